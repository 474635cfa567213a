use crate::core::{ElementHandle, PageTrait};
use crate::dom::DomSnapshot;
use crate::errors::{HealError, Result};
use crate::healing::heuristics::HeuristicGenerator;
use crate::healing::store::HealingStore;
use crate::healing::trace::{HealStage, HealTrace};
use crate::inference::InferenceBackend;
use crate::types::HealingRequest;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Produces one validated selector for a logical name whose static candidates all failed.
///
/// The AI step runs first when enabled; a recoverable failure there is
/// logged and recorded on the trace, then heuristics take over. Storage
/// failures and heuristic exhaustion are errors.
pub struct Healer {
    store: Arc<HealingStore>,
    heuristics: HeuristicGenerator,
    backend: Option<Arc<dyn InferenceBackend>>,
    ai_enabled: bool,
    dom_limit: usize,
    trace: HealTrace,
}

impl Healer {
    pub fn new(store: Arc<HealingStore>, trace: HealTrace) -> Self {
        Self {
            store,
            heuristics: HeuristicGenerator::default(),
            backend: None,
            ai_enabled: false,
            dom_limit: 12000,
            trace,
        }
    }

    /// Enable the AI step with `backend`.
    pub fn with_backend(mut self, backend: Arc<dyn InferenceBackend>) -> Self {
        self.backend = Some(backend);
        self.ai_enabled = true;
        self
    }

    pub fn with_ai_enabled(mut self, enabled: bool) -> Self {
        self.ai_enabled = enabled;
        self
    }

    pub fn with_heuristics(mut self, heuristics: HeuristicGenerator) -> Self {
        self.heuristics = heuristics;
        self
    }

    pub fn with_dom_limit(mut self, limit: usize) -> Self {
        self.dom_limit = limit;
        self
    }

    pub async fn heal<P: PageTrait + ?Sized>(&self, page: &P, logical_name: &str) -> Result<String> {
        info!(target: "healing", logical_name, "healing locator");

        match self.heal_with_ai(page, logical_name).await {
            Ok(Some(selector)) => return Ok(selector),
            Ok(None) => {}
            Err(e) if !e.is_recoverable() => return Err(e),
            Err(e) => {
                warn!(target: "healing", logical_name, error = %e, "AI healing failed, using heuristics");
                self.trace.record(logical_name, HealStage::AiFailed, e.to_string());
            }
        }

        self.heal_with_heuristics(page, logical_name).await
    }

    /// `Ok(None)` when the AI step was skipped or its answer matched nothing.
    async fn heal_with_ai<P: PageTrait + ?Sized>(
        &self,
        page: &P,
        logical_name: &str,
    ) -> Result<Option<String>> {
        let backend = match (&self.backend, self.ai_enabled) {
            (Some(backend), true) => backend,
            (None, true) => {
                self.trace.record(logical_name, HealStage::AiSkipped, "no inference backend configured");
                return Ok(None);
            }
            (_, false) => {
                self.trace.record(logical_name, HealStage::AiSkipped, "AI healing disabled");
                return Ok(None);
            }
        };

        let snapshot = DomSnapshot::capture(page, self.dom_limit).await?;
        let request = HealingRequest::new(logical_name, snapshot.url, snapshot.markup);
        debug!(
            target: "healing",
            logical_name,
            attempt = %request.attempt_id,
            provider = backend.name(),
            truncated = snapshot.truncated,
            "asking inference backend"
        );

        let selector = backend.infer(&request).await?;
        let count = match page.locator(&selector).count().await {
            Ok(count) => count,
            Err(e) => {
                debug!(target: "healing", selector = %selector, error = %e, "AI selector could not be evaluated");
                0
            }
        };

        if count == 0 {
            let err = HealError::InvalidCandidate(selector.clone());
            warn!(target: "healing", logical_name, error = %err, "AI suggestion rejected, using heuristics");
            self.trace.record(logical_name, HealStage::AiRejected, selector);
            return Ok(None);
        }

        self.store.persist(logical_name, &selector).await?;
        info!(target: "healing", logical_name, selector = %selector, provider = backend.name(), "healed with AI");
        self.trace.record(logical_name, HealStage::AiHealed, selector.clone());
        Ok(Some(selector))
    }

    async fn heal_with_heuristics<P: PageTrait + ?Sized>(
        &self,
        page: &P,
        logical_name: &str,
    ) -> Result<String> {
        for selector in self.heuristics.candidates(logical_name) {
            match page.locator(&selector).count().await {
                Ok(count) if count > 0 => {
                    self.store.persist(logical_name, &selector).await?;
                    info!(target: "healing", logical_name, selector = %selector, "healed with heuristics");
                    self.trace.record(logical_name, HealStage::HeuristicHealed, selector.clone());
                    return Ok(selector);
                }
                Ok(_) => debug!(target: "healing", selector = %selector, "heuristic candidate matched nothing"),
                Err(e) => debug!(target: "healing", selector = %selector, error = %e, "heuristic candidate failed"),
            }
        }

        warn!(target: "healing", logical_name, "no healing strategy matched");
        self.trace.record(logical_name, HealStage::Exhausted, "all heuristic candidates matched nothing");
        Err(HealError::HealingExhausted(logical_name.to_string()))
    }
}
