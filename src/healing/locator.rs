use crate::core::{Config, ElementHandle, PageTrait};
use crate::errors::{HealError, Result};
use crate::healing::healer::Healer;
use crate::healing::heuristics::HeuristicGenerator;
use crate::healing::store::HealingStore;
use crate::healing::trace::{HealStage, HealTrace};
use crate::inference::{build_backend, InferenceBackend};
use crate::types::{AttachOutcome, ElementState, LocatorCandidate};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Resolves logical element names against a live page.
///
/// Resolution order: the stored healed selector (if any), then the caller's
/// static candidates, each given `attach_timeout` to attach. When all of
/// them fail the [`Healer`] produces a fresh selector, which it has already
/// validated and persisted.
pub struct HealingLocator<P: PageTrait> {
    page: Arc<P>,
    store: Arc<HealingStore>,
    healer: Healer,
    attach_timeout: Duration,
    trace: HealTrace,
}

impl<P: PageTrait> HealingLocator<P> {
    pub fn new(page: Arc<P>, store: Arc<HealingStore>) -> Self {
        let trace = HealTrace::new();
        Self {
            healer: Healer::new(Arc::clone(&store), trace.clone()),
            page,
            store,
            attach_timeout: Duration::from_millis(1500),
            trace,
        }
    }

    /// Build from configuration, opening the store and, when AI healing is
    /// enabled, constructing the configured backend.
    pub fn from_config(page: Arc<P>, config: &Config) -> Result<Self> {
        let store = Arc::new(HealingStore::open(&config.healing.store_path)?);
        let mut locator = Self::new(page, store)
            .with_attach_timeout(Duration::from_millis(config.healing.attach_timeout_ms))
            .with_dom_limit(config.healing.dom_snapshot_limit);
        if config.healing.ai_enabled {
            let backend = build_backend(&config.inference)?;
            locator = locator.with_backend(backend);
        }
        Ok(locator)
    }

    pub fn with_attach_timeout(mut self, timeout: Duration) -> Self {
        self.attach_timeout = timeout;
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn InferenceBackend>) -> Self {
        self.healer = self.healer.with_backend(backend);
        self
    }

    /// Switch the AI step on or off without dropping the configured backend.
    pub fn with_ai_enabled(mut self, enabled: bool) -> Self {
        self.healer = self.healer.with_ai_enabled(enabled);
        self
    }

    pub fn with_heuristics(mut self, heuristics: HeuristicGenerator) -> Self {
        self.healer = self.healer.with_heuristics(heuristics);
        self
    }

    /// Cap on DOM characters sent to the inference backend.
    pub fn with_dom_limit(mut self, limit: usize) -> Self {
        self.healer = self.healer.with_dom_limit(limit);
        self
    }

    pub fn page(&self) -> &Arc<P> {
        &self.page
    }

    pub fn store(&self) -> &Arc<HealingStore> {
        &self.store
    }

    pub fn trace(&self) -> &HealTrace {
        &self.trace
    }

    /// Bind a logical name to its static definitions.
    pub fn bind<C>(&self, logical_name: &str, candidates: C) -> BoundLocator<'_, P>
    where
        C: IntoIterator,
        C::Item: Into<LocatorCandidate<P::Handle>>,
    {
        BoundLocator {
            locator: self,
            logical_name: logical_name.to_string(),
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }

    pub async fn resolve(
        &self,
        logical_name: &str,
        candidates: &[LocatorCandidate<P::Handle>],
    ) -> Result<P::Handle> {
        let cached = self.store.lookup(logical_name).await;

        if let Some(selector) = cached.as_deref() {
            let handle = self.page.locator(selector);
            if self.attach(&handle).await.is_attached() {
                debug!(target: "healing", logical_name, selector, "resolved from healing store");
                self.trace.record(logical_name, HealStage::CacheHit, selector);
                return Ok(handle);
            }
        }

        for candidate in candidates {
            let (handle, outcome) = match candidate {
                LocatorCandidate::Selector(selector) => {
                    let handle = self.page.locator(selector);
                    let outcome = self.attach(&handle).await;
                    (Some(handle), outcome)
                }
                LocatorCandidate::Resolver(resolve) => match resolve() {
                    Ok(handle) => {
                        let outcome = self.attach(&handle).await;
                        (Some(handle), outcome)
                    }
                    Err(e) => (None, AttachOutcome::Errored(e.to_string())),
                },
            };

            match (handle, outcome) {
                (Some(handle), AttachOutcome::Attached) => return Ok(handle),
                (_, outcome) => debug!(
                    target: "healing",
                    logical_name,
                    candidate = %candidate.describe(),
                    ?outcome,
                    "static candidate failed"
                ),
            }
        }

        let tried = candidates.len() + usize::from(cached.is_some());
        info!(target: "healing", logical_name, tried, "all candidates failed");
        self.trace.record(
            logical_name,
            HealStage::StaticMiss,
            format!("{tried} candidate(s) failed to attach"),
        );

        let healed = self.healer.heal(self.page.as_ref(), logical_name).await?;
        Ok(self.page.locator(&healed))
    }

    pub async fn click(&self, logical_name: &str, candidates: &[LocatorCandidate<P::Handle>]) -> Result<()> {
        self.resolve(logical_name, candidates).await?.click().await
    }

    pub async fn fill(
        &self,
        logical_name: &str,
        candidates: &[LocatorCandidate<P::Handle>],
        value: &str,
    ) -> Result<()> {
        self.resolve(logical_name, candidates).await?.fill(value).await
    }

    pub async fn text_content(
        &self,
        logical_name: &str,
        candidates: &[LocatorCandidate<P::Handle>],
    ) -> Result<Option<String>> {
        self.resolve(logical_name, candidates).await?.text_content().await
    }

    async fn attach(&self, handle: &P::Handle) -> AttachOutcome {
        match handle.wait_for(ElementState::Attached, self.attach_timeout).await {
            Ok(()) => AttachOutcome::Attached,
            Err(HealError::CandidateTimeout(_)) => AttachOutcome::TimedOut,
            Err(e) => AttachOutcome::Errored(e.to_string()),
        }
    }
}

/// A logical name bound to its static definitions; what page objects hold.
pub struct BoundLocator<'a, P: PageTrait> {
    locator: &'a HealingLocator<P>,
    logical_name: String,
    candidates: Vec<LocatorCandidate<P::Handle>>,
}

impl<'a, P: PageTrait> BoundLocator<'a, P> {
    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    pub async fn resolve(&self) -> Result<P::Handle> {
        self.locator.resolve(&self.logical_name, &self.candidates).await
    }

    pub async fn click(&self) -> Result<()> {
        self.resolve().await?.click().await
    }

    pub async fn fill(&self, value: &str) -> Result<()> {
        self.resolve().await?.fill(value).await
    }

    pub async fn text_content(&self) -> Result<Option<String>> {
        self.resolve().await?.text_content().await
    }
}
