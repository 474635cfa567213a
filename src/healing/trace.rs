use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

const MAX_EVENTS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealStage {
    /// A previously healed selector was used instead of the static definitions
    CacheHit,
    /// Every cached and static candidate failed to attach
    StaticMiss,
    AiSkipped,
    AiFailed,
    /// The model answered with a selector that matched nothing
    AiRejected,
    AiHealed,
    HeuristicHealed,
    Exhausted,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealEvent {
    pub timestamp: DateTime<Utc>,
    pub logical_name: String,
    pub stage: HealStage,
    pub detail: String,
}

/// Bounded record of fallback decisions, for attaching to test reports.
#[derive(Debug, Clone, Default)]
pub struct HealTrace {
    events: Arc<Mutex<VecDeque<HealEvent>>>,
}

impl HealTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, logical_name: &str, stage: HealStage, detail: impl Into<String>) {
        let event = HealEvent {
            timestamp: Utc::now(),
            logical_name: logical_name.to_string(),
            stage,
            detail: detail.into(),
        };
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        if events.len() == MAX_EVENTS {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub fn events(&self) -> Vec<HealEvent> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.iter().cloned().collect()
    }

    /// Drain everything recorded so far.
    pub fn take(&self) -> Vec<HealEvent> {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.drain(..).collect()
    }

    pub fn stages_for(&self, logical_name: &str) -> Vec<HealStage> {
        self.events()
            .into_iter()
            .filter(|e| e.logical_name == logical_name)
            .map(|e| e.stage)
            .collect()
    }
}
