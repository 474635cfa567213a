use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Closure producing a live element handle directly, for definitions that
/// need page context a plain selector cannot express.
pub type HandleResolver<H> = Arc<dyn Fn() -> Result<H> + Send + Sync>;

/// One static way of locating an element.
pub enum LocatorCandidate<H> {
    Selector(String),
    Resolver(HandleResolver<H>),
}

impl<H> LocatorCandidate<H> {
    pub fn selector(selector: impl Into<String>) -> Self {
        LocatorCandidate::Selector(selector.into())
    }

    pub fn resolver<F>(f: F) -> Self
    where
        F: Fn() -> Result<H> + Send + Sync + 'static,
    {
        LocatorCandidate::Resolver(Arc::new(f))
    }

    pub fn describe(&self) -> String {
        match self {
            LocatorCandidate::Selector(selector) => selector.clone(),
            LocatorCandidate::Resolver(_) => "<resolver>".to_string(),
        }
    }
}

impl<H> Clone for LocatorCandidate<H> {
    fn clone(&self) -> Self {
        match self {
            LocatorCandidate::Selector(selector) => LocatorCandidate::Selector(selector.clone()),
            LocatorCandidate::Resolver(f) => LocatorCandidate::Resolver(Arc::clone(f)),
        }
    }
}

impl<H> fmt::Debug for LocatorCandidate<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocatorCandidate::Selector(selector) => f.debug_tuple("Selector").field(selector).finish(),
            LocatorCandidate::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

impl<H> From<&str> for LocatorCandidate<H> {
    fn from(selector: &str) -> Self {
        LocatorCandidate::Selector(selector.to_string())
    }
}

impl<H> From<String> for LocatorCandidate<H> {
    fn from(selector: String) -> Self {
        LocatorCandidate::Selector(selector)
    }
}

/// Result of trying one static or cached candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachOutcome {
    Attached,
    TimedOut,
    Errored(String),
}

impl AttachOutcome {
    pub fn is_attached(&self) -> bool {
        matches!(self, AttachOutcome::Attached)
    }
}

/// DOM state a handle can be waited on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementState {
    Attached,
    Detached,
    Visible,
    Hidden,
}

impl ElementState {
    pub fn name(&self) -> &'static str {
        match self {
            ElementState::Attached => "attached",
            ElementState::Detached => "detached",
            ElementState::Visible => "visible",
            ElementState::Hidden => "hidden",
        }
    }
}

/// Everything an inference backend sees for one heal.
#[derive(Debug, Clone, Serialize)]
pub struct HealingRequest {
    pub attempt_id: uuid::Uuid,
    pub logical_name: String,
    pub url: String,
    pub dom: String,
}

impl HealingRequest {
    pub fn new(logical_name: impl Into<String>, url: impl Into<String>, dom: impl Into<String>) -> Self {
        Self {
            attempt_id: uuid::Uuid::new_v4(),
            logical_name: logical_name.into(),
            url: url.into(),
            dom: dom.into(),
        }
    }
}

/// The heuristic key of a logical name: its last dot-delimited segment.
pub fn logical_key(logical_name: &str) -> &str {
    logical_name.rsplit('.').next().unwrap_or(logical_name).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_key() {
        assert_eq!(logical_key("cartPage.checkoutButton"), "checkoutButton");
        assert_eq!(logical_key("products"), "products");
        assert_eq!(logical_key("a.b.c"), "c");
        assert_eq!(logical_key("trailing."), "");
    }

    #[test]
    fn test_candidate_conversions() {
        let candidate: LocatorCandidate<()> = "#login-button".into();
        assert_eq!(candidate.describe(), "#login-button");

        let resolver: LocatorCandidate<()> = LocatorCandidate::resolver(|| Ok(()));
        assert_eq!(resolver.describe(), "<resolver>");
        assert_eq!(format!("{:?}", resolver.clone()), "Resolver(..)");
    }

    #[test]
    fn test_requests_get_distinct_attempt_ids() {
        let a = HealingRequest::new("x", "about:blank", "");
        let b = HealingRequest::new("x", "about:blank", "");
        assert_ne!(a.attempt_id, b.attempt_id);
    }
}
