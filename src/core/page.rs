use crate::errors::Result;
use crate::types::ElementState;
use async_trait::async_trait;
use std::time::Duration;

/// A lazily evaluated element reference, re-queried on every call.
#[async_trait]
pub trait ElementHandle: Send + Sync {
    /// Selector or description this handle was built from
    fn selector(&self) -> &str;

    /// Wait until the element reaches `state`, failing with `CandidateTimeout`
    async fn wait_for(&self, state: ElementState, timeout: Duration) -> Result<()>;

    /// Number of elements currently matching
    async fn count(&self) -> Result<usize>;

    async fn click(&self) -> Result<()>;

    async fn fill(&self, value: &str) -> Result<()>;

    async fn text_content(&self) -> Result<Option<String>>;
}

/// The page capability the resolution engine drives.
#[async_trait]
pub trait PageTrait: Send + Sync {
    type Handle: ElementHandle;

    /// Build a handle for a selector; nothing is queried until it is used
    fn locator(&self, selector: &str) -> Self::Handle;

    /// Current page URL
    async fn url(&self) -> Result<String>;

    /// Serialized outer markup of the document
    async fn content(&self) -> Result<String>;
}
