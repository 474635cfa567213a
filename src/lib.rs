pub mod browser;
pub mod core;
pub mod dom;
pub mod errors;
pub mod healing;
pub mod inference;
pub mod testing;
pub mod types;

pub use browser::{ChromePage, SidecarClient, SidecarPage};
pub use self::core::{Config, ElementHandle, PageTrait};
pub use dom::{DomSnapshot, HtmlPage};
pub use errors::{HealError, Result};
pub use healing::{BoundLocator, HealStage, HealTrace, HealingLocator, HealingStore, HeuristicGenerator};
pub use inference::{build_backend, InferenceBackend};
pub use types::*;
