pub mod healer;
pub mod heuristics;
pub mod locator;
pub mod store;
pub mod trace;

pub use healer::Healer;
pub use heuristics::{HeuristicGenerator, TokenRule};
pub use locator::{BoundLocator, HealingLocator};
pub use store::HealingStore;
pub use trace::{HealEvent, HealStage, HealTrace};
