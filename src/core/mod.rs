pub mod config;
pub mod page;

pub use config::{
    BrowserConfig, Config, HealingConfig, InferenceConfig, ProviderSettings, SidecarConfig,
    Viewport,
};
pub use page::{ElementHandle, PageTrait};
