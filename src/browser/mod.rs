pub mod chrome;
pub mod sidecar;

pub use chrome::{ChromeElement, ChromePage};
pub use sidecar::{SidecarClient, SidecarElement, SidecarPage};
