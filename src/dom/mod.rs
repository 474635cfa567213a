pub mod html_page;
pub mod snapshot;

pub use html_page::{HtmlElement, HtmlPage, PageAction};
pub use snapshot::DomSnapshot;
