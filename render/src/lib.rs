mod buffer;
pub mod components;
mod settings;
pub mod site;
mod theme;

pub use buffer::Buffer;
pub use components::{Component, Content, RenderContext, VerifyError};
pub use settings::{BASELINE_ATTRIBUTES, Settings};
pub use site::{SiteAssets, render_frame, render_page_body, render_site};
pub use theme::{Theme, UnknownTheme, theme_names};
