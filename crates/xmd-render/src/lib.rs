//! HTML preview rendering of the document IR (C6).

pub mod config;
pub mod escape;
pub mod html;
pub mod inline;

pub use config::{HtmlRendererConfig, PlainImageMode};
pub use html::render_html;
