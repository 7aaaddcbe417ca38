//! LaTeX writer (C7) and reader (C8): converting between the document IR
//! and a bounded, compilable LaTeX subset.

pub mod config;
pub mod inline;
pub mod reader;
pub mod writer;

pub use config::LatexWriterConfig;
pub use reader::parse_latex;
pub use writer::{render_latex, render_latex_fragment};
