//! Report rendering.
//!
//! Produces Markdown and JSON reports for an estimate run.

pub mod generator;

pub use generator::{generate_json_report, generate_markdown_report, MarkdownOptions};
