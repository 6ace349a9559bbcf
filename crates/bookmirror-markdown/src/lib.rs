//! HTML to Markdown conversion for mirrored documentation pages.
//!
//! This crate owns the document representation and the conversion pipeline
//! used by the `bookmirror` crawler:
//!
//! - **Node tree**: an owned, mutable [`HtmlNode`]/[`HtmlElement`] tree that
//!   sanitization and extraction operate on without a live browser.
//! - **Parser**: maps `scraper`'s parse output into the node tree.
//! - **Converter**: rule-driven DOM to Markdown conversion. Rules are tried
//!   in registration order and the first match wins; anything no rule claims
//!   falls through to generic block and inline defaults.
//! - **Normalizer**: a whole-document post-pass that repairs pipe tables
//!   whose separator row was lost during conversion.
//!
//! # Example
//!
//! ```rust
//! use bookmirror_markdown::{Converter, parser};
//!
//! let nodes = parser::parse_fragment("<p>Hello <strong>world</strong>!</p>");
//! let markdown = Converter::new().convert(&nodes).unwrap();
//! assert_eq!(markdown.trim(), "Hello **world**!");
//! ```
pub mod converter;
pub mod node;
pub mod normalizer;
pub mod parser;

pub use converter::Converter;
pub use node::{HtmlElement, HtmlNode};
pub use normalizer::normalize_tables;
pub use parser::{parse_document, parse_fragment};
