//! Mirror a GitBook-style documentation site into a local Markdown tree.
//!
//! This crate drives a navigable-document engine (headless Chrome by
//! default) through a site's table of contents and converts every page to
//! Markdown with localized images.
//!
//! # Pipeline
//!
//! - Discover the page hierarchy from the root page ([`toc`])
//! - Fetch each page through the engine with resilient retries
//!   ([`engine`], [`resilience`])
//! - Strip non-content noise in place ([`sanitize`])
//! - Extract the title/subtitle/body fragment ([`extract`])
//! - Convert to Markdown with the rule-driven transcoder
//!   (`bookmirror-markdown`)
//! - Download and rewrite embedded images ([`images`])
//! - Persist under a path mirroring the site's structure ([`output`])
//!
//! Pages are processed by a bounded worker pool ([`pipeline`]); one page's
//! failure never aborts its siblings, and partial runs are reported through
//! warnings and end-of-run statistics rather than a failing command.
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod images;
pub mod matcher;
pub mod output;
pub mod pipeline;
pub mod resilience;
pub mod sanitize;
pub mod toc;
