//! Report renderers for classification results.
//!
//! - [`terminal`] — colored summary box and result table; respects `--quiet`.
//! - [`export`] — annotated CSV, JSON report and Markdown summary files.

pub mod export;
pub mod terminal;
