//! Shared helpers.
//!
//! - [`mime`]: MIME type detection by extension
//! - [`path`]: filesystem path normalization and content-path ↔ URL mapping
//! - [`url`]: source URL manipulation and reference classification

pub mod mime;
pub mod path;
pub mod url;
