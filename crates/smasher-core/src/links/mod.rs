//! Saved links
//!
//! - `model`: the `Link` entity plus the add / update DTOs
//! - `repository`: persistence with upsert-by-URL and import/export
//! - `url`: URL validation and hostname derivation

mod model;
mod repository;
pub mod url;

pub use model::{Link, LinkInput, LinkPatch, MAX_NOTES_LENGTH};
pub use repository::{filter_links, LinkRepository};
