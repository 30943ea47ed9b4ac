//! Link data model
//!
//! Links serialize with camelCase keys (`createdAt`) so the persisted and
//! exported JSON keeps the shape other surfaces already read.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::url::hostname;

/// Maximum length of a link's notes, in characters
pub const MAX_NOTES_LENGTH: usize = 200;

/// A saved link
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    /// Unique identifier, never changes
    pub id: String,
    /// The URL (unique across the collection)
    pub url: String,
    /// Display title
    pub title: String,
    /// Host without a leading `www.`, derived from `url`
    pub hostname: String,
    /// Labels, kept free of duplicates
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-text annotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Creation time in epoch milliseconds, never changes
    pub created_at: i64,
}

impl Link {
    /// Create a new link with a fresh id and the current timestamp
    ///
    /// The title defaults to the URL.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: Uuid::new_v4().to_string(),
            title: url.clone(),
            hostname: hostname(&url),
            url,
            tags: Vec::new(),
            notes: None,
            created_at: Utc::now().timestamp_millis(),
        }
    }

    /// Set the title, falling back to the URL when blank
    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        self.title = if title.trim().is_empty() {
            self.url.clone()
        } else {
            title
        };
    }

    /// Change the URL and re-derive the hostname
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
        self.hostname = hostname(&self.url);
    }

    /// Add a tag if not already present
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        let tag = tag.trim();
        if !tag.is_empty() && !self.tags.iter().any(|t| t == tag) {
            self.tags.push(tag.to_string());
        }
    }

    /// Remove a tag
    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.retain(|t| t != tag);
    }

    /// Replace all tags, collapsing duplicates
    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.clear();
        self.merge_tags(tags);
    }

    /// Union `tags` into the existing set, keeping existing order first
    pub fn merge_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            self.add_tag(tag);
        }
    }

    /// Replace the notes; an empty string clears them
    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = cap_notes(notes.into());
    }

    /// Case-insensitive substring match on title, URL, tags and notes
    ///
    /// `query` must already be lower-cased and trimmed.
    pub(crate) fn matches_query(&self, query: &str) -> bool {
        self.title.to_lowercase().contains(query)
            || self.url.to_lowercase().contains(query)
            || self.tags.iter().any(|t| t.to_lowercase().contains(query))
            || self
                .notes
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(query))
    }
}

/// Truncate notes to [`MAX_NOTES_LENGTH`] characters; empty means none
fn cap_notes(notes: String) -> Option<String> {
    if notes.is_empty() {
        return None;
    }
    match notes.char_indices().nth(MAX_NOTES_LENGTH) {
        Some((cut, _)) => Some(notes[..cut].to_string()),
        None => Some(notes),
    }
}

/// Data supplied when saving a link
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LinkInput {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// `None` leaves existing notes alone on upsert; `Some("")` clears them
    #[serde(default)]
    pub notes: Option<String>,
}

impl LinkInput {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Partial update for an existing link
///
/// `id`, `createdAt` and `hostname` are accepted so that a whole link can be
/// passed back as a patch, but they are never applied: the id and creation
/// time stay pinned and the hostname is re-derived from the URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkPatch {
    pub id: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub hostname: Option<String>,
    pub tags: Option<Vec<String>>,
    /// `Some("")` clears the notes, `None` keeps them
    pub notes: Option<String>,
    pub created_at: Option<i64>,
}

impl LinkPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Check if the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.url.is_none() && self.title.is_none() && self.tags.is_none() && self.notes.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_new() {
        let link = Link::new("https://www.example.com/page");
        assert_eq!(link.url, "https://www.example.com/page");
        assert_eq!(link.title, "https://www.example.com/page");
        assert_eq!(link.hostname, "example.com");
        assert!(link.tags.is_empty());
        assert!(link.notes.is_none());
        assert!(link.created_at > 0);
        assert!(Uuid::parse_str(&link.id).is_ok());
    }

    #[test]
    fn test_link_ids_are_unique() {
        let a = Link::new("https://example.com");
        let b = Link::new("https://example.com");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_set_title_blank_falls_back_to_url() {
        let mut link = Link::new("https://example.com");
        link.set_title("Example");
        assert_eq!(link.title, "Example");

        link.set_title("   ");
        assert_eq!(link.title, "https://example.com");
    }

    #[test]
    fn test_set_url_rederives_hostname() {
        let mut link = Link::new("https://example.com");
        link.set_url("https://www.rust-lang.org/learn");
        assert_eq!(link.hostname, "rust-lang.org");
    }

    #[test]
    fn test_link_tags() {
        let mut link = Link::new("https://example.com");
        link.add_tag("rust");
        link.add_tag("programming");
        assert_eq!(link.tags, vec!["rust", "programming"]);

        // Duplicates and blanks are ignored
        link.add_tag("rust");
        link.add_tag("  ");
        assert_eq!(link.tags.len(), 2);

        // Tags are case-sensitive
        link.add_tag("Rust");
        assert_eq!(link.tags, vec!["rust", "programming", "Rust"]);

        link.remove_tag("rust");
        assert_eq!(link.tags, vec!["programming", "Rust"]);
    }

    #[test]
    fn test_merge_tags_is_union() {
        let mut link = Link::new("https://example.com");
        link.set_tags(["x", "y", "x"]);
        assert_eq!(link.tags, vec!["x", "y"]);

        link.merge_tags(["y", "z"]);
        assert_eq!(link.tags, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_notes_capped_and_cleared() {
        let mut link = Link::new("https://example.com");

        link.set_notes("é".repeat(250));
        assert_eq!(link.notes.as_ref().unwrap().chars().count(), MAX_NOTES_LENGTH);

        link.set_notes("short");
        assert_eq!(link.notes.as_deref(), Some("short"));

        link.set_notes("");
        assert!(link.notes.is_none());
    }

    #[test]
    fn test_matches_query() {
        let mut link = Link::new("https://docs.rs/tokio");
        link.set_title("Tokio Docs");
        link.add_tag("Async");
        link.set_notes("runtime reference");

        assert!(link.matches_query("tokio"));
        assert!(link.matches_query("async"));
        assert!(link.matches_query("reference"));
        assert!(link.matches_query("docs.rs"));
        assert!(!link.matches_query("python"));
    }

    #[test]
    fn test_link_serialization_uses_camel_case() {
        let mut link = Link::new("https://example.com");
        link.add_tag("test");
        let json = serde_json::to_value(&link).unwrap();

        assert!(json.get("createdAt").is_some());
        assert!(json.get("created_at").is_none());
        // Absent notes are omitted
        assert!(json.get("notes").is_none());

        let deserialized: Link = serde_json::from_value(json).unwrap();
        assert_eq!(link, deserialized);
    }

    #[test]
    fn test_patch_accepts_whole_link_shape() {
        let patch: LinkPatch = serde_json::from_str(
            r#"{"id": "other", "createdAt": 0, "title": "new", "hostname": "x.com"}"#,
        )
        .unwrap();

        assert_eq!(patch.id.as_deref(), Some("other"));
        assert_eq!(patch.created_at, Some(0));
        assert_eq!(patch.title.as_deref(), Some("new"));
        assert!(patch.url.is_none());
        assert!(!patch.is_empty());
        assert!(LinkPatch::new().is_empty());
    }
}
