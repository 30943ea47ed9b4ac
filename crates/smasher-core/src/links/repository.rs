//! Link repository
//!
//! The `LinkRepository` owns the `links` key of the store. The whole
//! collection is read and written as one unit; every mutation runs inside a
//! [`Transaction`] so concurrent calls through the same repository (or any
//! repository sharing its [`KeyLocks`]) serialize instead of overwriting
//! each other.
//!
//! ## Usage
//!
//! ```ignore
//! let repo = LinkRepository::new(Arc::new(FileStore::from_config(&config)));
//!
//! // Saving the same URL twice merges into one entry
//! repo.add(LinkInput::new("https://example.com").tags(["rust"])).await?;
//! repo.add(LinkInput::new("https://example.com").tags(["async"])).await?;
//!
//! let links = repo.get_by_hostname("example.com").await?;
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::model::{Link, LinkInput, LinkPatch};
use super::url::is_valid_url;
use crate::error::{Error, Result};
use crate::message::{Message, Notifier};
use crate::store::{keys, read_value, KeyLocks, KeyValueStore, Transaction};

/// CRUD, upsert and import/export over the stored link collection
#[derive(Clone)]
pub struct LinkRepository {
    store: Arc<dyn KeyValueStore>,
    locks: KeyLocks,
    notifier: Notifier,
}

impl LinkRepository {
    /// Create a repository with its own lock set and notifier
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_locks(store, KeyLocks::new())
    }

    /// Create a repository that coordinates writes through `locks`
    pub fn with_locks(store: Arc<dyn KeyValueStore>, locks: KeyLocks) -> Self {
        Self {
            store,
            locks,
            notifier: Notifier::new(),
        }
    }

    /// Broadcast change messages on `notifier` instead of a private one
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Notifier that receives a `LinksChanged` message after every write
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    async fn begin(&self) -> Transaction<'_> {
        Transaction::begin(self.store.as_ref(), &self.locks, keys::LINKS).await
    }

    async fn load(&self) -> Result<Vec<Link>> {
        read_value(self.store.as_ref(), keys::LINKS).await
    }

    fn changed(&self, hostname: Option<String>) {
        self.notifier.send(Message::LinksChanged { hostname });
    }

    // ==================== Writes ====================

    /// Save a link, merging into an existing entry with the same URL
    ///
    /// On a URL match the existing id and creation time are kept, a
    /// non-empty title replaces the old one, tags are unioned, and notes are
    /// replaced only when the input carries them. Otherwise a new link is
    /// prepended to the collection.
    pub async fn add(&self, input: LinkInput) -> Result<Link> {
        if !is_valid_url(&input.url) {
            return Err(Error::invalid_input(format!("Invalid URL: {}", input.url)));
        }

        let txn = self.begin().await;
        let mut links: Vec<Link> = txn.read().await?;

        let link = match links.iter().position(|l| l.url == input.url) {
            Some(index) => {
                let existing = &mut links[index];
                if !input.title.trim().is_empty() {
                    existing.title = input.title;
                }
                existing.merge_tags(input.tags);
                if let Some(notes) = input.notes {
                    existing.set_notes(notes);
                }
                info!("Updated existing link {} ({})", existing.id, existing.url);
                existing.clone()
            }
            None => {
                let mut link = Link::new(input.url);
                link.set_title(input.title);
                link.set_tags(input.tags);
                if let Some(notes) = input.notes {
                    link.set_notes(notes);
                }
                info!("Saved new link {} ({})", link.id, link.url);
                links.insert(0, link.clone());
                link
            }
        };

        txn.write(&links).await?;
        drop(txn);

        self.changed(Some(link.hostname.clone()));
        Ok(link)
    }

    /// Apply `patch` to the link with `id`
    ///
    /// Returns `Ok(None)` when no link has that id. The id and creation time
    /// are never changed, even if the patch carries them.
    pub async fn update(&self, id: &str, patch: LinkPatch) -> Result<Option<Link>> {
        if let Some(url) = &patch.url {
            if !is_valid_url(url) {
                return Err(Error::invalid_input(format!("Invalid URL: {}", url)));
            }
        }

        let txn = self.begin().await;
        let mut links: Vec<Link> = txn.read().await?;

        let Some(link) = links.iter_mut().find(|l| l.id == id) else {
            debug!("Update skipped, no link with id {}", id);
            return Ok(None);
        };

        let previous_hostname = link.hostname.clone();
        if let Some(url) = patch.url {
            link.set_url(url);
        }
        if let Some(title) = patch.title {
            link.set_title(title);
        }
        if let Some(tags) = patch.tags {
            link.set_tags(tags);
        }
        if let Some(notes) = patch.notes {
            link.set_notes(notes);
        }
        let updated = link.clone();

        txn.write(&links).await?;
        drop(txn);

        info!("Updated link {}", updated.id);
        let hostname = (updated.hostname == previous_hostname).then(|| previous_hostname);
        self.changed(hostname);
        Ok(Some(updated))
    }

    /// Remove the link with `id`; unknown ids are ignored
    pub async fn delete(&self, id: &str) -> Result<()> {
        let txn = self.begin().await;
        let mut links: Vec<Link> = txn.read().await?;

        let Some(index) = links.iter().position(|l| l.id == id) else {
            debug!("Delete skipped, no link with id {}", id);
            return Ok(());
        };
        let removed = links.remove(index);

        txn.write(&links).await?;
        drop(txn);

        info!("Deleted link {} ({})", removed.id, removed.url);
        self.changed(Some(removed.hostname));
        Ok(())
    }

    // ==================== Reads ====================

    /// Get all links in stored (newest-first) order
    pub async fn get_all(&self) -> Result<Vec<Link>> {
        let links = self.load().await?;
        debug!("Loaded {} link(s)", links.len());
        Ok(links)
    }

    /// Get a link by id
    pub async fn get(&self, id: &str) -> Result<Option<Link>> {
        Ok(self.load().await?.into_iter().find(|l| l.id == id))
    }

    /// Get links whose hostname equals `hostname` exactly
    pub async fn get_by_hostname(&self, hostname: &str) -> Result<Vec<Link>> {
        let mut links = self.load().await?;
        links.retain(|l| l.hostname == hostname);
        Ok(links)
    }

    /// Case-insensitive search across title, URL, tags and notes
    pub async fn search(&self, query: &str) -> Result<Vec<Link>> {
        Ok(filter_links(&self.load().await?, query))
    }

    /// All tags with the number of links carrying each, alphabetical
    pub async fn tags_with_counts(&self) -> Result<Vec<(String, usize)>> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for link in self.load().await? {
            for tag in link.tags {
                *counts.entry(tag).or_default() += 1;
            }
        }
        Ok(counts.into_iter().collect())
    }

    // ==================== Import / Export ====================

    /// Serialize the full collection as pretty-printed JSON
    pub async fn export_all(&self) -> Result<String> {
        let links = self.load().await?;
        Ok(serde_json::to_string_pretty(&links)?)
    }

    /// Import links from JSON text, returning how many were added
    ///
    /// The payload must be a JSON array. Items missing a non-empty `id`,
    /// `url` or `hostname`, or a numeric `createdAt`, are skipped. Items
    /// whose URL is already stored are skipped too: existing entries always
    /// win and are never merged. Survivors are prepended in payload order.
    pub async fn import_all(&self, text: &str) -> Result<usize> {
        let payload: Value = serde_json::from_str(text)
            .map_err(|e| Error::ImportFormat(format!("not valid JSON: {}", e)))?;
        let Value::Array(items) = payload else {
            return Err(Error::ImportFormat("not an array".to_string()));
        };

        let candidates: Vec<Link> = items.iter().filter_map(parse_import_item).collect();
        let invalid = items.len() - candidates.len();
        if invalid > 0 {
            warn!("Import skipped {} malformed item(s)", invalid);
        }
        if candidates.is_empty() {
            return Ok(0);
        }

        let txn = self.begin().await;
        let existing: Vec<Link> = txn.read().await?;

        let mut seen: HashSet<String> = existing.iter().map(|l| l.url.clone()).collect();
        let mut merged: Vec<Link> = candidates
            .into_iter()
            .filter(|l| seen.insert(l.url.clone()))
            .collect();

        let added = merged.len();
        if added == 0 {
            debug!("Import found nothing new");
            return Ok(0);
        }

        merged.extend(existing);
        txn.write(&merged).await?;
        drop(txn);

        info!("Imported {} link(s)", added);
        self.changed(None);
        Ok(added)
    }
}

/// Keep links matching `query` (case-insensitive); a blank query keeps all
pub fn filter_links(links: &[Link], query: &str) -> Vec<Link> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return links.to_vec();
    }
    links
        .iter()
        .filter(|l| l.matches_query(&query))
        .cloned()
        .collect()
}

/// Structurally validate one imported item
fn parse_import_item(value: &Value) -> Option<Link> {
    let obj = value.as_object()?;

    let id = non_empty_str(obj, "id")?;
    let url = non_empty_str(obj, "url")?;
    let hostname = non_empty_str(obj, "hostname")?;
    let created_at = obj.get("createdAt").and_then(|v| {
        v.as_i64()
            .or_else(|| v.as_f64().map(|millis| millis as i64))
    })?;

    let mut link = Link {
        id: id.to_string(),
        url: url.to_string(),
        title: non_empty_str(obj, "title").unwrap_or(url).to_string(),
        hostname: hostname.to_string(),
        tags: Vec::new(),
        notes: None,
        created_at,
    };

    if let Some(tags) = obj.get("tags").and_then(Value::as_array) {
        link.set_tags(tags.iter().filter_map(Value::as_str));
    }
    if let Some(notes) = obj.get("notes").and_then(Value::as_str) {
        link.set_notes(notes);
    }

    Some(link)
}

fn non_empty_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileStore, MemoryStore};
    use futures_util::future::join_all;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_repo() -> LinkRepository {
        LinkRepository::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_add_new_link() {
        let repo = test_repo();

        let link = repo
            .add(
                LinkInput::new("https://www.rust-lang.org/learn")
                    .title("Learn Rust")
                    .tags(["rust", "docs"])
                    .notes("the book"),
            )
            .await
            .unwrap();

        assert_eq!(link.title, "Learn Rust");
        assert_eq!(link.hostname, "rust-lang.org");
        assert_eq!(link.tags, vec!["rust", "docs"]);
        assert_eq!(link.notes.as_deref(), Some("the book"));

        let all = repo.get_all().await.unwrap();
        assert_eq!(all, vec![link]);
    }

    #[tokio::test]
    async fn test_add_defaults_title_to_url() {
        let repo = test_repo();
        let link = repo.add(LinkInput::new("https://example.com")).await.unwrap();
        assert_eq!(link.title, "https://example.com");
    }

    #[tokio::test]
    async fn test_add_rejects_invalid_url() {
        let repo = test_repo();

        let err = repo.add(LinkInput::new("not a url")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(repo.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_is_newest_first() {
        let repo = test_repo();
        repo.add(LinkInput::new("https://one.com")).await.unwrap();
        repo.add(LinkInput::new("https://two.com")).await.unwrap();
        repo.add(LinkInput::new("https://three.com")).await.unwrap();

        let urls: Vec<_> = repo
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.url)
            .collect();
        assert_eq!(
            urls,
            vec!["https://three.com", "https://two.com", "https://one.com"]
        );
    }

    #[tokio::test]
    async fn test_add_same_url_keeps_one_entry() {
        let repo = test_repo();
        for _ in 0..5 {
            repo.add(LinkInput::new("https://a.com")).await.unwrap();
        }
        repo.add(LinkInput::new("https://b.com")).await.unwrap();
        repo.add(LinkInput::new("https://a.com")).await.unwrap();

        assert_eq!(repo.get_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_merges_fields() {
        let repo = test_repo();
        let original = repo
            .add(LinkInput::new("https://a.com").title("T1").tags(["x"]).notes("n"))
            .await
            .unwrap();

        let merged = repo
            .add(LinkInput::new("https://a.com").title("T2").tags(["y"]))
            .await
            .unwrap();

        assert_eq!(merged.id, original.id);
        assert_eq!(merged.created_at, original.created_at);
        assert_eq!(merged.title, "T2");
        assert_eq!(merged.tags, vec!["x", "y"]);
        // No notes supplied, so the old ones stay
        assert_eq!(merged.notes.as_deref(), Some("n"));
        assert_eq!(repo.get_all().await.unwrap(), vec![merged]);
    }

    #[tokio::test]
    async fn test_upsert_keeps_title_when_blank() {
        let repo = test_repo();
        repo.add(LinkInput::new("https://a.com").title("Keep me"))
            .await
            .unwrap();

        let merged = repo.add(LinkInput::new("https://a.com")).await.unwrap();
        assert_eq!(merged.title, "Keep me");
    }

    #[tokio::test]
    async fn test_upsert_explicit_empty_notes_clears() {
        let repo = test_repo();
        repo.add(LinkInput::new("https://a.com").notes("old"))
            .await
            .unwrap();

        let merged = repo
            .add(LinkInput::new("https://a.com").notes(""))
            .await
            .unwrap();
        assert!(merged.notes.is_none());
    }

    #[tokio::test]
    async fn test_upsert_tag_union_is_case_sensitive() {
        let repo = test_repo();
        repo.add(LinkInput::new("https://a.com").tags(["rust"]))
            .await
            .unwrap();

        let merged = repo
            .add(LinkInput::new("https://a.com").tags(["Rust", "rust"]))
            .await
            .unwrap();
        assert_eq!(merged.tags, vec!["rust", "Rust"]);
    }

    #[tokio::test]
    async fn test_update_pins_id_and_created_at() {
        let repo = test_repo();
        let link = repo.add(LinkInput::new("https://a.com")).await.unwrap();

        let patch = LinkPatch {
            id: Some("other".to_string()),
            created_at: Some(0),
            title: Some("new".to_string()),
            ..LinkPatch::default()
        };
        let updated = repo.update(&link.id, patch).await.unwrap().unwrap();

        assert_eq!(updated.id, link.id);
        assert_eq!(updated.created_at, link.created_at);
        assert_eq!(updated.title, "new");
        assert_eq!(updated.url, link.url);
        assert!(repo.get("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_none() {
        let repo = test_repo();
        repo.add(LinkInput::new("https://a.com")).await.unwrap();

        let result = repo
            .update("missing", LinkPatch::new().title("x"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_update_url_rederives_hostname() {
        let repo = test_repo();
        let link = repo
            .add(LinkInput::new("https://a.com").title("A"))
            .await
            .unwrap();

        let updated = repo
            .update(&link.id, LinkPatch::new().url("https://www.b.org/page"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.hostname, "b.org");
        assert_eq!(updated.title, "A");
        assert!(repo.get_by_hostname("a.com").await.unwrap().is_empty());
        assert_eq!(repo.get_by_hostname("b.org").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_url() {
        let repo = test_repo();
        let link = repo.add(LinkInput::new("https://a.com")).await.unwrap();

        let err = repo
            .update(&link.id, LinkPatch::new().url("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(repo.get(&link.id).await.unwrap().unwrap().url, "https://a.com");
    }

    #[tokio::test]
    async fn test_update_notes_omitted_vs_empty() {
        let repo = test_repo();
        let link = repo
            .add(LinkInput::new("https://a.com").notes("keep"))
            .await
            .unwrap();

        let updated = repo
            .update(&link.id, LinkPatch::new().title("t"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("keep"));

        let updated = repo
            .update(&link.id, LinkPatch::new().notes(""))
            .await
            .unwrap()
            .unwrap();
        assert!(updated.notes.is_none());
    }

    #[tokio::test]
    async fn test_update_replaces_tags() {
        let repo = test_repo();
        let link = repo
            .add(LinkInput::new("https://a.com").tags(["x", "y"]))
            .await
            .unwrap();

        let updated = repo
            .update(&link.id, LinkPatch::new().tags(["z"]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.tags, vec!["z"]);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let repo = test_repo();
        let link = repo.add(LinkInput::new("https://a.com")).await.unwrap();
        repo.add(LinkInput::new("https://b.com")).await.unwrap();

        repo.delete("missing").await.unwrap();
        repo.delete("missing").await.unwrap();
        assert_eq!(repo.get_all().await.unwrap().len(), 2);

        repo.delete(&link.id).await.unwrap();
        repo.delete(&link.id).await.unwrap();
        let remaining = repo.get_all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].url, "https://b.com");
    }

    #[tokio::test]
    async fn test_get_by_hostname_is_exact() {
        let repo = test_repo();
        repo.add(LinkInput::new("https://www.example.com/a"))
            .await
            .unwrap();
        repo.add(LinkInput::new("https://example.com/b")).await.unwrap();
        repo.add(LinkInput::new("https://blog.example.com/c"))
            .await
            .unwrap();

        assert_eq!(repo.get_by_hostname("example.com").await.unwrap().len(), 2);
        assert_eq!(
            repo.get_by_hostname("blog.example.com").await.unwrap().len(),
            1
        );
        assert!(repo.get_by_hostname("Example.com").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search() {
        let repo = test_repo();
        repo.add(
            LinkInput::new("https://rust-lang.org")
                .title("Rust Programming Language")
                .tags(["lang"]),
        )
        .await
        .unwrap();
        repo.add(LinkInput::new("https://python.org").notes("Also a language"))
            .await
            .unwrap();

        assert_eq!(repo.search("programming").await.unwrap().len(), 1);
        assert_eq!(repo.search("LANG").await.unwrap().len(), 2);
        assert_eq!(repo.search("  ").await.unwrap().len(), 2);
        assert!(repo.search("haskell").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tags_with_counts() {
        let repo = test_repo();
        repo.add(LinkInput::new("https://a.com").tags(["web", "shared"]))
            .await
            .unwrap();
        repo.add(LinkInput::new("https://b.com").tags(["shared"]))
            .await
            .unwrap();

        let tags = repo.tags_with_counts().await.unwrap();
        assert_eq!(
            tags,
            vec![("shared".to_string(), 2), ("web".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_export_is_pretty_json_array() {
        let repo = test_repo();
        repo.add(LinkInput::new("https://a.com")).await.unwrap();

        let text = repo.export_all().await.unwrap();
        assert!(text.contains('\n'));
        let parsed: Vec<Link> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, repo.get_all().await.unwrap());
    }

    #[tokio::test]
    async fn test_export_import_into_same_store_adds_nothing() {
        let repo = test_repo();
        repo.add(LinkInput::new("https://a.com")).await.unwrap();
        repo.add(LinkInput::new("https://b.com")).await.unwrap();

        let text = repo.export_all().await.unwrap();
        assert_eq!(repo.import_all(&text).await.unwrap(), 0);
        assert_eq!(repo.get_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_export_import_into_empty_store() {
        let source = test_repo();
        source.add(LinkInput::new("https://a.com").tags(["x"]))
            .await
            .unwrap();
        source.add(LinkInput::new("https://b.com").notes("n"))
            .await
            .unwrap();
        source.add(LinkInput::new("https://c.com")).await.unwrap();

        let destination = test_repo();
        let text = source.export_all().await.unwrap();
        assert_eq!(destination.import_all(&text).await.unwrap(), 3);
        assert_eq!(
            destination.get_all().await.unwrap(),
            source.get_all().await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_import_existing_url_wins() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(
                keys::LINKS,
                json!([{
                    "id": "1",
                    "url": "https://a.com",
                    "title": "Original",
                    "hostname": "a.com",
                    "tags": [],
                    "createdAt": 100
                }]),
            )
            .await
            .unwrap();
        let repo = LinkRepository::new(store);

        let payload = json!([{
            "id": "2",
            "url": "https://a.com",
            "hostname": "a.com",
            "createdAt": 1
        }]);
        let added = repo.import_all(&payload.to_string()).await.unwrap();

        assert_eq!(added, 0);
        let links = repo.get_all().await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].id, "1");
        assert_eq!(links[0].title, "Original");
    }

    #[tokio::test]
    async fn test_import_drops_malformed_items() {
        let repo = test_repo();
        let payload = json!([
            {"id": "ok", "url": "https://ok.com", "hostname": "ok.com", "createdAt": 5, "tags": ["a", "a"]},
            {"id": "", "url": "https://empty-id.com", "hostname": "empty-id.com", "createdAt": 5},
            {"id": "no-host", "url": "https://no-host.com", "createdAt": 5},
            {"id": "str-time", "url": "https://str.com", "hostname": "str.com", "createdAt": "5"},
            "not an object",
            42
        ]);

        let added = repo.import_all(&payload.to_string()).await.unwrap();
        assert_eq!(added, 1);

        let links = repo.get_all().await.unwrap();
        assert_eq!(links[0].id, "ok");
        assert_eq!(links[0].title, "https://ok.com");
        assert_eq!(links[0].tags, vec!["a"]);
        assert_eq!(links[0].created_at, 5);
    }

    #[tokio::test]
    async fn test_import_prepends_in_payload_order() {
        let repo = test_repo();
        repo.add(LinkInput::new("https://old.com")).await.unwrap();

        let payload = json!([
            {"id": "1", "url": "https://first.com", "hostname": "first.com", "createdAt": 2},
            {"id": "2", "url": "https://second.com", "hostname": "second.com", "createdAt": 1},
            {"id": "3", "url": "https://first.com", "hostname": "first.com", "createdAt": 3}
        ]);
        assert_eq!(repo.import_all(&payload.to_string()).await.unwrap(), 2);

        let urls: Vec<_> = repo
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.url)
            .collect();
        assert_eq!(
            urls,
            vec!["https://first.com", "https://second.com", "https://old.com"]
        );
    }

    #[tokio::test]
    async fn test_import_rejects_non_array() {
        let repo = test_repo();

        let err = repo.import_all(r#"{"links": []}"#).await.unwrap_err();
        assert!(matches!(err, Error::ImportFormat(_)));

        let err = repo.import_all("not json at all").await.unwrap_err();
        assert!(matches!(err, Error::ImportFormat(_)));
    }

    #[tokio::test]
    async fn test_import_nothing_valid_does_not_write() {
        let store = Arc::new(MemoryStore::new());
        let repo = LinkRepository::new(store.clone());

        assert_eq!(repo.import_all("[]").await.unwrap(), 0);
        assert_eq!(repo.import_all(r#"[{"id": 1}]"#).await.unwrap(), 0);
        assert!(store.get(keys::LINKS).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_writes_broadcast_links_changed() {
        let repo = test_repo();
        let mut rx = repo.notifier().subscribe();

        let link = repo.add(LinkInput::new("https://www.a.com")).await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            Message::LinksChanged {
                hostname: Some("a.com".to_string())
            }
        );

        repo.delete(&link.id).await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            Message::LinksChanged {
                hostname: Some("a.com".to_string())
            }
        );

        // No-op delete sends nothing
        repo.delete(&link.id).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_concurrent_adds_through_one_repository_are_all_kept() {
        let repo = LinkRepository::new(Arc::new(MemoryStore::with_latency(
            Duration::from_millis(2),
        )));

        let adds = (0..10).map(|i| {
            let repo = repo.clone();
            async move {
                repo.add(LinkInput::new(format!("https://site{}.com", i)))
                    .await
                    .unwrap()
            }
        });
        join_all(adds).await;

        assert_eq!(repo.get_all().await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_unshared_locks_lose_updates() {
        let store: Arc<dyn KeyValueStore> =
            Arc::new(MemoryStore::with_latency(Duration::from_millis(5)));
        let first = LinkRepository::new(store.clone());
        let second = LinkRepository::new(store.clone());

        let (a, b) = tokio::join!(
            first.add(LinkInput::new("https://a.com")),
            second.add(LinkInput::new("https://b.com")),
        );
        a.unwrap();
        b.unwrap();

        // Both read the empty collection before either wrote
        assert_eq!(first.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_shared_locks_prevent_lost_updates() {
        let store: Arc<dyn KeyValueStore> =
            Arc::new(MemoryStore::with_latency(Duration::from_millis(5)));
        let locks = KeyLocks::new();
        let first = LinkRepository::with_locks(store.clone(), locks.clone());
        let second = LinkRepository::with_locks(store.clone(), locks);

        let (a, b) = tokio::join!(
            first.add(LinkInput::new("https://a.com")),
            second.add(LinkInput::new("https://b.com")),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(first.get_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_data_persists_in_file_store() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");

        let id = {
            let repo = LinkRepository::new(Arc::new(FileStore::new(&path)));
            repo.add(LinkInput::new("https://persist.com").title("Persistent Link"))
                .await
                .unwrap()
                .id
        };

        let repo = LinkRepository::new(Arc::new(FileStore::new(&path)));
        let link = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(link.title, "Persistent Link");
    }

    #[test]
    fn test_filter_links() {
        let mut a = Link::new("https://a.com");
        a.set_title("Alpha");
        let b = Link::new("https://b.com");
        let links = vec![a, b];

        assert_eq!(filter_links(&links, "").len(), 2);
        assert_eq!(filter_links(&links, " ALPHA ").len(), 1);
        assert_eq!(filter_links(&links, "b.com").len(), 1);
    }
}
