use super::{
    bulk_slug, page_count, random_slug, validate_bulk, validate_url, Link, LinkPage, LinkStore,
    GENERATION_ATTEMPTS, SLUG_LEN,
};
use crate::error::{Result, StoreError};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Flat-file implementation of the link store: one pretty-printed JSON
/// object keyed by slug, rewritten wholesale on every mutation.
///
/// A single mutex serializes every read-modify-write cycle, so check-and-
/// insert for an explicit slug happens under the same lock as the write and
/// two concurrent creates can never both pass the existence check. Writes go
/// to a temp file first and are renamed into place, so a crash mid-write
/// cannot truncate the store.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

/// On-disk value shape: `{"url", "created", "visits", "lastVisit"?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredLink {
    url: String,
    created: DateTime<Utc>,
    visits: i64,
    #[serde(rename = "lastVisit", skip_serializing_if = "Option::is_none")]
    last_visit: Option<DateTime<Utc>>,
}

type LinkMap = HashMap<String, StoredLink>;

fn to_link(slug: &str, stored: &StoredLink) -> Link {
    Link {
        slug: slug.to_owned(),
        url: stored.url.clone(),
        visits: stored.visits,
        created_at: stored.created,
        last_visit: stored.last_visit,
    }
}

impl FileStore {
    /// Open the store, creating an empty file if none exists yet.
    pub async fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let store = Self {
            path: path.into(),
            lock: Mutex::new(()),
        };

        if tokio::fs::metadata(&store.path).await.is_err() {
            store.persist(&LinkMap::new()).await?;
            tracing::info!("created empty link store at {}", store.path.display());
        }

        Ok(store)
    }

    /// Read and parse the whole file. A missing file is an empty store; an
    /// unparseable one is logged and treated as empty rather than taking the
    /// service down.
    async fn load(&self) -> Result<LinkMap> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LinkMap::new()),
            Err(e) => {
                return Err(StoreError::Internal(anyhow::Error::new(e).context(format!(
                    "failed to read link store {}",
                    self.path.display()
                ))))
            }
        };

        match serde_json::from_str(&raw) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(
                    "link store {} is corrupt ({e}); starting from an empty store",
                    self.path.display()
                );
                Ok(LinkMap::new())
            }
        }
    }

    /// Rewrite the whole file: write to a temp sibling, then rename over the
    /// real path so readers never observe a half-written store.
    async fn persist(&self, map: &LinkMap) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp, &json)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;

        Ok(())
    }
}

#[async_trait]
impl LinkStore for FileStore {
    async fn create(&self, slug: Option<&str>, url: &str) -> Result<Link> {
        validate_url(url)?;

        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;

        let slug = match slug {
            Some(slug) => {
                if map.contains_key(slug) {
                    return Err(StoreError::Conflict(slug.to_owned()));
                }
                slug.to_owned()
            }
            None => {
                let mut candidate = None;
                for _ in 0..GENERATION_ATTEMPTS {
                    let s = random_slug(SLUG_LEN);
                    if !map.contains_key(&s) {
                        candidate = Some(s);
                        break;
                    }
                }
                candidate.ok_or_else(|| {
                    StoreError::Internal(anyhow::anyhow!(
                        "could not generate a free slug after {} attempts",
                        GENERATION_ATTEMPTS
                    ))
                })?
            }
        };

        let stored = StoredLink {
            url: url.to_owned(),
            created: Utc::now(),
            visits: 0,
            last_visit: None,
        };
        let link = to_link(&slug, &stored);
        map.insert(slug, stored);
        self.persist(&map).await?;

        Ok(link)
    }

    async fn bulk_create(
        &self,
        url: &str,
        count: usize,
        prefix: Option<&str>,
    ) -> Result<Vec<String>> {
        validate_bulk(url, count)?;

        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;

        // Best-effort: a colliding slug is skipped, the rest of the batch
        // still goes in. One rewrite covers the whole request.
        let mut created = Vec::with_capacity(count);
        for _ in 0..count {
            let slug = bulk_slug(prefix);
            if map.contains_key(&slug) {
                continue;
            }
            map.insert(
                slug.clone(),
                StoredLink {
                    url: url.to_owned(),
                    created: Utc::now(),
                    visits: 0,
                    last_visit: None,
                },
            );
            created.push(slug);
        }
        self.persist(&map).await?;

        Ok(created)
    }

    async fn list(&self, page: u64, limit: u64) -> Result<LinkPage> {
        let page = page.max(1);
        let limit = limit.max(1);

        let _guard = self.lock.lock().await;
        let map = self.load().await?;

        let mut links: Vec<Link> = map.iter().map(|(slug, stored)| to_link(slug, stored)).collect();
        // Most recent first; slug as tiebreaker so pagination is stable.
        links.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.slug.cmp(&b.slug))
        });

        let total = links.len() as u64;
        // Saturate: page and limit come straight off the query string, and
        // an extreme pair must land on an empty page, not overflow.
        let start = page.saturating_sub(1).saturating_mul(limit).min(total) as usize;
        let end = start.saturating_add(limit as usize).min(total as usize);

        Ok(LinkPage {
            links: links[start..end].to_vec(),
            total,
            page,
            pages: page_count(total, limit),
        })
    }

    async fn delete_by_slug(&self, slug: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;

        if map.remove(slug).is_none() {
            return Err(StoreError::NotFound);
        }
        self.persist(&map).await?;
        Ok(())
    }

    async fn delete_by_url(&self, url: &str) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;

        let before = map.len();
        map.retain(|_, stored| stored.url != url);
        let removed = (before - map.len()) as u64;

        if removed > 0 {
            self.persist(&map).await?;
        }
        Ok(removed)
    }

    async fn record_visit(&self, slug: &str) -> Result<String> {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;

        let stored = map.get_mut(slug).ok_or(StoreError::NotFound)?;
        stored.visits += 1;
        stored.last_visit = Some(Utc::now());
        let url = stored.url.clone();

        self.persist(&map).await?;
        Ok(url)
    }

    async fn ping(&self) -> Result<()> {
        match tokio::fs::metadata(&self.path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Internal(anyhow::Error::new(e).context(format!(
                "link store {} is not accessible",
                self.path.display()
            )))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn test_store() -> (FileStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("links.json")).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn create_then_resolve_returns_the_url() {
        let (store, _dir) = test_store().await;

        store.create(Some("docs"), "https://example.com/docs").await.unwrap();
        let url = store.record_visit("docs").await.unwrap();
        assert_eq!(url, "https://example.com/docs");

        let page = store.list(1, 10).await.unwrap();
        assert_eq!(page.links[0].visits, 1);
        assert!(page.links[0].last_visit.is_some());
    }

    #[tokio::test]
    async fn explicit_slug_conflicts_until_deleted() {
        let (store, _dir) = test_store().await;

        store.create(Some("x"), "https://a.com").await.unwrap();
        for _ in 0..3 {
            let err = store.create(Some("x"), "https://b.com").await.unwrap_err();
            assert!(matches!(err, StoreError::Conflict(_)));
        }

        store.delete_by_slug("x").await.unwrap();
        store.create(Some("x"), "https://b.com").await.unwrap();
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.json");

        {
            let store = FileStore::open(&path).await.unwrap();
            store.create(Some("keep"), "https://example.com").await.unwrap();
            store.record_visit("keep").await.unwrap();
        }

        let store = FileStore::open(&path).await.unwrap();
        assert_eq!(
            store.record_visit("keep").await.unwrap(),
            "https://example.com"
        );
        let page = store.list(1, 10).await.unwrap();
        assert_eq!(page.links[0].visits, 2);
    }

    #[tokio::test]
    async fn corrupt_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.json");
        tokio::fs::write(&path, b"{not json at all").await.unwrap();

        let store = FileStore::open(&path).await.unwrap();
        assert_eq!(store.list(1, 10).await.unwrap().total, 0);

        // The store stays usable after recovery.
        store.create(Some("fresh"), "https://example.com").await.unwrap();
        assert_eq!(store.list(1, 10).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn concurrent_visits_lose_no_increments() {
        let (store, _dir) = test_store().await;
        store.create(Some("hot"), "https://example.com").await.unwrap();

        let store = Arc::new(store);
        let mut tasks = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.record_visit("hot").await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let page = store.list(1, 10).await.unwrap();
        assert_eq!(page.links[0].visits, 20);
    }

    #[tokio::test]
    async fn bulk_create_honors_prefix_and_limit() {
        let (store, _dir) = test_store().await;

        let slugs = store.bulk_create("https://e.com", 3, Some("x")).await.unwrap();
        assert_eq!(slugs.len(), 3);
        for slug in &slugs {
            assert!(slug.starts_with('x'));
            assert_eq!(store.record_visit(slug).await.unwrap(), "https://e.com");
        }

        let err = store.bulk_create("https://e.com", 5001, None).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert_eq!(store.list(1, 100).await.unwrap().total, 3);
    }

    #[tokio::test]
    async fn list_pages_most_recent_first() {
        let (store, _dir) = test_store().await;
        store.create(Some("a"), "https://a.com").await.unwrap();
        store.create(Some("b"), "https://b.com").await.unwrap();

        let first = store.list(1, 1).await.unwrap();
        assert_eq!(first.total, 2);
        assert_eq!(first.pages, 2);
        assert_eq!(first.links[0].slug, "b");

        let second = store.list(2, 1).await.unwrap();
        assert_eq!(second.links[0].slug, "a");

        // A page past the end is empty, not an error.
        assert!(store.list(3, 1).await.unwrap().links.is_empty());
    }

    #[tokio::test]
    async fn list_with_extreme_page_and_limit_is_empty() {
        let (store, _dir) = test_store().await;
        store.create(Some("only"), "https://example.com").await.unwrap();

        let page = store.list(u64::MAX, 2).await.unwrap();
        assert!(page.links.is_empty());
        assert_eq!(page.total, 1);

        let page = store.list(2, u64::MAX).await.unwrap();
        assert!(page.links.is_empty());

        // A huge limit on page 1 still returns everything.
        let page = store.list(1, u64::MAX).await.unwrap();
        assert_eq!(page.links.len(), 1);
    }

    #[tokio::test]
    async fn delete_by_url_removes_only_matches() {
        let (store, _dir) = test_store().await;
        for slug in ["d1", "d2", "d3"] {
            store.create(Some(slug), "https://dup.com").await.unwrap();
        }
        store.create(Some("keep"), "https://other.com").await.unwrap();

        assert_eq!(store.delete_by_url("https://dup.com").await.unwrap(), 3);
        assert_eq!(store.delete_by_url("https://dup.com").await.unwrap(), 0);

        let page = store.list(1, 10).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.links[0].slug, "keep");
    }

    #[tokio::test]
    async fn delete_missing_slug_is_not_found() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.delete_by_slug("ghost").await.unwrap_err(),
            StoreError::NotFound
        ));
        assert!(matches!(
            store.record_visit("ghost").await.unwrap_err(),
            StoreError::NotFound
        ));
    }
}
