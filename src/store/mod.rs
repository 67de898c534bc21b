pub mod file;
pub mod sqlite;

use crate::error::{Result, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Maximum number of links one bulk request may generate.
pub const BULK_MAX: usize = 5000;

/// Generated slugs are 7 characters; with a caller-supplied prefix the
/// random suffix shrinks to 6.
pub const SLUG_LEN: usize = 7;
pub const PREFIXED_SUFFIX_LEN: usize = 6;

/// How many times `create` regenerates a random slug that collided before
/// giving up. Collisions are vanishingly rare at 64^7 combinations.
pub(crate) const GENERATION_ATTEMPTS: usize = 5;

/// A shortened link record.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub slug: String,
    pub url: String,
    pub visits: i64,
    pub created_at: DateTime<Utc>,
    pub last_visit: Option<DateTime<Utc>>,
}

/// One page of links plus the totals needed for the list response.
#[derive(Debug, Clone)]
pub struct LinkPage {
    pub links: Vec<Link>,
    /// Total number of links in the store (not just this page)
    pub total: u64,
    pub page: u64,
    pub pages: u64,
}

/// The slug-keyed mapping contract both backends implement. Handlers only
/// ever see `Arc<dyn LinkStore>`.
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Insert a new link. When `slug` is `None` a random one is generated,
    /// retrying a bounded number of times on collision. An explicit slug
    /// that already exists fails with `Conflict`; uniqueness is enforced by
    /// the storage layer itself, never by a separate existence check.
    async fn create(&self, slug: Option<&str>, url: &str) -> Result<Link>;

    /// Generate `count` independent slugs all mapping to `url`. Best-effort:
    /// individual collisions are skipped rather than failing the batch.
    /// Returns the slugs actually inserted.
    async fn bulk_create(&self, url: &str, count: usize, prefix: Option<&str>)
        -> Result<Vec<String>>;

    /// Page through all links, most recently created first.
    async fn list(&self, page: u64, limit: u64) -> Result<LinkPage>;

    /// Remove one link. `NotFound` when no link has that slug.
    async fn delete_by_slug(&self, slug: &str) -> Result<()>;

    /// Remove every link pointing at `url` (exact match). Returns the count
    /// removed; zero is not an error.
    async fn delete_by_url(&self, url: &str) -> Result<u64>;

    /// The redirect path: atomically increment `visits`, stamp `last_visit`,
    /// and return the destination URL. `NotFound` when the slug is absent.
    async fn record_visit(&self, slug: &str) -> Result<String>;

    /// Backend liveness probe for the health endpoint.
    async fn ping(&self) -> Result<()>;
}

/// Generate a random slug of `len` characters from a URL-safe alphabet.
pub fn random_slug(len: usize) -> String {
    use rand::Rng;
    const ALPHABET: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Slug for one bulk item: prefix + 6 random chars, or a plain 7-char slug.
pub(crate) fn bulk_slug(prefix: Option<&str>) -> String {
    match prefix {
        Some(p) if !p.is_empty() => format!("{p}{}", random_slug(PREFIXED_SUFFIX_LEN)),
        _ => random_slug(SLUG_LEN),
    }
}

pub(crate) fn validate_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(StoreError::invalid("destination url is required"));
    }
    Ok(())
}

pub(crate) fn validate_bulk(url: &str, count: usize) -> Result<()> {
    validate_url(url)?;
    if count > BULK_MAX {
        return Err(StoreError::invalid(format!(
            "at most {BULK_MAX} links per request"
        )));
    }
    Ok(())
}

/// Total page count for a list response: ceil(total / limit). An empty
/// store has zero pages.
pub(crate) fn page_count(total: u64, limit: u64) -> u64 {
    total.div_ceil(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_slug_has_requested_length_and_safe_alphabet() {
        for len in [6, 7, 9] {
            let slug = random_slug(len);
            assert_eq!(slug.len(), len);
            assert!(slug
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
        }
    }

    #[test]
    fn bulk_slug_respects_prefix() {
        let slug = bulk_slug(Some("promo"));
        assert!(slug.starts_with("promo"));
        assert_eq!(slug.len(), "promo".len() + PREFIXED_SUFFIX_LEN);

        assert_eq!(bulk_slug(None).len(), SLUG_LEN);
        assert_eq!(bulk_slug(Some("")).len(), SLUG_LEN);
    }

    #[test]
    fn bulk_validation_rejects_oversized_batches() {
        assert!(validate_bulk("https://e.com", BULK_MAX).is_ok());
        assert!(matches!(
            validate_bulk("https://e.com", BULK_MAX + 1),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_bulk("", 1),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(0, 100), 0);
        assert_eq!(page_count(1, 100), 1);
        assert_eq!(page_count(100, 100), 1);
        assert_eq!(page_count(101, 100), 2);
        assert_eq!(page_count(2, 1), 2);
    }
}
