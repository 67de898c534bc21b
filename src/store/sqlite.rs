use super::{
    bulk_slug, page_count, random_slug, validate_bulk, validate_url, Link, LinkPage, LinkStore,
    GENERATION_ATTEMPTS, SLUG_LEN,
};
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

/// SQLite implementation of the link store.
///
/// Slug uniqueness is a UNIQUE column constraint, so two concurrent creates
/// for the same slug can never both succeed: the second insert fails at the
/// database and is surfaced as `Conflict`. Visit counting is a single
/// `UPDATE ... RETURNING` statement, never a read followed by a write.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct LinkRow {
    slug: String,
    url: String,
    visits: i64,
    created_at: DateTime<Utc>,
    last_visit: Option<DateTime<Utc>>,
}

impl From<LinkRow> for Link {
    fn from(row: LinkRow) -> Self {
        Link {
            slug: row.slug,
            url: row.url,
            visits: row.visits,
            created_at: row.created_at,
            last_visit: row.last_visit,
        }
    }
}

impl SqliteStore {
    /// Open (creating the file if needed) and migrate the database.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(
                database_url
                    .parse::<SqliteConnectOptions>()?
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal),
            )
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    async fn insert(&self, slug: &str, url: &str) -> std::result::Result<Link, sqlx::Error> {
        let created_at = Utc::now();
        sqlx::query("INSERT INTO links (slug, url, visits, created_at) VALUES (?1, ?2, 0, ?3)")
            .bind(slug)
            .bind(url)
            .bind(created_at)
            .execute(&self.pool)
            .await?;

        Ok(Link {
            slug: slug.to_owned(),
            url: url.to_owned(),
            visits: 0,
            created_at,
            last_visit: None,
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

fn internal(err: sqlx::Error) -> StoreError {
    StoreError::Internal(err.into())
}

#[async_trait]
impl LinkStore for SqliteStore {
    async fn create(&self, slug: Option<&str>, url: &str) -> Result<Link> {
        validate_url(url)?;

        match slug {
            Some(slug) => match self.insert(slug, url).await {
                Ok(link) => Ok(link),
                Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict(slug.to_owned())),
                Err(e) => Err(internal(e)),
            },
            None => {
                for _ in 0..GENERATION_ATTEMPTS {
                    let candidate = random_slug(SLUG_LEN);
                    match self.insert(&candidate, url).await {
                        Ok(link) => return Ok(link),
                        Err(e) if is_unique_violation(&e) => continue,
                        Err(e) => return Err(internal(e)),
                    }
                }
                Err(StoreError::Internal(anyhow::anyhow!(
                    "could not generate a free slug after {} attempts",
                    GENERATION_ATTEMPTS
                )))
            }
        }
    }

    async fn bulk_create(
        &self,
        url: &str,
        count: usize,
        prefix: Option<&str>,
    ) -> Result<Vec<String>> {
        validate_bulk(url, count)?;

        // Best-effort batch: OR IGNORE skips any slug that collides with an
        // existing row (or with an earlier item of this batch).
        let mut created = Vec::with_capacity(count);
        for _ in 0..count {
            let slug = bulk_slug(prefix);
            let result = sqlx::query(
                "INSERT OR IGNORE INTO links (slug, url, visits, created_at) VALUES (?1, ?2, 0, ?3)",
            )
            .bind(&slug)
            .bind(url)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(internal)?;

            if result.rows_affected() > 0 {
                created.push(slug);
            }
        }

        Ok(created)
    }

    async fn list(&self, page: u64, limit: u64) -> Result<LinkPage> {
        let page = page.max(1);
        let limit = limit.max(1);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM links")
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;

        // Saturate and clamp to i64: page and limit come straight off the
        // query string, and an extreme pair must land on an empty page, not
        // overflow or go negative in the bind.
        let offset = page.saturating_sub(1).saturating_mul(limit);

        // Row ids are assigned in insertion order, which is creation order,
        // so id DESC is most-recent-first without depending on timestamp
        // precision.
        let rows: Vec<LinkRow> = sqlx::query_as(
            "SELECT slug, url, visits, created_at, last_visit
             FROM links ORDER BY id DESC LIMIT ?1 OFFSET ?2",
        )
        .bind(limit.min(i64::MAX as u64) as i64)
        .bind(offset.min(i64::MAX as u64) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        Ok(LinkPage {
            links: rows.into_iter().map(Link::from).collect(),
            total: total as u64,
            page,
            pages: page_count(total as u64, limit),
        })
    }

    async fn delete_by_slug(&self, slug: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM links WHERE slug = ?1")
            .bind(slug)
            .execute(&self.pool)
            .await
            .map_err(internal)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_by_url(&self, url: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM links WHERE url = ?1")
            .bind(url)
            .execute(&self.pool)
            .await
            .map_err(internal)?;

        Ok(result.rows_affected())
    }

    async fn record_visit(&self, slug: &str) -> Result<String> {
        let url: Option<String> = sqlx::query_scalar(
            "UPDATE links SET visits = visits + 1, last_visit = ?2 WHERE slug = ?1 RETURNING url",
        )
        .bind(slug)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        url.ok_or(StoreError::NotFound)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(())
    }
}
