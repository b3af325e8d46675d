//! Article storage: the narrow read/write contract the pipeline consumes,
//! plus a libSQL-backed implementation and an in-memory fake.
//!
//! Every component receives an [`ArticleStore`] explicitly, so tests can
//! swap [`Storage`] for [`MemoryStore`] without touching a database file.
//!
//! **Uniqueness:** `link` is unique. A duplicate-link write is a no-op
//! reported as `inserted = false`, never an error. Concurrent writers rely
//! on the database constraint, not application locks.

mod memory;
mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use postsmith_shared::{Article, NewArticle, PostsmithError, Result};

pub use memory::MemoryStore;

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Result of an insert-or-ignore write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    /// `false` when a record with the same link already existed.
    pub inserted: bool,
    /// Id of the new row, or of the row already holding the link.
    pub id: i64,
}

/// Storage capability consumed by the crawler, publisher, and pipeline.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert unless a record with the same `link` exists.
    async fn insert_if_absent(&self, article: &NewArticle) -> Result<InsertOutcome>;

    /// All records, ordered by `date` descending (ties by ascending id).
    async fn list_all(&self) -> Result<Vec<Article>>;

    /// A single record by id.
    async fn get_one(&self, id: i64) -> Result<Option<Article>>;
}

/// Reject records the schema would accept but the domain forbids.
pub(crate) fn validate_new(article: &NewArticle) -> Result<()> {
    if article.title.trim().is_empty() {
        return Err(PostsmithError::validation("article title is empty"));
    }
    if article.link.trim().is_empty() {
        return Err(PostsmithError::validation("article link is empty"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// libSQL implementation
// ---------------------------------------------------------------------------

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PostsmithError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| PostsmithError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| PostsmithError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        PostsmithError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Id of the row holding `link`, if any.
    async fn id_for_link(&self, link: &str) -> Result<Option<i64>> {
        let mut rows = self
            .conn
            .query("SELECT id FROM articles WHERE link = ?1", params![link])
            .await
            .map_err(|e| PostsmithError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(
                row.get::<i64>(0)
                    .map_err(|e| PostsmithError::Storage(e.to_string()))?,
            )),
            Ok(None) => Ok(None),
            Err(e) => Err(PostsmithError::Storage(e.to_string())),
        }
    }
}

#[async_trait]
impl ArticleStore for Storage {
    async fn insert_if_absent(&self, article: &NewArticle) -> Result<InsertOutcome> {
        validate_new(article)?;
        let now = Utc::now().to_rfc3339();

        // RETURNING yields no row when the unique constraint ignored the insert.
        let mut rows = self
            .conn
            .query(
                "INSERT OR IGNORE INTO articles (title, link, date, excerpt, scraped_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING id",
                params![
                    article.title.as_str(),
                    article.link.as_str(),
                    article.date.as_str(),
                    article.excerpt.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(|e| PostsmithError::Storage(e.to_string()))?;

        let inserted_id = match rows.next().await {
            Ok(Some(row)) => Some(
                row.get::<i64>(0)
                    .map_err(|e| PostsmithError::Storage(e.to_string()))?,
            ),
            Ok(None) => None,
            Err(e) => return Err(PostsmithError::Storage(e.to_string())),
        };
        drop(rows);

        if let Some(id) = inserted_id {
            tracing::debug!(id, link = %article.link, "article inserted");
            return Ok(InsertOutcome { inserted: true, id });
        }

        let id = self.id_for_link(&article.link).await?.ok_or_else(|| {
            PostsmithError::Storage(format!(
                "insert of {} was ignored but no row holds that link",
                article.link
            ))
        })?;
        tracing::debug!(id, link = %article.link, "article already present");
        Ok(InsertOutcome {
            inserted: false,
            id,
        })
    }

    async fn list_all(&self) -> Result<Vec<Article>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, link, date, excerpt, scraped_at
                 FROM articles ORDER BY date DESC, id ASC",
                params![],
            )
            .await
            .map_err(|e| PostsmithError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| PostsmithError::Storage(e.to_string()))?
        {
            results.push(row_to_article(&row)?);
        }
        Ok(results)
    }

    async fn get_one(&self, id: i64) -> Result<Option<Article>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, link, date, excerpt, scraped_at FROM articles WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| PostsmithError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_article(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(PostsmithError::Storage(e.to_string())),
        }
    }
}

/// Parse a stored timestamp: RFC 3339 from this crate, or SQLite's
/// `datetime('now')` format for rows inserted by other writers.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Convert a database row to an [`Article`].
fn row_to_article(row: &libsql::Row) -> Result<Article> {
    let scraped_at: String = row
        .get(5)
        .map_err(|e| PostsmithError::Storage(e.to_string()))?;

    Ok(Article {
        id: row
            .get::<i64>(0)
            .map_err(|e| PostsmithError::Storage(e.to_string()))?,
        title: row
            .get::<String>(1)
            .map_err(|e| PostsmithError::Storage(e.to_string()))?,
        link: row
            .get::<String>(2)
            .map_err(|e| PostsmithError::Storage(e.to_string()))?,
        date: row.get::<String>(3).unwrap_or_default(),
        excerpt: row.get::<String>(4).unwrap_or_default(),
        scraped_at: parse_timestamp(&scraped_at)
            .ok_or_else(|| PostsmithError::Storage(format!("invalid date: {scraped_at}")))?,
    })
}
