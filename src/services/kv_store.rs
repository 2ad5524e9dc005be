//! Ordered key-value substrate backed by SQLite.
//!
//! One sparse table holds every item, addressed by a composite `(pk, sk)`
//! key with a JSON attribute blob. The store offers point reads, range
//! queries by sort-key prefix, conditional writes, and named secondary
//! indexes that re-project item attributes under an alternate key.
//!
//! Index declarations map to SQLite expression indexes on
//! `json_extract(attrs, ...)`, so index maintenance happens as a side
//! effect of every base-table write; items lacking the projected attribute
//! simply never appear in the index. Callers must not rely on index reads
//! being atomic with base-table writes.

use std::sync::Arc;

use sqlx::SqlitePool;
use thiserror::Error;

/// A composite item address: primary component groups related items,
/// secondary component orders and namespaces them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemKey {
    pub pk: String,
    pub sk: String,
}

impl ItemKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }
}

/// One stored item: its key plus a JSON object of attributes.
#[derive(Clone, Debug)]
pub struct Item {
    pub key: ItemKey,
    pub attrs: serde_json::Value,
}

/// Existence guard evaluated atomically with a write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precondition {
    /// Unconditional upsert.
    None,
    /// The key must already exist; the write replaces its attributes.
    MustExist,
    /// The key must not exist yet.
    MustNotExist,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn sql(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// A declared secondary index: items carrying `pk_attr` are re-projected
/// under that attribute's value, ordered by `sk_attr`.
///
/// The attribute names are code-level constants and are interpolated into
/// SQL; they must match an expression index created by the migration for
/// lookups to be cheap (correctness does not depend on it).
#[derive(Clone, Copy, Debug)]
pub struct IndexDefinition {
    pub name: &'static str,
    pub pk_attr: &'static str,
    pub sk_attr: &'static str,
}

#[derive(Debug, Error)]
pub enum KvError {
    #[error("precondition failed for item `{pk}`/`{sk}`")]
    PreconditionFailed { pk: String, sk: String },
    #[error("unknown index `{0}`")]
    UnknownIndex(String),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type KvResult<T> = Result<T, KvError>;

/// Handle to the shared items table. Cheap to clone; all state lives in the
/// connection pool, injected once at startup.
#[derive(Clone)]
pub struct KvStore {
    db: Arc<SqlitePool>,
    indexes: Arc<[IndexDefinition]>,
}

impl KvStore {
    pub fn new(db: Arc<SqlitePool>, indexes: Vec<IndexDefinition>) -> Self {
        Self {
            db,
            indexes: indexes.into(),
        }
    }

    /// Write an item under the given precondition. A violated precondition
    /// fails with `PreconditionFailed` and performs no write.
    pub async fn put(&self, item: &Item, precondition: Precondition) -> KvResult<()> {
        let attrs = serde_json::to_string(&item.attrs)?;
        match precondition {
            Precondition::MustNotExist => {
                let res = sqlx::query("INSERT INTO items (pk, sk, attrs) VALUES (?, ?, ?)")
                    .bind(&item.key.pk)
                    .bind(&item.key.sk)
                    .bind(&attrs)
                    .execute(&*self.db)
                    .await;
                match res {
                    Ok(_) => Ok(()),
                    Err(err) if is_unique_violation(&err) => Err(KvError::PreconditionFailed {
                        pk: item.key.pk.clone(),
                        sk: item.key.sk.clone(),
                    }),
                    Err(err) => Err(err.into()),
                }
            }
            Precondition::MustExist => {
                let res = sqlx::query("UPDATE items SET attrs = ? WHERE pk = ? AND sk = ?")
                    .bind(&attrs)
                    .bind(&item.key.pk)
                    .bind(&item.key.sk)
                    .execute(&*self.db)
                    .await?;
                if res.rows_affected() == 0 {
                    return Err(KvError::PreconditionFailed {
                        pk: item.key.pk.clone(),
                        sk: item.key.sk.clone(),
                    });
                }
                Ok(())
            }
            Precondition::None => {
                sqlx::query(
                    "INSERT INTO items (pk, sk, attrs) VALUES (?, ?, ?)
                     ON CONFLICT(pk, sk) DO UPDATE SET attrs = excluded.attrs",
                )
                .bind(&item.key.pk)
                .bind(&item.key.sk)
                .bind(&attrs)
                .execute(&*self.db)
                .await?;
                Ok(())
            }
        }
    }

    /// Point read by exact composite key.
    pub async fn get(&self, key: &ItemKey) -> KvResult<Option<Item>> {
        let row: Option<(String, String, String)> =
            sqlx::query_as("SELECT pk, sk, attrs FROM items WHERE pk = ? AND sk = ?")
                .bind(&key.pk)
                .bind(&key.sk)
                .fetch_optional(&*self.db)
                .await?;
        row.map(row_to_item).transpose()
    }

    /// Range query: all items under `pk` whose sort key starts with
    /// `sk_prefix`, ordered by sort key, capped at `limit`.
    pub async fn query(
        &self,
        pk: &str,
        sk_prefix: &str,
        direction: SortDirection,
        limit: usize,
    ) -> KvResult<Vec<Item>> {
        // Upper bound: any sort key extending the prefix compares below
        // prefix + U+10FFFF.
        let upper = format!("{sk_prefix}\u{10FFFF}");
        let sql = format!(
            "SELECT pk, sk, attrs FROM items
             WHERE pk = ? AND sk >= ? AND sk < ?
             ORDER BY sk {} LIMIT ?",
            direction.sql()
        );
        let rows: Vec<(String, String, String)> = sqlx::query_as(&sql)
            .bind(pk)
            .bind(sk_prefix)
            .bind(&upper)
            .bind(limit as i64)
            .fetch_all(&*self.db)
            .await?;
        rows.into_iter().map(row_to_item).collect()
    }

    /// Query a declared secondary index: items whose projected partition
    /// attribute equals `index_key`, ordered by the projected sort
    /// attribute.
    pub async fn query_index(
        &self,
        index_name: &str,
        index_key: &str,
        direction: SortDirection,
        limit: usize,
    ) -> KvResult<Vec<Item>> {
        let def = self
            .indexes
            .iter()
            .find(|d| d.name == index_name)
            .ok_or_else(|| KvError::UnknownIndex(index_name.to_string()))?;
        let sql = format!(
            "SELECT pk, sk, attrs FROM items
             WHERE json_extract(attrs, '$.{}') = ?
             ORDER BY json_extract(attrs, '$.{}') {} LIMIT ?",
            def.pk_attr,
            def.sk_attr,
            direction.sql()
        );
        let rows: Vec<(String, String, String)> = sqlx::query_as(&sql)
            .bind(index_key)
            .bind(limit as i64)
            .fetch_all(&*self.db)
            .await?;
        rows.into_iter().map(row_to_item).collect()
    }

    /// Cheap connectivity probe for readiness checks.
    pub async fn ping(&self) -> KvResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}

fn row_to_item((pk, sk, attrs): (String, String, String)) -> KvResult<Item> {
    Ok(Item {
        key: ItemKey::new(pk, sk),
        attrs: serde_json::from_str(&attrs)?,
    })
}

/// Return true if a SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
