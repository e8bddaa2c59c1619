//! Typed key-value store abstraction backing the persisted-state layer:
//! reputation records, trust graph edges, wallet clusters, fraud records,
//! and dispute state all live behind this interface rather than bespoke
//! tables per component.

use async_trait::async_trait;
use sqlx::Row;

use super::connection::DbPool;
use super::{DatabaseError, DatabaseResult};

/// Minimal get/put/delete/prefix-scan interface external collaborators
/// (or, in production, a real embedded/remote KV engine) must provide.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &[u8]) -> DatabaseResult<Option<Vec<u8>>>;
    async fn put(&self, key: &[u8], value: &[u8]) -> DatabaseResult<()>;
    async fn delete(&self, key: &[u8]) -> DatabaseResult<()>;
    async fn list_keys_with_prefix(&self, prefix: &[u8]) -> DatabaseResult<Vec<Vec<u8>>>;
}

/// Postgres-backed `KvStore`, storing entries in a single `kv` table.
/// Keys and values are opaque bytes; callers own encoding (see
/// `node`'s persisted-state key layout).
pub struct PostgresKvStore {
    pool: DbPool,
}

impl PostgresKvStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create the backing table if it does not already exist. Intended to
    /// be called once at startup, ahead of (or instead of) a full
    /// migration run in environments without migration tooling.
    pub async fn ensure_schema(&self) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key BYTEA PRIMARY KEY,
                value BYTEA NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Connection)?;

        Ok(())
    }
}

#[async_trait]
impl KvStore for PostgresKvStore {
    async fn get(&self, key: &[u8]) -> DatabaseResult<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT value FROM kv WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Connection)?;

        Ok(row.map(|r| r.get::<Vec<u8>, _>("value")))
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = now()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Connection)?;

        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM kv WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Connection)?;

        Ok(())
    }

    async fn list_keys_with_prefix(&self, prefix: &[u8]) -> DatabaseResult<Vec<Vec<u8>>> {
        let rows = sqlx::query("SELECT key FROM kv WHERE key >= $1 AND key < $2 ORDER BY key")
            .bind(prefix)
            .bind(prefix_upper_bound(prefix))
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::Connection)?;

        Ok(rows.into_iter().map(|r| r.get::<Vec<u8>, _>("key")).collect())
    }
}

/// Smallest byte string that sorts after every string beginning with
/// `prefix`, used as the exclusive upper bound of a prefix scan. Returns
/// `None`-equivalent (all 0xff) only for an empty or all-0xff prefix.
fn prefix_upper_bound(prefix: &[u8]) -> Vec<u8> {
    let mut bound = prefix.to_vec();
    for i in (0..bound.len()).rev() {
        if bound[i] != 0xff {
            bound[i] += 1;
            bound.truncate(i + 1);
            return bound;
        }
    }
    vec![0xff; prefix.len() + 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_upper_bound_increments_last_byte() {
        assert_eq!(prefix_upper_bound(&[0x01, 0x02]), vec![0x01, 0x03]);
    }

    #[test]
    fn prefix_upper_bound_carries_over_ff() {
        assert_eq!(prefix_upper_bound(&[0x01, 0xff]), vec![0x02]);
    }

    #[test]
    fn prefix_upper_bound_all_ff_extends() {
        assert_eq!(prefix_upper_bound(&[0xff, 0xff]), vec![0xff, 0xff, 0xff]);
    }
}
