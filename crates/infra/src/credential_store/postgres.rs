//! Postgres-backed credential store.
//!
//! Schema (managed elsewhere):
//!
//! | table | columns |
//! |-------|---------|
//! | `tb_user` | `id BIGINT` identity, `name`, `email` (unique), `password` |
//! | `tb_role` | `id BIGINT` identity, `authority` |
//! | `tb_user_role` | `user_id`, `role_id` |
//!
//! ## Error Mapping
//!
//! | SQLx error | CredentialStoreError |
//! |------------|----------------------|
//! | Database, unique violation (`23505`) | `Duplicate` |
//! | PoolTimedOut / PoolClosed / Io / Tls | `Unavailable` |
//! | ColumnDecode / ColumnNotFound / Decode | `Decode` |
//! | anything else | `Query` |
//!
//! ## Runtime
//!
//! The store traits are synchronous. The trait impls below bridge into the
//! async pool with `block_in_place`, which needs a multi-thread Tokio runtime;
//! outside of one they fail with `Unavailable` instead of panicking.

use std::future::Future;
use std::sync::Arc;

use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{Span, instrument};

use sghm_auth::{
    CredentialRow, CredentialStore, CredentialStoreError, Role, User, UserDirectory, UserRecord,
};
use sghm_core::{RoleId, UserId};

/// Postgres credential store.
///
/// Uses the SQLx connection pool, so it is `Send + Sync` and cheap to clone.
#[derive(Debug, Clone)]
pub struct PostgresCredentialStore {
    pool: Arc<PgPool>,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Build a pool for `database_url` without opening a connection yet.
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn connect_lazy(database_url: &str) -> Result<Self, CredentialStoreError> {
        Handle::try_current().map_err(|_| no_runtime())?;
        let pool = PgPoolOptions::new()
            .connect_lazy(database_url)
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// One row per (user, role) pairing for `email`, in role id order.
    #[instrument(skip(self), fields(row_count = tracing::field::Empty), err)]
    pub async fn fetch_credential_rows(&self, email: &str) -> Result<Vec<CredentialRow>, CredentialStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                u.password AS password,
                r.id AS role_id,
                r.authority AS authority
            FROM tb_user u
            INNER JOIN tb_user_role ur ON ur.user_id = u.id
            INNER JOIN tb_role r ON r.id = ur.role_id
            WHERE u.email = $1
            ORDER BY r.id ASC
            "#,
        )
        .bind(email)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("search_user_and_roles_by_email", e))?;

        Span::current().record("row_count", rows.len());

        rows.iter().map(credential_row_from).collect()
    }

    #[instrument(skip(self), err)]
    pub async fn fetch_role_by_authority(&self, authority: &str) -> Result<Option<Role>, CredentialStoreError> {
        let row = sqlx::query("SELECT id, authority FROM tb_role WHERE authority = $1")
            .bind(authority)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_role_by_authority", e))?;

        row.as_ref().map(role_from).transpose()
    }

    #[instrument(skip(self), err)]
    pub async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, CredentialStoreError> {
        let Some(row) = sqlx::query("SELECT id, name, email, password FROM tb_user WHERE email = $1")
            .bind(email)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))?
        else {
            return Ok(None);
        };

        let id: i64 = row.try_get("id").map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        let name: String = row.try_get("name").map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        let stored_email: String = row.try_get("email").map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        let password: String = row.try_get("password").map_err(|e| map_sqlx_error("find_user_by_email", e))?;

        let role_rows = sqlx::query(
            r#"
            SELECT r.id AS id, r.authority AS authority
            FROM tb_user_role ur
            INNER JOIN tb_role r ON r.id = ur.role_id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_user_by_email", e))?;

        let mut user = User::new(UserId::new(id), name, stored_email, password);
        for row in &role_rows {
            user.add_role(role_from(row)?);
        }
        Ok(Some(user))
    }

    /// Insert the user and its join rows in one transaction.
    #[instrument(skip(self, record), fields(email = %record.email), err)]
    pub async fn insert_user_record(&self, record: UserRecord) -> Result<UserId, CredentialStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("insert_user", e))?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO tb_user (name, email, password) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&record.name)
        .bind(&record.email)
        .bind(&record.password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;

        for role_id in &record.role_ids {
            sqlx::query(
                "INSERT INTO tb_user_role (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(role_id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("grant_role", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_user", e))?;

        Ok(UserId::new(id))
    }
}

fn credential_row_from(row: &PgRow) -> Result<CredentialRow, CredentialStoreError> {
    let decode = |e| map_sqlx_error("decode_credential_row", e);
    Ok(CredentialRow {
        password_hash: row.try_get("password").map_err(decode)?,
        role_id: RoleId::new(row.try_get("role_id").map_err(decode)?),
        authority: row.try_get("authority").map_err(decode)?,
    })
}

fn role_from(row: &PgRow) -> Result<Role, CredentialStoreError> {
    let decode = |e| map_sqlx_error("decode_role", e);
    let id: i64 = row.try_get("id").map_err(decode)?;
    let authority: String = row.try_get("authority").map_err(decode)?;
    Ok(Role::new(RoleId::new(id), authority))
}

/// Map SQLx errors to `CredentialStoreError`, keeping the operation name.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> CredentialStoreError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            CredentialStoreError::Duplicate(format!("{operation}: {}", db.message()))
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            CredentialStoreError::Unavailable(format!("{operation}: connection pool exhausted or closed"))
        }
        sqlx::Error::Io(e) => CredentialStoreError::Unavailable(format!("{operation}: {e}")),
        sqlx::Error::Tls(e) => CredentialStoreError::Unavailable(format!("{operation}: {e}")),
        e @ (sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_)) => CredentialStoreError::Decode(format!("{operation}: {e}")),
        e => CredentialStoreError::Query(format!("{operation}: {e}")),
    }
}

fn no_runtime() -> CredentialStoreError {
    CredentialStoreError::Unavailable("PostgresCredentialStore requires a tokio runtime".to_string())
}

/// Run `fut` to completion from synchronous code inside a Tokio runtime.
fn block_on<F>(fut: F) -> Result<F::Output, CredentialStoreError>
where
    F: Future,
{
    let handle = Handle::try_current().map_err(|_| no_runtime())?;

    if handle.runtime_flavor() == RuntimeFlavor::CurrentThread {
        return Err(CredentialStoreError::Unavailable(
            "PostgresCredentialStore requires a multi-thread tokio runtime".to_string(),
        ));
    }

    Ok(tokio::task::block_in_place(|| handle.block_on(fut)))
}

impl CredentialStore for PostgresCredentialStore {
    fn search_user_and_roles_by_email(&self, email: &str) -> Result<Vec<CredentialRow>, CredentialStoreError> {
        block_on(self.fetch_credential_rows(email))?
    }
}

impl UserDirectory for PostgresCredentialStore {
    fn find_role_by_authority(&self, authority: &str) -> Result<Option<Role>, CredentialStoreError> {
        block_on(self.fetch_role_by_authority(authority))?
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, CredentialStoreError> {
        block_on(self.fetch_user_by_email(email))?
    }

    fn insert_user(&self, record: UserRecord) -> Result<UserId, CredentialStoreError> {
        block_on(self.insert_user_record(record))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_failures_are_unavailable() {
        assert!(matches!(
            map_sqlx_error("op", sqlx::Error::PoolTimedOut),
            CredentialStoreError::Unavailable(_)
        ));
        assert!(matches!(
            map_sqlx_error("op", sqlx::Error::PoolClosed),
            CredentialStoreError::Unavailable(_)
        ));
    }

    #[test]
    fn missing_column_is_a_decode_error() {
        let err = map_sqlx_error("decode_role", sqlx::Error::ColumnNotFound("authority".into()));
        assert!(matches!(&err, CredentialStoreError::Decode(msg) if msg.starts_with("decode_role")));
    }

    #[test]
    fn other_errors_are_query_errors() {
        assert!(matches!(
            map_sqlx_error("op", sqlx::Error::RowNotFound),
            CredentialStoreError::Query(_)
        ));
    }

    #[test]
    fn outside_a_runtime_is_unavailable() {
        let err = block_on(async { 1 }).unwrap_err();
        assert!(matches!(err, CredentialStoreError::Unavailable(_)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn current_thread_runtime_is_rejected_before_touching_the_pool() {
        let store = PostgresCredentialStore::connect_lazy("postgres://sghm@localhost/sghm").unwrap();

        let err = store.search_user_and_roles_by_email("a@x.com").unwrap_err();
        assert!(matches!(&err, CredentialStoreError::Unavailable(msg) if msg.contains("multi-thread")));
    }

    #[test]
    fn connect_lazy_outside_a_runtime_is_unavailable() {
        let err = PostgresCredentialStore::connect_lazy("postgres://sghm@localhost/sghm").unwrap_err();
        assert!(matches!(err, CredentialStoreError::Unavailable(_)));
    }
}
