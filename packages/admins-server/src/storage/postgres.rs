use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::traits::{AccountStore, SessionStore, StorageError, StorageResult};
use super::types::{
    Account, AccountId, AccountQuery, AccountUpdate, Page, RoleId, SessionRecord, SessionValues,
};

/// PostgreSQL implementation of AccountStore
pub struct PostgresAccountStore {
    pool: PgPool,
}

impl PostgresAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Initialize database schema for accounts
    pub async fn initialize(&self) -> StorageResult<()> {
        // The UNIQUE constraint on account is the authoritative duplicate guard
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS admins (
                id UUID PRIMARY KEY,
                account TEXT UNIQUE NOT NULL,
                phone_number TEXT NOT NULL DEFAULT '',
                password_hash TEXT NOT NULL DEFAULT '',
                role_id UUID,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_admins_created_at ON admins(created_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn account_from_row(row: &PgRow) -> Account {
    Account {
        id: row.get("id"),
        account: row.get("account"),
        phone_number: row.get("phone_number"),
        password_hash: row.get("password_hash"),
        role_id: row.get("role_id"),
        created_at: row.get("created_at"),
    }
}

fn map_write_error(e: sqlx::Error, account: &str) -> StorageError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return StorageError::DuplicateAccount(account.to_string());
        }
    }
    StorageError::Database(e)
}

fn map_query_error(e: sqlx::Error) -> StorageError {
    // 2201B: invalid_regular_expression
    if let Some(db_err) = e.as_database_error() {
        if db_err.code().as_deref() == Some("2201B") {
            return StorageError::InvalidQuery(db_err.message().to_string());
        }
    }
    StorageError::Database(e)
}

fn limit_param(page: Page) -> Option<i64> {
    (page.limit > 0).then_some(page.limit as i64)
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    async fn insert_account(&self, account: &Account) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO admins (id, account, phone_number, password_hash, role_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(account.id)
        .bind(&account.account)
        .bind(&account.phone_number)
        .bind(&account.password_hash)
        .bind(account.role_id)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &account.account))?;

        Ok(())
    }

    async fn get_account(&self, id: AccountId) -> StorageResult<Account> {
        let row = sqlx::query(
            r#"
            SELECT id, account, phone_number, password_hash, role_id, created_at
            FROM admins
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        Ok(account_from_row(&row))
    }

    async fn get_account_by_name(&self, account: &str) -> StorageResult<Account> {
        let row = sqlx::query(
            r#"
            SELECT id, account, phone_number, password_hash, role_id, created_at
            FROM admins
            WHERE account = $1
            "#,
        )
        .bind(account)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::NotFound(account.to_string()))?;

        Ok(account_from_row(&row))
    }

    async fn count_by_name(&self, account: &str) -> StorageResult<u64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS count FROM admins WHERE account = $1
            "#,
        )
        .bind(account)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<i64, _>("count") as u64)
    }

    async fn replace_account(&self, id: AccountId, update: &AccountUpdate) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE admins
            SET account = $2, phone_number = $3, password_hash = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&update.account)
        .bind(&update.phone_number)
        .bind(&update.password_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &update.account))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn set_role(&self, id: AccountId, role_id: Option<RoleId>) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE admins SET role_id = $2 WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(role_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn delete_account(&self, id: AccountId) -> StorageResult<()> {
        sqlx::query(
            r#"
            DELETE FROM admins WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_accounts(&self, query: &AccountQuery, page: Page) -> StorageResult<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account, phone_number, password_hash, role_id, created_at
            FROM admins
            WHERE ($1::TEXT IS NULL OR account ~* $1)
              AND ($2::TIMESTAMPTZ IS NULL OR created_at >= $2)
              AND ($3::TIMESTAMPTZ IS NULL OR created_at < $3)
            ORDER BY created_at ASC, id ASC
            OFFSET $4
            LIMIT $5
            "#,
        )
        .bind(query.pattern())
        .bind(query.start_time)
        .bind(query.end_time)
        .bind(page.offset as i64)
        .bind(limit_param(page))
        .fetch_all(&self.pool)
        .await
        .map_err(map_query_error)?;

        Ok(rows.iter().map(account_from_row).collect())
    }

    async fn count_accounts(&self, query: &AccountQuery) -> StorageResult<u64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS count
            FROM admins
            WHERE ($1::TEXT IS NULL OR account ~* $1)
              AND ($2::TIMESTAMPTZ IS NULL OR created_at >= $2)
              AND ($3::TIMESTAMPTZ IS NULL OR created_at < $3)
            "#,
        )
        .bind(query.pattern())
        .bind(query.start_time)
        .bind(query.end_time)
        .fetch_one(&self.pool)
        .await
        .map_err(map_query_error)?;

        Ok(row.get::<i64, _>("count") as u64)
    }
}

/// PostgreSQL implementation of SessionStore
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Initialize database schema for sessions
    pub async fn initialize(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS admin_sessions (
                id TEXT PRIMARY KEY,
                data JSONB NOT NULL DEFAULT '{}'::JSONB,
                expires_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_admin_sessions_expires
                ON admin_sessions(expires_at) WHERE expires_at IS NOT NULL
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn load_session(&self, id: &str) -> StorageResult<Option<SessionRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, data, expires_at
            FROM admin_sessions
            WHERE id = $1 AND (expires_at IS NULL OR expires_at > NOW())
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let values: SessionValues = serde_json::from_value(row.get("data"))?;
        let expires_at: Option<DateTime<Utc>> = row.get("expires_at");

        Ok(Some(SessionRecord {
            id: row.get("id"),
            values,
            expires_at,
        }))
    }

    async fn save_session(&self, record: &SessionRecord) -> StorageResult<()> {
        let data = serde_json::to_value(&record.values)?;

        sqlx::query(
            r#"
            INSERT INTO admin_sessions (id, data, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                data = EXCLUDED.data,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&record.id)
        .bind(data)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_session(&self, id: &str) -> StorageResult<()> {
        sqlx::query(
            r#"
            DELETE FROM admin_sessions WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn cleanup_expired_sessions(&self) -> StorageResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM admin_sessions WHERE expires_at IS NOT NULL AND expires_at <= NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
