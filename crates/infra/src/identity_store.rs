//! Postgres-backed identity store.
//!
//! ## Thread safety
//!
//! Uses the SQLx connection pool, which is thread-safe; each call checks a
//! connection out for its own scope, and multi-row writes run inside an
//! explicit transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use kardex_accounts::identity::{AccountStatus, Identity, Profile};
use kardex_accounts::store::{IdentityStore, StoreError};
use kardex_auth::Role;
use kardex_core::UserId;

pub struct PostgresIdentityStore {
    pool: PgPool,
}

impl PostgresIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the identity tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS identities (
                id UUID PRIMARY KEY,
                username TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_digest TEXT NOT NULL,
                role TEXT NOT NULL,
                verified BOOLEAN NOT NULL DEFAULT FALSE,
                status TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                user_id UUID PRIMARY KEY REFERENCES identities(id),
                full_name TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(())
    }
}

fn map_db_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            return StoreError::DuplicateEmail;
        }
    }
    StoreError::Backend(e.to_string())
}

fn identity_from_row(row: &PgRow) -> Result<Identity, StoreError> {
    let wrap = |e: sqlx::Error| StoreError::Backend(e.to_string());
    let parse = |what: &str, msg: String| StoreError::Backend(format!("bad {what} column: {msg}"));

    let role: String = row.try_get("role").map_err(wrap)?;
    let status: String = row.try_get("status").map_err(wrap)?;

    Ok(Identity {
        id: UserId::from_uuid(row.try_get::<Uuid, _>("id").map_err(wrap)?),
        username: row.try_get("username").map_err(wrap)?,
        email: row.try_get("email").map_err(wrap)?,
        password_digest: row.try_get("password_digest").map_err(wrap)?,
        role: role
            .parse::<Role>()
            .map_err(|e| parse("role", e.to_string()))?,
        verified: row.try_get("verified").map_err(wrap)?,
        status: status
            .parse::<AccountStatus>()
            .map_err(|e| parse("status", e.to_string()))?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(wrap)?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(wrap)?,
    })
}

fn profile_from_row(row: &PgRow) -> Result<Profile, StoreError> {
    let wrap = |e: sqlx::Error| StoreError::Backend(e.to_string());

    Ok(Profile {
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id").map_err(wrap)?),
        full_name: row.try_get("full_name").map_err(wrap)?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("profile_created_at")
            .map_err(wrap)?,
        updated_at: row
            .try_get::<DateTime<Utc>, _>("profile_updated_at")
            .map_err(wrap)?,
    })
}

const IDENTITY_COLUMNS: &str =
    "id, username, email, password_digest, role, verified, status, created_at, updated_at";

#[async_trait]
impl IdentityStore for PostgresIdentityStore {
    async fn insert(&self, identity: &Identity, profile: &Profile) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        sqlx::query(
            r#"
            INSERT INTO identities
                (id, username, email, password_digest, role, verified, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(identity.id.as_uuid())
        .bind(&identity.username)
        .bind(&identity.email)
        .bind(&identity.password_digest)
        .bind(identity.role.as_str())
        .bind(identity.verified)
        .bind(identity.status.as_str())
        .bind(identity.created_at)
        .bind(identity.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, full_name, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(profile.user_id.as_uuid())
        .bind(&profile.full_name)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        tx.commit().await.map_err(map_db_err)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;

        row.as_ref().map(identity_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;

        row.as_ref().map(identity_from_row).transpose()
    }

    async fn update(&self, identity: &Identity) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE identities
            SET username = $2, role = $3, verified = $4, status = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(identity.id.as_uuid())
        .bind(&identity.username)
        .bind(identity.role.as_str())
        .bind(identity.verified)
        .bind(identity.status.as_str())
        .bind(identity.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(())
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        sqlx::query("DELETE FROM profiles WHERE user_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        let result = sqlx::query("DELETE FROM identities WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        tx.commit().await.map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_batch(&self, ids: &[UserId]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        sqlx::query("DELETE FROM profiles WHERE user_id = ANY($1)")
            .bind(&uuids)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        let result = sqlx::query("DELETE FROM identities WHERE id = ANY($1)")
            .bind(&uuids)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        tx.commit().await.map_err(map_db_err)?;
        Ok(result.rows_affected())
    }

    async fn list_unverified(&self) -> Result<Vec<Identity>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities WHERE verified = FALSE"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        rows.iter().map(identity_from_row).collect()
    }

    async fn list_with_profiles(&self) -> Result<Vec<(Identity, Profile)>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT i.id, i.username, i.email, i.password_digest, i.role,
                   i.verified, i.status, i.created_at, i.updated_at,
                   p.user_id, p.full_name,
                   p.created_at AS profile_created_at,
                   p.updated_at AS profile_updated_at
            FROM identities i
            JOIN profiles p ON p.user_id = i.id
            ORDER BY i.created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        rows.iter()
            .map(|row| Ok((identity_from_row(row)?, profile_from_row(row)?)))
            .collect()
    }
}
