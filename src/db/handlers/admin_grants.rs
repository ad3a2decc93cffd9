//! Database access for admin grants.
//!
//! Grants are keyed by user id and don't fit the generic repository shape
//! (no surrogate id, no pagination to speak of), so this handler is bespoke.

use crate::db::{
    errors::Result,
    models::admin_grants::{AdminGrantCreateDBRequest, AdminGrantDBResponse},
};
use crate::types::{UserId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

const ALL_COLUMNS: &str = "user_id, role, is_active, granted_at, granted_by";

pub struct AdminGrants<'c> {
    db: &'c mut PgConnection,
}

impl<'c> AdminGrants<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn find_by_user_id(&mut self, user_id: UserId) -> Result<Option<AdminGrantDBResponse>> {
        let grant = sqlx::query_as::<_, AdminGrantDBResponse>(&format!(
            "SELECT {ALL_COLUMNS} FROM admin_users WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(grant)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), role = ?request.role), err)]
    pub async fn create(&mut self, request: &AdminGrantCreateDBRequest) -> Result<AdminGrantDBResponse> {
        let grant = sqlx::query_as::<_, AdminGrantDBResponse>(&format!(
            r#"
            INSERT INTO admin_users (user_id, role, granted_by)
            VALUES ($1, $2, $3)
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(request.user_id)
        .bind(request.role)
        .bind(request.granted_by)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(grant)
    }

    /// Activate or deactivate a grant. Deactivation takes effect on the
    /// holder's next admin-track request; their sessions are not touched here.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn set_active(&mut self, user_id: UserId, is_active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE admin_users SET is_active = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(is_active)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn delete(&mut self, user_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM admin_users WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
