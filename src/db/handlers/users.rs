//! Database repository for users.

use std::collections::HashMap;

use crate::api::models::users::AccountStatus;
use crate::types::{UserId, abbrev_uuid};
use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

const ALL_COLUMNS: &str = "id, username, email, display_name, avatar_url, password_hash, status, deleted_at, created_at, updated_at, last_login";

/// Filter for listing users
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub skip: i64,
    pub limit: i64,
    /// Case-insensitive substring match on username or email
    pub search: Option<String>,
}

impl UserFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            search: None,
        }
    }
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        // Always generate a new ID for users
        let user_id = Uuid::new_v4();

        let user = sqlx::query_as::<_, UserDBResponse>(&format!(
            r#"
            INSERT INTO users (id, username, email, display_name, avatar_url, password_hash, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&request.username)
        .bind(&request.email)
        .bind(&request.display_name)
        .bind(&request.avatar_url)
        .bind(&request.password_hash)
        .bind(request.status)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!("SELECT {ALL_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let users = sqlx::query_as::<_, UserDBResponse>(&format!("SELECT {ALL_COLUMNS} FROM users WHERE id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let users = if let Some(search) = &filter.search {
            sqlx::query_as::<_, UserDBResponse>(&format!(
                r#"
                SELECT {ALL_COLUMNS} FROM users
                WHERE username ILIKE $1 OR email ILIKE $1
                ORDER BY created_at DESC LIMIT $2 OFFSET $3
                "#
            ))
            .bind(format!("%{search}%"))
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?
        } else {
            sqlx::query_as::<_, UserDBResponse>(&format!(
                "SELECT {ALL_COLUMNS} FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2"
            ))
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?
        };

        Ok(users)
    }

    #[instrument(skip(self, id, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!(
            r#"
            UPDATE users
            SET display_name = COALESCE($2, display_name),
                avatar_url = COALESCE($3, avatar_url),
                password_hash = COALESCE($4, password_hash),
                status = COALESCE($5, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.display_name)
        .bind(&request.avatar_url)
        .bind(&request.password_hash)
        .bind(request.status)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self, id), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Look up a user by login identifier (username or email), case-insensitively.
    #[instrument(skip(self, identifier), err)]
    pub async fn get_user_by_identifier(&mut self, identifier: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!(
            "SELECT {ALL_COLUMNS} FROM users WHERE LOWER(username) = LOWER($1) OR LOWER(email) = LOWER($1)"
        ))
        .bind(identifier)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self, email), err)]
    pub async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!("SELECT {ALL_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"))
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    /// Total rows matching a filter, ignoring its pagination.
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &UserFilter) -> Result<i64> {
        let count: (i64,) = if let Some(search) = &filter.search {
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE username ILIKE $1 OR email ILIKE $1")
                .bind(format!("%{search}%"))
                .fetch_one(&mut *self.db)
                .await?
        } else {
            sqlx::query_as("SELECT COUNT(*) FROM users").fetch_one(&mut *self.db).await?
        };

        Ok(count.0)
    }

    /// Record a successful login time. Best-effort metadata, not a correctness boundary.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn record_login(&mut self, id: UserId) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    /// Set the account status. Used by the back-office workflows; existing
    /// sessions for a non-active account stop resolving on their next use.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn set_status(&mut self, id: UserId, status: AccountStatus) -> Result<()> {
        sqlx::query("UPDATE users SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    /// Soft-delete an account. The row is kept; resolution treats it as gone.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_deleted(&mut self, id: UserId) -> Result<()> {
        sqlx::query("UPDATE users SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_user;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn test_identifier_lookup_is_case_insensitive(pool: PgPool) {
        let user = create_test_user(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut users = Users::new(&mut conn);

        let by_username = users.get_user_by_identifier(&user.username.to_uppercase()).await.unwrap();
        assert_eq!(by_username.map(|u| u.id), Some(user.id));

        let by_email = users.get_user_by_identifier(&user.email.to_uppercase()).await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(user.id));
    }

    #[sqlx::test]
    async fn test_get_bulk(pool: PgPool) {
        let a = create_test_user(&pool).await;
        let b = create_test_user(&pool).await;

        let mut conn = pool.acquire().await.unwrap();
        let found = Users::new(&mut conn).get_bulk(vec![a.id, b.id, Uuid::new_v4()]).await.unwrap();

        assert_eq!(found.len(), 2);
        assert!(found.contains_key(&a.id));
        assert!(found.contains_key(&b.id));
    }

    #[sqlx::test]
    async fn test_update_leaves_unset_fields_alone(pool: PgPool) {
        let user = create_test_user(&pool).await;
        let mut conn = pool.acquire().await.unwrap();

        let updated = Users::new(&mut conn)
            .update(
                user.id,
                &UserUpdateDBRequest {
                    display_name: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.display_name.as_deref(), Some("Renamed"));
        assert_eq!(updated.email, user.email);
        assert!(updated.password_hash.is_some());
    }

    #[sqlx::test]
    async fn test_mark_deleted_stops_resolution(pool: PgPool) {
        let user = create_test_user(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut users = Users::new(&mut conn);

        users.mark_deleted(user.id).await.unwrap();

        // Row survives, but no longer resolves
        let row = users.get_by_id(user.id).await.unwrap().unwrap();
        assert!(row.deleted_at.is_some());
        assert!(!row.is_resolvable());
    }
}
