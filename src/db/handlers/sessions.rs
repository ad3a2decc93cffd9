//! Database repository for sessions.

use std::collections::HashMap;

use crate::auth::session::SessionTrack;
use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::{
        sessions::{SessionCreateDBRequest, SessionDBResponse, SessionFilter, SessionUpdateDBRequest},
        users::UserDBResponse,
    },
};
use crate::types::{SessionId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

const ALL_COLUMNS: &str =
    "id, user_id, track, token_hash, ip, user_agent, created_at, last_activity, expires_at";

pub struct Sessions<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Sessions<'c> {
    type CreateRequest = SessionCreateDBRequest;
    type UpdateRequest = SessionUpdateDBRequest;
    type Response = SessionDBResponse;
    type Id = SessionId;
    type Filter = SessionFilter;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), track = ?request.track), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let session_id = Uuid::new_v4();

        let session = sqlx::query_as::<_, SessionDBResponse>(&format!(
            r#"
            INSERT INTO sessions (id, user_id, track, token_hash, ip, user_agent, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(session_id)
        .bind(request.user_id)
        .bind(request.track)
        .bind(&request.token_hash)
        .bind(&request.ip)
        .bind(&request.user_agent)
        .bind(request.expires_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(session)
    }

    #[instrument(skip(self), fields(session_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let session =
            sqlx::query_as::<_, SessionDBResponse>(&format!("SELECT {ALL_COLUMNS} FROM sessions WHERE id = $1"))
                .bind(id)
                .fetch_optional(&mut *self.db)
                .await?;

        Ok(session)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let sessions =
            sqlx::query_as::<_, SessionDBResponse>(&format!("SELECT {ALL_COLUMNS} FROM sessions WHERE id = ANY($1)"))
                .bind(&ids)
                .fetch_all(&mut *self.db)
                .await?;

        Ok(sessions.into_iter().map(|s| (s.id, s)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let sessions = sqlx::query_as::<_, SessionDBResponse>(&format!(
            r#"
            SELECT {ALL_COLUMNS} FROM sessions
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::session_track IS NULL OR track = $2)
            ORDER BY created_at DESC LIMIT $3 OFFSET $4
            "#
        ))
        .bind(filter.user_id)
        .bind(filter.track)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(sessions)
    }

    #[instrument(skip(self, id, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let session = sqlx::query_as::<_, SessionDBResponse>(&format!(
            r#"
            UPDATE sessions
            SET last_activity = COALESCE($2, last_activity)
            WHERE id = $1
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(request.last_activity)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(session)
    }

    #[instrument(skip(self, id), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl<'c> Sessions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Look up a live session by token fingerprint on the given track.
    ///
    /// Rows past their cookie expiry are invisible here; the separate admin
    /// inactivity/absolute timeouts are evaluated by the caller.
    #[instrument(skip(self, token_hash), fields(track = ?track), err)]
    pub async fn find_active_by_fingerprint(
        &mut self,
        token_hash: &str,
        track: SessionTrack,
    ) -> Result<Option<SessionDBResponse>> {
        let session = sqlx::query_as::<_, SessionDBResponse>(&format!(
            "SELECT {ALL_COLUMNS} FROM sessions WHERE token_hash = $1 AND track = $2 AND expires_at > NOW()"
        ))
        .bind(token_hash)
        .bind(track)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(session)
    }

    /// Load the account backing a session, if it still resolves. A suspended,
    /// banned, pending, or soft-deleted account yields `None` even though the
    /// session row exists.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn resolve_identity(&mut self, user_id: UserId) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            SELECT id, username, email, display_name, avatar_url, password_hash, status,
                   deleted_at, created_at, updated_at, last_login
            FROM users
            WHERE id = $1 AND status = 'active' AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(user)
    }

    /// Advance a session's activity timestamp.
    #[instrument(skip(self), fields(session_id = %abbrev_uuid(&id)), err)]
    pub async fn touch(&mut self, id: SessionId, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE sessions SET last_activity = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    /// Delete a session by its token fingerprint. Idempotent: an unknown
    /// fingerprint is not an error.
    #[instrument(skip(self, token_hash), fields(track = ?track), err)]
    pub async fn delete_by_fingerprint(&mut self, token_hash: &str, track: SessionTrack) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = $1 AND track = $2")
            .bind(token_hash)
            .bind(track)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every session a user holds, optionally limited to one track.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn delete_for_user(&mut self, user_id: UserId, track: Option<SessionTrack>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1 AND ($2::session_track IS NULL OR track = $2)")
            .bind(user_id)
            .bind(track)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }

    /// Remove rows past their cookie expiry. Run opportunistically; stale rows
    /// are harmless since lookups filter on `expires_at` anyway.
    #[instrument(skip(self), err)]
    pub async fn delete_expired(&mut self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn test_list_and_delete_for_user_by_track(pool: PgPool) {
        let user = create_test_user(&pool).await;
        establish_test_session(&pool, &user, SessionTrack::User).await;
        establish_test_session(&pool, &user, SessionTrack::User).await;
        establish_test_session(&pool, &user, SessionTrack::Admin).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut sessions = Sessions::new(&mut conn);

        let mut filter = SessionFilter::new(0, 10);
        filter.user_id = Some(user.id);
        assert_eq!(sessions.list(&filter).await.unwrap().len(), 3);

        // Only the user-track sessions go
        let deleted = sessions.delete_for_user(user.id, Some(SessionTrack::User)).await.unwrap();
        assert_eq!(deleted, 2);

        filter.track = Some(SessionTrack::Admin);
        assert_eq!(sessions.list(&filter).await.unwrap().len(), 1);

        let deleted = sessions.delete_for_user(user.id, None).await.unwrap();
        assert_eq!(deleted, 1);
    }

    #[sqlx::test]
    async fn test_delete_expired_only_removes_past_expiry(pool: PgPool) {
        let user = create_test_user(&pool).await;
        let (_, live) = establish_test_session(&pool, &user, SessionTrack::User).await;
        let (_, stale) = establish_test_session(&pool, &user, SessionTrack::User).await;

        sqlx::query("UPDATE sessions SET expires_at = NOW() - INTERVAL '1 hour' WHERE id = $1")
            .bind(stale.id)
            .execute(&pool)
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let mut sessions = Sessions::new(&mut conn);

        assert_eq!(sessions.delete_expired().await.unwrap(), 1);
        assert!(sessions.get_by_id(live.id).await.unwrap().is_some());
        assert!(sessions.get_by_id(stale.id).await.unwrap().is_none());
    }
}
