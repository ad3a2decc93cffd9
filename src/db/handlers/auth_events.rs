//! Database access for the authentication audit log.
//!
//! Append-only: rows are inserted and listed, never updated or deleted.

use crate::db::{
    errors::Result,
    models::auth_events::{AuthEventCreateDBRequest, AuthEventDBResponse},
};
use crate::types::{UserId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

const ALL_COLUMNS: &str =
    "id, event_type, track, success, identifier, user_id, ip, user_agent, failure_reason, created_at";

pub struct AuthEvents<'c> {
    db: &'c mut PgConnection,
}

impl<'c> AuthEvents<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(event_type = ?request.event_type, success = request.success), err)]
    pub async fn record(&mut self, request: &AuthEventCreateDBRequest) -> Result<AuthEventDBResponse> {
        let event_id = Uuid::new_v4();

        let event = sqlx::query_as::<_, AuthEventDBResponse>(&format!(
            r#"
            INSERT INTO auth_events (id, event_type, track, success, identifier, user_id, ip, user_agent, failure_reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(event_id)
        .bind(request.event_type)
        .bind(request.track)
        .bind(request.success)
        .bind(&request.identifier)
        .bind(request.user_id)
        .bind(&request.ip)
        .bind(&request.user_agent)
        .bind(&request.failure_reason)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(event)
    }

    /// Most recent events first, optionally narrowed to one user.
    #[instrument(skip(self), err)]
    pub async fn list_recent(&mut self, user_id: Option<UserId>, limit: i64) -> Result<Vec<AuthEventDBResponse>> {
        let events = sqlx::query_as::<_, AuthEventDBResponse>(&format!(
            r#"
            SELECT {ALL_COLUMNS} FROM auth_events
            WHERE ($1::uuid IS NULL OR user_id = $1)
            ORDER BY created_at DESC LIMIT $2
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(events)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn count_for_user(&mut self, user_id: UserId) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM auth_events WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::SessionTrack;
    use crate::db::models::auth_events::AuthEventType;
    use crate::test_utils::create_test_user;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn test_record_list_and_count(pool: PgPool) {
        let user = create_test_user(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut events = AuthEvents::new(&mut conn);

        events
            .record(&AuthEventCreateDBRequest {
                event_type: AuthEventType::Login,
                track: SessionTrack::User,
                success: false,
                identifier: Some(user.username.clone()),
                user_id: None,
                ip: Some("203.0.113.7".to_string()),
                user_agent: None,
                failure_reason: Some("invalid_credentials".to_string()),
            })
            .await
            .unwrap();

        events
            .record(&AuthEventCreateDBRequest {
                event_type: AuthEventType::Login,
                track: SessionTrack::User,
                success: true,
                identifier: Some(user.username.clone()),
                user_id: Some(user.id),
                ip: None,
                user_agent: None,
                failure_reason: None,
            })
            .await
            .unwrap();

        // The failure carried no user id, so only the success counts here
        assert_eq!(events.count_for_user(user.id).await.unwrap(), 1);

        let recent = events.list_recent(None, 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        // Most recent first
        assert!(recent[0].success);

        let for_user = events.list_recent(Some(user.id), 10).await.unwrap();
        assert_eq!(for_user.len(), 1);
    }
}
