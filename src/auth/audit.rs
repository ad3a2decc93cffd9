//! Fire-and-forget audit event emission.
//!
//! Audit writes must never change the outcome of the request that triggered
//! them, so they run on a detached task and failures are only logged.

use axum::http::HeaderMap;
use sqlx::PgPool;
use tracing::warn;

use crate::auth::session::SessionTrack;
use crate::db::handlers::auth_events::AuthEvents;
use crate::db::models::auth_events::{AuthEventCreateDBRequest, AuthEventType};
use crate::types::UserId;

/// Client metadata captured for audit rows.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string());

        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());

        Self { ip, user_agent }
    }
}

/// Record an audit event on a detached task.
pub fn emit(db: PgPool, event: AuthEventCreateDBRequest) {
    tokio::spawn(async move {
        let mut conn = match db.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("failed to acquire connection for audit event: {e}");
                return;
            }
        };

        if let Err(e) = AuthEvents::new(&mut conn).record(&event).await {
            warn!("failed to record audit event: {e}");
        }
    });
}

pub fn login_success(track: SessionTrack, user_id: UserId, identifier: &str, client: &ClientInfo) -> AuthEventCreateDBRequest {
    AuthEventCreateDBRequest {
        event_type: AuthEventType::Login,
        track,
        success: true,
        identifier: Some(identifier.to_string()),
        user_id: Some(user_id),
        ip: client.ip.clone(),
        user_agent: client.user_agent.clone(),
        failure_reason: None,
    }
}

/// Failed logins may not map onto a known account; the presented identifier
/// is recorded either way.
pub fn login_failure(track: SessionTrack, identifier: &str, reason: &str, client: &ClientInfo) -> AuthEventCreateDBRequest {
    AuthEventCreateDBRequest {
        event_type: AuthEventType::Login,
        track,
        success: false,
        identifier: Some(identifier.to_string()),
        user_id: None,
        ip: client.ip.clone(),
        user_agent: client.user_agent.clone(),
        failure_reason: Some(reason.to_string()),
    }
}

pub fn logout(track: SessionTrack, user_id: UserId, client: &ClientInfo) -> AuthEventCreateDBRequest {
    AuthEventCreateDBRequest {
        event_type: AuthEventType::Logout,
        track,
        success: true,
        identifier: None,
        user_id: Some(user_id),
        ip: client.ip.clone(),
        user_agent: client.user_agent.clone(),
        failure_reason: None,
    }
}

/// A logout the holder did not ask for, e.g. an admin session destroyed by
/// the timeout enforcer. The reason code distinguishes it from a voluntary
/// logout.
pub fn forced_logout(track: SessionTrack, user_id: UserId, reason: &str) -> AuthEventCreateDBRequest {
    AuthEventCreateDBRequest {
        event_type: AuthEventType::Logout,
        track,
        success: true,
        identifier: None,
        user_id: Some(user_id),
        ip: None,
        user_agent: None,
        failure_reason: Some(reason.to_string()),
    }
}
