//! Database models for dual-track sessions.

use crate::auth::session::SessionTrack;
use crate::types::{SessionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A session row. Holds only the token fingerprint, never the raw token.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionDBResponse {
    pub id: SessionId,
    pub user_id: UserId,
    pub track: SessionTrack,
    pub token_hash: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionCreateDBRequest {
    pub user_id: UserId,
    pub track: SessionTrack,
    /// Fingerprint of the raw token (see [`crate::auth::token::fingerprint`])
    pub token_hash: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Sessions are immutable apart from `last_activity`, which is advanced by
/// `touch`; the update request exists to satisfy the repository contract.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdateDBRequest {
    pub last_activity: Option<DateTime<Utc>>,
}

/// Filter for listing sessions
#[derive(Debug, Clone)]
pub struct SessionFilter {
    pub user_id: Option<UserId>,
    pub track: Option<SessionTrack>,
    pub skip: i64,
    pub limit: i64,
}

impl SessionFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            user_id: None,
            track: None,
            skip,
            limit,
        }
    }
}
