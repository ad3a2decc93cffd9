//! Opaque session establishment, authentication, and destruction.
//!
//! Sessions live in the database and are keyed by the fingerprint of an
//! opaque token; revoking a row revokes the session with no grace period.
//! The user and admin tracks are fully isolated: separate cookies, separate
//! rows, and a token minted on one track never authenticates the other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;

use crate::{
    auth::{audit, token},
    config::Config,
    db::{
        handlers::{admin_grants::AdminGrants, repository::Repository as _, sessions::Sessions},
        models::{admin_grants::AdminGrantDBResponse, sessions::SessionCreateDBRequest, sessions::SessionDBResponse, users::UserDBResponse},
    },
    errors::{Error, Result},
};

/// Which of the two session tracks a session belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "session_track", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionTrack {
    User,
    Admin,
}

impl SessionTrack {
    pub fn cookie_name(self, config: &Config) -> &str {
        match self {
            SessionTrack::User => &config.auth.sessions.user.cookie_name,
            SessionTrack::Admin => &config.auth.sessions.admin.cookie_name,
        }
    }

    /// Cookie lifetime. For the admin track this only bounds the cookie;
    /// the timeout policy below expires admin sessions far sooner.
    pub fn ttl(self, config: &Config) -> std::time::Duration {
        match self {
            SessionTrack::User => config.auth.sessions.user.ttl,
            SessionTrack::Admin => config.auth.sessions.admin.ttl,
        }
    }
}

/// Timeout policy applied to admin-track sessions on every use.
#[derive(Debug, Clone, Copy)]
pub struct AdminTimeoutPolicy {
    /// Sliding window: expired once this long passes without activity.
    pub inactivity: std::time::Duration,
    /// Hard cap on session age, regardless of activity.
    pub absolute: std::time::Duration,
}

/// Verdict of the admin timeout policy for one session at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminSessionState {
    Valid,
    ExpiredInactivity,
    ExpiredAbsolute,
}

fn chrono_duration(d: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

/// Evaluate the admin timeout policy. Pure: callers pass `now` so the
/// boundaries can be tested without a clock or a database.
///
/// Inactivity is checked before the absolute cap, so a session that is both
/// idle and ancient reports the inactivity verdict.
pub fn admin_timeout_state(
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    now: DateTime<Utc>,
    policy: &AdminTimeoutPolicy,
) -> AdminSessionState {
    if now.signed_duration_since(last_activity) >= chrono_duration(policy.inactivity) {
        return AdminSessionState::ExpiredInactivity;
    }

    if now.signed_duration_since(created_at) >= chrono_duration(policy.absolute) {
        return AdminSessionState::ExpiredAbsolute;
    }

    AdminSessionState::Valid
}

/// Why a presented token did not authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRejection {
    /// No live session row matches the fingerprint on this track.
    UnknownSession,
    /// The session row exists but its account no longer resolves.
    IdentityNotActive,
    /// Admin track: idle past the sliding window. The session was destroyed.
    InactivityTimeout,
    /// Admin track: older than the absolute cap. The session was destroyed.
    AbsoluteTimeout,
    /// Admin track: the account's admin grant is missing or deactivated.
    GrantInactive,
}

impl SessionRejection {
    /// Stable reason code used in audit rows and logs.
    pub fn reason_code(self) -> &'static str {
        match self {
            SessionRejection::UnknownSession => "unknown_session",
            SessionRejection::IdentityNotActive => "identity_not_active",
            SessionRejection::InactivityTimeout => "inactivity_timeout_30m",
            SessionRejection::AbsoluteTimeout => "absolute_timeout_18h",
            SessionRejection::GrantInactive => "grant_inactive",
        }
    }

    /// Timed-out sessions no longer exist server-side, so the stale cookie
    /// should be cleared from the client.
    pub fn clears_cookie(self) -> bool {
        matches!(
            self,
            SessionRejection::UnknownSession | SessionRejection::InactivityTimeout | SessionRejection::AbsoluteTimeout
        )
    }
}

/// A fully-resolved session: the row, its account, and (admin track) the
/// grant that authorizes it.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub user: UserDBResponse,
    pub session: SessionDBResponse,
    pub grant: Option<AdminGrantDBResponse>,
}

#[derive(Debug)]
pub enum SessionOutcome {
    Valid(AuthenticatedSession),
    Rejected(SessionRejection),
}

/// Mint a session for an already-authenticated user.
///
/// Returns the raw token (shown to the client exactly once) alongside the
/// stored row, which only holds the fingerprint.
#[instrument(skip_all, fields(user_id = %user.id, track = ?track))]
pub async fn establish(
    db: &PgPool,
    user: &UserDBResponse,
    track: SessionTrack,
    config: &Config,
    client: &audit::ClientInfo,
) -> Result<(String, SessionDBResponse)> {
    let raw_token = token::generate_token();
    let token_hash = token::fingerprint(&raw_token);

    let expires_at = Utc::now()
        + chrono::Duration::from_std(track.ttl(config)).map_err(|e| Error::Internal {
            operation: format!("convert session ttl: {e}"),
        })?;

    let mut conn = db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let session = Sessions::new(&mut conn)
        .create(&SessionCreateDBRequest {
            user_id: user.id,
            track,
            token_hash,
            ip: client.ip.clone(),
            user_agent: client.user_agent.clone(),
            expires_at,
        })
        .await?;

    Ok((raw_token, session))
}

/// Authenticate a presented token on one track.
///
/// Admin-track timeouts are enforced here: an expired session is deleted and
/// a forced-logout audit event is emitted before the rejection is returned.
/// Activity is touched only on success, so a rejected request never extends
/// the sliding window.
#[instrument(skip_all, fields(track = ?track))]
pub async fn authenticate(db: &PgPool, raw_token: &str, track: SessionTrack, config: &Config) -> Result<SessionOutcome> {
    let token_hash = token::fingerprint(raw_token);
    let now = Utc::now();

    let mut conn = db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut sessions = Sessions::new(&mut conn);

    let Some(session) = sessions.find_active_by_fingerprint(&token_hash, track).await? else {
        return Ok(SessionOutcome::Rejected(SessionRejection::UnknownSession));
    };

    if track == SessionTrack::Admin {
        let policy = config.auth.sessions.admin.timeout_policy();
        match admin_timeout_state(session.created_at, session.last_activity, now, &policy) {
            AdminSessionState::Valid => {}
            expired => {
                let rejection = match expired {
                    AdminSessionState::ExpiredInactivity => SessionRejection::InactivityTimeout,
                    _ => SessionRejection::AbsoluteTimeout,
                };
                debug!(session_id = %session.id, reason = rejection.reason_code(), "destroying timed-out admin session");

                sessions.delete(session.id).await?;
                audit::emit(
                    db.clone(),
                    audit::forced_logout(track, session.user_id, rejection.reason_code()),
                );

                return Ok(SessionOutcome::Rejected(rejection));
            }
        }
    }

    // A suspended, banned, or deleted account keeps its rows but stops
    // resolving, on both tracks, with no grace period.
    let Some(user) = sessions.resolve_identity(session.user_id).await? else {
        return Ok(SessionOutcome::Rejected(SessionRejection::IdentityNotActive));
    };

    let grant = if track == SessionTrack::Admin {
        let grant = AdminGrants::new(&mut conn).find_by_user_id(session.user_id).await?;
        match grant {
            Some(g) if g.is_active => Some(g),
            _ => return Ok(SessionOutcome::Rejected(SessionRejection::GrantInactive)),
        }
    } else {
        None
    };

    // Advance the sliding window. Best-effort: a failed touch must not turn
    // an otherwise valid request into an error.
    if let Err(e) = Sessions::new(&mut conn).touch(session.id, now).await {
        warn!(session_id = %session.id, "failed to touch session activity: {e}");
    }

    Ok(SessionOutcome::Valid(AuthenticatedSession { user, session, grant }))
}

/// Destroy the session matching a presented token. Idempotent: destroying a
/// token that matches nothing succeeds.
///
/// Returns the user the session belonged to, when one was actually destroyed.
#[instrument(skip_all, fields(track = ?track))]
pub async fn destroy(db: &PgPool, raw_token: &str, track: SessionTrack) -> Result<Option<crate::types::UserId>> {
    let token_hash = token::fingerprint(raw_token);

    let mut conn = db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut sessions = Sessions::new(&mut conn);

    let session = sessions.find_active_by_fingerprint(&token_hash, track).await?;
    let deleted = sessions.delete_by_fingerprint(&token_hash, track).await?;

    Ok(if deleted { session.map(|s| s.user_id) } else { None })
}

/// Helper to build a Set-Cookie value for a freshly-minted session token.
pub fn create_session_cookie(token: &str, track: SessionTrack, config: &Config) -> String {
    let sessions = &config.auth.sessions;
    let max_age = track.ttl(config).as_secs();

    format!(
        "{}={}; Path=/; HttpOnly; Secure={}; SameSite={}; Max-Age={}",
        track.cookie_name(config),
        token,
        sessions.cookie_secure,
        sessions.cookie_same_site,
        max_age
    )
}

/// Helper to build a Set-Cookie value that clears a track's cookie.
pub fn clear_session_cookie(track: SessionTrack, config: &Config) -> String {
    let sessions = &config.auth.sessions;

    format!(
        "{}=; Path=/; HttpOnly; Secure={}; SameSite={}; Max-Age=0",
        track.cookie_name(config),
        sessions.cookie_secure,
        sessions.cookie_same_site
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn policy() -> AdminTimeoutPolicy {
        AdminTimeoutPolicy {
            inactivity: Duration::from_secs(30 * 60),
            absolute: Duration::from_secs(18 * 60 * 60),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_fresh_session_is_valid() {
        let state = admin_timeout_state(at(0), at(0), at(60), &policy());
        assert_eq!(state, AdminSessionState::Valid);
    }

    #[test]
    fn test_inactivity_boundary() {
        // 29:59 idle: still valid
        let state = admin_timeout_state(at(0), at(0), at(29 * 60 + 59), &policy());
        assert_eq!(state, AdminSessionState::Valid);

        // 30:01 idle: expired
        let state = admin_timeout_state(at(0), at(0), at(30 * 60 + 1), &policy());
        assert_eq!(state, AdminSessionState::ExpiredInactivity);
    }

    #[test]
    fn test_activity_slides_the_window() {
        // Created long ago but touched recently: valid
        let created = at(0);
        let touched = at(10 * 60 * 60);
        let state = admin_timeout_state(created, touched, at(10 * 60 * 60 + 60), &policy());
        assert_eq!(state, AdminSessionState::Valid);
    }

    #[test]
    fn test_absolute_boundary() {
        let created = at(0);

        // 17:59:59 old, recently active: valid
        let now = at(17 * 3600 + 59 * 60 + 59);
        let state = admin_timeout_state(created, at(17 * 3600 + 59 * 60), now, &policy());
        assert_eq!(state, AdminSessionState::Valid);

        // 18:00:01 old, recently active: expired regardless of activity
        let now = at(18 * 3600 + 1);
        let state = admin_timeout_state(created, at(18 * 3600), now, &policy());
        assert_eq!(state, AdminSessionState::ExpiredAbsolute);
    }

    #[test]
    fn test_inactivity_reported_before_absolute() {
        // Both limits blown: the inactivity verdict wins
        let state = admin_timeout_state(at(0), at(0), at(20 * 3600), &policy());
        assert_eq!(state, AdminSessionState::ExpiredInactivity);
    }

    #[test]
    fn test_rejection_reason_codes() {
        assert_eq!(SessionRejection::UnknownSession.reason_code(), "unknown_session");
        assert_eq!(SessionRejection::InactivityTimeout.reason_code(), "inactivity_timeout_30m");
        assert_eq!(SessionRejection::AbsoluteTimeout.reason_code(), "absolute_timeout_18h");
        assert_eq!(SessionRejection::GrantInactive.reason_code(), "grant_inactive");
    }

    #[test]
    fn test_cookie_clearing_policy() {
        assert!(SessionRejection::UnknownSession.clears_cookie());
        assert!(SessionRejection::InactivityTimeout.clears_cookie());
        assert!(SessionRejection::AbsoluteTimeout.clears_cookie());
        // The session may still be live; the holder just isn't authorized
        assert!(!SessionRejection::GrantInactive.clears_cookie());
        assert!(!SessionRejection::IdentityNotActive.clears_cookie());
    }
}

#[cfg(test)]
mod db_tests {
    use super::*;
    use crate::db::models::admin_grants::AdminRole;
    use crate::db::models::auth_events::AuthEventType;
    use crate::test_utils::*;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn test_establish_and_authenticate(pool: PgPool) {
        let config = create_test_config();
        let user = create_test_user(&pool).await;

        let (token, session) = establish_test_session(&pool, &user, SessionTrack::User).await;

        // Only the fingerprint is stored
        assert_ne!(session.token_hash, token);

        match authenticate(&pool, &token, SessionTrack::User, &config).await.unwrap() {
            SessionOutcome::Valid(resolved) => {
                assert_eq!(resolved.user.id, user.id);
                assert_eq!(resolved.session.id, session.id);
                assert!(resolved.grant.is_none());
            }
            SessionOutcome::Rejected(r) => panic!("expected valid session, got {r:?}"),
        }
    }

    #[sqlx::test]
    async fn test_unknown_token_is_rejected(pool: PgPool) {
        let config = create_test_config();
        let outcome = authenticate(&pool, "bm90LWEtcmVhbC10b2tlbg", SessionTrack::User, &config)
            .await
            .unwrap();
        assert!(matches!(outcome, SessionOutcome::Rejected(SessionRejection::UnknownSession)));
    }

    #[sqlx::test]
    async fn test_token_is_track_bound(pool: PgPool) {
        let config = create_test_config();
        let admin = create_test_admin(&pool, AdminRole::Admin).await;
        let (token, _) = establish_test_session(&pool, &admin, SessionTrack::User).await;

        let outcome = authenticate(&pool, &token, SessionTrack::Admin, &config).await.unwrap();
        assert!(matches!(outcome, SessionOutcome::Rejected(SessionRejection::UnknownSession)));
    }

    #[sqlx::test]
    async fn test_admin_authentication_carries_grant(pool: PgPool) {
        let config = create_test_config();
        let admin = create_test_admin(&pool, AdminRole::Superadmin).await;
        let (token, _) = establish_test_session(&pool, &admin, SessionTrack::Admin).await;

        match authenticate(&pool, &token, SessionTrack::Admin, &config).await.unwrap() {
            SessionOutcome::Valid(resolved) => {
                let grant = resolved.grant.expect("admin session should carry its grant");
                assert_eq!(grant.role, AdminRole::Superadmin);
            }
            SessionOutcome::Rejected(r) => panic!("expected valid session, got {r:?}"),
        }
    }

    #[sqlx::test]
    async fn test_authentication_touches_activity(pool: PgPool) {
        let config = create_test_config();
        let user = create_test_user(&pool).await;
        let (token, session) = establish_test_session(&pool, &user, SessionTrack::User).await;

        let earlier = Utc::now() - chrono::Duration::minutes(10);
        backdate_session(&pool, session.id, earlier, earlier).await;

        authenticate(&pool, &token, SessionTrack::User, &config).await.unwrap();

        let (last_activity,): (DateTime<Utc>,) = sqlx::query_as("SELECT last_activity FROM sessions WHERE id = $1")
            .bind(session.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(last_activity > earlier);
    }

    #[sqlx::test]
    async fn test_destroy_is_idempotent(pool: PgPool) {
        let user = create_test_user(&pool).await;
        let (token, _) = establish_test_session(&pool, &user, SessionTrack::User).await;

        let first = destroy(&pool, &token, SessionTrack::User).await.unwrap();
        assert_eq!(first, Some(user.id));

        let second = destroy(&pool, &token, SessionTrack::User).await.unwrap();
        assert_eq!(second, None);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_timed_out_admin_session_is_destroyed_and_audited(pool: PgPool) {
        let config = create_test_config();
        let admin = create_test_admin(&pool, AdminRole::Admin).await;
        let (token, session) = establish_test_session(&pool, &admin, SessionTrack::Admin).await;

        backdate_session(
            &pool,
            session.id,
            Utc::now() - chrono::Duration::hours(1),
            Utc::now() - chrono::Duration::minutes(31),
        )
        .await;

        let outcome = authenticate(&pool, &token, SessionTrack::Admin, &config).await.unwrap();
        assert!(matches!(outcome, SessionOutcome::Rejected(SessionRejection::InactivityTimeout)));

        let row: Option<(uuid::Uuid,)> = sqlx::query_as("SELECT id FROM sessions WHERE id = $1")
            .bind(session.id)
            .fetch_optional(&pool)
            .await
            .unwrap();
        assert!(row.is_none());

        // The audit write is detached; poll briefly for it
        let mut event = None;
        for _ in 0..50 {
            let mut conn = pool.acquire().await.unwrap();
            let events = crate::db::handlers::AuthEvents::new(&mut conn)
                .list_recent(Some(admin.id), 10)
                .await
                .unwrap();
            if let Some(e) = events.into_iter().find(|e| e.failure_reason.is_some()) {
                event = Some(e);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        let event = event.expect("forced logout should be audited");
        assert_eq!(event.event_type, AuthEventType::Logout);
        assert_eq!(event.failure_reason.as_deref(), Some("inactivity_timeout_30m"));
    }
}
