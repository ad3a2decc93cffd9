//! Test utilities for integration testing (available with `test-utils` feature).

use crate::api::models::users::AccountStatus;
use crate::auth::{audit::ClientInfo, password, session, session::SessionTrack};
use crate::db::handlers::{AdminGrants, Repository, Users};
use crate::db::models::{
    admin_grants::{AdminGrantCreateDBRequest, AdminRole},
    sessions::SessionDBResponse,
    users::{UserCreateDBRequest, UserDBResponse},
};
use crate::types::SessionId;
use axum_test::TestServer;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

pub fn create_test_config() -> crate::config::Config {
    let mut config = crate::config::Config::default();
    config.host = "127.0.0.1".to_string();
    config.port = 0;
    // No TLS in tests
    config.auth.sessions.cookie_secure = false;
    // Keep test hashing cheap
    config.auth.password.argon2_memory_kib = 1024;
    config.auth.password.argon2_iterations = 1;
    config
}

pub fn create_test_app_state(pool: PgPool) -> crate::AppState {
    crate::AppState::builder().db(pool).config(create_test_config()).build()
}

pub fn create_test_server(pool: PgPool) -> TestServer {
    let state = create_test_app_state(pool);
    let router = crate::build_router(&state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

/// Create an active user with [`TEST_PASSWORD`] set.
pub async fn create_test_user(pool: &PgPool) -> UserDBResponse {
    create_test_user_with_status(pool, AccountStatus::Active).await
}

pub async fn create_test_user_with_status(pool: &PgPool, status: AccountStatus) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let user_id = Uuid::new_v4();
    let username = format!("testuser_{}", user_id.simple());
    let email = format!("{username}@example.com");

    let password_hash = password::hash_string_with_params(
        TEST_PASSWORD,
        Some(crate::auth::password::Argon2Params {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }),
    )
    .expect("Failed to hash test password");

    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            username,
            email,
            display_name: Some("Test User".to_string()),
            avatar_url: None,
            password_hash: Some(password_hash),
            status,
        })
        .await
        .expect("Failed to create test user")
}

/// Create an active user holding an active admin grant.
pub async fn create_test_admin(pool: &PgPool, role: AdminRole) -> UserDBResponse {
    let user = create_test_user(pool).await;

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    AdminGrants::new(&mut conn)
        .create(&AdminGrantCreateDBRequest {
            user_id: user.id,
            role,
            granted_by: None,
        })
        .await
        .expect("Failed to create admin grant");

    user
}

/// Mint a session for a user and return the raw token with the stored row.
pub async fn establish_test_session(pool: &PgPool, user: &UserDBResponse, track: SessionTrack) -> (String, SessionDBResponse) {
    let config = create_test_config();
    session::establish(pool, user, track, &config, &ClientInfo::default())
        .await
        .expect("Failed to establish test session")
}

/// Rewrite a session's timestamps to simulate age and idleness.
pub async fn backdate_session(pool: &PgPool, session_id: SessionId, created_at: DateTime<Utc>, last_activity: DateTime<Utc>) {
    sqlx::query("UPDATE sessions SET created_at = $2, last_activity = $3 WHERE id = $1")
        .bind(session_id)
        .bind(created_at)
        .bind(last_activity)
        .execute(pool)
        .await
        .expect("Failed to backdate session");
}

/// Format a session cookie header value the way a browser would send it back.
pub fn session_cookie_header(track: SessionTrack, token: &str) -> (String, String) {
    let config = create_test_config();
    ("cookie".to_string(), format!("{}={}", track.cookie_name(&config), token))
}
