//! # agora: Authentication and Session Authorization Service
//!
//! `agora` is the authentication subsystem of the Agora social platform. It owns
//! credential verification, opaque session tokens, and the authorization
//! middleware the rest of the platform sits behind.
//!
//! ## Overview
//!
//! Accounts sign in with a username or email plus a password; passwords are
//! stored as Argon2id hashes and never leave the database layer. A successful
//! login mints an opaque random token, stores only its SHA-256 fingerprint in
//! a session row, and hands the raw token back in an HttpOnly cookie. Every
//! subsequent request presents the cookie, and the session layer resolves it
//! back to a live account.
//!
//! Sessions run on two fully isolated tracks. The **user track** carries the
//! ordinary browsing session under the `agora_session` cookie. The **admin
//! track** carries back-office access under `agora_admin_session`: it requires
//! an active admin grant on every request and is subject to a sliding
//! inactivity timeout and an absolute lifetime cap, enforced lazily when the
//! session is next presented. A token minted on one track never authenticates
//! the other.
//!
//! Security-relevant transitions (logins, failures, logouts, forced timeouts)
//! are recorded as audit events, written asynchronously so the request path
//! never blocks on them.
//!
//! ## Request Flow
//!
//! Browser requests to `/authentication/*` and `/admin/authentication/*`
//! establish and destroy sessions. Admin management routes under
//! `/admin/api/v1/*` sit behind [`auth::middleware::require_admin`], which
//! authenticates the admin cookie, enforces the timeout policy, re-checks the
//! admin grant, and injects the resolved identity into request extensions for
//! the handlers' extractors.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use agora::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = agora::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     agora::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! The application requires PostgreSQL and runs migrations on startup:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
//! agora::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod telemetry;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::{
    api::models::users::AccountStatus,
    auth::password,
    config::CorsOrigin,
    db::handlers::{AdminGrants, Repository, Users},
    db::models::{admin_grants::AdminGrantCreateDBRequest, admin_grants::AdminRole, users::UserCreateDBRequest},
    openapi::ApiDoc,
};
use axum::{
    Router, http,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{AuthEventId, SessionId, UserId};

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
}

/// Get the agora database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user and its superadmin grant if they don't exist.
///
/// Idempotent: an existing user keeps its row (the password is updated when one
/// is configured), and an existing grant is reactivated rather than duplicated.
/// Called during startup so a fresh deployment always has a way in.
#[instrument(skip_all)]
pub async fn create_initial_admin(
    username: &str,
    email: &str,
    password: Option<&str>,
    params: Option<password::Argon2Params>,
    db: &PgPool,
) -> Result<UserId, anyhow::Error> {
    let password_hash = match password {
        Some(pwd) => {
            Some(password::hash_string_with_params(pwd, params).map_err(|e| anyhow::anyhow!("Failed to hash admin password: {e}"))?)
        }
        None => None,
    };

    let mut tx = db.begin().await?;

    let existing = Users::new(&mut tx).get_user_by_email(email).await?;
    let user_id = match existing {
        Some(user) => {
            if let Some(hash) = password_hash {
                sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
                    .bind(hash)
                    .bind(user.id)
                    .execute(&mut *tx)
                    .await?;
            }
            user.id
        }
        None => {
            let created = Users::new(&mut tx)
                .create(&UserCreateDBRequest {
                    username: username.to_string(),
                    email: email.to_string(),
                    display_name: None,
                    avatar_url: None,
                    password_hash,
                    status: AccountStatus::Active,
                })
                .await?;
            info!(username = %username, "created initial admin user");
            created.id
        }
    };

    let mut grants = AdminGrants::new(&mut tx);
    match grants.find_by_user_id(user_id).await? {
        Some(grant) if grant.is_active => {}
        Some(_) => {
            grants.set_active(user_id, true).await?;
        }
        None => {
            grants
                .create(&AdminGrantCreateDBRequest {
                    user_id,
                    role: AdminRole::Superadmin,
                    granted_by: None,
                })
                .await?;
        }
    }

    tx.commit().await?;
    Ok(user_id)
}

/// Setup the database connection, run migrations, and bootstrap the admin user
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.pool.max_connections)
        .min_connections(config.database.pool.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(config.database.pool.acquire_timeout_secs))
        .connect(&config.database.url)
        .await?;

    migrator().run(&pool).await?;

    create_initial_admin(
        &config.bootstrap.admin_username,
        &config.bootstrap.admin_email,
        config.bootstrap.admin_password.as_deref(),
        Some(config.auth.password.argon2_params()),
        &pool,
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {e}"))?;

    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.cors.allow_credentials)
        .allow_methods([http::Method::GET, http::Method::POST])
        .allow_headers([http::header::CONTENT_TYPE]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the main application router with all endpoints and middleware.
///
/// - Authentication routes on both tracks (login, logout, session probe)
/// - Admin management routes behind the admin authorization middleware
/// - OpenAPI documentation at `/admin/docs`
/// - CORS and tracing middleware
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    // Authentication routes (at root level; session cookies do the rest).
    // The probes sit behind the track middleware so a stale cookie is cleared
    // on rejection rather than just answered with a 401.
    let auth_routes = Router::new()
        .route("/authentication/login", post(api::handlers::auth::login))
        .route("/authentication/logout", post(api::handlers::auth::logout))
        .route(
            "/authentication/session",
            get(api::handlers::auth::session).route_layer(from_fn_with_state(state.clone(), auth::middleware::require_user)),
        )
        .route("/admin/authentication/login", post(api::handlers::admin::login))
        .route("/admin/authentication/logout", post(api::handlers::admin::logout))
        .route(
            "/admin/authentication/session",
            get(api::handlers::admin::session).route_layer(from_fn_with_state(state.clone(), auth::middleware::require_admin)),
        )
        .with_state(state.clone());

    // Admin management API, gated as a block
    let admin_api_routes = Router::new()
        .route("/users", get(api::handlers::users::list_users))
        .route("/users/{id}", get(api::handlers::users::get_user))
        .route_layer(from_fn_with_state(state.clone(), auth::middleware::require_admin))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .merge(auth_routes)
        .nest("/admin/api/v1", admin_api_routes)
        .merge(Scalar::with_url("/admin/docs", ApiDoc::openapi()));

    let cors_layer = create_cors_layer(&state.config)?;

    let router = router.layer(cors_layer).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs
///    migrations, and bootstraps the initial admin
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles
///    requests until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting agora with configuration: {:#?}", config);

        let pool = setup_database(&config).await?;

        let app_state = AppState::builder().db(pool.clone()).config(config.clone()).build();
        let router = build_router(&app_state)?;

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Agora listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::create_initial_admin;
    use crate::db::handlers::{AdminGrants, Users};
    use sqlx::PgPool;

    #[sqlx::test]
    async fn test_create_initial_admin_is_idempotent(pool: PgPool) {
        let first = create_initial_admin("admin", "admin@example.com", Some("bootstrap-password"), None, &pool)
            .await
            .unwrap();
        let second = create_initial_admin("admin", "admin@example.com", Some("bootstrap-password"), None, &pool)
            .await
            .unwrap();
        assert_eq!(first, second);

        let mut conn = pool.acquire().await.unwrap();
        let user = Users::new(&mut conn).get_user_by_email("admin@example.com").await.unwrap().unwrap();
        assert_eq!(user.id, first);

        let grant = AdminGrants::new(&mut conn).find_by_user_id(first).await.unwrap().unwrap();
        assert!(grant.is_active);
    }

    #[sqlx::test]
    async fn test_create_initial_admin_reactivates_revoked_grant(pool: PgPool) {
        let user_id = create_initial_admin("admin", "admin@example.com", Some("bootstrap-password"), None, &pool)
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        AdminGrants::new(&mut conn).set_active(user_id, false).await.unwrap();
        drop(conn);

        create_initial_admin("admin", "admin@example.com", None, None, &pool).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let grant = AdminGrants::new(&mut conn).find_by_user_id(user_id).await.unwrap().unwrap();
        assert!(grant.is_active);
    }
}
