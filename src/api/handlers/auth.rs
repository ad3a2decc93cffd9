//! User-track authentication endpoints.

use axum::{Json, extract::State, http::HeaderMap};

use crate::{
    AppState,
    api::models::{
        auth::{AuthResponse, AuthSuccessResponse, LoginRequest, LoginResponse, LogoutResponse, SessionResponse},
        users::{CurrentUser, UserResponse},
    },
    auth::{
        audit::{self, ClientInfo},
        current_user::session_token_from_headers,
        password,
        session::{self, SessionTrack},
    },
    db::handlers::Users,
    errors::Error,
};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Login with username or email and password
#[utoipa::path(
    post,
    path = "/authentication/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, headers: HeaderMap, Json(request): Json<LoginRequest>) -> Result<LoginResponse, Error> {
    login_on_track(state, headers, request, SessionTrack::User).await
}

/// Shared login flow for both tracks. The admin track additionally requires
/// an active grant, checked by the caller-supplied track.
///
/// Every rejection returns the same status and body; only the audit trail
/// records which check failed.
pub(crate) async fn login_on_track(
    state: AppState,
    headers: HeaderMap,
    request: LoginRequest,
    track: SessionTrack,
) -> Result<LoginResponse, Error> {
    let client = ClientInfo::from_headers(&headers);

    let reject = |reason: &str| {
        audit::emit(state.db.clone(), audit::login_failure(track, &request.identifier, reason, &client));
        Error::Unauthenticated {
            message: Some(INVALID_CREDENTIALS.to_string()),
        }
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let user = Users::new(&mut pool_conn).get_user_by_identifier(&request.identifier).await?;

    // Verify on a blocking thread to avoid blocking the async runtime. An
    // unknown identifier or an account without a hash still burns one
    // verification so all rejections cost similar wall time.
    let password = request.password.clone();
    let hash = user.as_ref().and_then(|u| u.password_hash.clone()).unwrap_or_default();
    let is_valid = tokio::task::spawn_blocking(move || password::verify_string(&password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })?;

    let Some(user) = user else {
        return Err(reject("invalid_credentials"));
    };

    if !is_valid {
        return Err(reject("invalid_credentials"));
    }

    // Credentials alone are not enough: the account must also resolve
    if !user.is_resolvable() {
        return Err(reject("identity_not_active"));
    }

    if track == SessionTrack::Admin {
        match crate::db::handlers::AdminGrants::new(&mut pool_conn).find_by_user_id(user.id).await? {
            Some(grant) if grant.is_active => {}
            _ => return Err(reject("grant_inactive")),
        }
    }

    Users::new(&mut pool_conn).record_login(user.id).await?;
    drop(pool_conn);

    let (token, _session) = session::establish(&state.db, &user, track, &state.config, &client).await?;

    audit::emit(state.db.clone(), audit::login_success(track, user.id, &request.identifier, &client));

    let cookie = session::create_session_cookie(&token, track, &state.config);
    let auth_response = AuthResponse {
        user: UserResponse::from(user),
        message: "Login successful".to_string(),
    };

    Ok(LoginResponse { auth_response, cookie })
}

/// Logout (destroy session and clear cookie)
#[utoipa::path(
    post,
    path = "/authentication/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout successful", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<LogoutResponse, Error> {
    logout_on_track(state, headers, SessionTrack::User).await
}

/// Shared logout flow. Idempotent: logging out with no cookie, or with a
/// token that matches no session, still succeeds and clears the cookie.
pub(crate) async fn logout_on_track(state: AppState, headers: HeaderMap, track: SessionTrack) -> Result<LogoutResponse, Error> {
    let client = ClientInfo::from_headers(&headers);

    if let Some(token) = session_token_from_headers(&headers, track.cookie_name(&state.config))? {
        if let Some(user_id) = session::destroy(&state.db, &token, track).await? {
            audit::emit(state.db.clone(), audit::logout(track, user_id, &client));
        }
    }

    let cookie = session::clear_session_cookie(track, &state.config);
    let auth_response = AuthSuccessResponse {
        message: "Logout successful".to_string(),
    };

    Ok(LogoutResponse { auth_response, cookie })
}

/// Probe the current user session
#[utoipa::path(
    get,
    path = "/authentication/session",
    tag = "authentication",
    responses(
        (status = 200, description = "Active session", body = SessionResponse),
        (status = 401, description = "No valid session"),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn session(current_user: CurrentUser) -> Json<SessionResponse> {
    Json(SessionResponse { user: current_user })
}
