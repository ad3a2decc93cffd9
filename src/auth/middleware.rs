use crate::{
    AppState,
    api::models::users::{CurrentAdmin, CurrentUser},
    auth::{
        current_user::session_token_from_headers,
        session::{self, SessionOutcome, SessionRejection, SessionTrack},
    },
    errors::Error,
};
use axum::{
    extract::{Request, State},
    http::{HeaderValue, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, trace};

/// Shared implementation for both track middlewares. A rejected request gets
/// its response built here (rather than just an Error) because timed-out and
/// unknown sessions must also clear the stale cookie on the way out, and the
/// error type cannot carry headers.
async fn authorize(state: AppState, mut request: Request, next: Next, track: SessionTrack) -> Result<Response, Error> {
    let cookie_name = track.cookie_name(&state.config);
    let Some(token) = session_token_from_headers(request.headers(), cookie_name)? else {
        trace!(track = ?track, "no session cookie on protected route");
        return Err(Error::Unauthenticated { message: None });
    };

    match session::authenticate(&state.db, &token, track, &state.config).await? {
        SessionOutcome::Valid(auth) => {
            let user = CurrentUser::from(auth.user);
            debug!(user_id = %user.id, track = ?track, "request authorized");

            if track == SessionTrack::Admin {
                let role = match auth.grant {
                    Some(grant) => grant.role,
                    None => {
                        return Err(Error::Internal {
                            operation: "resolve grant for authenticated admin session".to_string(),
                        });
                    }
                };
                request.extensions_mut().insert(CurrentAdmin {
                    user: user.clone(),
                    role,
                });
            }
            request.extensions_mut().insert(user);

            Ok(next.run(request).await)
        }
        SessionOutcome::Rejected(rejection) => {
            trace!(track = ?track, reason = rejection.reason_code(), "request rejected");

            let error = match rejection {
                SessionRejection::GrantInactive => Error::Forbidden {
                    resource: "admin interface".to_string(),
                },
                _ => Error::Unauthenticated { message: None },
            };

            let mut response = error.into_response();
            if rejection.clears_cookie() {
                if let Ok(value) = HeaderValue::from_str(&session::clear_session_cookie(track, &state.config)) {
                    response.headers_mut().append(SET_COOKIE, value);
                }
            }

            Ok(response)
        }
    }
}

/// Middleware guarding user-track routes. Inserts [`CurrentUser`] into
/// request extensions on success.
pub async fn require_user(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, Error> {
    authorize(state, request, next, SessionTrack::User).await
}

/// Middleware guarding admin-track routes. Inserts both [`CurrentAdmin`] and
/// [`CurrentUser`] into request extensions on success.
pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, Error> {
    authorize(state, request, next, SessionTrack::Admin).await
}
