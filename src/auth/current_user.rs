use crate::{
    AppState,
    api::models::users::{CurrentAdmin, CurrentUser},
    auth::session::{self, SessionOutcome, SessionRejection, SessionTrack},
    errors::{Error, Result},
};
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use tracing::{instrument, trace};

/// Extract a session token from the Cookie header, by cookie name.
/// Returns:
/// - Ok(None): No cookie with that name present
/// - Ok(Some(token)): Cookie found
/// - Err(error): Cookie header present but not valid UTF-8
pub(crate) fn session_token_from_headers(headers: &HeaderMap, cookie_name: &str) -> Result<Option<String>> {
    let Some(cookie_header) = headers.get(axum::http::header::COOKIE) else {
        return Ok(None);
    };

    let cookie_str = cookie_header.to_str().map_err(|e| Error::BadRequest {
        message: format!("Invalid cookie header: {e}"),
    })?;

    for cookie in cookie_str.split(';') {
        let cookie = cookie.trim();
        if let Some((name, value)) = cookie.split_once('=') {
            if name == cookie_name {
                return Ok(Some(value.to_string()));
            }
        }
    }

    Ok(None)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        // The authorization middleware resolves the session once per request
        // and stashes the result; prefer that over a second database round trip.
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let cookie_name = SessionTrack::User.cookie_name(&state.config);
        let Some(token) = session_token_from_headers(&parts.headers, cookie_name)? else {
            trace!("No user session cookie present");
            return Err(Error::Unauthenticated { message: None });
        };

        match session::authenticate(&state.db, &token, SessionTrack::User, &state.config).await? {
            SessionOutcome::Valid(auth) => Ok(CurrentUser::from(auth.user)),
            SessionOutcome::Rejected(rejection) => {
                trace!(reason = rejection.reason_code(), "user session rejected");
                Err(Error::Unauthenticated { message: None })
            }
        }
    }
}

impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        if let Some(admin) = parts.extensions.get::<CurrentAdmin>() {
            return Ok(admin.clone());
        }

        let cookie_name = SessionTrack::Admin.cookie_name(&state.config);
        let Some(token) = session_token_from_headers(&parts.headers, cookie_name)? else {
            trace!("No admin session cookie present");
            return Err(Error::Unauthenticated { message: None });
        };

        match session::authenticate(&state.db, &token, SessionTrack::Admin, &state.config).await? {
            SessionOutcome::Valid(auth) => match auth.grant {
                Some(grant) => Ok(CurrentAdmin {
                    user: CurrentUser::from(auth.user),
                    role: grant.role,
                }),
                None => Err(Error::Internal {
                    operation: "resolve grant for authenticated admin session".to_string(),
                }),
            },
            SessionOutcome::Rejected(SessionRejection::GrantInactive) => Err(Error::Forbidden {
                resource: "admin interface".to_string(),
            }),
            SessionOutcome::Rejected(rejection) => {
                trace!(reason = rejection.reason_code(), "admin session rejected");
                Err(Error::Unauthenticated { message: None })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::COOKIE, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_cookie_extraction() {
        let headers = headers_with_cookie("agora_session=abc123; other=value");
        let token = session_token_from_headers(&headers, "agora_session").unwrap();
        assert_eq!(token.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_cookie_extraction_with_whitespace() {
        let headers = headers_with_cookie("other=value;  agora_session=abc123");
        let token = session_token_from_headers(&headers, "agora_session").unwrap();
        assert_eq!(token.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_missing_cookie_is_none() {
        let headers = headers_with_cookie("other=value");
        let token = session_token_from_headers(&headers, "agora_session").unwrap();
        assert!(token.is_none());

        let token = session_token_from_headers(&HeaderMap::new(), "agora_session").unwrap();
        assert!(token.is_none());
    }

    #[test]
    fn test_track_cookies_do_not_alias() {
        // A cookie on one track must never be picked up when looking for the other
        let headers = headers_with_cookie("agora_admin_session=admintoken");
        let token = session_token_from_headers(&headers, "agora_session").unwrap();
        assert!(token.is_none());

        let token = session_token_from_headers(&headers, "agora_admin_session").unwrap();
        assert_eq!(token.as_deref(), Some("admintoken"));
    }
}
