//! OpenAPI documentation configuration.
//!
//! Collects the annotated handlers into a single spec, rendered at
//! `/admin/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api;

/// Cookie-based security schemes for the two session tracks.
struct SessionSecurityAddon;

impl Modify for SessionSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "session_token".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("agora_session"))),
            );
            components.security_schemes.insert(
                "admin_session_token".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("agora_admin_session"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::session,
        api::handlers::admin::login,
        api::handlers::admin::logout,
        api::handlers::admin::session,
        api::handlers::users::list_users,
        api::handlers::users::get_user,
    ),
    modifiers(&SessionSecurityAddon),
    tags(
        (name = "authentication", description = "User-track login, logout, and session probe"),
        (name = "admin-authentication", description = "Admin-track login, logout, and session probe"),
        (name = "users", description = "Admin-gated account inspection"),
    ),
    info(
        title = "Agora API",
        description = "Authentication and session-authorization service for the Agora social platform"
    )
)]
pub struct ApiDoc;
