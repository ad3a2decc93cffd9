//! Admin endpoints for inspecting user accounts.
//!
//! These routes sit behind the admin authorization middleware; the
//! [`CurrentAdmin`] extractor reads the identity it resolved.

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        users::{CurrentAdmin, ListUsersQuery, UserResponse},
    },
    db::handlers::{Repository as _, Users, users::UserFilter},
    errors::Error,
    types::UserId,
};

/// List user accounts
#[utoipa::path(
    get,
    path = "/admin/api/v1/users",
    tag = "users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Users", body = PaginatedResponse<UserResponse>),
        (status = 401, description = "No valid admin session"),
        (status = 403, description = "Admin grant revoked"),
    ),
    security(
        ("admin_session_token" = [])
    )
)]
#[tracing::instrument(skip_all, fields(admin_id = %current_admin.user.id))]
pub async fn list_users(
    State(state): State<AppState>,
    current_admin: CurrentAdmin,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<PaginatedResponse<UserResponse>>, Error> {
    let (skip, limit) = query.pagination.params();
    let mut filter = UserFilter::new(skip, limit);
    filter.search = query.search;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut user_repo = Users::new(&mut pool_conn);

    let users = user_repo.list(&filter).await?;
    let total_count = user_repo.count(&filter).await?;

    let data = users.into_iter().map(UserResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

/// Get a single user account
#[utoipa::path(
    get,
    path = "/admin/api/v1/users/{id}",
    tag = "users",
    params(
        ("id" = String, Path, format = "uuid", description = "User ID"),
    ),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 401, description = "No valid admin session"),
        (status = 403, description = "Admin grant revoked"),
        (status = 404, description = "User not found"),
    ),
    security(
        ("admin_session_token" = [])
    )
)]
#[tracing::instrument(skip_all, fields(admin_id = %current_admin.user.id))]
pub async fn get_user(
    State(state): State<AppState>,
    current_admin: CurrentAdmin,
    Path(id): Path<UserId>,
) -> Result<Json<UserResponse>, Error> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let user = Users::new(&mut pool_conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    })?;

    Ok(Json(UserResponse::from(user)))
}

#[cfg(test)]
mod tests {
    use crate::auth::session::SessionTrack;
    use crate::db::models::admin_grants::AdminRole;
    use crate::test_utils::*;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn test_get_user_and_not_found(pool: PgPool) {
        let server = create_test_server(pool.clone());
        let admin = create_test_admin(&pool, AdminRole::Admin).await;
        let user = create_test_user(&pool).await;

        let (token, _) = establish_test_session(&pool, &admin, SessionTrack::Admin).await;
        let (name, value) = session_cookie_header(SessionTrack::Admin, &token);

        let response = server
            .get(&format!("/admin/api/v1/users/{}", user.id))
            .add_header(name.clone(), value.clone())
            .await;
        assert_eq!(response.status_code().as_u16(), 200);
        let body: serde_json::Value = response.json();
        assert_eq!(body["username"], user.username.as_str());
        // Credential material never leaves the database layer
        assert!(body.get("password_hash").is_none());

        let missing = server
            .get(&format!("/admin/api/v1/users/{}", uuid::Uuid::new_v4()))
            .add_header(name, value)
            .await;
        assert_eq!(missing.status_code().as_u16(), 404);
    }

    #[sqlx::test]
    async fn test_list_users_search(pool: PgPool) {
        let server = create_test_server(pool.clone());
        let admin = create_test_admin(&pool, AdminRole::Admin).await;
        let user = create_test_user(&pool).await;
        create_test_user(&pool).await;

        let (token, _) = establish_test_session(&pool, &admin, SessionTrack::Admin).await;
        let (name, value) = session_cookie_header(SessionTrack::Admin, &token);

        let response = server
            .get(&format!("/admin/api/v1/users?search={}", user.username))
            .add_header(name, value)
            .await;
        assert_eq!(response.status_code().as_u16(), 200);

        let body: serde_json::Value = response.json();
        assert_eq!(body["total_count"], 1);
        assert_eq!(body["data"][0]["username"], user.username.as_str());
    }
}
