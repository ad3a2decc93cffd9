//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **User authentication** (`/authentication/*`): Login, logout, session probe
//! - **Admin authentication** (`/admin/authentication/*`): Same surface on the admin track
//! - **Users** (`/admin/api/v1/users/*`): Admin-gated account inspection
//!
//! All endpoints carry OpenAPI annotations via `utoipa`; the rendered
//! documentation is served at `/admin/docs`.

pub mod handlers;
pub mod models;
