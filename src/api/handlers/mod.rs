//! HTTP request handlers for all API endpoints.
//!
//! - [`auth`]: User-track login, logout, and session probe
//! - [`admin`]: Admin-track login, logout, and session probe
//! - [`users`]: Admin-gated account inspection
//!
//! Protected routes are guarded by [`crate::auth::middleware`]; handlers
//! read the resolved identity through the extractors in
//! [`crate::api::models::users`].

pub mod admin;
pub mod auth;
pub mod users;
