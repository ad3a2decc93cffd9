//! Database record models matching table schemas.
//!
//! Each model struct corresponds to a database table row. Models derive
//! `sqlx::FromRow` for query results and are distinct from the API models in
//! [`crate::api::models`] so storage and API representations can evolve
//! independently.
//!
//! - [`users`]: User accounts and credentials
//! - [`sessions`]: Dual-track session rows (hashed tokens only)
//! - [`admin_grants`]: Elevated-privilege grants, one per admin identity
//! - [`auth_events`]: Append-only authentication audit records

pub mod admin_grants;
pub mod auth_events;
pub mod sessions;
pub mod users;
