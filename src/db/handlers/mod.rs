//! Repository implementations for database access.
//!
//! Each repository wraps a SQLx connection or transaction, provides
//! strongly-typed operations, and returns domain models from
//! [`crate::db::models`].
//!
//! # Available Repositories
//!
//! - [`Users`]: Account storage and credential lookup
//! - [`Sessions`]: Dual-track session rows and identity resolution
//! - [`AdminGrants`]: Admin grant lookup and activation
//! - [`AuthEvents`]: Append-only authentication audit log

pub mod admin_grants;
pub mod auth_events;
pub mod repository;
pub mod sessions;
pub mod users;

pub use admin_grants::AdminGrants;
pub use auth_events::AuthEvents;
pub use repository::Repository;
pub use sessions::Sessions;
pub use users::Users;
