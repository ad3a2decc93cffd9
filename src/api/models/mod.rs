//! API request/response models.

pub mod auth;
pub mod pagination;
pub mod users;
