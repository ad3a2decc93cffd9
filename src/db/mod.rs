//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL.
//! It follows the Repository pattern to provide clean abstractions over database operations.
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations for CRUD operations
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! # Repository Pattern
//!
//! The [`handlers`] module provides repository structs for each database table.
//! Repositories encapsulate all database access for a specific entity type:
//! they wrap a SQLx connection or transaction, provide strongly-typed CRUD
//! operations, and return domain models from [`models`].

pub mod errors;
pub mod handlers;
pub mod models;
