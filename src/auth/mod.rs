//! Authentication and session authorization.
//!
//! Credential verification ([`password`]), opaque token handling ([`token`]),
//! the dual-track session machinery ([`session`]), request extractors
//! ([`current_user`]), route guards ([`middleware`]), and the audit trail
//! ([`audit`]).

pub mod audit;
pub mod current_user;
pub mod middleware;
pub mod password;
pub mod session;
pub mod token;
