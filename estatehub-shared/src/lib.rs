//! # EstateHub Shared Library
//!
//! Types, persistence and auth primitives shared by the EstateHub API server
//! and the email worker.
//!
//! ## Module Organization
//!
//! - `auth`: JWT, password hashing, TOTP, email verification tokens, authorization
//! - `db`: connection pool and migrations
//! - `geo`: points and search polygons
//! - `models`: database models and their queries
//! - `search`: listing filters for the geographic search
//! - `user_agent`: user-agent family detection for the login audit

pub mod auth;
pub mod db;
pub mod geo;
pub mod models;
pub mod search;
pub mod user_agent;

/// Current version of the EstateHub shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
