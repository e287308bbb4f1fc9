//! # E-Card Shared Library
//!
//! This crate contains shared types, utilities, and business logic used by
//! the e-card API server.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `auth`: Password hashing, JWT tokens and one-time codes
//! - `db`: Connection pooling and migrations
//! - `slug`: URL slug derivation and uniqueness probing
//! - `style`: Background parsing and text color derivation
//! - `contact`: Phone and WhatsApp number normalization
//! - `qr`: QR code artifact rendering
//! - `persist`: The card save pipeline tying the above together

pub mod auth;
pub mod contact;
pub mod db;
pub mod models;
pub mod persist;
pub mod qr;
pub mod slug;
pub mod style;

/// Current version of the e-card shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
