//! # E-Card API Server Library
//!
//! This library provides the core functionality for the e-card API server.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `routes`: API route handlers
//! - `middleware`: Security headers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
