/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Authentication and password-reset endpoints
/// - `cards`: Owner CRUD, the public slug lookup and upgrade requests
/// - `plans`: Billing reference data (plans, subscriptions)
/// - `admin`: The admin surface

pub mod admin;
pub mod auth;
pub mod cards;
pub mod health;
pub mod plans;
