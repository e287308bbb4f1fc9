/// Database models for the e-card platform
///
/// # Models
///
/// - `user`: User accounts and authentication
/// - `profile`: Per-user profile (canonical phone, OTP state, card limit)
/// - `card`: Digital business cards and their derived state
/// - `upgrade_request`: User requests for limit raises / reactivations
/// - `subscription`: Billing plans and subscriptions (reference metadata)

pub mod card;
pub mod profile;
pub mod subscription;
pub mod upgrade_request;
pub mod user;
