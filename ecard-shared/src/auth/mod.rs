/// Authentication utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength validation
/// - [`jwt`]: JWT token generation and validation
/// - [`otp`]: One-time codes for phone-based password reset
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id with 64 MB memory, 3 iterations
/// - **JWT Tokens**: HS256 signing with access/refresh split
/// - **OTP**: SHA-256 hashed at rest, bounded attempts and resend throttle
/// - **Constant-time Comparison**: Password verification is constant-time

pub mod jwt;
pub mod otp;
pub mod password;
