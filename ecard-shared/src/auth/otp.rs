/// One-time codes for phone-based password reset
///
/// Only the SHA-256 hex digest of a code is ever stored; the plaintext code
/// exists in memory just long enough to hand to the message dispatcher. All
/// state
/// (hash, expiry, request time, attempt counter) lives on the profile row;
/// this module owns the pure policy so it can be tested without a database.
///
/// # Policy
///
/// - 6-digit numeric code, uniformly random
/// - Valid for 10 minutes from issuance
/// - At most 5 verification attempts per issued code
/// - At most one issuance per 60 seconds per profile

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Digits in a generated code.
pub const CODE_LENGTH: usize = 6;

/// Verification attempts allowed per issued code.
pub const MAX_ATTEMPTS: i16 = 5;

/// How long an issued code stays valid.
pub fn validity_window() -> Duration {
    Duration::minutes(10)
}

/// Minimum gap between issuances for one profile.
pub fn resend_interval() -> Duration {
    Duration::seconds(60)
}

/// Outcome of checking a submitted code against stored state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Code matches and is within budget; clear the OTP state
    Valid,

    /// Code does not match; increment the attempt counter
    WrongCode,

    /// The code's validity window has passed; clear the OTP state
    Expired,

    /// The attempt budget is spent; clear the OTP state
    AttemptsExhausted,
}

/// Generates a fresh 6-digit code.
pub fn generate() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", n)
}

/// Hex SHA-256 digest of a code, the only form that touches storage.
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Expiry timestamp for a code issued at `now`.
pub fn expiry_from(now: DateTime<Utc>) -> DateTime<Utc> {
    now + validity_window()
}

/// Whether a new code may be issued given the previous request time.
pub fn can_resend(last_requested: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_requested {
        Some(at) => now - at >= resend_interval(),
        None => true,
    }
}

/// Checks a submitted code against the stored hash and budgets.
///
/// `attempts` is the number of failed attempts already recorded. Budget and
/// expiry are checked before the hash so an exhausted or stale code never
/// reports `WrongCode`.
pub fn verify(
    submitted: &str,
    stored_hash: &str,
    expires_at: DateTime<Utc>,
    attempts: i16,
    now: DateTime<Utc>,
) -> VerifyOutcome {
    if attempts >= MAX_ATTEMPTS {
        return VerifyOutcome::AttemptsExhausted;
    }

    if now >= expires_at {
        return VerifyOutcome::Expired;
    }

    if hash_code(submitted) == stored_hash {
        VerifyOutcome::Valid
    } else {
        VerifyOutcome::WrongCode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_shape() {
        for _ in 0..50 {
            let code = generate();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_hash_code_is_hex_sha256() {
        let hash = hash_code("123456");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        // Digest is deterministic
        assert_eq!(hash, hash_code("123456"));
        assert_ne!(hash, hash_code("123457"));
    }

    #[test]
    fn test_verify_valid_and_wrong() {
        let now = Utc::now();
        let hash = hash_code("123456");
        let expires = expiry_from(now);

        assert_eq!(verify("123456", &hash, expires, 0, now), VerifyOutcome::Valid);
        assert_eq!(
            verify("000000", &hash, expires, 0, now),
            VerifyOutcome::WrongCode
        );
    }

    #[test]
    fn test_verify_expired() {
        let now = Utc::now();
        let hash = hash_code("123456");
        let expires = now - Duration::seconds(1);

        assert_eq!(
            verify("123456", &hash, expires, 0, now),
            VerifyOutcome::Expired
        );
    }

    #[test]
    fn test_verify_attempts_exhausted_even_with_correct_code() {
        let now = Utc::now();
        let hash = hash_code("123456");
        let expires = expiry_from(now);

        assert_eq!(
            verify("123456", &hash, expires, MAX_ATTEMPTS, now),
            VerifyOutcome::AttemptsExhausted
        );
    }

    #[test]
    fn test_can_resend_throttle() {
        let now = Utc::now();

        assert!(can_resend(None, now));
        assert!(!can_resend(Some(now - Duration::seconds(30)), now));
        assert!(can_resend(Some(now - Duration::seconds(60)), now));
        assert!(can_resend(Some(now - Duration::minutes(5)), now));
    }
}
