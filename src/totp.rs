//! RFC 6238 time-based one-time passwords (HMAC-SHA1, 6 digits, 30s
//! steps), used to gate approval decisions and stepped-up login.
//!
//! Verification accepts the current time step plus one step either side
//! to tolerate client clock skew; nothing wider.

use anyhow::Result;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Code length in digits.
pub const DIGITS: u32 = 6;

/// Time step size in seconds.
pub const STEP_SECONDS: i64 = 30;

/// Accepted skew in steps on either side of "now".
pub const SKEW_STEPS: i64 = 1;

/// Raw secret length in bytes (160 bits, the RFC 4226 recommendation).
pub const SECRET_LEN: usize = 20;

/// Generate a fresh random TOTP secret.
#[must_use]
pub fn generate_secret() -> Vec<u8> {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; SECRET_LEN] = rng.random();
    bytes.to_vec()
}

/// Build the otpauth:// URI an authenticator app enrolls from.
#[must_use]
pub fn provisioning_uri(secret: &[u8], issuer: &str, account: &str) -> String {
    let encoded = base32::encode(base32::Alphabet::Rfc4648 { padding: false }, secret);
    format!(
        "otpauth://totp/{issuer}:{account}?secret={encoded}&issuer={issuer}&algorithm=SHA1&digits={DIGITS}&period={STEP_SECONDS}"
    )
}

fn hotp(secret: &[u8], counter: u64) -> Result<u32> {
    let mut mac = HmacSha1::new_from_slice(secret)
        .map_err(|e| anyhow::anyhow!("invalid hmac key: {e}"))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // Dynamic truncation per RFC 4226 §5.3.
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = (u32::from(digest[offset]) & 0x7f) << 24
        | u32::from(digest[offset + 1]) << 16
        | u32::from(digest[offset + 2]) << 8
        | u32::from(digest[offset + 3]);

    Ok(binary % 10_u32.pow(DIGITS))
}

/// The code valid at a given instant, zero-padded to six digits.
pub fn code_at(secret: &[u8], at: DateTime<Utc>) -> Result<String> {
    let step = at.timestamp().div_euclid(STEP_SECONDS);
    let counter = u64::try_from(step)
        .map_err(|_| anyhow::anyhow!("timestamp predates the epoch"))?;
    let code = hotp(secret, counter)?;
    Ok(format!("{code:0width$}", width = DIGITS as usize))
}

/// Verify a code at a given instant, allowing `SKEW_STEPS` of drift.
pub fn verify_at(secret: &[u8], code: &str, at: DateTime<Utc>) -> Result<bool> {
    let code = code.trim();
    if code.len() != DIGITS as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(false);
    }

    let step = at.timestamp().div_euclid(STEP_SECONDS);
    for delta in -SKEW_STEPS..=SKEW_STEPS {
        let candidate_step = step + delta;
        let Ok(counter) = u64::try_from(candidate_step) else {
            continue;
        };
        let expected = hotp(secret, counter)?;
        if format!("{expected:0width$}", width = DIGITS as usize) == code {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Verify a code against the wall clock.
pub fn verify(secret: &[u8], code: &str) -> Result<bool> {
    verify_at(secret, code, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 6238 Appendix B SHA-1 vectors, truncated from eight digits to
    // our six.
    const RFC_SECRET: &[u8] = b"12345678901234567890";

    fn at(unix: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(unix, 0).unwrap()
    }

    #[test]
    fn rfc6238_vectors() {
        let cases = [
            (59, "287082"),
            (1_111_111_109, "081804"),
            (1_111_111_111, "050471"),
            (1_234_567_890, "005924"),
            (2_000_000_000, "279037"),
            (20_000_000_000, "353130"),
        ];

        for (unix, expected) in cases {
            assert_eq!(code_at(RFC_SECRET, at(unix)).unwrap(), expected);
        }
    }

    #[test]
    fn verify_accepts_adjacent_steps_only() {
        let secret = generate_secret();
        let now = at(1_700_000_000);
        let code = code_at(&secret, now).unwrap();

        assert!(verify_at(&secret, &code, now).unwrap());
        assert!(verify_at(&secret, &code, at(1_700_000_000 + 30)).unwrap());
        assert!(verify_at(&secret, &code, at(1_700_000_000 - 30)).unwrap());
        assert!(!verify_at(&secret, &code, at(1_700_000_000 + 90)).unwrap());
    }

    #[test]
    fn verify_rejects_malformed_codes() {
        let secret = generate_secret();
        let now = Utc::now();

        assert!(!verify_at(&secret, "12345", now).unwrap());
        assert!(!verify_at(&secret, "1234567", now).unwrap());
        assert!(!verify_at(&secret, "12a456", now).unwrap());
        assert!(!verify_at(&secret, "", now).unwrap());
    }

    #[test]
    fn provisioning_uri_shape() {
        let uri = provisioning_uri(RFC_SECRET, "Keywarden", "alice");
        assert!(uri.starts_with("otpauth://totp/Keywarden:alice?secret="));
        assert!(uri.contains("algorithm=SHA1"));
        assert!(uri.contains("digits=6"));
        assert!(uri.contains("period=30"));
        // RFC 4648 base32 of the RFC test secret.
        assert!(uri.contains("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ"));
    }

    #[test]
    fn secrets_are_unique_and_sized() {
        let a = generate_secret();
        let b = generate_secret();
        assert_eq!(a.len(), SECRET_LEN);
        assert_ne!(a, b);
    }
}
