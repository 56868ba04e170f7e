//! RFC 6238 time-based one-time codes
//!
//! HMAC-SHA1 over the big-endian time counter with RFC 4226 dynamic
//! truncation. Secrets are the base32 strings authenticator apps hand out:
//! upper or lower case, optional whitespace and `=` padding.

use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use zeroize::Zeroize;

use crate::error::{TotpError, TotpResult};

/// Default time step in seconds
pub const DEFAULT_STEP_SECS: u64 = 30;

/// Default code width
pub const DEFAULT_DIGITS: u32 = 6;

/// Compute the TOTP code for a base32 secret at the given Unix time.
pub fn totp(secret_base32: &str, time_millis: u64, step_secs: u64, digits: u32) -> TotpResult<String> {
    if digits == 0 || digits > 9 {
        return Err(TotpError::UnsupportedDigits);
    }
    if step_secs == 0 {
        return Err(TotpError::InvalidPeriod);
    }

    let mut key = decode_secret(secret_base32)?;
    let counter = (time_millis / 1_000) / step_secs;

    let mut mac = Hmac::<Sha1>::new_from_slice(&key)
        .map_err(|_| TotpError::InvalidSecret)?;
    key.zeroize();
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // Dynamic truncation: 4-byte window at the offset named by the low
    // nibble of the last byte, top bit masked off.
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);

    let code = binary % 10u32.pow(digits);
    Ok(format!("{:0width$}", code, width = digits as usize))
}

/// Compute a code with the standard 30-second step and 6 digits.
pub fn totp_now(secret_base32: &str, time_millis: u64) -> TotpResult<String> {
    totp(secret_base32, time_millis, DEFAULT_STEP_SECS, DEFAULT_DIGITS)
}

/// Seconds until the current code rolls over. A zero step has no
/// rollover and yields 0.
pub fn seconds_remaining(time_millis: u64, step_secs: u64) -> u64 {
    if step_secs == 0 {
        return 0;
    }
    step_secs - (time_millis / 1_000) % step_secs
}

fn decode_secret(secret: &str) -> TotpResult<Vec<u8>> {
    let normalized: String = secret
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && *c != '=')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if normalized.is_empty() {
        return Err(TotpError::InvalidSecret);
    }

    BASE32_NOPAD
        .decode(normalized.as_bytes())
        .map_err(|_| TotpError::InvalidSecret)
}

#[cfg(test)]
mod tests {
    use super::*;

    // The RFC 6238 Appendix B secret: ASCII "12345678901234567890"
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn rfc6238_eight_digit_vectors() {
        let cases = [
            (59_u64, "94287082"),
            (1_111_111_109, "07081804"),
            (1_111_111_111, "14050471"),
            (1_234_567_890, "89005924"),
            (2_000_000_000, "69279037"),
            (20_000_000_000, "65353130"),
        ];
        for (secs, expected) in cases {
            assert_eq!(totp(RFC_SECRET, secs * 1_000, 30, 8).unwrap(), expected);
        }
    }

    #[test]
    fn six_digit_codes_are_the_truncated_tail() {
        assert_eq!(totp(RFC_SECRET, 59_000, 30, 6).unwrap(), "287082");
        assert_eq!(totp(RFC_SECRET, 1_234_567_890_000, 30, 6).unwrap(), "005924");
    }

    #[test]
    fn common_authenticator_secret() {
        // Base32 "JBSWY3DPEHPK3PXP"; codes cross-checked against a
        // reference HMAC-SHA1 implementation.
        let secret = "JBSWY3DPEHPK3PXP";
        assert_eq!(totp_now(secret, 59_000).unwrap(), "996554");
        assert_eq!(totp_now(secret, 1_111_111_109_000).unwrap(), "071271");
        assert_eq!(totp_now(secret, 1_234_567_890_000).unwrap(), "742275");
    }

    #[test]
    fn secret_normalization() {
        let canonical = totp_now("JBSWY3DPEHPK3PXP", 59_000).unwrap();
        assert_eq!(totp_now("jbswy3dpehpk3pxp", 59_000).unwrap(), canonical);
        assert_eq!(totp_now("JBSW Y3DP EHPK 3PXP", 59_000).unwrap(), canonical);
        assert_eq!(totp_now("JBSWY3DPEHPK3PXP===", 59_000).unwrap(), canonical);
    }

    #[test]
    fn malformed_secret_is_rejected() {
        assert_eq!(totp_now("not!base32", 0), Err(TotpError::InvalidSecret));
        assert_eq!(totp_now("", 0), Err(TotpError::InvalidSecret));
        assert_eq!(totp_now("   ", 0), Err(TotpError::InvalidSecret));
    }

    #[test]
    fn parameter_validation() {
        assert_eq!(
            totp(RFC_SECRET, 0, 0, 6),
            Err(TotpError::InvalidPeriod)
        );
        assert_eq!(
            totp(RFC_SECRET, 0, 30, 0),
            Err(TotpError::UnsupportedDigits)
        );
        assert_eq!(
            totp(RFC_SECRET, 0, 30, 10),
            Err(TotpError::UnsupportedDigits)
        );
    }

    #[test]
    fn codes_are_stable_within_a_step() {
        let a = totp_now(RFC_SECRET, 30_000).unwrap();
        let b = totp_now(RFC_SECRET, 59_999).unwrap();
        let c = totp_now(RFC_SECRET, 60_000).unwrap();
        assert_eq!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn remaining_seconds() {
        assert_eq!(seconds_remaining(0, 30), 30);
        assert_eq!(seconds_remaining(29_000, 30), 1);
        assert_eq!(seconds_remaining(30_000, 30), 30);
        assert_eq!(seconds_remaining(29_000, 0), 0);
    }
}
