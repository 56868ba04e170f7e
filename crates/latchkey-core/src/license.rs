//! Offline, signature-verified license tokens
//!
//! Token format: `L1.<payload base64url>.<signature base64url>`, no
//! padding. The signature is Ed25519 over the raw payload bytes and is
//! checked against an embedded public key before any payload field is
//! looked at, so unverified attacker-controlled content is never parsed
//! for business rules.
//!
//! The payload is a restricted flat object grammar: `{"key": "value",
//! "key2": null, ...}` with no nesting, arrays, numbers, or escape
//! sequences. Fields the grammar cannot express simply come out missing,
//! which the business rules then judge.

use std::collections::BTreeMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{NaiveDate, Utc};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::error::LicenseError;

/// Expected token version prefix
const TOKEN_PREFIX: &str = "L1.";

/// Embedded Ed25519 verifying key (raw 32 bytes)
const EMBEDDED_PUBLIC_KEY: [u8; 32] = [
    0x59, 0x96, 0x4d, 0xf6, 0xc6, 0xaa, 0x5e, 0xf3, 0xf3, 0x18, 0x87, 0x35,
    0x82, 0xdc, 0xc1, 0x58, 0x31, 0xa3, 0x0a, 0x3a, 0x78, 0x49, 0x1f, 0x3d,
    0x57, 0xd3, 0x16, 0x15, 0xfa, 0xa4, 0xd4, 0x4e,
];

/// Parsed payload: field name to string value, `None` for JSON `null`.
pub type LicensePayload = BTreeMap<String, Option<String>>;

/// Outcome of verifying one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseCheck {
    pub valid: bool,
    /// "OK" on success, otherwise the failing rule's message
    pub reason: String,
    /// Parsed payload; `None` when verification failed before parsing
    pub payload: Option<LicensePayload>,
}

impl LicenseCheck {
    fn ok(payload: LicensePayload) -> Self {
        Self {
            valid: true,
            reason: "OK".to_string(),
            payload: Some(payload),
        }
    }

    fn fail(error: LicenseError, payload: Option<LicensePayload>) -> Self {
        Self {
            valid: false,
            reason: error.to_string(),
            payload,
        }
    }

    /// The `plan` field of a successfully verified token.
    pub fn plan(&self) -> Option<&str> {
        self.payload
            .as_ref()
            .and_then(|p| p.get("plan"))
            .and_then(|v| v.as_deref())
    }
}

/// Verify a token against the embedded public key, as of today.
pub fn verify_license(token: &str, device_fingerprint: Option<&str>) -> LicenseCheck {
    let key = match VerifyingKey::from_bytes(&EMBEDDED_PUBLIC_KEY) {
        Ok(key) => key,
        Err(_) => return LicenseCheck::fail(LicenseError::SignatureInvalid, None),
    };
    verify_license_with_key(token, device_fingerprint, &key, Utc::now().date_naive())
}

/// Verify against an explicit key and reference date. The production path
/// is [`verify_license`]; this entry point exists for issuance tooling and
/// tests.
pub fn verify_license_with_key(
    token: &str,
    device_fingerprint: Option<&str>,
    key: &VerifyingKey,
    today: NaiveDate,
) -> LicenseCheck {
    if !token.starts_with(TOKEN_PREFIX) {
        return LicenseCheck::fail(LicenseError::MalformedToken, None);
    }
    let mut segments = token.splitn(3, '.');
    let (_, payload_b64, sig_b64) = match (segments.next(), segments.next(), segments.next()) {
        (Some(prefix), Some(payload), Some(sig)) if prefix == "L1" && !payload.is_empty() => {
            (prefix, payload, sig)
        }
        _ => return LicenseCheck::fail(LicenseError::MalformedToken, None),
    };

    let payload_bytes = match URL_SAFE_NO_PAD.decode(payload_b64) {
        Ok(bytes) => bytes,
        Err(_) => return LicenseCheck::fail(LicenseError::MalformedToken, None),
    };
    let sig_bytes = match URL_SAFE_NO_PAD.decode(sig_b64) {
        Ok(bytes) => bytes,
        Err(_) => return LicenseCheck::fail(LicenseError::MalformedToken, None),
    };

    // Signature first, over the raw payload bytes. Failure short-circuits
    // with no payload parsing.
    let signature = match Signature::from_slice(&sig_bytes) {
        Ok(sig) => sig,
        Err(_) => return LicenseCheck::fail(LicenseError::SignatureInvalid, None),
    };
    if key.verify(&payload_bytes, &signature).is_err() {
        return LicenseCheck::fail(LicenseError::SignatureInvalid, None);
    }

    let payload = parse_flat_object(&String::from_utf8_lossy(&payload_bytes));

    // Business rules, in order, first failure wins.
    let plan = payload.get("plan").and_then(|v| v.as_deref());
    if plan.map_or(true, str::is_empty) {
        return LicenseCheck::fail(LicenseError::MissingPlan, Some(payload));
    }

    if let Some(exp) = payload.get("exp").and_then(|v| v.as_deref()) {
        if !exp.is_empty() {
            // Unparseable dates are ignored, matching the historical
            // verifier; same-day expiry is still valid.
            if let Ok(date) = NaiveDate::parse_from_str(exp, "%Y-%m-%d") {
                if date < today {
                    return LicenseCheck::fail(LicenseError::Expired, Some(payload));
                }
            }
        }
    }

    if let (Some(bound), Some(fingerprint)) = (
        payload.get("machine").and_then(|v| v.as_deref()),
        device_fingerprint,
    ) {
        if bound != fingerprint {
            return LicenseCheck::fail(LicenseError::DeviceMismatch, Some(payload));
        }
    }

    LicenseCheck::ok(payload)
}

/// A stable, locally computed identifier for this machine: SHA-256 of
/// OS, architecture, and user name, base64url of the first 16 bytes.
pub fn device_fingerprint() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let seed = format!(
        "{}|{}|{}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        user
    );
    let digest = Sha256::digest(seed.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..16])
}

/// Parse the restricted flat object grammar. Anything outside the grammar
/// yields an (incomplete) mapping rather than an error; missing fields are
/// the business rules' concern.
fn parse_flat_object(text: &str) -> LicensePayload {
    let mut map = LicensePayload::new();

    let trimmed = text.trim();
    let Some(inner) = trimmed
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
    else {
        return map;
    };
    let inner = inner.trim();
    if inner.is_empty() {
        return map;
    }

    for pair in inner.split(',') {
        let Some((raw_key, raw_value)) = pair.split_once(':') else {
            continue;
        };
        let key = unquote(raw_key);
        if key.is_empty() {
            continue;
        }
        let value = raw_value.trim();
        if value == "null" {
            map.insert(key, None);
        } else {
            map.insert(key, Some(unquote(raw_value)));
        }
    }

    map
}

fn unquote(token: &str) -> String {
    let t = token.trim();
    if t.len() >= 2 && t.starts_with('"') && t.ends_with('"') {
        t[1..t.len() - 1].to_string()
    } else {
        t.to_string()
    }
}
