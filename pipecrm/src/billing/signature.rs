//! Stripe webhook signature verification.
//!
//! Stripe signs each delivery with the endpoint's signing secret:
//! - The `stripe-signature` header looks like `t=1704067200,v1=<hex>[,v1=<hex>...][,v0=<hex>]`
//! - Each `v1` value is the hex-encoded HMAC-SHA256 of `{t}.{raw body}`
//! - Several `v1` entries appear while a secret is being rolled; any one may match
//!
//! Only `v1` is honoured. The timestamp must lie within a tolerance of the current time.

use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Name of the header Stripe puts the signature in.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature header is malformed")]
    MalformedHeader,
    #[error("signature header has no v1 signature")]
    NoSignature,
    #[error("timestamp is outside the tolerance window")]
    StaleTimestamp,
    #[error("no signature matches the payload")]
    Mismatch,
}

struct SignatureHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> Result<SignatureHeader<'_>, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for item in header.split(',') {
        let Some((key, value)) = item.trim().split_once('=') else {
            return Err(SignatureError::MalformedHeader);
        };
        match key {
            "t" => timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::MalformedHeader)?),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(SignatureError::NoSignature);
    }

    Ok(SignatureHeader { timestamp, signatures })
}

/// Compute the hex `v1` signature for a payload.
pub fn compute_signature(timestamp: i64, payload: &[u8], secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Build a complete `stripe-signature` header value.
pub fn sign_payload(timestamp: i64, payload: &[u8], secret: &str) -> Option<String> {
    let signature = compute_signature(timestamp, payload, secret)?;
    Some(format!("t={timestamp},v1={signature}"))
}

/// Verify `header` against the raw request body, with `now` as unix seconds.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str, tolerance: Duration, now: i64) -> Result<(), SignatureError> {
    let parsed = parse_header(header)?;

    let age = now.saturating_sub(parsed.timestamp).unsigned_abs();
    if age > tolerance.as_secs() {
        return Err(SignatureError::StaleTimestamp);
    }

    let expected = compute_signature(parsed.timestamp, payload, secret).ok_or(SignatureError::Mismatch)?;
    if parsed
        .signatures
        .iter()
        .any(|candidate| constant_time_eq(candidate.as_bytes(), expected.as_bytes()))
    {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
