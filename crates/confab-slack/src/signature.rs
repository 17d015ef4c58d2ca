//! Events API request signing (v0 scheme).
//!
//! Slack signs each delivery with HMAC-SHA256 over `v0:{timestamp}:{body}`
//! and sends the hex digest as `v0=<hex>` in `x-slack-signature`. The
//! timestamp rides in `x-slack-request-timestamp` and doubles as a replay
//! guard.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Scheme version; also the prefix of the signature header value.
pub const SIGNATURE_VERSION: &str = "v0";
/// Maximum distance between the request timestamp and our clock.
pub const MAX_TIMESTAMP_SKEW_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("request timestamp is not a number")]
    InvalidTimestamp,

    #[error("request timestamp outside the freshness window")]
    StaleTimestamp,

    #[error("malformed signature header")]
    MalformedSignature,

    #[error("invalid signing key")]
    InvalidKey,

    #[error("signature mismatch")]
    Mismatch,
}

/// Compute the `v0=<hex>` signature for a request body at `timestamp`.
pub fn sign(signing_secret: &str, timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .map_err(|_| SignatureError::InvalidKey)?;
    mac.update(format!("{SIGNATURE_VERSION}:{timestamp}:").as_bytes());
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    Ok(format!("{SIGNATURE_VERSION}={}", hex::encode(digest)))
}

/// Verify a delivery against the signing secret.
///
/// `now_unix` is the verifier's clock; deliveries whose timestamp sits more
/// than [`MAX_TIMESTAMP_SKEW_SECS`] away from it are rejected before any
/// MAC work. The digest comparison itself is constant-time.
pub fn verify(
    signing_secret: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
    now_unix: i64,
) -> Result<(), SignatureError> {
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp)?;
    if (now_unix - ts).abs() > MAX_TIMESTAMP_SKEW_SECS {
        return Err(SignatureError::StaleTimestamp);
    }

    let sig_hex = signature
        .strip_prefix("v0=")
        .ok_or(SignatureError::MalformedSignature)?;
    let expected = hex::decode(sig_hex).map_err(|_| SignatureError::MalformedSignature)?;

    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .map_err(|_| SignatureError::InvalidKey)?;
    mac.update(format!("{SIGNATURE_VERSION}:{timestamp}:").as_bytes());
    mac.update(body);

    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}
