//! Unverified JWT payload decoding.
//!
//! The client only needs to estimate when its token stops being useful, so the
//! signature is never checked. Anything that does not decode cleanly is
//! reported as "no claims" and the caller treats it as an invalid session.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize};

/// The subset of JWT claims the client reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Expiry, seconds since the Unix epoch. A fractional NumericDate is
    /// rounded up, so `exp <= now` stays exact against a whole-second clock.
    #[serde(deserialize_with = "numeric_date")]
    pub exp: i64,
    #[serde(default)]
    pub username: String,
}

impl Claims {
    pub fn is_expired_at(&self, unix_now: i64) -> bool {
        self.exp <= unix_now
    }
}

fn numeric_date<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    if !secs.is_finite() || secs.abs() > i64::MAX as f64 {
        return Err(serde::de::Error::custom("exp out of range"));
    }
    Ok(secs.ceil() as i64)
}

/// Decode the payload segment of `token` without verifying it.
pub fn decode_claims(token: &str) -> Option<Claims> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .ok()?;

    serde_json::from_slice(&bytes).ok()
}
