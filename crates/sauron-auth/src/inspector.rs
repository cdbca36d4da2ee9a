//! Bearer token inspection.
//!
//! Reads the payload segment of a `header.payload.signature` token to find its
//! expiry. The signature is never verified; this is only used to decide when
//! to refresh. Anything malformed reads as "expiring".

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Default refresh horizon: five minutes.
pub const DEFAULT_EXPIRY_HORIZON: Duration = Duration::from_secs(5 * 60);

/// Decoded token payload. A payload without `exp` does not decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Expiry, whole seconds since the Unix epoch.
    #[serde(deserialize_with = "numeric_date")]
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// JWT NumericDate: any JSON number of seconds, fractions rounded down.
fn numeric_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    if !secs.is_finite() {
        return Err(D::Error::custom("exp is not a finite number"));
    }
    Ok(secs.floor() as i64)
}

/// Decode the payload of a three-segment token. `None` on any malformed input.
pub fn decode(token: &str) -> Option<Claims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return None;
    }

    let payload = segments[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Expiry time of `token`, if it carries one.
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    decode(token)?.expires_at()
}

/// True if `token` expires within `horizon` of now, already expired, or
/// cannot be decoded.
pub fn is_expiring_soon(token: &str, horizon: Duration) -> bool {
    is_expiring_soon_at(token, horizon, Utc::now().timestamp_millis())
}

/// [`is_expiring_soon`] against an explicit clock, in epoch milliseconds.
pub fn is_expiring_soon_at(token: &str, horizon: Duration, now_ms: i64) -> bool {
    let Some(exp) = decode(token).map(|claims| claims.exp) else {
        return true;
    };

    let horizon_ms = i64::try_from(horizon.as_millis()).unwrap_or(i64::MAX);
    exp.saturating_mul(1000).saturating_sub(now_ms) < horizon_ms
}
