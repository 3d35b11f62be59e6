use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The token triple issued by a login or refresh exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    #[serde(alias = "access_token")]
    pub access_token: String,
    #[serde(alias = "id_token")]
    pub id_token: String,
    #[serde(alias = "refresh_token")]
    pub refresh_token: String,
}

impl AuthTokens {
    pub fn new(
        access_token: impl Into<String>,
        id_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            id_token: id_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

/// Whether `token` is a structurally valid JWT whose `exp` lies in the
/// future. The signature is not checked.
pub fn is_valid_token(token: &str) -> bool {
    expiry_seconds(token).is_some_and(|exp| exp > Utc::now().timestamp())
}

/// Expiry of a structurally valid JWT, whether or not it has passed.
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    expiry_seconds(token).and_then(|exp| DateTime::from_timestamp(exp, 0))
}

fn expiry_seconds(token: &str) -> Option<i64> {
    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    decode_segment(header)?;
    decode_segment(signature)?;
    let payload: Value = serde_json::from_slice(&decode_segment(payload)?).ok()?;

    let exp = payload.as_object()?.get("exp")?;
    exp.as_i64()
        .or_else(|| exp.as_f64().map(|secs| secs.floor() as i64))
}

fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    if segment.is_empty() {
        return None;
    }
    URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')).ok()
}

/// Unsigned JWT with the given `exp`, for tests.
#[cfg(test)]
pub(crate) fn test_jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"user","exp":{exp}}}"#));
    let signature = URL_SAFE_NO_PAD.encode(b"signature");
    format!("{header}.{payload}.{signature}")
}
