//! Captured request snapshots and the body variants they carry.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Header name to every value received for it, in arrival order.
pub type HeaderMultimap = BTreeMap<String, Vec<String>>;

/// Body of a captured request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Body sent with a JSON content type and decoded as JSON.
    Json(Value),
    /// Any other non-empty body, kept as text.
    Text(String),
    /// No body bytes were sent.
    Absent,
}

impl RequestBody {
    /// Decode raw body bytes according to the request's content type.
    ///
    /// Only `application/json` is parsed; everything else is stored as
    /// (lossily decoded) text.
    pub fn decode(content_type: Option<&str>, bytes: &[u8]) -> Result<Self, serde_json::Error> {
        if bytes.is_empty() {
            return Ok(Self::Absent);
        }

        if content_type.map(is_json_media_type).unwrap_or(false) {
            let value = serde_json::from_slice(bytes)?;
            return Ok(Self::Json(value));
        }

        Ok(Self::Text(String::from_utf8_lossy(bytes).into_owned()))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

// JSON as-is, text as a string, absent as null.
impl Serialize for RequestBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Json(value) => value.serialize(serializer),
            Self::Text(text) => serializer.serialize_str(text),
            Self::Absent => serializer.serialize_none(),
        }
    }
}

fn is_json_media_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// An inbound request as decoded by the HTTP layer, not yet stamped.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingRequest {
    pub method: String,
    pub url: String,
    pub headers: HeaderMultimap,
    pub body: RequestBody,
}

impl IncomingRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HeaderMultimap::new(),
            body: RequestBody::Absent,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    /// Freeze this request into a snapshot captured at `at`.
    pub fn stamp(self, at: DateTime<Utc>) -> CapturedRequest {
        CapturedRequest {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
            captured_at: at,
        }
    }
}

/// Immutable snapshot of one captured request.
///
/// Serializes with the field names clients of the service already consume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapturedRequest {
    #[serde(rename = "Method")]
    method: String,
    #[serde(rename = "Url")]
    url: String,
    #[serde(rename = "Header")]
    headers: HeaderMultimap,
    #[serde(rename = "Body")]
    body: RequestBody,
    #[serde(rename = "Time", with = "chrono::serde::ts_seconds")]
    captured_at: DateTime<Utc>,
}

impl CapturedRequest {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMultimap {
        &self.headers
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_decode_json_body() {
        let body = RequestBody::decode(Some("application/json"), br#"{"a":1}"#).unwrap();
        assert_eq!(body, RequestBody::Json(json!({"a": 1})));

        let body =
            RequestBody::decode(Some("Application/JSON; charset=utf-8"), b"[1,2]").unwrap();
        assert_eq!(body, RequestBody::Json(json!([1, 2])));
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        assert!(RequestBody::decode(Some("application/json"), b"{not json").is_err());
    }

    #[test]
    fn test_decode_text_and_absent() {
        let body = RequestBody::decode(Some("text/plain"), b"hello").unwrap();
        assert_eq!(body, RequestBody::Text("hello".to_string()));

        // JSON-looking bytes without a JSON content type stay text
        let body = RequestBody::decode(None, br#"{"a":1}"#).unwrap();
        assert_eq!(body, RequestBody::Text(r#"{"a":1}"#.to_string()));

        let body = RequestBody::decode(Some("application/json"), b"").unwrap();
        assert!(body.is_absent());
    }

    #[test]
    fn test_captured_request_wire_shape() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let captured = IncomingRequest::new("POST", "/PostRequest?token=t1")
            .with_header("accept", "a")
            .with_header("accept", "b")
            .with_body(json!({"k": "v"}))
            .stamp(at);

        let value = serde_json::to_value(&captured).unwrap();
        assert_eq!(
            value,
            json!({
                "Method": "POST",
                "Url": "/PostRequest?token=t1",
                "Header": {"accept": ["a", "b"]},
                "Body": {"k": "v"},
                "Time": at.timestamp(),
            })
        );
    }

    #[test]
    fn test_body_serialization_variants() {
        assert_eq!(serde_json::to_value(RequestBody::from("x")).unwrap(), json!("x"));
        assert_eq!(serde_json::to_value(RequestBody::Absent).unwrap(), Value::Null);
    }
}
