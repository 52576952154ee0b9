// Raw REST responses
//
// The provisioning flow decides what to do from the status code, the
// `Location` header and the JSON body, so responses are handed back
// whole rather than mapped into errors.

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, LOCATION};
use serde_json::Value;

use crate::error::Error;

/// A completed HTTP exchange: status, headers and the decoded body.
///
/// Bodies that are empty or not valid JSON decode to `Value::Null`
/// (empty) or `Value::String` (anything else) so callers never have to
/// distinguish "no JSON" from "JSON they didn't expect".
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Convenience constructor used by test doubles and internal callers.
    pub fn with_status(status: u16, body: Value) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            headers: HeaderMap::new(),
            body,
        }
    }

    /// Attach a `Location` header. Values that are not valid header text
    /// are dropped.
    pub fn with_location(mut self, location: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(location) {
            self.headers.insert(LOCATION, value);
        }
        self
    }

    /// Decode a raw response body.
    pub(crate) fn decode_body(text: &str) -> Value {
        if text.trim().is_empty() {
            return Value::Null;
        }
        serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_owned()))
    }

    /// The numeric id of a singleton lookup result.
    ///
    /// A lookup matches only when the status is `200` and the body is an
    /// array of exactly one element carrying an `id`. Empty and
    /// multi-element arrays are "not found", never errors.
    pub fn single_match_id(&self) -> Option<u64> {
        if self.status != StatusCode::OK {
            return None;
        }
        match self.body.as_array() {
            Some(items) if items.len() == 1 => items.first().and_then(|item| value_as_id(&item["id"])),
            _ => None,
        }
    }

    /// Extract the new entity id from the `Location` header.
    ///
    /// The id is the last non-empty path segment, parsed as an integer:
    /// `/rules/17` and `http://host/v1/rules/17/` both yield `17`.
    pub fn location_id(&self) -> Result<u64, Error> {
        let value = self
            .headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        value
            .as_deref()
            .and_then(|location| location.split('/').rev().find(|s| !s.is_empty()))
            .and_then(|segment| segment.parse().ok())
            .ok_or(Error::InvalidLocation { value })
    }

    /// The `message` field of an error body, if present.
    pub fn error_message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }
}

/// Ids come back as JSON numbers, but tolerate numeric strings.
fn value_as_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
