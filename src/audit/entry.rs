//! Audit entry model and normalization
//!
//! Converts an inbound submission into a persistable entry: decodes
//! base64-flagged query text and canonicalizes arbitrary body payloads to
//! plain text. Normalization never fails a submission; every decode or
//! serialization error has a fallback.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// One inbound audit submission as received from the transport layer.
///
/// No field is validated for content; absent fields persist as their empty
/// forms (empty strings, response 0, no body).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditRequest {
    #[serde(default)]
    pub user_id: String,

    #[serde(default)]
    pub action: String,

    #[serde(default)]
    pub response: i32,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub parameters: String,

    #[serde(default)]
    pub query: String,

    /// Whether `query` arrived base64-encoded
    #[serde(default)]
    pub query_base64: bool,

    #[serde(default)]
    pub body: Body,

    #[serde(default)]
    pub additional_info: String,
}

/// Body payload as it arrives at the boundary.
///
/// Resolved to plain text by [`Body::canonicalize`] before it ever reaches
/// the file layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(untagged)]
pub enum Body {
    /// No body was submitted
    #[default]
    Absent,
    /// Body is already plain text
    Text(String),
    /// Any other JSON value
    Structured(Value),
}

impl Body {
    /// Resolve the body to the text form that gets persisted.
    ///
    /// Text passes through verbatim with no re-encoding; structured values
    /// are serialized to JSON, falling back to their display rendering if
    /// serialization fails.
    pub fn canonicalize(self) -> String {
        match self {
            Body::Absent => String::new(),
            Body::Text(text) => text,
            Body::Structured(value) => match serde_json::to_string(&value) {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to serialize body, using display form: {}", e);
                    value.to_string()
                }
            },
        }
    }
}

/// Decode base64-flagged query text.
///
/// Returns the input unchanged when the flag is unset. A decode failure
/// (including non-UTF-8 decoded bytes) keeps the original text and is never
/// surfaced as a submission failure.
pub fn decode_query(query: String, is_base64: bool) -> String {
    if !is_base64 {
        return query;
    }

    match BASE64.decode(query.as_bytes()) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Base64 query decoded to invalid UTF-8, keeping original: {}", e);
                query
            }
        },
        Err(e) => {
            warn!("Failed to decode base64 query, keeping original: {}", e);
            query
        }
    }
}

/// One normalized, persistable audit record.
///
/// Immutable once constructed; exists only as a serialized line after
/// submission.
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    pub timestamp: String,
    pub user_id: String,
    pub action: String,
    pub response: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub parameters: String,
    pub query: String,
    pub body: String,
    pub additional_info: String,
}

impl Entry {
    /// Normalize a submission into a persistable entry.
    pub fn from_request(request: AuditRequest, timestamp: String) -> Self {
        Self {
            timestamp,
            user_id: request.user_id,
            action: request.action,
            response: request.response,
            error: request.error,
            parameters: request.parameters,
            query: decode_query(request.query, request.query_base64),
            body: request.body.canonicalize(),
            additional_info: request.additional_info,
        }
    }

    /// Serialize to the newline-terminated record that lands on disk.
    ///
    /// The whole line is buffered here so the file layer can emit it in a
    /// single write.
    pub fn to_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_query_passthrough_when_not_flagged() {
        let query = decode_query("aGVsbG8=".to_string(), false);
        assert_eq!(query, "aGVsbG8=");
    }

    #[test]
    fn test_decode_query_valid_base64() {
        let query = decode_query("aGVsbG8gd29ybGQ=".to_string(), true);
        assert_eq!(query, "hello world");
    }

    #[test]
    fn test_decode_query_invalid_base64_keeps_original() {
        let query = decode_query("!!!not base64!!!".to_string(), true);
        assert_eq!(query, "!!!not base64!!!");
    }

    #[test]
    fn test_decode_query_non_utf8_keeps_original() {
        // Valid base64, but decodes to bytes that are not UTF-8
        let encoded = BASE64.encode([0xff, 0xfe, 0x00, 0x01]);
        let query = decode_query(encoded.clone(), true);
        assert_eq!(query, encoded);
    }

    #[test]
    fn test_canonicalize_absent_body() {
        assert_eq!(Body::Absent.canonicalize(), "");
    }

    #[test]
    fn test_canonicalize_text_body_verbatim() {
        // Already-textual bodies are not re-encoded or escaped
        let body = Body::Text(r#"{"raw": "kept as-is"}"#.to_string());
        assert_eq!(body.canonicalize(), r#"{"raw": "kept as-is"}"#);
    }

    #[test]
    fn test_canonicalize_structured_body() {
        let body = Body::Structured(json!({"key": "value", "count": 3}));
        let text = body.canonicalize();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["key"], "value");
        assert_eq!(parsed["count"], 3);
    }

    #[test]
    fn test_body_deserializes_from_wire_forms() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(default)]
            body: Body,
        }

        let missing: Wrapper = serde_json::from_str("{}").unwrap();
        assert!(matches!(missing.body, Body::Absent));

        let null: Wrapper = serde_json::from_str(r#"{"body": null}"#).unwrap();
        assert!(matches!(null.body, Body::Absent));

        let text: Wrapper = serde_json::from_str(r#"{"body": "plain"}"#).unwrap();
        assert!(matches!(text.body, Body::Text(ref s) if s == "plain"));

        let object: Wrapper = serde_json::from_str(r#"{"body": {"a": 1}}"#).unwrap();
        assert!(matches!(object.body, Body::Structured(_)));
    }

    #[test]
    fn test_request_accepts_missing_fields() {
        let request: AuditRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.user_id, "");
        assert_eq!(request.action, "");
        assert_eq!(request.response, 0);
        assert_eq!(request.error, None);
        assert!(!request.query_base64);
        assert!(matches!(request.body, Body::Absent));
    }

    #[test]
    fn test_entry_serializes_to_single_line() {
        let entry = Entry {
            timestamp: "06-08-2026 12:00:00+0200".to_string(),
            user_id: "alice".to_string(),
            action: "login".to_string(),
            response: 200,
            error: None,
            parameters: "id=7".to_string(),
            query: "SELECT 1".to_string(),
            body: "".to_string(),
            additional_info: "note\nwith newline".to_string(),
        };

        let line = entry.to_line().unwrap();
        assert_eq!(line.last(), Some(&b'\n'));
        // Embedded newlines are JSON-escaped; one record is always one line
        assert_eq!(line.iter().filter(|&&b| b == b'\n').count(), 1);

        let parsed: Value = serde_json::from_slice(&line).unwrap();
        assert_eq!(parsed["user_id"], "alice");
        assert_eq!(parsed["response"], 200);
        // Absent errors are omitted, not serialized as null
        assert!(parsed.get("error").is_none());
    }

    #[test]
    fn test_entry_keeps_error_when_present() {
        let request = AuditRequest {
            error: Some("boom".to_string()),
            ..Default::default()
        };
        let entry = Entry::from_request(request, "ts".to_string());
        let parsed: Value = serde_json::from_slice(&entry.to_line().unwrap()).unwrap();
        assert_eq!(parsed["error"], "boom");
    }
}
