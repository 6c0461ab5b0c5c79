use serde::de::DeserializeOwned;

use super::error::{CrudError, MSG_ALREADY_REGISTERED, MSG_FILE_UPLOAD, MSG_SERVER_ERROR};

const DUPLICATE_MARKERS: [&str; 4] = [
    "unique constraint failed",
    "duplicate key",
    "already exists",
    "integrityerror",
];

const CODEC_MARKERS: [&str; 3] = ["codec can't decode", "invalid base64", "incorrect padding"];

const HTML_MARKERS: [&str; 2] = ["<!doctype", "<html"];

/// Builds the error for a non-success response from its status and raw body.
///
/// A JSON body with an `error` string is surfaced as-is. Anything else is
/// matched against known substrings before falling back to the raw text.
pub(crate) fn error_from_body(status: u16, body: &str) -> CrudError {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = map.get("error").and_then(|v| v.as_str()) {
            return CrudError::Api {
                status,
                message: message.to_string(),
            };
        }
    }
    CrudError::Server {
        status,
        message: classify_text(status, body),
    }
}

pub(crate) fn classify_text(status: u16, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return format!("HTTP error! status: {status}");
    }
    let lower = trimmed.to_lowercase();
    if DUPLICATE_MARKERS.iter().any(|m| lower.contains(m)) {
        return MSG_ALREADY_REGISTERED.to_string();
    }
    if CODEC_MARKERS.iter().any(|m| lower.contains(m)) {
        return MSG_FILE_UPLOAD.to_string();
    }
    if HTML_MARKERS.iter().any(|m| lower.contains(m)) {
        return MSG_SERVER_ERROR.to_string();
    }
    trimmed.to_string()
}

/// Parses a success body. Empty bodies (e.g. 204) decode from `null`.
pub(crate) fn decode_body<T: DeserializeOwned>(url: &str, body: &str) -> Result<T, CrudError> {
    let text = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(text).map_err(|e| CrudError::Decode {
        url: url.to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_error_body_is_surfaced_verbatim() {
        let err = error_from_body(400, r#"{"error":"ID is required for PUT requests"}"#);
        assert!(matches!(err, CrudError::Api { status: 400, .. }));
        assert_eq!(err.user_message(), "ID is required for PUT requests");
    }

    #[test]
    fn html_error_page_becomes_generic_message() {
        let body = "<!DOCTYPE html><html><body><h1>Server Error (500)</h1></body></html>";
        let err = error_from_body(500, body);
        assert_eq!(err.user_message(), MSG_SERVER_ERROR);
    }

    #[test]
    fn known_substrings_are_translated() {
        assert_eq!(
            classify_text(500, "UNIQUE constraint failed: rest_table3.email_field"),
            MSG_ALREADY_REGISTERED
        );
        assert_eq!(
            classify_text(500, "'utf-8' codec can't decode byte 0x89"),
            MSG_FILE_UPLOAD
        );
        assert_eq!(classify_text(502, "Bad gateway"), "Bad gateway");
        assert_eq!(classify_text(503, "  "), "HTTP error! status: 503");
    }

    #[test]
    fn json_without_error_key_falls_back_to_text() {
        let err = error_from_body(404, r#"{"detail":"nope"}"#);
        assert_eq!(err.user_message(), r#"{"detail":"nope"}"#);
    }

    #[test]
    fn empty_success_body_decodes_as_null() {
        let v: serde_json::Value = decode_body("http://x/", "").unwrap();
        assert!(v.is_null());
        assert!(decode_body::<serde_json::Value>("http://x/", "<html>").is_err());
    }
}
