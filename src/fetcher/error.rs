use thiserror::Error;

pub const MSG_ALREADY_REGISTERED: &str = "This entry is already registered.";
pub const MSG_FILE_UPLOAD: &str = "Error processing file upload. Please try again.";
pub const MSG_SERVER_ERROR: &str = "A server error occurred. Please try again later.";

#[derive(Debug, Error)]
pub enum CrudError {
    #[error("network error while calling {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success status with a structured `{"error": ...}` body.
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Non-success status with a plain-text or HTML body, already translated.
    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    #[error("failed to read attachment {path}: {source}")]
    Attachment {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid payload: {message}")]
    InvalidPayload { message: String },

    #[error("CSRF token not found: {message}")]
    Csrf { message: String },

    #[error("page size storage error at {path}: {message}")]
    Storage { path: String, message: String },

    #[error("invalid base URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },
}

impl CrudError {
    /// Text shown to the user in an alert or banner.
    pub fn user_message(&self) -> String {
        match self {
            CrudError::Api { message, .. } => message.clone(),
            CrudError::Server { message, .. } => message.clone(),
            CrudError::Network { source, .. } => format!("Network error: {source}"),
            CrudError::Attachment { .. } => MSG_FILE_UPLOAD.to_string(),
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            CrudError::Api { status, .. } | CrudError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}
