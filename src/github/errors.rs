//! GitHub API Error Types
//!
//! Structured error handling for GitHub contents API operations.
//! Maps HTTP status codes to specific error variants so callers can tell
//! "the file is not there" apart from transport or API failures.

/// GitHub API error types
#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("GitHub authentication failed: invalid or expired token")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("GitHub rate limit exceeded")]
    RateLimited,

    #[error("GitHub server error ({0}): {1}")]
    Server(u16, String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("Failed to decode content: {0}")]
    Decode(String),
}

impl GitHubError {
    /// Whether this error means the requested path does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, GitHubError::NotFound(_))
    }

    /// Create a GitHubError from an HTTP status code and response body
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => GitHubError::Unauthorized,
            // GitHub reports primary rate limiting as 403 with a rate-limit message
            403 if body.contains("rate limit") => GitHubError::RateLimited,
            403 => GitHubError::Forbidden(body.to_string()),
            404 => GitHubError::NotFound(body.to_string()),
            429 => GitHubError::RateLimited,
            500..=599 => GitHubError::Server(status, body.to_string()),
            _ => GitHubError::Request(format!("HTTP {}: {}", status, body)),
        }
    }
}

impl From<reqwest::Error> for GitHubError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GitHubError::Decode(e.to_string())
        } else if e.is_timeout() || e.is_connect() {
            GitHubError::Network(e.to_string())
        } else {
            GitHubError::Request(e.to_string())
        }
    }
}

impl From<serde_json::Error> for GitHubError {
    fn from(e: serde_json::Error) -> Self {
        GitHubError::Decode(e.to_string())
    }
}

impl From<base64::DecodeError> for GitHubError {
    fn from(e: base64::DecodeError) -> Self {
        GitHubError::Decode(e.to_string())
    }
}
