use reqwest::StatusCode;
use serde::Deserialize;

const MAX_DETAIL_CHARS: usize = 800;

/// Failure talking to the agent backend.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{detail}")]
    Http { status: StatusCode, detail: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Human-readable message for validation banners.
    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Pull a readable message out of a non-2xx body.
///
/// Prefers `{"detail": ...}`, then the raw body, then the status line.
pub fn extract_detail(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        match parsed.detail {
            serde_json::Value::String(s) if !s.trim().is_empty() => return s,
            serde_json::Value::Null => {}
            other => return other.to_string(),
        }
    }
    if body.is_empty() {
        return format!("request failed: {}", status);
    }
    let truncated: String = body.chars().take(MAX_DETAIL_CHARS).collect();
    if truncated.len() < body.len() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_from_json() {
        let detail = extract_detail(
            StatusCode::BAD_REQUEST,
            r#"{"detail": "Invalid API key provided"}"#,
        );
        assert_eq!(detail, "Invalid API key provided");
    }

    #[test]
    fn test_detail_non_string() {
        let detail = extract_detail(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail": [{"msg": "field required"}]}"#,
        );
        assert!(detail.contains("field required"));
    }

    #[test]
    fn test_detail_falls_back_to_body_and_status() {
        assert_eq!(
            extract_detail(StatusCode::BAD_GATEWAY, "upstream down"),
            "upstream down"
        );
        assert_eq!(
            extract_detail(StatusCode::BAD_GATEWAY, "  "),
            "request failed: 502 Bad Gateway"
        );
    }

    #[test]
    fn test_detail_truncates_long_bodies() {
        let body = "x".repeat(2000);
        let detail = extract_detail(StatusCode::INTERNAL_SERVER_ERROR, &body);
        assert_eq!(detail.len(), MAX_DETAIL_CHARS + 3);
        assert!(detail.ends_with("..."));
    }

    #[test]
    fn test_http_error_displays_detail() {
        let err = ApiError::Http {
            status: StatusCode::UNAUTHORIZED,
            detail: "bad token".into(),
        };
        assert_eq!(err.message(), "bad token");
        assert!(!err.is_not_found());
    }
}
