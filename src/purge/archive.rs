//! Paste-service upload for purge transcripts.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Deserialize)]
struct ArchiveResponse {
    success: bool,
    url: Option<String>,
    error: Option<String>,
}

pub struct ArchiveUploader {
    endpoint: String,
    http: reqwest::Client,
}

impl ArchiveUploader {
    pub fn new(endpoint: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build archive HTTP client, using defaults: {e}");
                reqwest::Client::new()
            });
        Self { endpoint, http }
    }

    /// Upload a transcript.
    ///
    /// Returns the retrieval URL, or a description of what went wrong. Never fails.
    pub async fn upload(&self, transcript: &str) -> String {
        let response = match self
            .http
            .post(&self.endpoint)
            .form(&[("content", transcript)])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Archive upload failed: {e}");
                return format!("Archive upload failed: {e}");
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                warn!("Failed to read archive response: {e}");
                return format!("Archive upload failed (HTTP {}): unreadable response: {e}", status.as_u16());
            }
        };

        let result = interpret_response(status, &body);
        info!("📦 Archive upload ({} bytes) → {}", transcript.len(), result);
        result
    }
}

/// Map the paste service's reply onto a URL or error text.
pub fn interpret_response(status: StatusCode, body: &str) -> String {
    if status != StatusCode::OK {
        return format!("Archive upload failed (HTTP {}): {}", status.as_u16(), body.trim());
    }

    let parsed: ArchiveResponse = match serde_json::from_str(body) {
        Ok(p) => p,
        Err(e) => return format!("Archive upload failed: unexpected response ({e}): {}", body.trim()),
    };

    match (parsed.success, parsed.url) {
        (true, Some(url)) if !url.is_empty() => url,
        (true, _) => "Archive upload failed: service reported success without a URL".to_string(),
        (false, _) => format!(
            "Archive upload failed: {}",
            parsed.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn uploader(server: &MockServer) -> ArchiveUploader {
        ArchiveUploader::new(format!("{}/paste", server.uri()))
    }

    #[tokio::test]
    async fn test_upload_posts_form_and_returns_url() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/paste"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("content="))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"success": true, "url": "https://paste.example/abc"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = uploader(&server).upload("[2026-10-19 12:00:00] alice: spam").await;
        assert_eq!(result, "https://paste.example/abc");
    }

    #[tokio::test]
    async fn test_upload_rate_limited_returns_error_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/paste"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let result = uploader(&server).upload("alice: spam").await;
        assert!(result.contains("rate limited"));
        assert!(result.contains("429"));
    }

    #[tokio::test]
    async fn test_upload_denied_by_service() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/paste"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": false, "error": "spam detected"})),
            )
            .mount(&server)
            .await;

        let result = uploader(&server).upload("alice: spam").await;
        assert_eq!(result, "Archive upload failed: spam detected");
    }

    #[tokio::test]
    async fn test_upload_unreachable_endpoint() {
        // Nothing listens on port 1.
        let result = ArchiveUploader::new("http://127.0.0.1:1/paste".to_string())
            .upload("alice: spam")
            .await;
        assert!(result.starts_with("Archive upload failed"));
        assert!(!result.starts_with("http"));
    }

    #[test]
    fn test_success_returns_url() {
        let body = r#"{"success": true, "url": "https://paste.example/abc"}"#;
        assert_eq!(interpret_response(StatusCode::OK, body), "https://paste.example/abc");
    }

    #[test]
    fn test_denied_embeds_service_error() {
        let body = r#"{"success": false, "error": "content too large"}"#;
        let result = interpret_response(StatusCode::OK, body);
        assert!(result.contains("content too large"));
        assert!(!result.starts_with("http"));
    }

    #[test]
    fn test_denied_without_error_field() {
        let result = interpret_response(StatusCode::OK, r#"{"success": false}"#);
        assert!(result.contains("unknown error"));
    }

    #[test]
    fn test_non_200_embeds_status_and_body() {
        let result = interpret_response(StatusCode::TOO_MANY_REQUESTS, "rate limited");
        assert!(result.contains("429"));
        assert!(result.contains("rate limited"));
    }

    #[test]
    fn test_other_2xx_is_treated_as_failure() {
        let result = interpret_response(StatusCode::CREATED, r#"{"success": true, "url": "x"}"#);
        assert!(result.contains("201"));
    }

    #[test]
    fn test_malformed_json() {
        let result = interpret_response(StatusCode::OK, "<html>oops</html>");
        assert!(result.starts_with("Archive upload failed"));
        assert!(result.contains("oops"));
    }

    #[test]
    fn test_success_missing_url() {
        let result = interpret_response(StatusCode::OK, r#"{"success": true}"#);
        assert!(result.contains("without a URL"));
    }
}
