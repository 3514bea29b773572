//! Chat-completions client for the ask plugin.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_COMPLETION_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub struct Client {
    endpoint: String,
    model: String,
    http: reqwest::Client,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl Client {
    pub fn new(endpoint: String, model: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { endpoint, model, http }
    }

    pub async fn complete(&self, api_key: &str, messages: &[Message], max_tokens: u32) -> Result<String, Error> {
        let request = ApiRequest {
            model: &self.model,
            max_tokens,
            messages: messages
                .iter()
                .map(|m| ApiMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        debug!("Completion response status: {status}");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!("{status}: {body}")));
        }

        let body = response.text().await.map_err(|e| Error::Http(e.to_string()))?;
        parse_response(&body)
    }
}

/// First choice's text from a chat-completions response body.
pub fn parse_response(body: &str) -> Result<String, Error> {
    let parsed: ApiResponse = serde_json::from_str(body).map_err(|e| Error::Parse(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(Error::Empty)
}

#[derive(Debug)]
pub enum Error {
    Http(String),
    Api(String),
    Parse(String),
    Empty,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Api(e) => write!(f, "API error: {e}"),
            Error::Parse(e) => write!(f, "Parse error: {e}"),
            Error::Empty => write!(f, "Empty response"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_choice() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": "  Arr, matey.  "}}, {"message": {"content": "second"}}]}"#;
        assert_eq!(parse_response(body).unwrap(), "Arr, matey.");
    }

    #[test]
    fn test_parse_empty_choices() {
        assert!(matches!(parse_response(r#"{"choices": []}"#), Err(Error::Empty)));
        assert!(matches!(
            parse_response(r#"{"choices": [{"message": {"content": null}}]}"#),
            Err(Error::Empty)
        ));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(parse_response("not json"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_request_shape() {
        let request = ApiRequest {
            model: "m",
            max_tokens: 7,
            messages: vec![
                ApiMessage { role: Role::System.as_str(), content: "be brief" },
                ApiMessage { role: Role::User.as_str(), content: "hi" },
            ],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "m",
                "max_tokens": 7,
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ]
            })
        );
    }
}
