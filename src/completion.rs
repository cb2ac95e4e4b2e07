//! Blocking client for the Anthropic Messages API.

use crate::config::Config;
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

const API_VERSION: &str = "2023-06-01";
const PING_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Issues single, non-retried generation requests.
pub struct CompletionClient {
    api_key: SecretString,
    url: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
    client: Client,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("api_key", &"[REDACTED]")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CompletionClient {
    /// Creates a client from the run configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_settings(
            config.api_key(),
            &config.generation_url,
            &config.model,
            config.max_tokens,
            config.generation_timeout,
        )
    }

    /// Creates a client from individual settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_settings(
        api_key: &str,
        url: &str,
        model: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            api_key: SecretString::from(api_key.to_string()),
            url: url.to_string(),
            model: model.to_string(),
            max_tokens,
            timeout,
            client,
        })
    }

    /// Sends the prompt and returns the first text block of the answer.
    ///
    /// # Errors
    ///
    /// - [`Error::Upstream`] on a non-success status or an answer without text
    /// - [`Error::Timeout`] if the wait budget is exceeded
    /// - [`Error::Transport`] on any other connection failure
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_chars = prompt.len()))]
    pub fn complete(&self, prompt: &str) -> Result<String> {
        info!("Requesting documentation from the generation API");
        let start = Instant::now();

        let text = self.send(prompt, self.max_tokens, self.timeout)?;

        info!(
            "Received {} characters in {:.2}s",
            text.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(text)
    }

    /// Sends a tiny request to verify the key and endpoint.
    ///
    /// # Errors
    ///
    /// Same as [`CompletionClient::complete`].
    pub fn ping(&self) -> Result<()> {
        self.send("Hi", 10, PING_TIMEOUT.min(self.timeout)).map(|_| ())
    }

    fn send(&self, prompt: &str, max_tokens: u32, timeout: Duration) -> Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        debug!("POST {}", self.url);
        let response = self
            .client
            .post(&self.url)
            .timeout(timeout)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout {
                        seconds: timeout.as_secs(),
                    }
                } else {
                    Error::transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    seconds: timeout.as_secs(),
                }
            } else {
                Error::transport(e.to_string())
            }
        })?;

        if !status.is_success() {
            return Err(Error::upstream(status.as_u16(), body));
        }

        let parsed: MessagesResponse = serde_json::from_str(&body)?;
        parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| Error::upstream(status.as_u16(), body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::ServerGuard, timeout: Duration) -> CompletionClient {
        CompletionClient::with_settings(
            "sk-ant-test",
            &format!("{}/v1/messages", server.url()),
            "claude-test",
            64,
            timeout,
        )
        .unwrap()
    }

    #[test]
    fn test_complete_returns_first_text() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-ant-test")
            .match_header("anthropic-version", API_VERSION)
            .match_body(Matcher::PartialJson(json!({
                "model": "claude-test",
                "max_tokens": 64,
                "messages": [{"role": "user", "content": "Document this"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"content": [{"type": "text", "text": "# Title\nBody"}]}).to_string())
            .expect(1)
            .create();

        let client = client_for(&server, Duration::from_secs(5));
        let text = client.complete("Document this").unwrap();

        mock.assert();
        assert_eq!(text, "# Title\nBody");
    }

    #[test]
    fn test_non_success_is_upstream_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body("{\"error\":{\"type\":\"overloaded_error\"}}")
            .create();

        let client = client_for(&server, Duration::from_secs(5));
        let err = client.complete("x").unwrap_err();

        match err {
            Error::Upstream { status, body } => {
                assert_eq!(status, 529);
                assert!(body.contains("overloaded_error"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_content_is_upstream_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body("{\"content\": []}")
            .create();

        let client = client_for(&server, Duration::from_secs(5));
        assert!(client.complete("x").unwrap_err().is_upstream());
    }

    #[test]
    fn test_unreachable_endpoint_is_transport_error() {
        let client = CompletionClient::with_settings(
            "sk-ant-test",
            "http://127.0.0.1:9/v1/messages",
            "claude-test",
            64,
            Duration::from_secs(2),
        )
        .unwrap();

        let err = client.complete("x").unwrap_err();
        assert!(matches!(err, Error::Transport { .. }), "unexpected error: {err:?}");
    }

    #[test]
    fn test_silent_endpoint_times_out() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/v1/messages", listener.local_addr().unwrap());
        let client =
            CompletionClient::with_settings("sk-ant-test", &url, "claude-test", 64, Duration::from_secs(1))
                .unwrap();

        let err = client.complete("x").unwrap_err();
        assert!(matches!(err, Error::Timeout { seconds: 1 }), "unexpected error: {err:?}");
        assert!(err.is_upstream());
        drop(listener);
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = CompletionClient::with_settings(
            "sk-ant-secret",
            "http://localhost/v1/messages",
            "m",
            1,
            Duration::from_secs(1),
        )
        .unwrap();

        assert!(!format!("{client:?}").contains("sk-ant-secret"));
    }
}
