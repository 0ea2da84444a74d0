use reqwest::Client;

use crate::error::{ChatClientError, Result};
use crate::retry::{backoff_delay, is_retryable_status};
use crate::types::{ChatClientConfig, ChatMessage, ChatRequest, ChatResponse};

#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    config: ChatClientConfig,
}

impl ChatClient {
    pub fn new(config: ChatClientConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ChatClientConfig {
        &self.config
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Send one system + user exchange and return the reply text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature: self.config.temperature,
        };
        let response = self.send(&request).await?;
        response
            .text()
            .map(str::to_string)
            .ok_or(ChatClientError::EmptyResponse)
    }

    /// POST `request`, retrying transport errors and transient statuses.
    pub async fn send(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = self.url();
        let max_retries = self.config.max_retries;

        for attempt in 0..=max_retries {
            tracing::debug!(url = %url, attempt = attempt + 1, "sending chat completion");

            let mut builder = self.http.post(&url).json(request);
            if let Some(key) = &self.config.api_key {
                builder = builder.bearer_auth(key);
            }

            let response = match builder.send().await {
                Ok(r) => r,
                Err(e) if attempt < max_retries => {
                    let delay = backoff_delay(self.config.retry_base, attempt);
                    tracing::warn!(
                        error = %e,
                        attempt = attempt + 1,
                        max = max_retries + 1,
                        ?delay,
                        "chat completion request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status().as_u16();
            let body = response.text().await?;

            if !(200..300).contains(&status) {
                if is_retryable_status(status) && attempt < max_retries {
                    let delay = backoff_delay(self.config.retry_base, attempt);
                    tracing::warn!(
                        status,
                        attempt = attempt + 1,
                        max = max_retries + 1,
                        ?delay,
                        "chat completion returned a transient error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(ChatClientError::Status { status, body });
            }

            return serde_json::from_str(&body).map_err(|source| ChatClientError::Parse { body, source });
        }

        // Every iteration returns or continues; the last attempt never continues.
        Err(ChatClientError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client(server: &mockito::Server, max_retries: u32) -> ChatClient {
        ChatClient::new(ChatClientConfig {
            base_url: server.url(),
            api_key: Some("test-key".into()),
            max_retries,
            retry_base: Duration::from_millis(1),
            ..Default::default()
        })
        .unwrap()
    }

    const OK_BODY: &str = r#"{"choices":[{"message":{"role":"assistant","content":"{\"intent\": \"learn\"}"}}]}"#;

    #[tokio::test]
    async fn returns_first_choice_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"model":"gpt-4o-mini","messages":[{"role":"system","content":"sys"},{"role":"user","content":"hi"}]}"#
                    .into(),
            ))
            .with_status(200)
            .with_body(OK_BODY)
            .create_async()
            .await;

        let text = client(&server, 0).complete("sys", "hi").await.unwrap();
        assert_eq!(text, r#"{"intent": "learn"}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn retries_transient_status() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(OK_BODY)
            .create_async()
            .await;

        let text = client(&server, 2).complete("sys", "hi").await.unwrap();
        assert!(text.contains("learn"));
        failing.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body("bad key")
            .expect(1)
            .create_async()
            .await;

        let err = client(&server, 3).complete("sys", "hi").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn exhausted_retries_report_last_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .expect(2)
            .create_async()
            .await;

        let err = client(&server, 1).complete("sys", "hi").await.unwrap_err();
        assert_eq!(err.status(), Some(429));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let err = client(&server, 0).complete("sys", "hi").await.unwrap_err();
        assert!(matches!(err, ChatClientError::EmptyResponse));
    }

    #[tokio::test]
    async fn malformed_body_is_a_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = client(&server, 0).complete("sys", "hi").await.unwrap_err();
        assert!(matches!(err, ChatClientError::Parse { .. }));
    }
}
