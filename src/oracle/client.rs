use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::OracleError;
use crate::config::OracleConfig;

/// One generation call: system instruction, user prompt, optional images.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenerateRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    /// Base64-encoded images.
    pub images: Vec<String>,
    /// Ask the backend to constrain output to a JSON document.
    pub json_output: bool,
}

/// LLM backend abstraction (allows mocking).
pub trait LlmClient: Send + Sync {
    fn generate(
        &self,
        request: &GenerateRequest,
    ) -> impl Future<Output = Result<String, OracleError>> + Send;
}

impl<C: LlmClient> LlmClient for Arc<C> {
    fn generate(
        &self,
        request: &GenerateRequest,
    ) -> impl Future<Output = Result<String, OracleError>> + Send {
        (**self).generate(request)
    }
}

/// HTTP client for an Ollama-compatible `/api/generate` endpoint.
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| OracleError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn from_config(config: &OracleConfig) -> Result<Self, OracleError> {
        Self::new(&config.base_url, config.timeout_secs)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Request body for /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    images: &'a [String],
}

/// Response body from /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl LlmClient for OllamaClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, OracleError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model: &request.model,
            prompt: &request.prompt,
            system: &request.system,
            stream: false,
            format: request.json_output.then_some("json"),
            images: &request.images,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    OracleError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    OracleError::Timeout(self.timeout_secs)
                } else {
                    OracleError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| OracleError::MalformedResponse(e.to_string()))?;

        Ok(parsed.response)
    }
}

/// Mock LLM client for testing. Returns a configurable response and
/// remembers every request it saw.
pub struct MockLlmClient {
    reply: Result<String, String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            reply: Ok(response.to_string()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A client whose every call fails with a connection error.
    pub fn unreachable(base_url: &str) -> Self {
        Self {
            reply: Err(base_url.to_string()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.requests.lock().ok()?.last().cloned()
    }
}

impl LlmClient for MockLlmClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(url) => Err(OracleError::Connection(url.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_trims_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/", 30).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[test]
    fn client_from_default_config_points_at_localhost() {
        let client = OllamaClient::from_config(&OracleConfig::default()).unwrap();
        assert!(client.base_url().contains("localhost"));
    }

    #[test]
    fn request_body_skips_empty_images_and_format() {
        let body = OllamaGenerateRequest {
            model: "m",
            prompt: "p",
            system: "s",
            stream: false,
            format: None,
            images: &[],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("images").is_none());
        assert!(json.get("format").is_none());
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn request_body_carries_images_and_json_format() {
        let images = vec!["YWJj".to_string()];
        let body = OllamaGenerateRequest {
            model: "m",
            prompt: "p",
            system: "s",
            stream: false,
            format: Some("json"),
            images: &images,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["format"], "json");
        assert_eq!(json["images"][0], "YWJj");
    }

    #[tokio::test]
    async fn mock_records_requests() {
        let mock = MockLlmClient::new("{}");
        let request = GenerateRequest {
            model: "m".into(),
            prompt: "hello".into(),
            ..Default::default()
        };
        assert_eq!(mock.generate(&request).await.unwrap(), "{}");
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.last_request().unwrap().prompt, "hello");
    }

    #[tokio::test]
    async fn unreachable_mock_fails_with_connection_error() {
        let mock = Arc::new(MockLlmClient::unreachable("http://nowhere"));
        let err = mock.generate(&GenerateRequest::default()).await.unwrap_err();
        assert!(matches!(err, OracleError::Connection(ref url) if url == "http://nowhere"));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn connection_refused_maps_to_connection_error() {
        let client = OllamaClient::new("http://127.0.0.1:9", 5).unwrap();
        let err = client.generate(&GenerateRequest::default()).await.unwrap_err();
        assert!(matches!(
            err,
            OracleError::Connection(_) | OracleError::HttpClient(_) | OracleError::Timeout(_)
        ));
    }
}
