//! Async Ollama HTTP client shared by the vision OCR and category predictor
//! adapters. Only `/api/generate` is needed: both adapters send a single
//! non-streaming prompt (with images for OCR) and read back `response`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OllamaError {
    #[error("Ollama is not running at {0}")]
    NotReachable(String),

    #[error("Ollama returned error (status {status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed Ollama response: {0}")]
    MalformedResponse(String),
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    /// Base64-encoded images (PNG or JPEG).
    #[serde(skip_serializing_if = "no_images")]
    images: &'a [String],
    stream: bool,
}

fn no_images(images: &&[String]) -> bool {
    images.is_empty()
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, OllamaError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OllamaError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: Option<&str>,
        images: &[String],
    ) -> Result<String, OllamaError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model,
            prompt,
            system,
            images,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OllamaError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| OllamaError::MalformedResponse(e.to_string()))?;

        Ok(parsed.response)
    }

    fn classify(&self, e: reqwest::Error) -> OllamaError {
        if e.is_connect() {
            OllamaError::NotReachable(self.base_url.clone())
        } else if e.is_timeout() {
            OllamaError::Timeout(self.timeout.as_secs())
        } else {
            OllamaError::HttpClient(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_trimmed() {
        let client = OllamaClient::new("http://localhost:11434/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[test]
    fn request_omits_empty_images_and_system() {
        let body = GenerateRequest {
            model: "llama3.2",
            prompt: "hi",
            system: None,
            images: &[],
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("images").is_none());
        assert!(json.get("system").is_none());
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn request_includes_images() {
        let images = vec!["aGVsbG8=".to_string()];
        let body = GenerateRequest {
            model: "llama3.2-vision",
            prompt: "read",
            system: Some("sys"),
            images: &images,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["images"][0], "aGVsbG8=");
        assert_eq!(json["system"], "sys");
    }

    #[tokio::test]
    async fn unreachable_server_is_not_reachable() {
        // Port 9 (discard) is closed on test machines.
        let client = OllamaClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client.generate("m", "p", None, &[]).await.unwrap_err();
        assert!(matches!(
            err,
            OllamaError::NotReachable(_) | OllamaError::Timeout(_) | OllamaError::HttpClient(_)
        ));
    }
}
