//! HTTP client for the Gemini `generateContent` API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use leeway_core::config::BackendConfig;
use leeway_core::{AnalysisBackend, DesignError, DesignRequest, LeewayConfig, Result};

use crate::image::encode_image;
use crate::prompt::build_prompt;
use crate::protocol::*;

/// Analysis client backed by Gemini.
///
/// Holds no per-call state, so one instance can be shared for the whole
/// process. Without an API key every call fails with `BackendUnavailable`
/// before touching the network.
pub struct GeminiClient {
    client: Client,
    settings: BackendConfig,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(settings: BackendConfig, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .unwrap_or_else(|_| Client::new());
        let api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        Self {
            client,
            settings,
            api_key,
        }
    }

    pub fn from_config(config: &LeewayConfig) -> Self {
        Self::new(config.backend.clone(), config.gemini_api_key())
    }

    /// Whether a credential is present.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn model_url(&self) -> String {
        let base = self.settings.api_base.trim_end_matches('/');
        let model = self.settings.model.trim();
        if model.starts_with("models/") {
            format!("{base}/{model}")
        } else {
            format!("{base}/models/{model}")
        }
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            DesignError::BackendUnavailable(
                "Gemini API key is not configured (set GEMINI_API_KEY)".to_string(),
            )
        })
    }

    /// Assemble the payload: the prompt, then the image if it can be read.
    async fn build_body(&self, request: &DesignRequest) -> GenerateContentRequest {
        let inline = match request.image_uri() {
            Some(handle) => encode_image(handle.as_path(), self.settings.max_image_bytes).await,
            None => None,
        };

        let mut parts = vec![Part::Text {
            text: build_prompt(request, inline.is_some()),
        }];
        if let Some(inline_data) = inline {
            parts.push(Part::InlineData { inline_data });
        }

        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: Some(GenerationConfig {
                temperature: self.settings.temperature,
                max_output_tokens: self.settings.max_output_tokens,
                response_mime_type: self
                    .settings
                    .json_mode
                    .then(|| "application/json".to_string()),
            }),
        }
    }

    /// Send a request and return the model's raw text.
    #[instrument(skip(self, request), fields(request_id = %request.id(), model = %self.settings.model))]
    pub async fn generate(&self, request: &DesignRequest) -> Result<String> {
        let api_key = self.api_key()?;
        let body = self.build_body(request).await;
        let with_image = body.contents[0].parts.len() > 1;

        let url = format!("{}:generateContent", self.model_url());
        info!(with_image, "Sending room analysis request");

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            return Err(status_error(status, &error_text));
        }

        let response: GenerateContentResponse = resp.json().await.map_err(|e| {
            DesignError::BackendError(format!("Could not decode backend response: {e}"))
        })?;

        match response.text() {
            Some(text) => {
                debug!(chars = text.len(), "Received backend output");
                Ok(text)
            }
            None => Err(DesignError::BackendError(response.empty_reason())),
        }
    }

    /// Check that the configured model is reachable with the current key.
    #[instrument(skip(self))]
    pub async fn ping(&self) -> bool {
        let Ok(api_key) = self.api_key() else {
            debug!("No API key configured, skipping connection test");
            return false;
        };

        match self
            .client
            .get(self.model_url())
            .header("x-goog-api-key", api_key)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(status = %resp.status(), "Connection test rejected");
                false
            }
            Err(e) => {
                warn!(error = %e, "Connection test failed");
                false
            }
        }
    }
}

#[async_trait]
impl AnalysisBackend for GeminiClient {
    async fn analyze(&self, request: &DesignRequest) -> Result<String> {
        self.generate(request).await
    }

    async fn test_connection(&self) -> bool {
        self.ping().await
    }
}

fn transport_error(e: reqwest::Error) -> DesignError {
    if e.is_connect() || e.is_timeout() {
        DesignError::BackendUnavailable(e.to_string())
    } else {
        DesignError::BackendError(e.to_string())
    }
}

fn status_error(status: StatusCode, body: &str) -> DesignError {
    let detail = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(ApiErrorResponse { error }) if !error.message.is_empty() => match error.status {
            Some(api_status) => format!("{status} {api_status}: {}", error.message),
            None => format!("{status}: {}", error.message),
        },
        _ => format!("{status}: {}", body.trim()),
    };

    if status == StatusCode::SERVICE_UNAVAILABLE {
        DesignError::BackendUnavailable(detail)
    } else {
        DesignError::BackendError(detail)
    }
}
