use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::json;
use std::process::Command;
use tracing::{debug, info};

use super::retry::{BASE_DELAY, MAX_RETRIES, is_retryable, retry_after, wait_with_backoff};
use super::{ProcessResponse, RecognitionFuture, Recognizer, RequestMeta};

/// Which Document AI processor to call and how to authenticate.
#[derive(Debug, Clone, Default)]
pub struct RecognitionConfig {
    /// Regional host, e.g. `eu-documentai.googleapis.com`.
    pub api_endpoint: String,
    /// `projects/<p>/locations/<l>/processors/<id>`, optionally with a
    /// `/processorVersions/<v>` suffix.
    pub processor_name: String,
    /// OAuth bearer token. When absent, `gcloud auth print-access-token` is
    /// asked for one.
    pub access_token: Option<String>,
}

impl RecognitionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.api_endpoint.trim().is_empty() {
            return Err(anyhow!("no API_ENDPOINT"));
        }
        if self.processor_name.trim().is_empty() {
            return Err(anyhow!("no PROCESSOR_NAME"));
        }
        Ok(())
    }

    /// Bare hosts are reached over https; an explicit `http://` endpoint
    /// (a local emulator) is kept as given.
    pub fn process_url(&self) -> String {
        let endpoint = self.api_endpoint.trim().trim_end_matches('/');
        let base = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("https://{}", endpoint)
        };
        format!(
            "{}/v1/{}:process",
            base,
            self.processor_name.trim().trim_matches('/')
        )
    }
}

#[derive(Debug, Clone)]
pub struct DocumentAiClient {
    config: RecognitionConfig,
    http: reqwest::Client,
}

impl DocumentAiClient {
    pub fn new(config: RecognitionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            http: reqwest::Client::new(),
        })
    }

    fn access_token(&self) -> Result<String> {
        if let Some(token) = self
            .config
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
        {
            return Ok(token.to_string());
        }
        let output = Command::new("gcloud")
            .args(["auth", "print-access-token"])
            .output()
            .with_context(|| "failed to run gcloud (set DOCUMENT_AI_ACCESS_TOKEN or install the gcloud CLI)")?;
        if !output.status.success() {
            return Err(anyhow!(
                "gcloud auth print-access-token failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        let token = String::from_utf8(output.stdout)
            .with_context(|| "gcloud printed a non-utf8 access token")?;
        Ok(token.trim().to_string())
    }

    async fn process(&self, image: &[u8], mime: &str) -> Result<ProcessResponse> {
        let url = self.config.process_url();
        let token = self.access_token()?;
        let body = json!({
            "skipHumanReview": true,
            "rawDocument": {
                "content": BASE64.encode(image),
                "mimeType": mime
            }
        });
        info!("recognizing {} bytes of {} via {}", image.len(), mime, self.config.api_endpoint);

        let mut attempt = 0usize;
        let mut delay = BASE_DELAY;
        loop {
            attempt += 1;
            let response = self
                .http
                .post(&url)
                .bearer_auth(&token)
                .json(&body)
                .send()
                .await
                .with_context(|| format!("failed to call {}", url))?;

            let status = response.status();
            let retry_after = retry_after(response.headers());
            let text = response
                .text()
                .await
                .with_context(|| format!("failed to read response body from {}", url))?;
            if status.is_success() {
                debug!("document ai answered with {} bytes", text.len());
                let parsed: ProcessResponse = serde_json::from_str(&text)
                    .with_context(|| "failed to parse Document AI response JSON")?;
                return Ok(ProcessResponse {
                    request_meta: Some(RequestMeta {
                        api_endpoint: self.config.api_endpoint.clone(),
                        processor_name: self.config.processor_name.clone(),
                    }),
                    ..parsed
                });
            }
            if is_retryable(status, &text) && attempt < MAX_RETRIES {
                delay = wait_with_backoff(attempt, delay, retry_after).await;
                continue;
            }
            return Err(anyhow!(
                "Document AI error ({}): {}",
                status,
                extract_error(&text).unwrap_or(text)
            ));
        }
    }
}

impl Recognizer for DocumentAiClient {
    fn recognize<'a>(&'a self, image: &'a [u8], mime: &'a str) -> RecognitionFuture<'a> {
        Box::pin(self.process(image, mime))
    }
}

fn extract_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<GoogleError>,
    }

    #[derive(Deserialize)]
    struct GoogleError {
        message: Option<String>,
        status: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    match (error.status, error.message) {
        (Some(status), Some(message)) => Some(format!("{}: {}", status, message)),
        (status, message) => status.or(message),
    }
}
