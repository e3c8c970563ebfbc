//! HTTP client for a MeloTTS-compatible server.

use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Response, header::CONTENT_TYPE};
use serde::Deserialize;
use url::Url;

use crate::application::tts::{SpeechRequest, SynthesizedAudio, TtsClient, TtsError, TtsHealth};

use super::error::InfraError;

const ERROR_DETAIL_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
struct SpeakersResponse {
    speakers: BTreeMap<String, serde_json::Value>,
}

/// Talks to `{endpoint}/tts`, `{endpoint}/health` and `{endpoint}/speakers/{language}`.
///
/// Synthesis uses `request_timeout`; the probe routes use the shorter `probe_timeout`.
#[derive(Clone)]
pub struct HttpTtsClient {
    client: Client,
    request_timeout: Duration,
    probe_timeout: Duration,
}

impl HttpTtsClient {
    pub fn new(request_timeout: Duration, probe_timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(concat!("melo-reader/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self {
            client,
            request_timeout,
            probe_timeout,
        })
    }

    fn map_send_error(err: reqwest::Error, timeout: Duration) -> TtsError {
        if err.is_timeout() {
            TtsError::Timeout {
                seconds: timeout.as_secs(),
            }
        } else {
            TtsError::Transport(err.to_string())
        }
    }

    async fn ensure_success(response: Response) -> Result<Response, TtsError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TtsError::Status {
            status: status.as_u16(),
            detail: error_detail(&body),
        })
    }

    async fn get_json<T>(&self, url: Url) -> Result<T, TtsError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .get(url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|err| Self::map_send_error(err, self.probe_timeout))?;
        let response = Self::ensure_success(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| TtsError::Decode(err.to_string()))
    }
}

#[async_trait]
impl TtsClient for HttpTtsClient {
    async fn synthesize(
        &self,
        endpoint: &str,
        request: &SpeechRequest,
    ) -> Result<SynthesizedAudio, TtsError> {
        let url = endpoint_url(endpoint, "tts")?;
        let response = self
            .client
            .post(url)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await
            .map_err(|err| Self::map_send_error(err, self.request_timeout))?;
        let response = Self::ensure_success(response).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|err| Self::map_send_error(err, self.request_timeout))?;
        if bytes.is_empty() {
            return Err(TtsError::EmptyPayload);
        }

        Ok(SynthesizedAudio {
            bytes,
            content_type,
        })
    }

    async fn health(&self, endpoint: &str) -> Result<TtsHealth, TtsError> {
        let url = endpoint_url(endpoint, "health")?;
        self.get_json(url).await
    }

    async fn speakers(&self, endpoint: &str, language: &str) -> Result<Vec<String>, TtsError> {
        let mut url = endpoint_url(endpoint, "speakers")?;
        url.path_segments_mut()
            .map_err(|_| TtsError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: "endpoint cannot be a base URL".to_string(),
            })?
            .push(language);
        let response: SpeakersResponse = self.get_json(url).await?;
        Ok(response.speakers.into_keys().collect())
    }
}

/// Join a route onto the configured endpoint, tolerating a trailing slash.
pub fn endpoint_url(endpoint: &str, route: &str) -> Result<Url, TtsError> {
    let joined = format!("{}/{}", endpoint.trim().trim_end_matches('/'), route);
    let url = Url::parse(&joined).map_err(|err| TtsError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: err.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(TtsError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: format!("unsupported scheme `{other}`"),
        }),
    }
}

fn error_detail(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no response body".to_string();
    }
    match trimmed.char_indices().nth(ERROR_DETAIL_LIMIT) {
        Some((index, _)) => format!("{}…", &trimmed[..index]),
        None => trimmed.to_string(),
    }
}
