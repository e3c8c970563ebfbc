//! Port to the external text-to-speech server.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON body accepted by `POST {endpoint}/tts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeechRequest {
    pub text: String,
    pub language: String,
    pub speaker: String,
}

/// Raw audio returned by the TTS server. The payload is opaque; the reported
/// content type is kept for diagnostics only.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Response of `GET {endpoint}/health`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TtsHealth {
    pub status: String,
    #[serde(default)]
    pub available_languages: Vec<String>,
}

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("invalid TTS endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("request to TTS server timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("request to TTS server failed: {0}")]
    Transport(String),
    #[error("TTS server responded with status {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("TTS server returned an empty audio payload")]
    EmptyPayload,
    #[error("unexpected TTS server response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait TtsClient: Send + Sync {
    /// Issue a single synthesis request. Implementations never retry.
    async fn synthesize(
        &self,
        endpoint: &str,
        request: &SpeechRequest,
    ) -> Result<SynthesizedAudio, TtsError>;

    async fn health(&self, endpoint: &str) -> Result<TtsHealth, TtsError>;

    /// Speaker names the server offers for `language`.
    async fn speakers(&self, endpoint: &str, language: &str) -> Result<Vec<String>, TtsError>;
}
