//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

/// Post metadata key holding the generated audio URL for a post.
pub const AUDIO_URL_META_KEY: &str = "_melo_tts_audio_url";

/// Option names for the TTS settings.
pub const OPTION_API_ENDPOINT: &str = "melo_tts_api_endpoint";
pub const OPTION_LANGUAGE: &str = "melo_tts_language";
pub const OPTION_SPEAKER: &str = "melo_tts_speaker";

pub const DEFAULT_API_ENDPOINT: &str = "http://localhost:5000";
pub const DEFAULT_LANGUAGE: &str = "KR";
pub const DEFAULT_SPEAKER: &str = "KR";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostSummaryRecord {
    pub id: i64,
    pub title: String,
    pub created_at: OffsetDateTime,
}

/// Resolved TTS settings, read once per synthesis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TtsSettings {
    pub endpoint: String,
    pub language: String,
    pub speaker: String,
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_API_ENDPOINT.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            speaker: DEFAULT_SPEAKER.to_string(),
        }
    }
}

/// Languages offered by the settings form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechLanguage {
    Korean,
    English,
    Chinese,
}

impl SpeechLanguage {
    pub const ALL: [SpeechLanguage; 3] = [
        SpeechLanguage::Korean,
        SpeechLanguage::English,
        SpeechLanguage::Chinese,
    ];

    pub fn code(self) -> &'static str {
        match self {
            SpeechLanguage::Korean => "KR",
            SpeechLanguage::English => "EN",
            SpeechLanguage::Chinese => "ZH",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SpeechLanguage::Korean => "한국어",
            SpeechLanguage::English => "English",
            SpeechLanguage::Chinese => "中文",
        }
    }
}
