use std::sync::Arc;

use thiserror::Error;

use crate::application::repos::{OptionsRepo, RepoError};
use crate::application::tts::{TtsClient, TtsHealth};
use crate::domain::entities::{
    DEFAULT_API_ENDPOINT, DEFAULT_LANGUAGE, DEFAULT_SPEAKER, OPTION_API_ENDPOINT,
    OPTION_LANGUAGE, OPTION_SPEAKER, TtsSettings,
};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("`{0}` must not be empty")]
    ConstraintViolation(&'static str),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct UpdateTtsSettingsCommand {
    pub endpoint: String,
    pub language: String,
    pub speaker: String,
}

/// Reads and writes the three TTS options, applying defaults for unset values.
#[derive(Clone)]
pub struct TtsSettingsService {
    repo: Arc<dyn OptionsRepo>,
}

impl TtsSettingsService {
    pub fn new(repo: Arc<dyn OptionsRepo>) -> Self {
        Self { repo }
    }

    pub async fn load(&self) -> Result<TtsSettings, SettingsError> {
        let endpoint = self.option_or(OPTION_API_ENDPOINT, DEFAULT_API_ENDPOINT).await?;
        let language = self.option_or(OPTION_LANGUAGE, DEFAULT_LANGUAGE).await?;
        let speaker = self.option_or(OPTION_SPEAKER, DEFAULT_SPEAKER).await?;

        Ok(TtsSettings {
            endpoint,
            language,
            speaker,
        })
    }

    pub async fn update(
        &self,
        command: UpdateTtsSettingsCommand,
    ) -> Result<TtsSettings, SettingsError> {
        let settings = TtsSettings {
            endpoint: command.endpoint.trim().to_string(),
            language: command.language.trim().to_string(),
            speaker: command.speaker.trim().to_string(),
        };

        ensure_non_empty(&settings.endpoint, "endpoint")?;
        ensure_non_empty(&settings.language, "language")?;
        ensure_non_empty(&settings.speaker, "speaker")?;

        self.repo
            .set_options(&[
                (OPTION_API_ENDPOINT, settings.endpoint.as_str()),
                (OPTION_LANGUAGE, settings.language.as_str()),
                (OPTION_SPEAKER, settings.speaker.as_str()),
            ])
            .await?;

        Ok(settings)
    }

    async fn option_or(&self, name: &str, default: &str) -> Result<String, SettingsError> {
        let value = self.repo.get_option(name).await?;
        Ok(value
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| default.to_string()))
    }
}

fn ensure_non_empty(value: &str, field: &'static str) -> Result<(), SettingsError> {
    if value.is_empty() {
        Err(SettingsError::ConstraintViolation(field))
    } else {
        Ok(())
    }
}

/// Result of checking the configured TTS server from the settings page.
#[derive(Debug, Clone)]
pub struct TtsProbe {
    pub health: Result<TtsHealth, String>,
    pub speakers: Result<Vec<String>, String>,
}

/// Query `/health` and `/speakers/{language}` concurrently. Failures are reported in the
/// probe rather than returned, so the settings page still renders.
pub async fn probe_server(tts: &dyn TtsClient, settings: &TtsSettings) -> TtsProbe {
    let (health, speakers) = tokio::join!(
        tts.health(&settings.endpoint),
        tts.speakers(&settings.endpoint, &settings.language),
    );

    TtsProbe {
        health: health.map_err(|err| err.to_string()),
        speakers: speakers.map_err(|err| err.to_string()),
    }
}
