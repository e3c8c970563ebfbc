//! Post-to-speech synthesis with a per-post audio cache.
//!
//! A cache entry is the audio URL stored in post metadata. It is valid only while the
//! URL is non-empty and the referenced file still exists, so removing the file makes the
//! next request regenerate it. Fills for the same post are serialised and re-check the
//! cache after acquiring the lock, collapsing concurrent first requests into one call.

use std::{sync::Arc, time::Instant};

use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    application::{
        locks::PostLocks,
        nonce::{NonceError, NonceService, SYNTHESIS_NONCE_ACTION},
        repos::{PostMetaRepo, PostsRepo, RepoError},
        settings::{SettingsError, TtsSettingsService},
        tts::{SpeechRequest, SynthesizedAudio, TtsClient, TtsError},
    },
    domain::{
        entities::{AUDIO_URL_META_KEY, PostRecord, TtsSettings},
        error::DomainError,
        speech::build_speech_text,
    },
    infra::audio_store::{AudioStorage, AudioStorageError},
};

/// Value of the `action` form field that routes an `/ajax` request to synthesis.
pub const GENERATE_TTS_ACTION: &str = "generate_tts";

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error(transparent)]
    Auth(#[from] NonceError),
    #[error("post {post_id} not found")]
    PostNotFound { post_id: i64 },
    #[error("TTS generation failed: {0}")]
    Transport(#[source] TtsError),
    #[error(transparent)]
    Text(#[from] DomainError),
    #[error("failed to store generated audio")]
    Storage(#[from] AudioStorageError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Generated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOutcome {
    pub audio_url: String,
    pub cache: CacheStatus,
}

impl SynthesisOutcome {
    fn hit(audio_url: String) -> Self {
        Self {
            audio_url,
            cache: CacheStatus::Hit,
        }
    }
}

#[derive(Clone)]
pub struct SynthesisService {
    posts: Arc<dyn PostsRepo>,
    meta: Arc<dyn PostMetaRepo>,
    settings: TtsSettingsService,
    tts: Arc<dyn TtsClient>,
    storage: Arc<AudioStorage>,
    nonces: NonceService,
    locks: PostLocks,
    max_chars: usize,
}

pub struct SynthesisDeps {
    pub posts: Arc<dyn PostsRepo>,
    pub meta: Arc<dyn PostMetaRepo>,
    pub settings: TtsSettingsService,
    pub tts: Arc<dyn TtsClient>,
    pub storage: Arc<AudioStorage>,
    pub nonces: NonceService,
}

impl SynthesisService {
    pub fn new(deps: SynthesisDeps, max_chars: usize) -> Self {
        Self {
            posts: deps.posts,
            meta: deps.meta,
            settings: deps.settings,
            tts: deps.tts,
            storage: deps.storage,
            nonces: deps.nonces,
            locks: PostLocks::new(),
            max_chars,
        }
    }

    /// Handle a synthesis request from a rendered page. The token is checked before
    /// anything else is read.
    pub async fn synthesize(
        &self,
        post_id: i64,
        token: &str,
    ) -> Result<SynthesisOutcome, SynthesisError> {
        self.authorize(token)?;
        self.ensure_audio(post_id).await
    }

    /// Check a page token for the synthesis action. Callers that still have to parse
    /// the rest of the request run this first.
    pub fn authorize(&self, token: &str) -> Result<(), SynthesisError> {
        self.nonces.verify(SYNTHESIS_NONCE_ACTION, token)?;
        Ok(())
    }

    /// Return the cached audio URL for `post_id`, generating it on a miss.
    pub async fn ensure_audio(&self, post_id: i64) -> Result<SynthesisOutcome, SynthesisError> {
        let post = self
            .posts
            .find_post(post_id)
            .await?
            .ok_or(SynthesisError::PostNotFound { post_id })?;

        if let Some(audio_url) = self.cached_audio_url(post_id).await? {
            counter!("melo_tts_cache_hit_total").increment(1);
            debug!(post_id, audio_url = %audio_url, "audio cache hit");
            return Ok(SynthesisOutcome::hit(audio_url));
        }

        let _guard = self.locks.acquire(post_id).await;

        if let Some(audio_url) = self.cached_audio_url(post_id).await? {
            counter!("melo_tts_cache_hit_total").increment(1);
            debug!(post_id, audio_url = %audio_url, "audio filled by concurrent request");
            return Ok(SynthesisOutcome::hit(audio_url));
        }

        counter!("melo_tts_cache_miss_total").increment(1);
        let settings = self.settings.load().await?;

        let result = self.generate(&post, &settings).await;
        if let Err(err) = &result {
            counter!("melo_tts_synthesis_failed_total").increment(1);
            warn!(post_id, error = %err, "audio generation failed");
        }
        result
    }

    async fn generate(
        &self,
        post: &PostRecord,
        settings: &TtsSettings,
    ) -> Result<SynthesisOutcome, SynthesisError> {
        let text = build_speech_text(&post.title, &post.body, self.max_chars)?;
        let request = SpeechRequest {
            text,
            language: settings.language.clone(),
            speaker: settings.speaker.clone(),
        };

        let started = Instant::now();
        let audio = self
            .tts
            .synthesize(&settings.endpoint, &request)
            .await
            .map_err(SynthesisError::Transport)?;
        let elapsed_ms = started.elapsed().as_millis();
        histogram!("melo_tts_synthesis_ms").record(elapsed_ms as f64);
        log_content_type(post.id, &audio);

        let stored = self.storage.store_audio(post.id, audio.bytes).await?;
        self.meta
            .set_post_meta(post.id, AUDIO_URL_META_KEY, &stored.public_url)
            .await?;

        info!(
            post_id = post.id,
            audio_url = %stored.public_url,
            size_bytes = stored.size_bytes,
            elapsed_ms = elapsed_ms as u64,
            language = %settings.language,
            "generated post audio"
        );

        Ok(SynthesisOutcome {
            audio_url: stored.public_url,
            cache: CacheStatus::Generated,
        })
    }

    async fn cached_audio_url(&self, post_id: i64) -> Result<Option<String>, SynthesisError> {
        let Some(audio_url) = self.meta.get_post_meta(post_id, AUDIO_URL_META_KEY).await? else {
            return Ok(None);
        };
        if audio_url.is_empty() {
            return Ok(None);
        }
        if self.storage.exists_for_url(&audio_url).await? {
            Ok(Some(audio_url))
        } else {
            debug!(post_id, audio_url = %audio_url, "cached audio file is gone");
            Ok(None)
        }
    }
}

fn log_content_type(post_id: i64, audio: &SynthesizedAudio) {
    match audio.content_type.as_deref() {
        Some(value) if value.starts_with("audio/") => {}
        other => debug!(
            post_id,
            content_type = other.unwrap_or(""),
            "TTS response is not labelled as audio"
        ),
    }
}
