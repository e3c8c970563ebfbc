#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use melo_reader::{
    application::{
        nonce::{NonceService, SYNTHESIS_NONCE_ACTION},
        reader::ReaderService,
        repos::{CreatePostParams, OptionsRepo, PostMetaRepo, PostsRepo, RepoError},
        settings::TtsSettingsService,
        synthesis::{SynthesisDeps, SynthesisService},
        tts::{SpeechRequest, SynthesizedAudio, TtsClient, TtsError, TtsHealth},
    },
    domain::entities::{AUDIO_URL_META_KEY, PostRecord, PostSummaryRecord},
    domain::speech::MAX_SPEECH_CHARS,
    infra::audio_store::AudioStorage,
};

pub const TEST_SECRET: &str = "integration-test-nonce-secret";
pub const FAKE_AUDIO: &[u8] = b"RIFF\x24\x00\x00\x00WAVEfmt ";

#[derive(Default)]
pub struct MemoryStore {
    posts: Mutex<Vec<PostRecord>>,
    meta: Mutex<HashMap<(i64, String), String>>,
    options: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub async fn insert_post(&self, title: &str, body: &str) -> i64 {
        self.create_post(CreatePostParams {
            title: title.to_string(),
            body: body.to_string(),
        })
        .await
        .expect("insert post")
        .id
    }

    pub async fn audio_url(&self, post_id: i64) -> Option<String> {
        self.meta
            .lock()
            .await
            .get(&(post_id, AUDIO_URL_META_KEY.to_string()))
            .cloned()
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let posts = self.posts.lock().await;
        Ok(posts.iter().find(|post| post.id == id).cloned())
    }

    async fn list_recent_posts(&self, limit: i64) -> Result<Vec<PostSummaryRecord>, RepoError> {
        let posts = self.posts.lock().await;
        Ok(posts
            .iter()
            .rev()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|post| PostSummaryRecord {
                id: post.id,
                title: post.title.clone(),
                created_at: post.created_at,
            })
            .collect())
    }

    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut posts = self.posts.lock().await;
        let now = OffsetDateTime::now_utc();
        let record = PostRecord {
            id: posts.len() as i64 + 1,
            title: params.title,
            body: params.body,
            created_at: now,
            updated_at: now,
        };
        posts.push(record.clone());
        Ok(record)
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[async_trait]
impl PostMetaRepo for MemoryStore {
    async fn get_post_meta(&self, post_id: i64, key: &str) -> Result<Option<String>, RepoError> {
        Ok(self
            .meta
            .lock()
            .await
            .get(&(post_id, key.to_string()))
            .cloned())
    }

    async fn set_post_meta(&self, post_id: i64, key: &str, value: &str) -> Result<(), RepoError> {
        self.meta
            .lock()
            .await
            .insert((post_id, key.to_string()), value.to_string());
        Ok(())
    }
}

#[async_trait]
impl OptionsRepo for MemoryStore {
    async fn get_option(&self, name: &str) -> Result<Option<String>, RepoError> {
        Ok(self.options.lock().await.get(name).cloned())
    }

    async fn set_options(&self, values: &[(&str, &str)]) -> Result<(), RepoError> {
        let mut options = self.options.lock().await;
        for (name, value) in values {
            options.insert(name.to_string(), value.to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FakeReply {
    Audio,
    Status(u16),
    Timeout,
}

/// Counts synthesis calls and records every request it receives.
pub struct FakeTts {
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, SpeechRequest)>>,
    reply: FakeReply,
    delay: Option<Duration>,
}

impl FakeTts {
    pub fn new(reply: FakeReply) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            reply,
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn requests(&self) -> Vec<(String, SpeechRequest)> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl TtsClient for FakeTts {
    async fn synthesize(
        &self,
        endpoint: &str,
        request: &SpeechRequest,
    ) -> Result<SynthesizedAudio, TtsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .await
            .push((endpoint.to_string(), request.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.reply {
            FakeReply::Audio => Ok(SynthesizedAudio {
                bytes: Bytes::from_static(FAKE_AUDIO),
                content_type: Some("audio/wav".to_string()),
            }),
            FakeReply::Status(status) => Err(TtsError::Status {
                status,
                detail: "model unavailable".to_string(),
            }),
            FakeReply::Timeout => Err(TtsError::Timeout { seconds: 60 }),
        }
    }

    async fn health(&self, _endpoint: &str) -> Result<TtsHealth, TtsError> {
        match self.reply {
            FakeReply::Audio => Ok(TtsHealth {
                status: "ok".to_string(),
                available_languages: vec!["KR".to_string(), "EN".to_string()],
            }),
            _ => Err(TtsError::Transport("connection refused".to_string())),
        }
    }

    async fn speakers(&self, _endpoint: &str, language: &str) -> Result<Vec<String>, TtsError> {
        match self.reply {
            FakeReply::Audio => Ok(vec![language.to_string()]),
            _ => Err(TtsError::Transport("connection refused".to_string())),
        }
    }
}

/// Services wired against in-memory repositories, a fake TTS server and a temporary
/// upload directory.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub tts: Arc<FakeTts>,
    pub storage: Arc<AudioStorage>,
    pub nonces: NonceService,
    pub settings: TtsSettingsService,
    pub reader: Arc<ReaderService>,
    pub synthesis: Arc<SynthesisService>,
    dir: tempfile::TempDir,
}

impl Harness {
    pub fn new(tts: FakeTts) -> Self {
        Self::with_max_chars(tts, MAX_SPEECH_CHARS)
    }

    pub fn with_max_chars(tts: FakeTts, max_chars: usize) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::default());
        let tts = Arc::new(tts);
        let storage = Arc::new(
            AudioStorage::new(dir.path().join("uploads"), "/uploads").expect("audio storage"),
        );
        let nonces = NonceService::new(TEST_SECRET, Duration::from_secs(86_400));
        let settings = TtsSettingsService::new(store.clone());
        let reader = Arc::new(ReaderService::new(store.clone(), nonces.clone()));
        let synthesis = Arc::new(SynthesisService::new(
            SynthesisDeps {
                posts: store.clone(),
                meta: store.clone(),
                settings: settings.clone(),
                tts: tts.clone(),
                storage: storage.clone(),
                nonces: nonces.clone(),
            },
            max_chars,
        ));

        Self {
            store,
            tts,
            storage,
            nonces,
            settings,
            reader,
            synthesis,
            dir,
        }
    }

    pub fn token(&self) -> String {
        self.nonces.issue(SYNTHESIS_NONCE_ACTION)
    }

    pub fn upload_root(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    pub fn stored_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        collect_files(&self.upload_root(), &mut files);
        files
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out);
        } else {
            out.push(path);
        }
    }
}
