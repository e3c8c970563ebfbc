//! Public file store for generated audio.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::{fs, io::AsyncWriteExt};
use url::Url;

const AUDIO_FILE_PREFIX: &str = "melo-tts";
const AUDIO_FILE_EXTENSION: &str = "wav";

/// Errors that can occur while interacting with the audio store.
#[derive(Debug, Error)]
pub enum AudioStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("audio payload is empty")]
    EmptyPayload,
}

/// Result of storing an audio payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAudio {
    pub stored_path: String,
    pub public_url: String,
    pub size_bytes: u64,
}

/// Filesystem-backed audio storage whose files are reachable under a public base URL.
#[derive(Debug)]
pub struct AudioStorage {
    root: PathBuf,
    public_base: String,
}

impl AudioStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    ///
    /// `public_base_url` may be absolute (`https://example.com/uploads`) or a path
    /// (`/uploads`).
    pub fn new(root: PathBuf, public_base_url: &str) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            public_base: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a synthesized payload for `post_id`, named after the current time.
    pub async fn store_audio(
        &self,
        post_id: i64,
        data: Bytes,
    ) -> Result<StoredAudio, AudioStorageError> {
        self.store_audio_at(post_id, data, OffsetDateTime::now_utc())
            .await
    }

    pub async fn store_audio_at(
        &self,
        post_id: i64,
        data: Bytes,
        now: OffsetDateTime,
    ) -> Result<StoredAudio, AudioStorageError> {
        if data.is_empty() {
            return Err(AudioStorageError::EmptyPayload);
        }

        let stored_path = build_stored_path(post_id, now);
        let absolute = self.resolve(&stored_path)?;

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(err) = write_file(&absolute, &data).await {
            let _ = fs::remove_file(&absolute).await;
            return Err(AudioStorageError::Io(err));
        }

        Ok(StoredAudio {
            public_url: self.public_url(&stored_path),
            stored_path,
            size_bytes: data.len() as u64,
        })
    }

    pub fn public_url(&self, stored_path: &str) -> String {
        format!("{}/{}", self.public_base, stored_path)
    }

    /// Map a public URL produced by [`Self::public_url`] back to its stored path.
    /// Returns `None` for URLs outside this store.
    pub fn stored_path_for_url(&self, audio_url: &str) -> Option<String> {
        let base_path = url_path(&self.public_base);
        let audio_path = url_path(audio_url);
        let base_path = base_path.trim_end_matches('/');

        let relative = audio_path.strip_prefix(base_path)?.strip_prefix('/')?;
        if relative.is_empty() {
            return None;
        }
        Some(relative.to_string())
    }

    /// Whether the file behind `audio_url` is still present. URLs that do not point into
    /// this store count as missing.
    pub async fn exists_for_url(&self, audio_url: &str) -> Result<bool, AudioStorageError> {
        let Some(stored_path) = self.stored_path_for_url(audio_url) else {
            return Ok(false);
        };
        let absolute = match self.resolve(&stored_path) {
            Ok(path) => path,
            Err(AudioStorageError::InvalidPath) => return Ok(false),
            Err(err) => return Err(err),
        };
        Ok(fs::try_exists(absolute).await?)
    }

    /// Resolve the absolute filesystem path for a stored file.
    fn resolve(&self, stored_path: &str) -> Result<PathBuf, AudioStorageError> {
        let relative = Path::new(stored_path);
        if relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(AudioStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

/// Create, write and flush `path`. The caller removes the file on any error.
async fn write_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.flush().await?;
    file.sync_all().await
}

/// `melo-tts-{post_id}-{unix_timestamp}.wav`
pub fn audio_file_name(post_id: i64, unix_timestamp: i64) -> String {
    format!("{AUDIO_FILE_PREFIX}-{post_id}-{unix_timestamp}.{AUDIO_FILE_EXTENSION}")
}

fn build_stored_path(post_id: i64, now: OffsetDateTime) -> String {
    let (year, month, _) = now.to_calendar_date();
    let filename = audio_file_name(post_id, now.unix_timestamp());
    format!("{year}/{:02}/{filename}", month as u8)
}

fn url_path(value: &str) -> String {
    match Url::parse(value) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => value
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn file_name_embeds_post_and_timestamp() {
        assert_eq!(audio_file_name(42, 1_700_000_000), "melo-tts-42-1700000000.wav");
    }

    #[tokio::test]
    async fn stores_under_year_month_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = AudioStorage::new(dir.path().to_path_buf(), "/uploads/").expect("storage");
        let now = datetime!(2026-03-05 08:00 UTC);

        let stored = storage
            .store_audio_at(9, Bytes::from_static(b"RIFF"), now)
            .await
            .expect("stored");

        let expected_name = audio_file_name(9, now.unix_timestamp());
        assert_eq!(stored.stored_path, format!("2026/03/{expected_name}"));
        assert_eq!(stored.public_url, format!("/uploads/2026/03/{expected_name}"));
        assert_eq!(stored.size_bytes, 4);
        assert!(dir.path().join(&stored.stored_path).exists());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn failed_write_leaves_no_file_behind() {
        let device = Path::new("/dev/full");
        if !device.exists() {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = AudioStorage::new(dir.path().to_path_buf(), "/uploads").expect("storage");
        let now = datetime!(2026-03-05 08:00 UTC);
        let target = dir
            .path()
            .join("2026/03")
            .join(audio_file_name(9, now.unix_timestamp()));
        std::fs::create_dir_all(target.parent().expect("month dir")).expect("month dir");
        // Opening succeeds but every write reports a full disk.
        std::os::unix::fs::symlink(device, &target).expect("symlink");

        let result = storage
            .store_audio_at(9, Bytes::from_static(b"RIFF"), now)
            .await;

        assert!(matches!(result, Err(AudioStorageError::Io(_))));
        assert!(std::fs::symlink_metadata(&target).is_err());
    }

    #[tokio::test]
    async fn empty_payload_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = AudioStorage::new(dir.path().to_path_buf(), "/uploads").expect("storage");
        let result = storage.store_audio(1, Bytes::new()).await;
        assert!(matches!(result, Err(AudioStorageError::EmptyPayload)));
    }

    #[test]
    fn maps_absolute_and_relative_urls_back_to_stored_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let absolute =
            AudioStorage::new(dir.path().to_path_buf(), "https://blog.example/uploads")
                .expect("storage");
        assert_eq!(
            absolute.stored_path_for_url("https://blog.example/uploads/2026/03/a.wav"),
            Some("2026/03/a.wav".to_string())
        );
        assert_eq!(absolute.stored_path_for_url("https://blog.example/other/a.wav"), None);

        let relative = AudioStorage::new(dir.path().to_path_buf(), "/uploads").expect("storage");
        assert_eq!(
            relative.stored_path_for_url("/uploads/2026/03/a.wav?v=1"),
            Some("2026/03/a.wav".to_string())
        );
        assert_eq!(relative.stored_path_for_url("/uploadsX/a.wav"), None);
        assert_eq!(relative.stored_path_for_url(""), None);
    }

    #[tokio::test]
    async fn existence_follows_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = AudioStorage::new(dir.path().to_path_buf(), "/uploads").expect("storage");
        let stored = storage
            .store_audio(3, Bytes::from_static(b"audio"))
            .await
            .expect("stored");

        assert!(storage.exists_for_url(&stored.public_url).await.expect("exists"));
        std::fs::remove_file(dir.path().join(&stored.stored_path)).expect("removed");
        assert!(!storage.exists_for_url(&stored.public_url).await.expect("exists"));
    }

    #[tokio::test]
    async fn traversal_urls_count_as_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = AudioStorage::new(dir.path().to_path_buf(), "/uploads").expect("storage");
        assert!(
            !storage
                .exists_for_url("/uploads/../secret.wav")
                .await
                .expect("exists")
        );
    }
}
