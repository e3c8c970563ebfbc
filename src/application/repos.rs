//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{PostRecord, PostSummaryRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub title: String,
    pub body: String,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError>;

    async fn list_recent_posts(&self, limit: i64) -> Result<Vec<PostSummaryRecord>, RepoError>;

    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    async fn health_check(&self) -> Result<(), RepoError>;
}

/// Per-post key/value metadata.
#[async_trait]
pub trait PostMetaRepo: Send + Sync {
    async fn get_post_meta(&self, post_id: i64, key: &str) -> Result<Option<String>, RepoError>;

    /// Insert or overwrite the value stored under `key` for `post_id`.
    async fn set_post_meta(&self, post_id: i64, key: &str, value: &str) -> Result<(), RepoError>;
}

/// Global named options.
#[async_trait]
pub trait OptionsRepo: Send + Sync {
    async fn get_option(&self, name: &str) -> Result<Option<String>, RepoError>;

    async fn set_options(&self, values: &[(&str, &str)]) -> Result<(), RepoError>;
}
