//! Read side of the public site: post index, post pages and post import.

use std::sync::Arc;

use crate::application::{
    error::AppError,
    nonce::{NonceService, SYNTHESIS_NONCE_ACTION},
    repos::{CreatePostParams, PostsRepo, RepoError},
};
use crate::domain::entities::{PostRecord, PostSummaryRecord};

const RECENT_POSTS_LIMIT: i64 = 50;

/// A post ready for rendering together with a fresh synthesis token.
#[derive(Debug, Clone)]
pub struct PostPage {
    pub post: PostRecord,
    pub nonce: String,
}

#[derive(Clone)]
pub struct ReaderService {
    posts: Arc<dyn PostsRepo>,
    nonces: NonceService,
}

impl ReaderService {
    pub fn new(posts: Arc<dyn PostsRepo>, nonces: NonceService) -> Self {
        Self { posts, nonces }
    }

    pub async fn recent_posts(&self) -> Result<Vec<PostSummaryRecord>, RepoError> {
        self.posts.list_recent_posts(RECENT_POSTS_LIMIT).await
    }

    pub async fn post_page(&self, id: i64) -> Result<Option<PostPage>, RepoError> {
        let Some(post) = self.posts.find_post(id).await? else {
            return Ok(None);
        };
        Ok(Some(PostPage {
            post,
            nonce: self.nonces.issue(SYNTHESIS_NONCE_ACTION),
        }))
    }

    pub async fn import_post(&self, title: &str, body: &str) -> Result<PostRecord, AppError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::validation("post title must not be empty"));
        }
        let record = self
            .posts
            .create_post(CreatePostParams {
                title: title.to_string(),
                body: body.to_string(),
            })
            .await?;
        Ok(record)
    }

    pub async fn health_check(&self) -> Result<(), RepoError> {
        self.posts.health_check().await
    }
}
