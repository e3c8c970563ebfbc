use async_trait::async_trait;

use crate::application::repos::{PostMetaRepo, RepoError};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl PostMetaRepo for PostgresRepositories {
    async fn get_post_meta(&self, post_id: i64, key: &str) -> Result<Option<String>, RepoError> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT meta_value
            FROM post_meta
            WHERE post_id = $1 AND meta_key = $2
            "#,
        )
        .bind(post_id)
        .bind(key)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn set_post_meta(&self, post_id: i64, key: &str, value: &str) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO post_meta (post_id, meta_key, meta_value)
            VALUES ($1, $2, $3)
            ON CONFLICT (post_id, meta_key)
            DO UPDATE SET meta_value = EXCLUDED.meta_value,
                          updated_at = now()
            "#,
        )
        .bind(post_id)
        .bind(key)
        .bind(value)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
