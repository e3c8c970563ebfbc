use async_trait::async_trait;

use crate::application::repos::{OptionsRepo, RepoError};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl OptionsRepo for PostgresRepositories {
    async fn get_option(&self, name: &str) -> Result<Option<String>, RepoError> {
        sqlx::query_scalar::<_, String>("SELECT value FROM options WHERE name = $1")
            .bind(name)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn set_options(&self, values: &[(&str, &str)]) -> Result<(), RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        for (name, value) in values {
            sqlx::query(
                r#"
                INSERT INTO options (name, value)
                VALUES ($1, $2)
                ON CONFLICT (name)
                DO UPDATE SET value = EXCLUDED.value,
                              updated_at = now()
                "#,
            )
            .bind(*name)
            .bind(*value)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}
