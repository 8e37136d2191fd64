use bistro_core::domain::customer::CustomerId;
use bistro_core::domain::feedback::{FeedbackId, Rating};

use super::{is_foreign_key_violation, now_rfc3339, RepositoryError};
use crate::DbPool;

pub struct SqlFeedbackRepository {
    pool: DbPool,
}

impl SqlFeedbackRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        customer_id: Option<CustomerId>,
        rating: Rating,
        comments: &str,
    ) -> Result<FeedbackId, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO feedback (customer_id, rating, comments, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(customer_id.map(|id| id.0))
        .bind(i64::from(rating.value()))
        .bind(comments.trim())
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|error| match customer_id {
            Some(id) if is_foreign_key_violation(&error) => {
                RepositoryError::NotFound { entity: "customer", id: id.0 }
            }
            _ => RepositoryError::Database(error),
        })?;

        Ok(FeedbackId(result.last_insert_rowid()))
    }
}
