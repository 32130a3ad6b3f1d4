use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::error::Error;
use uuid::Uuid;

use tandem_domain::repository::ReviewRepository;
use tandem_domain::review::{NewReview, Review, ReviewUpdate};

const REVIEW_COLUMNS: &str = "id, ride_id, author_id, rating, comment, created_at";

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    ride_id: Uuid,
    author_id: Uuid,
    rating: i32,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            ride_id: row.ride_id,
            author_id: row.author_id,
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
        }
    }
}

fn select_review_sql(suffix: &str) -> String {
    format!("SELECT {} FROM reviews {}", REVIEW_COLUMNS, suffix)
}

pub struct PgReviewRepository {
    pool: PgPool,
}

impl PgReviewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewRepository for PgReviewRepository {
    async fn create(
        &self,
        author_id: Uuid,
        review: NewReview,
    ) -> Result<Review, Box<dyn Error + Send + Sync>> {
        let review = Review {
            id: Uuid::new_v4(),
            ride_id: review.ride_id,
            author_id,
            rating: review.rating,
            comment: review.comment,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO reviews (id, ride_id, author_id, rating, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(review.id)
        .bind(review.ride_id)
        .bind(review.author_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .execute(&self.pool)
        .await?;

        Ok(review)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Review>, Box<dyn Error + Send + Sync>> {
        let row = sqlx::query_as::<_, ReviewRow>(&select_review_sql("WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Review::from))
    }

    async fn list_by_ride(
        &self,
        ride_id: Uuid,
    ) -> Result<Vec<Review>, Box<dyn Error + Send + Sync>> {
        let rows = sqlx::query_as::<_, ReviewRow>(&select_review_sql(
            "WHERE ride_id = $1 ORDER BY created_at DESC",
        ))
        .bind(ride_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Review::from).collect())
    }

    async fn list_by_author(
        &self,
        author_id: Uuid,
    ) -> Result<Vec<Review>, Box<dyn Error + Send + Sync>> {
        let rows = sqlx::query_as::<_, ReviewRow>(&select_review_sql(
            "WHERE author_id = $1 ORDER BY created_at DESC",
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Review::from).collect())
    }

    async fn update(
        &self,
        id: Uuid,
        patch: ReviewUpdate,
    ) -> Result<Option<Review>, Box<dyn Error + Send + Sync>> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            "UPDATE reviews SET rating = COALESCE($2, rating), comment = COALESCE($3, comment) \
             WHERE id = $1 RETURNING {}",
            REVIEW_COLUMNS
        ))
        .bind(id)
        .bind(patch.rating)
        .bind(patch.comment)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Review::from))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, Box<dyn Error + Send + Sync>> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
