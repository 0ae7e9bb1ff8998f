//! Review repository, keeps tour ratings in step with its reviews

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ApiResult, AppError};
use crate::features::{FieldSpec, Retrieval};
use crate::models::tour::round_rating;
use crate::models::{NewReview, Review, ReviewInput, ReviewRow, ReviewUpdate};
use crate::repositories::Resource;

/// Reviews joined with their active author, wrapped so filters can use bare column names
const SELECT_REVIEW: &str = r#"
    SELECT * FROM (
        SELECT r.id, r.review, r.rating, r.tour_id, r.user_id, r.version, r.created_at,
               u.name AS user_name, u.photo AS user_photo
        FROM reviews r
        LEFT JOIN users u ON u.id = r.user_id AND u.active = TRUE
    ) AS reviews
"#;

/// Review repository
#[derive(Clone)]
pub struct ReviewRepository {
    pool: PgPool,
    default_ratings_average: f64,
}

impl ReviewRepository {
    /// Create a new review repository
    pub fn new(pool: PgPool, default_ratings_average: f64) -> Self {
        Self {
            pool,
            default_ratings_average,
        }
    }

    async fn find_row(&self, id: Uuid) -> sqlx::Result<Option<ReviewRow>> {
        sqlx::query_as::<_, ReviewRow>(&format!("{SELECT_REVIEW} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Every review of a tour, oldest first
    pub async fn for_tour(&self, tour_id: Uuid) -> sqlx::Result<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            "{SELECT_REVIEW} WHERE tour_id = $1 ORDER BY created_at, id"
        ))
        .bind(tour_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Review::from).collect())
    }

    /// Insert a validated review. `id` is only set by the seeder.
    pub async fn insert(&self, id: Option<Uuid>, review: &NewReview) -> ApiResult<Review> {
        let row = sqlx::query(
            r#"
            INSERT INTO reviews (id, review, rating, tour_id, user_id)
            VALUES (COALESCE($1, gen_random_uuid()), $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(&review.review)
        .bind(review.rating)
        .bind(review.tour_id)
        .bind(review.user_id)
        .fetch_one(&self.pool)
        .await?;
        let id: Uuid = row.get("id");

        self.recalculate(review.tour_id).await?;
        info!("Created review {} for tour {}", id, review.tour_id);

        self.find_row(id)
            .await?
            .map(Review::from)
            .ok_or_else(AppError::no_document)
    }

    /// Recompute the owning tour's rating average and count
    pub async fn recalculate(&self, tour_id: Uuid) -> sqlx::Result<()> {
        recalculate_ratings(&self.pool, tour_id, self.default_ratings_average).await
    }
}

/// Average and count for a tour given its aggregated reviews
///
/// With no reviews the tour falls back to `default_average` and a count of 0.
pub fn rating_summary(count: i64, average: Option<f64>, default_average: f64) -> (f64, i32) {
    match average {
        Some(average) if count > 0 => (round_rating(average), count as i32),
        _ => (default_average, 0),
    }
}

/// Aggregate a tour's reviews and store the result on the tour
pub async fn recalculate_ratings(pool: &PgPool, tour_id: Uuid, default_average: f64) -> sqlx::Result<()> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS n_rating, AVG(rating)::DOUBLE PRECISION AS avg_rating
        FROM reviews
        WHERE tour_id = $1
        "#,
    )
    .bind(tour_id)
    .fetch_one(pool)
    .await?;

    let (average, quantity) = rating_summary(
        row.get::<i64, _>("n_rating"),
        row.get::<Option<f64>, _>("avg_rating"),
        default_average,
    );

    sqlx::query("UPDATE tours SET ratings_average = $2, ratings_quantity = $3 WHERE id = $1")
        .bind(tour_id)
        .bind(average)
        .bind(quantity)
        .execute(pool)
        .await?;

    debug!(
        "Tour {} now rated {} over {} reviews",
        tour_id, average, quantity
    );
    Ok(())
}

#[async_trait]
impl Resource for ReviewRepository {
    type Record = Review;
    type Create = ReviewInput;
    type Update = ReviewUpdate;

    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("rating", "rating", "integer"),
        FieldSpec::new("tour", "tour_id", "uuid"),
        FieldSpec::new("user", "user_id", "uuid"),
        FieldSpec::new("createdAt", "created_at", "timestamptz"),
    ];

    async fn list(&self, retrieval: &Retrieval) -> ApiResult<Vec<Review>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("{SELECT_REVIEW} WHERE TRUE"));
        retrieval.push_conditions(&mut builder);
        retrieval.push_order(&mut builder);
        retrieval.push_page(&mut builder);

        let rows = builder
            .build_query_as::<ReviewRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Review::from).collect())
    }

    async fn find(&self, id: Uuid) -> ApiResult<Option<Review>> {
        Ok(self.find_row(id).await?.map(Review::from))
    }

    async fn create(&self, input: ReviewInput) -> ApiResult<Review> {
        let review = input.prepare().map_err(AppError::validation)?;
        self.insert(None, &review).await
    }

    async fn update(&self, id: Uuid, input: ReviewUpdate) -> ApiResult<Option<Review>> {
        let Some(current) = self.find_row(id).await? else {
            return Ok(None);
        };
        let (review, rating) = input.merge(&current).map_err(AppError::validation)?;

        sqlx::query(
            r#"
            UPDATE reviews
            SET review = $2, rating = $3, version = version + 1
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&review)
        .bind(rating)
        .execute(&self.pool)
        .await?;

        self.recalculate(current.tour_id).await?;
        Ok(self.find_row(id).await?.map(Review::from))
    }

    async fn delete(&self, id: Uuid) -> ApiResult<bool> {
        let deleted = sqlx::query("DELETE FROM reviews WHERE id = $1 RETURNING tour_id")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match deleted {
            Some(row) => {
                self.recalculate(row.get("tour_id")).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_summary_averages() {
        assert_eq!(rating_summary(2, Some(4.5), 4.5), (4.5, 2));
        assert_eq!(rating_summary(3, Some(13.0 / 3.0), 4.5), (4.3, 3));
    }

    #[test]
    fn test_rating_summary_resets_without_reviews() {
        assert_eq!(rating_summary(0, None, 4.5), (4.5, 0));
        assert_eq!(rating_summary(0, None, 3.0), (3.0, 0));
    }
}
