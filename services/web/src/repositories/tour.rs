//! Tour repository: CRUD, aggregations and start-location lookups

use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row, types::Json};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ApiResult, AppError};
use crate::features::{FieldSpec, Retrieval};
use crate::models::{Location, Tour, TourDraft, TourInput, TourRow};
use crate::repositories::{ReviewRepository, UserRepository};
use crate::repositories::Resource;

const TOUR_COLUMNS: &str = "id, name, slug, duration, max_group_size, difficulty, \
     ratings_average, ratings_quantity, price, price_discount, summary, description, \
     image_cover, images, start_dates, secret_tour, start_location, locations, guides, \
     version, created_at";

/// Base query for reads; secret tours never leave this module
fn select_tours() -> String {
    format!("SELECT {TOUR_COLUMNS} FROM tours WHERE secret_tour = FALSE")
}

/// Per-difficulty statistics over well-rated tours
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TourStats {
    pub difficulty: String,
    pub num_tours: i64,
    pub num_ratings: i64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

/// Tour starts within one month
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPlan {
    pub month: i32,
    pub num_tour_starts: i64,
    pub tours: Vec<String>,
}

/// A tour's start location
#[derive(Debug, Clone)]
pub struct StartPoint {
    pub id: Uuid,
    pub name: String,
    pub location: Location,
}

/// Tour repository
#[derive(Clone)]
pub struct TourRepository {
    pool: PgPool,
    users: UserRepository,
    reviews: ReviewRepository,
}

impl TourRepository {
    /// Create a new tour repository
    pub fn new(pool: PgPool, users: UserRepository, reviews: ReviewRepository) -> Self {
        Self {
            pool,
            users,
            reviews,
        }
    }

    async fn find_row(&self, id: Uuid) -> sqlx::Result<Option<TourRow>> {
        sqlx::query_as::<_, TourRow>(&format!("{} AND id = $1", select_tours()))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Embed guides into every row
    async fn populate(&self, rows: Vec<TourRow>) -> sqlx::Result<Vec<Tour>> {
        let mut guide_ids: Vec<Uuid> = rows.iter().flat_map(|row| row.guides.clone()).collect();
        guide_ids.sort();
        guide_ids.dedup();
        let guides = self.users.summaries(&guide_ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let embedded = row
                    .guides
                    .iter()
                    .filter_map(|id| guides.iter().find(|guide| guide.id == *id).cloned())
                    .collect();
                Tour::after_load(row, embedded)
            })
            .collect())
    }

    async fn populate_one(&self, row: TourRow) -> sqlx::Result<Tour> {
        let guides = self.users.summaries(&row.guides).await?;
        Ok(Tour::after_load(row, guides))
    }

    /// Is there a visible tour with this id
    pub async fn exists(&self, id: Uuid) -> sqlx::Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM tours WHERE id = $1 AND secret_tour = FALSE)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
    }

    /// Tour with guides and reviews, looked up by slug
    pub async fn find_by_slug(&self, slug: &str) -> ApiResult<Option<Tour>> {
        let row = sqlx::query_as::<_, TourRow>(&format!("{} AND slug = $1", select_tours()))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let reviews = self.reviews.for_tour(row.id).await?;
                Ok(Some(self.populate_one(row).await?.with_reviews(reviews)))
            }
            None => Ok(None),
        }
    }

    /// Tours among `ids`, newest first
    pub async fn list_by_ids(&self, ids: &[Uuid]) -> ApiResult<Vec<Tour>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, TourRow>(&format!(
            "{} AND id = ANY($1) ORDER BY created_at DESC, id",
            select_tours()
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(self.populate(rows).await?)
    }

    /// Insert a validated tour. `id` is only set by the seeder.
    pub async fn insert(&self, id: Option<Uuid>, draft: &TourDraft) -> ApiResult<Tour> {
        let row = sqlx::query_as::<_, TourRow>(&format!(
            r#"
            INSERT INTO tours (
                id, name, slug, duration, max_group_size, difficulty, ratings_average,
                ratings_quantity, price, price_discount, summary, description, image_cover,
                images, start_dates, secret_tour, start_location, locations, guides
            )
            VALUES (
                COALESCE($1, gen_random_uuid()), $2, $3, $4, $5, $6, $7,
                $8, $9, $10, $11, $12, $13,
                $14, $15, $16, $17, $18, $19
            )
            RETURNING {TOUR_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&draft.name)
        .bind(&draft.slug)
        .bind(draft.duration)
        .bind(draft.max_group_size)
        .bind(draft.difficulty)
        .bind(draft.ratings_average)
        .bind(draft.ratings_quantity)
        .bind(draft.price)
        .bind(draft.price_discount)
        .bind(&draft.summary)
        .bind(&draft.description)
        .bind(&draft.image_cover)
        .bind(&draft.images)
        .bind(&draft.start_dates)
        .bind(draft.secret_tour)
        .bind(draft.start_location.as_ref().map(Json))
        .bind(Json(&draft.locations))
        .bind(&draft.guides)
        .fetch_one(&self.pool)
        .await?;

        info!("Created tour {} ({})", row.name, row.id);
        Ok(self.populate_one(row).await?)
    }

    async fn store(&self, id: Uuid, draft: &TourDraft) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE tours
            SET name = $2, slug = $3, duration = $4, max_group_size = $5, difficulty = $6,
                ratings_average = $7, ratings_quantity = $8, price = $9, price_discount = $10,
                summary = $11, description = $12, image_cover = $13, images = $14,
                start_dates = $15, secret_tour = $16, start_location = $17, locations = $18,
                guides = $19, version = version + 1
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&draft.name)
        .bind(&draft.slug)
        .bind(draft.duration)
        .bind(draft.max_group_size)
        .bind(draft.difficulty)
        .bind(draft.ratings_average)
        .bind(draft.ratings_quantity)
        .bind(draft.price)
        .bind(draft.price_discount)
        .bind(&draft.summary)
        .bind(&draft.description)
        .bind(&draft.image_cover)
        .bind(&draft.images)
        .bind(&draft.start_dates)
        .bind(draft.secret_tour)
        .bind(draft.start_location.as_ref().map(Json))
        .bind(Json(&draft.locations))
        .bind(&draft.guides)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Statistics grouped by difficulty for tours rated 4.5 and above
    pub async fn stats(&self) -> sqlx::Result<Vec<TourStats>> {
        sqlx::query_as::<_, TourStats>(
            r#"
            SELECT UPPER(difficulty::TEXT) AS difficulty,
                   COUNT(*) AS num_tours,
                   COALESCE(SUM(ratings_quantity), 0)::BIGINT AS num_ratings,
                   AVG(ratings_average) AS avg_rating,
                   AVG(price) AS avg_price,
                   MIN(price) AS min_price,
                   MAX(price) AS max_price
            FROM tours
            WHERE secret_tour = FALSE AND ratings_average >= 4.5
            GROUP BY UPPER(difficulty::TEXT)
            ORDER BY avg_price ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Tour starts per month of `year`, busiest months first
    pub async fn monthly_plan(&self, year: i32) -> sqlx::Result<Vec<MonthlyPlan>> {
        sqlx::query_as::<_, MonthlyPlan>(
            r#"
            SELECT EXTRACT(MONTH FROM s.start_date AT TIME ZONE 'UTC')::INTEGER AS month,
                   COUNT(*) AS num_tour_starts,
                   ARRAY_AGG(t.name ORDER BY t.name) AS tours
            FROM tours t
            CROSS JOIN LATERAL UNNEST(t.start_dates) AS s(start_date)
            WHERE t.secret_tour = FALSE
              AND EXTRACT(YEAR FROM s.start_date AT TIME ZONE 'UTC')::INTEGER = $1
            GROUP BY month
            ORDER BY num_tour_starts DESC, month ASC
            LIMIT 12
            "#,
        )
        .bind(year)
        .fetch_all(&self.pool)
        .await
    }

    /// Start locations of every visible tour that has one
    pub async fn start_points(&self) -> sqlx::Result<Vec<StartPoint>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, start_location
            FROM tours
            WHERE secret_tour = FALSE AND start_location IS NOT NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let Json(location): Json<Location> = row.get("start_location");
                StartPoint {
                    id: row.get("id"),
                    name: row.get("name"),
                    location,
                }
            })
            .collect())
    }
}

#[async_trait]
impl Resource for TourRepository {
    type Record = Tour;
    type Create = TourInput;
    type Update = TourInput;

    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("name", "name", "text"),
        FieldSpec::new("slug", "slug", "text"),
        FieldSpec::new("duration", "duration", "integer"),
        FieldSpec::new("maxGroupSize", "max_group_size", "integer"),
        FieldSpec::new("difficulty", "difficulty", "tour_difficulty"),
        FieldSpec::new("ratingsAverage", "ratings_average", "double precision"),
        FieldSpec::new("ratingsQuantity", "ratings_quantity", "integer"),
        FieldSpec::new("price", "price", "double precision"),
        FieldSpec::new("priceDiscount", "price_discount", "double precision"),
        FieldSpec::new("summary", "summary", "text"),
        FieldSpec::new("createdAt", "created_at", "timestamptz"),
    ];

    async fn list(&self, retrieval: &Retrieval) -> ApiResult<Vec<Tour>> {
        let started = Instant::now();

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(select_tours());
        retrieval.push_conditions(&mut builder);
        retrieval.push_order(&mut builder);
        retrieval.push_page(&mut builder);

        let rows = builder
            .build_query_as::<TourRow>()
            .fetch_all(&self.pool)
            .await?;
        let tours = self.populate(rows).await?;

        debug!("Tour query took {} ms", started.elapsed().as_millis());
        Ok(tours)
    }

    async fn find(&self, id: Uuid) -> ApiResult<Option<Tour>> {
        let Some(row) = self.find_row(id).await? else {
            return Ok(None);
        };
        let reviews = self.reviews.for_tour(id).await?;
        Ok(Some(self.populate_one(row).await?.with_reviews(reviews)))
    }

    async fn create(&self, input: TourInput) -> ApiResult<Tour> {
        let draft = input.prepare().map_err(AppError::validation)?;
        self.insert(None, &draft).await
    }

    async fn update(&self, id: Uuid, input: TourInput) -> ApiResult<Option<Tour>> {
        let Some(current) = self.find_row(id).await? else {
            return Ok(None);
        };
        let draft = TourInput::from(&current)
            .overlay(input)
            .prepare()
            .map_err(AppError::validation)?;

        self.store(id, &draft).await?;
        info!("Updated tour {}", id);

        match self.find_row(id).await? {
            Some(row) => Ok(Some(self.populate_one(row).await?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid) -> ApiResult<bool> {
        let result = sqlx::query("DELETE FROM tours WHERE id = $1 AND secret_tour = FALSE")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
