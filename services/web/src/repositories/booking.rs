//! Booking repository for database operations

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiResult, AppError};
use crate::features::{FieldSpec, Retrieval};
use crate::models::{Booking, BookingInput, BookingRow, NewBooking};
use crate::repositories::Resource;

/// Bookings joined with tour and user names, wrapped so filters can use bare column names
const SELECT_BOOKING: &str = r#"
    SELECT * FROM (
        SELECT b.id, b.tour_id, b.user_id, b.price, b.paid, b.checkout_session_id,
               b.version, b.created_at, t.name AS tour_name, u.name AS user_name
        FROM bookings b
        JOIN tours t ON t.id = b.tour_id
        JOIN users u ON u.id = b.user_id
    ) AS bookings
"#;

/// Booking repository
#[derive(Clone)]
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    /// Create a new booking repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_row(&self, id: Uuid) -> sqlx::Result<Option<BookingRow>> {
        sqlx::query_as::<_, BookingRow>(&format!("{SELECT_BOOKING} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Insert a booking. A repeated checkout session id is ignored and
    /// `None` returned.
    pub async fn insert(&self, booking: &NewBooking) -> ApiResult<Option<Booking>> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO bookings (tour_id, user_id, price, paid, checkout_session_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (checkout_session_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(booking.tour_id)
        .bind(booking.user_id)
        .bind(booking.price)
        .bind(booking.paid)
        .bind(&booking.checkout_session_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = inserted else {
            info!(
                "Booking for checkout session {:?} already recorded",
                booking.checkout_session_id
            );
            return Ok(None);
        };

        let id: Uuid = row.get("id");
        info!("Created booking {} for tour {}", id, booking.tour_id);
        Ok(self.find_row(id).await?.map(Booking::from))
    }

    /// Ids of the tours a user has booked
    pub async fn tour_ids_for_user(&self, user_id: Uuid) -> sqlx::Result<Vec<Uuid>> {
        let rows = sqlx::query("SELECT DISTINCT tour_id FROM bookings WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|row| row.get("tour_id")).collect())
    }
}

#[async_trait]
impl Resource for BookingRepository {
    type Record = Booking;
    type Create = BookingInput;
    type Update = BookingInput;

    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("price", "price", "double precision"),
        FieldSpec::new("paid", "paid", "boolean"),
        FieldSpec::new("tour", "tour_id", "uuid"),
        FieldSpec::new("user", "user_id", "uuid"),
        FieldSpec::new("createdAt", "created_at", "timestamptz"),
    ];

    async fn list(&self, retrieval: &Retrieval) -> ApiResult<Vec<Booking>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("{SELECT_BOOKING} WHERE TRUE"));
        retrieval.push_conditions(&mut builder);
        retrieval.push_order(&mut builder);
        retrieval.push_page(&mut builder);

        let rows = builder
            .build_query_as::<BookingRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Booking::from).collect())
    }

    async fn find(&self, id: Uuid) -> ApiResult<Option<Booking>> {
        Ok(self.find_row(id).await?.map(Booking::from))
    }

    async fn create(&self, input: BookingInput) -> ApiResult<Booking> {
        let booking = input.prepare().map_err(AppError::validation)?;
        self.insert(&booking)
            .await?
            .ok_or_else(AppError::no_document)
    }

    async fn update(&self, id: Uuid, input: BookingInput) -> ApiResult<Option<Booking>> {
        let Some(current) = self.find_row(id).await? else {
            return Ok(None);
        };
        let merged = input.merge(&current);

        sqlx::query(
            r#"
            UPDATE bookings
            SET tour_id = $2, user_id = $3, price = $4, paid = $5, version = version + 1
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(merged.tour_id)
        .bind(merged.user_id)
        .bind(merged.price)
        .bind(merged.paid)
        .execute(&self.pool)
        .await?;

        Ok(self.find_row(id).await?.map(Booking::from))
    }

    async fn delete(&self, id: Uuid) -> ApiResult<bool> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
