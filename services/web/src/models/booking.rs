use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::validation::Violations;

/// Booking row joined with tour and user names
#[derive(Debug, Clone, FromRow)]
pub struct BookingRow {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub price: f64,
    pub paid: bool,
    pub checkout_session_id: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub tour_name: String,
    pub user_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub tour: Uuid,
    pub user: Uuid,
    pub tour_name: String,
    pub user_name: String,
    pub price: f64,
    pub paid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_session_id: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Booking {
            id: row.id,
            tour: row.tour_id,
            user: row.user_id,
            tour_name: row.tour_name,
            user_name: row.user_name,
            price: row.price,
            paid: row.paid,
            checkout_session_id: row.checkout_session_id,
            version: row.version,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingInput {
    pub tour: Option<Uuid>,
    pub user: Option<Uuid>,
    pub price: Option<f64>,
    pub paid: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub price: f64,
    pub paid: bool,
    pub checkout_session_id: Option<String>,
}

impl BookingInput {
    pub fn prepare(self) -> Result<NewBooking, Vec<String>> {
        let mut violations = Violations::new();
        violations
            .require(self.tour.is_some(), "Booking must belong to a tour!")
            .require(self.user.is_some(), "Booking must belong to a user!")
            .require(self.price.is_some(), "Booking must have a price.");
        violations.into_result()?;

        match (self.tour, self.user, self.price) {
            (Some(tour_id), Some(user_id), Some(price)) => Ok(NewBooking {
                tour_id,
                user_id,
                price,
                paid: self.paid.unwrap_or(true),
                checkout_session_id: None,
            }),
            _ => Err(vec!["Invalid booking".to_string()]),
        }
    }

    /// Overlay onto a stored booking
    pub fn merge(self, current: &BookingRow) -> NewBooking {
        NewBooking {
            tour_id: self.tour.unwrap_or(current.tour_id),
            user_id: self.user.unwrap_or(current.user_id),
            price: self.price.unwrap_or(current.price),
            paid: self.paid.unwrap_or(current.paid),
            checkout_session_id: current.checkout_session_id.clone(),
        }
    }
}
