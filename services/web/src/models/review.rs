use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::validation::{Violations, validate_rating};

/// Review row joined with its (active) author
#[derive(Debug, Clone, FromRow)]
pub struct ReviewRow {
    pub id: Uuid,
    pub review: String,
    pub rating: i32,
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub user_name: Option<String>,
    pub user_photo: Option<String>,
}

/// Author embedded in a review
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReviewAuthor {
    pub id: Uuid,
    pub name: String,
    pub photo: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub review: String,
    pub rating: i32,
    pub tour: Uuid,
    pub user: Option<ReviewAuthor>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        let user = match (row.user_name, row.user_photo) {
            (Some(name), Some(photo)) => Some(ReviewAuthor {
                id: row.user_id,
                name,
                photo,
            }),
            _ => None,
        };

        Review {
            id: row.id,
            review: row.review,
            rating: row.rating,
            tour: row.tour_id,
            user,
            version: row.version,
            created_at: row.created_at,
        }
    }
}

/// Create payload; `tour` and `user` are filled from the route and session
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewInput {
    pub review: Option<String>,
    pub rating: Option<i32>,
    pub tour: Option<Uuid>,
    pub user: Option<Uuid>,
}

/// A validated review ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub review: String,
    pub rating: i32,
    pub tour_id: Uuid,
    pub user_id: Uuid,
}

impl ReviewInput {
    pub fn prepare(self) -> Result<NewReview, Vec<String>> {
        let review = self.review.map(|r| r.trim().to_string()).unwrap_or_default();

        let mut violations = Violations::new();
        violations
            .require(!review.is_empty(), "Reviews cannot be empty")
            .require(self.rating.is_some(), "A review must have a rating")
            .require(self.tour.is_some(), "Review must belong to a tour.")
            .require(self.user.is_some(), "Review must belong to a user.");
        if let Some(rating) = self.rating {
            violations.check(validate_rating(rating));
        }
        violations.into_result()?;

        match (self.rating, self.tour, self.user) {
            (Some(rating), Some(tour_id), Some(user_id)) => Ok(NewReview {
                review,
                rating,
                tour_id,
                user_id,
            }),
            _ => Err(vec!["Invalid review".to_string()]),
        }
    }
}

/// Partial update payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewUpdate {
    pub review: Option<String>,
    pub rating: Option<i32>,
}

impl ReviewUpdate {
    /// Overlay onto the stored review and re-run validation
    pub fn merge(self, current: &ReviewRow) -> Result<(String, i32), Vec<String>> {
        let review = self
            .review
            .map(|r| r.trim().to_string())
            .unwrap_or_else(|| current.review.clone());
        let rating = self.rating.unwrap_or(current.rating);

        let mut violations = Violations::new();
        violations
            .require(!review.is_empty(), "Reviews cannot be empty")
            .check(validate_rating(rating));
        violations.into_result()?;

        Ok((review, rating))
    }
}
