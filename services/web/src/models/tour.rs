use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

use crate::models::{review::Review, user::UserSummary};
use crate::validation::{
    Violations, validate_price_discount, validate_ratings_average, validate_tour_name,
};

pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "tour_difficulty", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Difficult => "difficult",
        })
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "difficult" => Ok(Difficulty::Difficult),
            _ => Err("Difficulty must be either: easy, medium or difficult".to_string()),
        }
    }
}

/// GeoJSON-like point, coordinates are `[lng, lat]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "type", default = "point")]
    pub kind: String,
    pub coordinates: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<i32>,
}

fn point() -> String {
    "Point".to_string()
}

#[derive(Debug, Clone, FromRow)]
pub struct TourRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub secret_tour: bool,
    pub start_location: Option<Json<Location>>,
    pub locations: Json<Vec<Location>>,
    pub guides: Vec<Uuid>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

/// Tour as sent to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_discount: Option<f64>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub secret_tour: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_location: Option<Location>,
    pub locations: Vec<Location>,
    pub guides: Vec<UserSummary>,
    pub duration_weeks: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<Review>>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

impl Tour {
    /// Post-load enrichment: embeds guides and derives `durationWeeks`
    pub fn after_load(row: TourRow, guides: Vec<UserSummary>) -> Self {
        Tour {
            id: row.id,
            duration_weeks: f64::from(row.duration) / 7.0,
            name: row.name,
            slug: row.slug,
            duration: row.duration,
            max_group_size: row.max_group_size,
            difficulty: row.difficulty,
            ratings_average: row.ratings_average,
            ratings_quantity: row.ratings_quantity,
            price: row.price,
            price_discount: row.price_discount,
            summary: row.summary,
            description: row.description,
            image_cover: row.image_cover,
            images: row.images,
            start_dates: row.start_dates,
            secret_tour: row.secret_tour,
            start_location: row.start_location.map(|Json(location)| location),
            locations: row.locations.0,
            guides,
            reviews: None,
            version: row.version,
            created_at: row.created_at,
        }
    }

    pub fn with_reviews(mut self, reviews: Vec<Review>) -> Self {
        self.reviews = Some(reviews);
        self
    }
}

/// Create and partial update payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourInput {
    pub name: Option<String>,
    pub duration: Option<i32>,
    pub max_group_size: Option<i32>,
    pub difficulty: Option<String>,
    pub ratings_average: Option<f64>,
    pub ratings_quantity: Option<i32>,
    pub price: Option<f64>,
    pub price_discount: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    pub secret_tour: Option<bool>,
    pub start_location: Option<Location>,
    pub locations: Option<Vec<Location>>,
    pub guides: Option<Vec<Uuid>>,
}

/// Validated tour fields with derived values filled in
#[derive(Debug, Clone, PartialEq)]
pub struct TourDraft {
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub secret_tour: bool,
    pub start_location: Option<Location>,
    pub locations: Vec<Location>,
    pub guides: Vec<Uuid>,
}

impl From<&TourRow> for TourInput {
    fn from(row: &TourRow) -> Self {
        TourInput {
            name: Some(row.name.clone()),
            duration: Some(row.duration),
            max_group_size: Some(row.max_group_size),
            difficulty: Some(row.difficulty.to_string()),
            ratings_average: Some(row.ratings_average),
            ratings_quantity: Some(row.ratings_quantity),
            price: Some(row.price),
            price_discount: row.price_discount,
            summary: Some(row.summary.clone()),
            description: row.description.clone(),
            image_cover: Some(row.image_cover.clone()),
            images: Some(row.images.clone()),
            start_dates: Some(row.start_dates.clone()),
            secret_tour: Some(row.secret_tour),
            start_location: row.start_location.as_ref().map(|l| l.0.clone()),
            locations: Some(row.locations.0.clone()),
            guides: Some(row.guides.clone()),
        }
    }
}

impl TourInput {
    /// Fields present in `patch` replace those in `self`
    pub fn overlay(self, patch: TourInput) -> TourInput {
        TourInput {
            name: patch.name.or(self.name),
            duration: patch.duration.or(self.duration),
            max_group_size: patch.max_group_size.or(self.max_group_size),
            difficulty: patch.difficulty.or(self.difficulty),
            ratings_average: patch.ratings_average.or(self.ratings_average),
            ratings_quantity: patch.ratings_quantity.or(self.ratings_quantity),
            price: patch.price.or(self.price),
            price_discount: patch.price_discount.or(self.price_discount),
            summary: patch.summary.or(self.summary),
            description: patch.description.or(self.description),
            image_cover: patch.image_cover.or(self.image_cover),
            images: patch.images.or(self.images),
            start_dates: patch.start_dates.or(self.start_dates),
            secret_tour: patch.secret_tour.or(self.secret_tour),
            start_location: patch.start_location.or(self.start_location),
            locations: patch.locations.or(self.locations),
            guides: patch.guides.or(self.guides),
        }
    }

    /// Validate and derive: trims text, slugifies the name, rounds the rating
    pub fn prepare(self) -> Result<TourDraft, Vec<String>> {
        let name = self.name.map(|n| n.trim().to_string()).unwrap_or_default();
        let summary = self.summary.map(|s| s.trim().to_string()).unwrap_or_default();
        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let ratings_average = round_rating(self.ratings_average.unwrap_or(DEFAULT_RATINGS_AVERAGE));

        let mut violations = Violations::new();
        violations
            .check(validate_tour_name(&name))
            .require(self.duration.is_some(), "A tour must have a duration")
            .require(
                self.max_group_size.is_some(),
                "A tour must have a maximum group size",
            )
            .require(self.difficulty.is_some(), "A tour must have a difficulty")
            .require(self.price.is_some(), "A tour must have a price")
            .require(!summary.is_empty(), "A tour must have a summary")
            .require(
                self.image_cover.as_deref().is_some_and(|c| !c.is_empty()),
                "A tour must have a cover image",
            )
            .check(validate_ratings_average(ratings_average));

        if self.duration.is_some_and(|d| d <= 0) {
            violations.check(Err("Duration must be at least one day".to_string()));
        }
        if self.max_group_size.is_some_and(|s| s <= 0) {
            violations.check(Err("Group size must be at least one".to_string()));
        }
        if let Some(price) = self.price {
            violations
                .require(price > 0.0, "Price must be positive")
                .check(validate_price_discount(self.price_discount, price));
        }
        let difficulty = match self.difficulty.as_deref().map(Difficulty::from_str) {
            Some(Ok(difficulty)) => Some(difficulty),
            Some(Err(message)) => {
                violations.check(Err(message));
                None
            }
            None => None,
        };
        violations.into_result()?;

        match (
            self.duration,
            self.max_group_size,
            difficulty,
            self.price,
            self.image_cover,
        ) {
            (Some(duration), Some(max_group_size), Some(difficulty), Some(price), Some(image_cover)) => {
                Ok(TourDraft {
                    slug: slug::slugify(&name),
                    name,
                    duration,
                    max_group_size,
                    difficulty,
                    ratings_average,
                    ratings_quantity: self.ratings_quantity.unwrap_or(0),
                    price,
                    price_discount: self.price_discount,
                    summary,
                    description,
                    image_cover,
                    images: self.images.unwrap_or_default(),
                    start_dates: self.start_dates.unwrap_or_default(),
                    secret_tour: self.secret_tour.unwrap_or(false),
                    start_location: self.start_location,
                    locations: self.locations.unwrap_or_default(),
                    guides: self.guides.unwrap_or_default(),
                })
            }
            _ => Err(vec!["Invalid tour".to_string()]),
        }
    }
}

/// Round to one decimal, e.g. 4.666 -> 4.7
pub fn round_rating(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
