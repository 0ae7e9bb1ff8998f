//! Application state shared across handlers

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::FromRef;
use sqlx::PgPool;
use tera::Tera;

use crate::config::AppConfig;
use crate::email::{EmailComposer, Mailer};
use crate::jwt::JwtService;
use crate::payment::StripeClient;
use crate::rate_limiter::{RateLimiter, RateLimiterConfig};
use crate::repositories::{BookingRepository, ReviewRepository, TourRepository, UserRepository};
use crate::uploads::ImageStore;

/// Application state shared across handlers
///
/// Every field has its own type so handlers can extract just what they
/// need with `State<T>`.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: PgPool,
    pub jwt: JwtService,
    pub users: UserRepository,
    pub tours: TourRepository,
    pub reviews: ReviewRepository,
    pub bookings: BookingRepository,
    pub templates: Arc<Tera>,
    pub emails: EmailComposer,
    pub payments: StripeClient,
    pub rate_limiter: RateLimiter,
    pub images: ImageStore,
}

/// Load every template under `dir`
pub fn load_templates(dir: &str) -> Result<Tera> {
    Tera::new(&format!("{}/**/*", dir.trim_end_matches('/')))
        .with_context(|| format!("Failed to load templates from {}", dir))
}

impl AppState {
    pub fn new(config: AppConfig, db_pool: PgPool, mailer: Arc<dyn Mailer>) -> Result<Self> {
        let templates = Arc::new(load_templates(&config.templates_dir)?);

        let users = UserRepository::new(db_pool.clone());
        let reviews = ReviewRepository::new(db_pool.clone(), config.default_ratings_average);
        let tours = TourRepository::new(db_pool.clone(), users.clone(), reviews.clone());
        let bookings = BookingRepository::new(db_pool.clone());

        Ok(Self {
            jwt: JwtService::from_config(&config),
            emails: EmailComposer::new(templates.clone(), mailer),
            payments: StripeClient::from_config(&config),
            rate_limiter: RateLimiter::new(RateLimiterConfig::from(&config)),
            images: ImageStore::new(&config.public_dir),
            templates,
            users,
            reviews,
            tours,
            bookings,
            db_pool,
            config: Arc::new(config),
        })
    }
}
