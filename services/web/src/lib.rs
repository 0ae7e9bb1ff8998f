//! Natours tour booking service
//!
//! JSON API under `/api/v1`, server rendered pages, image uploads, email
//! delivery and the payment webhook, all served from one axum router.

pub mod config;
pub mod email;
pub mod error;
pub mod extractors;
pub mod features;
pub mod geo;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod payment;
pub mod rate_limiter;
pub mod repositories;
pub mod routes;
pub mod state;
pub mod uploads;
pub mod validation;

pub use config::AppConfig;
pub use error::{ApiResult, AppError};
pub use routes::create_router;
pub use state::AppState;
