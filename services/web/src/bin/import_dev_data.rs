//! Load or wipe the development data set
//!
//! ```text
//! import-dev-data --import [dir]
//! import-dev-data --delete
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sqlx::PgPool;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use common::database::{DatabaseConfig, init_pool};
use web::models::{NewReview, NewUser, Role, TourInput};
use web::models::tour::DEFAULT_RATINGS_AVERAGE;
use web::repositories::{ReviewRepository, TourRepository, UserRepository};

const DEFAULT_DIR: &str = "dev-data";

#[derive(Debug, Deserialize)]
struct SeedUser {
    id: Uuid,
    name: String,
    email: String,
    #[serde(default = "default_role")]
    role: Role,
    #[serde(default)]
    photo: Option<String>,
    password: String,
}

fn default_role() -> Role {
    Role::User
}

#[derive(Debug, Deserialize)]
struct SeedTour {
    id: Uuid,
    #[serde(flatten)]
    tour: TourInput,
}

#[derive(Debug, Deserialize)]
struct SeedReview {
    id: Uuid,
    review: String,
    rating: i32,
    tour: Uuid,
    user: Uuid,
}

#[derive(Debug, PartialEq)]
enum Command {
    Import(PathBuf),
    Delete,
}

fn parse_args(args: &[String]) -> Result<Command> {
    match args.first().map(String::as_str) {
        Some("--import") => Ok(Command::Import(
            args.get(1)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DIR)),
        )),
        Some("--delete") => Ok(Command::Delete),
        _ => bail!("Usage: import-dev-data --import [dir] | --delete"),
    }
}

fn read_json<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<Vec<T>> {
    let path = dir.join(file);
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

async fn import(pool: &PgPool, dir: &Path, default_ratings_average: f64) -> Result<()> {
    let users = UserRepository::new(pool.clone());
    let reviews = ReviewRepository::new(pool.clone(), default_ratings_average);
    let tours = TourRepository::new(pool.clone(), users.clone(), reviews.clone());

    let seed_users: Vec<SeedUser> = read_json(dir, "users.json")?;
    let seed_tours: Vec<SeedTour> = read_json(dir, "tours.json")?;
    let seed_reviews: Vec<SeedReview> = read_json(dir, "reviews.json")?;

    // passwords are hashed but not checked against a confirmation
    for seed in &seed_users {
        let user = NewUser {
            name: seed.name.clone(),
            email: seed.email.trim().to_lowercase(),
            photo: seed
                .photo
                .clone()
                .unwrap_or_else(|| web::models::user::DEFAULT_PHOTO.to_string()),
            role: seed.role,
            password: seed.password.clone(),
        };
        users.insert(Some(seed.id), &user).await?;
    }
    info!("Imported {} users", seed_users.len());

    for seed in seed_tours {
        let draft = seed
            .tour
            .prepare()
            .map_err(|errors| anyhow::anyhow!("Invalid tour {}: {}", seed.id, errors.join(". ")))?;
        tours.insert(Some(seed.id), &draft).await?;
    }
    info!("Imported tours");

    for seed in &seed_reviews {
        let review = NewReview {
            review: seed.review.clone(),
            rating: seed.rating,
            tour_id: seed.tour,
            user_id: seed.user,
        };
        reviews.insert(Some(seed.id), &review).await?;
    }
    info!("Imported {} reviews", seed_reviews.len());

    Ok(())
}

async fn delete_all(pool: &PgPool) -> Result<()> {
    sqlx::query("TRUNCATE bookings, reviews, tours, users RESTART IDENTITY CASCADE")
        .execute(pool)
        .await
        .context("Failed to delete data")?;
    info!("Data successfully deleted");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;

    let pool = init_pool(&DatabaseConfig::from_env()?).await?;

    match command {
        Command::Import(dir) => {
            let default_ratings_average = std::env::var("DEFAULT_RATINGS_AVERAGE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_RATINGS_AVERAGE);
            import(&pool, &dir, default_ratings_average).await?;
            info!("Data successfully loaded from {}", dir.display());
        }
        Command::Delete => delete_all(&pool).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_import_defaults_to_dev_data() {
        assert_eq!(
            parse_args(&args(&["--import"])).unwrap(),
            Command::Import(PathBuf::from("dev-data"))
        );
        assert_eq!(
            parse_args(&args(&["--import", "/tmp/seed"])).unwrap(),
            Command::Import(PathBuf::from("/tmp/seed"))
        );
        assert_eq!(parse_args(&args(&["--delete"])).unwrap(), Command::Delete);
        assert!(parse_args(&args(&[])).is_err());
    }

    #[test]
    fn test_bundled_data_parses() {
        let dir = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/dev-data"));
        let users: Vec<SeedUser> = read_json(dir, "users.json").unwrap();
        let tours: Vec<SeedTour> = read_json(dir, "tours.json").unwrap();
        let reviews: Vec<SeedReview> = read_json(dir, "reviews.json").unwrap();

        assert!(users.iter().any(|u| u.role == Role::Admin));
        for seed in tours {
            let draft = seed.tour.prepare().unwrap();
            assert!(draft.guides.iter().all(|g| users.iter().any(|u| u.id == *g)));
        }
        assert!(reviews.iter().all(|r| users.iter().any(|u| u.id == r.user)));
    }
}
