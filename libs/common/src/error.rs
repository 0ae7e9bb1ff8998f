//! Errors raised while setting up the database
//!
//! Query failures are not wrapped here; the service maps `sqlx::Error`
//! directly into its own error type.

use sqlx::Error as SqlxError;
use sqlx::migrate::MigrateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The pool could not open a connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// A pending migration failed to apply
    #[error("Database migration error: {0}")]
    Migration(#[from] MigrateError),

    /// Missing or malformed connection settings
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_configuration_message() {
        let err = DatabaseError::Configuration("DATABASE environment variable not set".into());
        assert_eq!(
            err.to_string(),
            "Database configuration error: DATABASE environment variable not set"
        );
        assert!(err.source().is_none());
    }

    #[test]
    fn test_migration_keeps_its_source() {
        let err = DatabaseError::from(MigrateError::VersionMissing(3));
        assert!(err.to_string().starts_with("Database migration error:"));
        assert!(err.source().is_some());
    }
}
