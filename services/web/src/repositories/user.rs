//! User repository for database operations

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiResult, AppError};
use crate::features::{FieldSpec, Retrieval};
use crate::models::{NewUser, SignupInput, User, UserChanges, UserRow, UserSummary, UserUpdate};
use crate::password::{ResetToken, changed_at_now, hash_password};
use crate::repositories::Resource;

const SELECT_USER: &str = r#"
    SELECT id, name, email, photo, role, password_hash, password_changed_at,
           password_reset_token, password_reset_expires, active, version, created_at
    FROM users
"#;

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find an active user by ID
    pub async fn find_active(&self, id: Uuid) -> sqlx::Result<Option<UserRow>> {
        sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE id = $1 AND active = TRUE"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find an active user by (lower-cased) email
    pub async fn find_by_email(&self, email: &str) -> sqlx::Result<Option<UserRow>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "{SELECT_USER} WHERE email = $1 AND active = TRUE"
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await
    }

    /// Insert a validated user, hashing the password. `id` is only set by the seeder.
    pub async fn insert(&self, id: Option<Uuid>, user: &NewUser) -> ApiResult<UserRow> {
        info!("Creating new user: {}", user.email);

        let password_hash = hash_password(&user.password)?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, name, email, photo, role, password_hash)
            VALUES (COALESCE($1, gen_random_uuid()), $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            RETURNING_USER
        ))
        .bind(id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.photo)
        .bind(user.role)
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Replace the password, stamp the change and drop any reset token
    pub async fn set_password(&self, id: Uuid, password: &str) -> ApiResult<UserRow> {
        let password_hash = hash_password(password)?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET password_hash = $2,
                password_changed_at = $3,
                password_reset_token = NULL,
                password_reset_expires = NULL,
                version = version + 1
            WHERE id = $1
            RETURNING {}
            "#,
            RETURNING_USER
        ))
        .bind(id)
        .bind(&password_hash)
        .bind(changed_at_now())
        .fetch_one(&self.pool)
        .await?;

        info!("Password changed for user {}", id);
        Ok(row)
    }

    pub async fn set_reset_token(&self, id: Uuid, token: &ResetToken) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_reset_token = $2, password_reset_expires = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&token.digest)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn clear_reset_token(&self, id: Uuid) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_reset_token = NULL, password_reset_expires = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Active user holding an unexpired reset token with this digest
    pub async fn find_by_reset_token(&self, digest: &str) -> sqlx::Result<Option<UserRow>> {
        sqlx::query_as::<_, UserRow>(&format!(
            r#"{SELECT_USER}
            WHERE password_reset_token = $1
              AND password_reset_expires > NOW()
              AND active = TRUE"#
        ))
        .bind(digest)
        .fetch_optional(&self.pool)
        .await
    }

    /// Merge, validate and store profile changes
    pub async fn update_profile(&self, id: Uuid, update: UserUpdate) -> ApiResult<Option<UserRow>> {
        let Some(current) = self.find_active(id).await? else {
            return Ok(None);
        };
        let changes = update.merge(&current).map_err(AppError::validation)?;
        self.apply(id, &changes).await
    }

    async fn apply(&self, id: Uuid, changes: &UserChanges) -> ApiResult<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET name = $2, email = $3, photo = $4, role = $5, version = version + 1
            WHERE id = $1 AND active = TRUE
            RETURNING {}
            "#,
            RETURNING_USER
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.email)
        .bind(&changes.photo)
        .bind(changes.role)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Soft delete
    pub async fn deactivate(&self, id: Uuid) -> sqlx::Result<()> {
        sqlx::query("UPDATE users SET active = FALSE, version = version + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        info!("Deactivated user {}", id);
        Ok(())
    }

    /// Active users among `ids`, in the order given
    pub async fn summaries(&self, ids: &[Uuid]) -> sqlx::Result<Vec<UserSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let found = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT id, name, email, photo, role
            FROM users
            WHERE id = ANY($1) AND active = TRUE
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids
            .iter()
            .filter_map(|id| found.iter().find(|user| user.id == *id).cloned())
            .collect())
    }
}

const RETURNING_USER: &str = "id, name, email, photo, role, password_hash, password_changed_at, \
     password_reset_token, password_reset_expires, active, version, created_at";

#[async_trait]
impl Resource for UserRepository {
    type Record = User;
    type Create = SignupInput;
    type Update = UserUpdate;

    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("name", "name", "text"),
        FieldSpec::new("email", "email", "text"),
        FieldSpec::new("role", "role", "user_role"),
        FieldSpec::new("photo", "photo", "text"),
        FieldSpec::new("createdAt", "created_at", "timestamptz"),
    ];

    async fn list(&self, retrieval: &Retrieval) -> ApiResult<Vec<User>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("{SELECT_USER} WHERE active = TRUE"));
        retrieval.push_conditions(&mut builder);
        retrieval.push_order(&mut builder);
        retrieval.push_page(&mut builder);

        let rows = builder
            .build_query_as::<UserRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn find(&self, id: Uuid) -> ApiResult<Option<User>> {
        Ok(self.find_active(id).await?.map(User::from))
    }

    async fn create(&self, input: SignupInput) -> ApiResult<User> {
        let user = input.prepare().map_err(AppError::validation)?;
        Ok(self.insert(None, &user).await?.into())
    }

    async fn update(&self, id: Uuid, input: UserUpdate) -> ApiResult<Option<User>> {
        Ok(self.update_profile(id, input).await?.map(User::from))
    }

    async fn delete(&self, id: Uuid) -> ApiResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
