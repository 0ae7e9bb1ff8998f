use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::validation::{
    Violations, validate_email, validate_password, validate_password_confirm,
};

pub const DEFAULT_PHOTO: &str = "default.jpg";

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Guide,
    LeadGuide,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Guide => "guide",
            Role::LeadGuide => "lead-guide",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "guide" => Ok(Role::Guide),
            "lead-guide" => Ok(Role::LeadGuide),
            "admin" => Ok(Role::Admin),
            other => Err(format!(
                "Role ({}) must be either: user, guide, lead-guide or admin",
                other
            )),
        }
    }
}

/// Full user row, including credentials
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: Role,
    pub password_hash: String,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub password_reset_token: Option<String>,
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub active: bool,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

/// User as sent to clients, credentials never leave the server
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_changed_at: Option<DateTime<Utc>>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            photo: row.photo,
            role: row.role,
            password_changed_at: row.password_changed_at,
            version: row.version,
            created_at: row.created_at,
        }
    }
}

impl UserRow {
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

/// Guide as embedded in a tour
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: Role,
}

/// Signup payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

/// A validated user ready to insert, password still in clear
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: Role,
    pub password: String,
}

impl SignupInput {
    pub fn prepare(self) -> Result<NewUser, Vec<String>> {
        let name = self.name.map(|n| n.trim().to_string()).unwrap_or_default();
        let email = self
            .email
            .map(|e| e.trim().to_lowercase())
            .unwrap_or_default();
        let password = self.password.unwrap_or_default();

        let mut violations = Violations::new();
        violations
            .require(!name.is_empty(), "Please input your name!")
            .check(validate_email(&email))
            .check(validate_password(&password))
            .check(validate_password_confirm(
                &password,
                self.password_confirm.as_deref(),
            ));
        violations.into_result()?;

        Ok(NewUser {
            name,
            email,
            photo: DEFAULT_PHOTO.to_string(),
            role: Role::User,
            password,
        })
    }
}

/// Fields an administrator may change, and the subset users change on themselves
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<String>,
    pub role: Option<String>,
}

/// Merged and validated user fields
#[derive(Debug, Clone, PartialEq)]
pub struct UserChanges {
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: Role,
}

impl UserUpdate {
    /// Overlay onto the stored user and re-run validation
    pub fn merge(self, current: &UserRow) -> Result<UserChanges, Vec<String>> {
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .unwrap_or_else(|| current.name.clone());
        let email = self
            .email
            .map(|e| e.trim().to_lowercase())
            .unwrap_or_else(|| current.email.clone());
        let photo = self.photo.unwrap_or_else(|| current.photo.clone());

        let mut violations = Violations::new();
        violations
            .require(!name.is_empty(), "Please input your name!")
            .check(validate_email(&email));

        let role = match self.role.as_deref().map(Role::from_str) {
            None => current.role,
            Some(Ok(role)) => role,
            Some(Err(message)) => {
                violations.check(Err(message));
                current.role
            }
        };
        violations.into_result()?;

        Ok(UserChanges {
            name,
            email,
            photo,
            role,
        })
    }
}

/// Password change payload, `passwordCurrent` only for self-service changes
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordInput {
    pub password_current: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

impl PasswordInput {
    /// Validated new password
    pub fn new_password(&self) -> Result<String, Vec<String>> {
        let password = self.password.clone().unwrap_or_default();
        let mut violations = Violations::new();
        violations
            .check(validate_password(&password))
            .check(validate_password_confirm(
                &password,
                self.password_confirm.as_deref(),
            ));
        violations.into_result()?;
        Ok(password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            name: "Laura Wilson".to_string(),
            email: "laura@example.com".to_string(),
            photo: DEFAULT_PHOTO.to_string(),
            role: Role::User,
            password_hash: "hash".to_string(),
            password_changed_at: None,
            password_reset_token: Some("digest".to_string()),
            password_reset_expires: None,
            active: true,
            version: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_role_round_trip() {
        for role in [Role::User, Role::Guide, Role::LeadGuide, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("root".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::LeadGuide).unwrap(), "\"lead-guide\"");
    }

    #[test]
    fn test_signup_lowercases_email() {
        let user = SignupInput {
            name: Some(" Jonas ".to_string()),
            email: Some("Jonas@Example.COM".to_string()),
            password: Some("pass1234".to_string()),
            password_confirm: Some("pass1234".to_string()),
        }
        .prepare()
        .unwrap();

        assert_eq!(user.name, "Jonas");
        assert_eq!(user.email, "jonas@example.com");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.photo, DEFAULT_PHOTO);
    }

    #[test]
    fn test_signup_collects_all_violations() {
        let errors = SignupInput {
            password: Some("pass1234".to_string()),
            password_confirm: Some("other123".to_string()),
            ..Default::default()
        }
        .prepare()
        .unwrap_err();

        assert_eq!(
            errors,
            vec![
                "Please input your name!".to_string(),
                "Please input your email!".to_string(),
                "Passwords do not match".to_string(),
            ]
        );
    }

    #[test]
    fn test_serialized_user_hides_credentials() {
        let json = serde_json::to_value(User::from(row())).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert!(json.get("passwordResetToken").is_none());
        assert!(json.get("active").is_none());
        assert_eq!(json["role"], "user");
    }

    #[test]
    fn test_update_merges_over_current() {
        let current = row();
        let changes = UserUpdate {
            email: Some("NEW@example.com".to_string()),
            ..Default::default()
        }
        .merge(&current)
        .unwrap();

        assert_eq!(changes.name, "Laura Wilson");
        assert_eq!(changes.email, "new@example.com");
        assert_eq!(changes.role, Role::User);
    }

    #[test]
    fn test_update_rejects_bad_role_and_email() {
        let errors = UserUpdate {
            email: Some("nope".to_string()),
            role: Some("root".to_string()),
            ..Default::default()
        }
        .merge(&row())
        .unwrap_err();

        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_first_name() {
        assert_eq!(row().first_name(), "Laura");
    }

    #[test]
    fn test_password_input_requires_matching_confirmation() {
        let input = PasswordInput {
            password: Some("newpass123".to_string()),
            password_confirm: Some("newpass124".to_string()),
            ..Default::default()
        };
        assert_eq!(input.new_password().unwrap_err(), vec!["Passwords do not match"]);
    }
}
