//! Self-service profile endpoints

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::error::{ApiResult, AppError};
use crate::extractors::{CurrentUser, Json, WithUploads};
use crate::handlers::factory;
use crate::models::{User, UserUpdate};
use crate::repositories::UserRepository;
use crate::uploads::ImageStore;

pub async fn get_me(CurrentUser(user): CurrentUser) -> ApiResult<Json<Value>> {
    factory::single(&User::from(user))
}

/// Body accepted by `/updateMe`; password fields are only read to reject them
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

impl ProfileInput {
    /// Only name and email are taken from the body
    fn into_update(self) -> ApiResult<UserUpdate> {
        if self.password.is_some() || self.password_confirm.is_some() {
            return Err(AppError::bad_request(
                "This route is not for password updates. Please use /updateMyPassword.",
            ));
        }
        Ok(UserUpdate {
            name: self.name,
            email: self.email,
            photo: None,
            role: None,
        })
    }
}

pub async fn update_me(
    State(users): State<UserRepository>,
    State(images): State<ImageStore>,
    CurrentUser(user): CurrentUser,
    mut payload: WithUploads<ProfileInput>,
) -> ApiResult<Json<Value>> {
    let photo = payload.take_file("photo");
    let mut update = payload.data.into_update()?;

    if let Some(photo) = photo {
        update.photo = Some(images.save_user_photo(user.id, photo).await?);
    }

    let updated = users
        .update_profile(user.id, update)
        .await?
        .ok_or_else(AppError::no_document)?;

    Ok(Json(json!({
        "status": "success",
        "data": { "user": User::from(updated) },
    })))
}

pub async fn delete_me(
    State(users): State<UserRepository>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<StatusCode> {
    users.deactivate(user.id).await?;
    info!("User {} deleted their account", user.id);
    Ok(StatusCode::NO_CONTENT)
}

/// Accounts are only created through signup
pub async fn create_user() -> AppError {
    AppError::new(
        "This route is not defined! Please use /signup instead",
        StatusCode::INTERNAL_SERVER_ERROR,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_fields_are_refused() {
        let input = ProfileInput {
            password: Some("newpass123".to_string()),
            ..ProfileInput::default()
        };
        let err = input.into_update().unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_role_and_photo_are_never_taken_from_the_body() {
        let update = ProfileInput {
            name: Some("Jonas".to_string()),
            ..ProfileInput::default()
        }
        .into_update()
        .unwrap();

        assert_eq!(update.name.as_deref(), Some("Jonas"));
        assert!(update.role.is_none());
        assert!(update.photo.is_none());
    }
}
