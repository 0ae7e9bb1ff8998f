//! Signup, login and password management

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::error::{ApiResult, AppError};
use crate::extractors::{CurrentUser, Json, Origin};
use crate::models::{PasswordInput, SignupInput, User, UserRow};
use crate::password::{ResetToken, digest_token, verify_password};
use crate::state::AppState;

/// Sign a token for `user`, set the cookie and return `{status, token, data: {user}}`
fn send_token(
    state: &AppState,
    jar: CookieJar,
    user: UserRow,
    status: StatusCode,
) -> ApiResult<(StatusCode, CookieJar, Json<Value>)> {
    let token = state.jwt.sign(user.id)?;
    let jar = jar.add(state.jwt.auth_cookie(token.clone()));

    Ok((
        status,
        jar,
        Json(json!({
            "status": "success",
            "token": token,
            "data": { "user": User::from(user) },
        })),
    ))
}

pub async fn signup(
    State(state): State<AppState>,
    Origin(origin): Origin,
    jar: CookieJar,
    Json(input): Json<SignupInput>,
) -> ApiResult<(StatusCode, CookieJar, Json<Value>)> {
    let new_user = input.prepare().map_err(AppError::validation)?;
    let user = state.users.insert(None, &new_user).await?;
    info!("User {} signed up", user.id);

    if let Err(e) = state
        .emails
        .send_welcome(&user, &format!("{}/me", origin))
        .await
    {
        warn!("Failed to send welcome email to {}: {}", user.email, e);
    }

    send_token(&state, jar, user, StatusCode::CREATED)
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(input): Json<LoginInput>,
) -> ApiResult<(StatusCode, CookieJar, Json<Value>)> {
    let (Some(email), Some(password)) = (input.email, input.password) else {
        return Err(AppError::bad_request("Please provide email and password!"));
    };

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .filter(|user| verify_password(&password, &user.password_hash))
        .ok_or_else(|| AppError::unauthorized("Incorrect email or password"))?;

    send_token(&state, jar, user, StatusCode::OK)
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<Value>) {
    (
        jar.add(state.jwt.logout_cookie()),
        Json(json!({ "status": "success" })),
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct ForgotPasswordInput {
    pub email: Option<String>,
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Origin(origin): Origin,
    Json(input): Json<ForgotPasswordInput>,
) -> ApiResult<Json<Value>> {
    let email = input.email.unwrap_or_default();
    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::not_found("There is no user with that email address."))?;

    let token = ResetToken::generate();
    state.users.set_reset_token(user.id, &token).await?;

    let url = format!("{}/api/v1/users/resetPassword/{}", origin, token.plain);
    if let Err(e) = state.emails.send_password_reset(&user, &url).await {
        error!("Failed to send reset email to {}: {}", user.email, e);
        state.users.clear_reset_token(user.id).await?;
        return Err(AppError::new(
            "There was an error sending the email. Try again later!",
            StatusCode::INTERNAL_SERVER_ERROR,
        ));
    }

    Ok(Json(json!({
        "status": "success",
        "message": "Token sent to email!",
    })))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    jar: CookieJar,
    Json(input): Json<PasswordInput>,
) -> ApiResult<(StatusCode, CookieJar, Json<Value>)> {
    let user = state
        .users
        .find_by_reset_token(&digest_token(&token))
        .await?
        .ok_or_else(|| AppError::bad_request("Token is invalid or has expired"))?;

    let password = input.new_password().map_err(AppError::validation)?;
    let user = state.users.set_password(user.id, &password).await?;

    send_token(&state, jar, user, StatusCode::OK)
}

pub async fn update_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    Json(input): Json<PasswordInput>,
) -> ApiResult<(StatusCode, CookieJar, Json<Value>)> {
    let current = input.password_current.as_deref().unwrap_or_default();
    if !verify_password(current, &user.password_hash) {
        return Err(AppError::unauthorized("Your current password is wrong."));
    }

    let password = input.new_password().map_err(AppError::validation)?;
    let user = state.users.set_password(user.id, &password).await?;

    send_token(&state, jar, user, StatusCode::OK)
}
