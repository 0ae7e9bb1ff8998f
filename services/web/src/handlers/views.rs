//! Server rendered pages

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Html,
};
use serde::Deserialize;
use tera::{Context, Tera};

use crate::error::{ApiResult, AppError};
use crate::extractors::{CurrentUser, Form, Query};
use crate::features::{ApiFeatures, Retrieval};
use crate::models::{User, UserUpdate};
use crate::repositories::{BookingRepository, Resource, TourRepository, UserRepository};

pub const BOOKING_ALERT: &str = "Your booking was successful! Please check your email for a confirmation. If your booking doesn't show up here immediately, please come back later.";

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub alert: Option<String>,
}

/// Banner text for a known `?alert=` value
pub fn alert_message(alert: Option<&str>) -> Option<&'static str> {
    match alert {
        Some("booking") => Some(BOOKING_ALERT),
        _ => None,
    }
}

/// Base context every page gets: title, the signed in user and any alert
fn page(title: &str, user: Option<&CurrentUser>, alert: Option<&str>) -> Context {
    let mut context = Context::new();
    context.insert("title", title);
    if let Some(CurrentUser(user)) = user {
        context.insert("user", &User::from(user.clone()));
    }
    if let Some(alert) = alert_message(alert) {
        context.insert("alert", alert);
    }
    context
}

fn render(templates: &Tera, template: &str, context: &Context) -> ApiResult<Html<String>> {
    Ok(Html(templates.render(template, context)?))
}

pub async fn get_overview(
    State(tours): State<TourRepository>,
    State(templates): State<Arc<Tera>>,
    user: Option<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Html<String>> {
    let retrieval = ApiFeatures::new(&[], TourRepository::FIELDS, Retrieval::new())
        .sort()
        .build();
    let all = tours.list(&retrieval).await?;

    let mut context = page("All tours", user.as_ref(), query.alert.as_deref());
    context.insert("tours", &all);
    render(&templates, "overview.html", &context)
}

pub async fn get_tour(
    State(tours): State<TourRepository>,
    State(templates): State<Arc<Tera>>,
    user: Option<CurrentUser>,
    Path(slug): Path<String>,
) -> ApiResult<Html<String>> {
    let tour = tours
        .find_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::not_found("There is no tour with that name."))?;

    let mut context = page(&format!("{} Tour", tour.name), user.as_ref(), None);
    context.insert("tour", &tour);
    render(&templates, "tour.html", &context)
}

pub async fn get_login_form(
    State(templates): State<Arc<Tera>>,
    user: Option<CurrentUser>,
) -> ApiResult<Html<String>> {
    render(
        &templates,
        "login.html",
        &page("Log into your account", user.as_ref(), None),
    )
}

pub async fn get_signup_form(
    State(templates): State<Arc<Tera>>,
    user: Option<CurrentUser>,
) -> ApiResult<Html<String>> {
    render(
        &templates,
        "signup.html",
        &page("Sign up for an account", user.as_ref(), None),
    )
}

pub async fn get_account(
    State(templates): State<Arc<Tera>>,
    user: CurrentUser,
) -> ApiResult<Html<String>> {
    render(
        &templates,
        "account.html",
        &page("Your account", Some(&user), None),
    )
}

/// Tours the signed in user has booked
pub async fn get_my_tours(
    State(tours): State<TourRepository>,
    State(bookings): State<BookingRepository>,
    State(templates): State<Arc<Tera>>,
    user: CurrentUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Html<String>> {
    let tour_ids = bookings.tour_ids_for_user(user.0.id).await?;
    let booked = tours.list_by_ids(&tour_ids).await?;

    let mut context = page("My tours", Some(&user), query.alert.as_deref());
    context.insert("tours", &booked);
    render(&templates, "overview.html", &context)
}

#[derive(Debug, Deserialize)]
pub struct UserDataForm {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Plain form post from the account page
pub async fn update_user_data(
    State(users): State<UserRepository>,
    State(templates): State<Arc<Tera>>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<UserDataForm>,
) -> ApiResult<Html<String>> {
    let update = UserUpdate {
        name: form.name,
        email: form.email,
        photo: None,
        role: None,
    };
    let updated = users
        .update_profile(user.id, update)
        .await?
        .ok_or_else(AppError::no_document)?;

    render(
        &templates,
        "account.html",
        &page("Your account", Some(&CurrentUser(updated)), None),
    )
}
