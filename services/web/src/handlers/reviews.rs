//! Review endpoints, including the ones nested under a tour

use axum::{extract::State, http::StatusCode};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extractors::{CurrentUser, Json, Query, ResourceId};
use crate::features::Retrieval;
use crate::handlers::factory::{self, QueryPairs};
use crate::models::ReviewInput;
use crate::repositories::{Resource, ReviewRepository};

/// Reviews of one tour, `/tours/:id/reviews`
pub async fn get_tour_reviews(
    State(reviews): State<ReviewRepository>,
    ResourceId(tour_id): ResourceId,
    Query(query): Query<QueryPairs>,
) -> ApiResult<Json<Value>> {
    let base = Retrieval::new().scoped("tour_id", tour_id, "uuid");
    factory::list_with(&reviews, &query, base).await
}

/// The author is always the caller; the tour comes from the path when nested
fn attribute(mut input: ReviewInput, user: &CurrentUser, tour_id: Option<Uuid>) -> ReviewInput {
    input.user = Some(user.0.id);
    if tour_id.is_some() {
        input.tour = tour_id;
    }
    input
}

pub async fn create_review(
    State(reviews): State<ReviewRepository>,
    user: CurrentUser,
    Json(input): Json<ReviewInput>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let review = reviews.create(attribute(input, &user, None)).await?;
    Ok((StatusCode::CREATED, factory::single(&review)?))
}

pub async fn create_tour_review(
    State(reviews): State<ReviewRepository>,
    user: CurrentUser,
    ResourceId(tour_id): ResourceId,
    Json(input): Json<ReviewInput>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let review = reviews
        .create(attribute(input, &user, Some(tour_id)))
        .await?;
    Ok((StatusCode::CREATED, factory::single(&review)?))
}
