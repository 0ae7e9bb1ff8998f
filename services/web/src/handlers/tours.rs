//! Tour specific endpoints: aliases, aggregations, geo queries and image uploads

use axum::extract::{Path, State};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiResult, AppError};
use crate::extractors::{Json, Query, ResourceId, WithUploads};
use crate::features::Retrieval;
use crate::geo::{self, Point, Unit};
use crate::handlers::factory::{self, QueryPairs};
use crate::models::TourInput;
use crate::repositories::{Resource, TourRepository};
use crate::uploads::ImageStore;

/// Query preset behind `/top-5-cheap`
pub fn top_tours_preset(mut query: QueryPairs) -> QueryPairs {
    query.push(("limit".into(), "5".into()));
    query.push(("sort".into(), "-ratingsAverage,price".into()));
    query.push((
        "fields".into(),
        "name,price,ratingsAverage,summary,difficulty".into(),
    ));
    query
}

pub async fn top_5_cheap(
    State(tours): State<TourRepository>,
    Query(query): Query<QueryPairs>,
) -> ApiResult<Json<Value>> {
    factory::list_with(&tours, &top_tours_preset(query), Retrieval::new()).await
}

pub async fn tour_stats(State(tours): State<TourRepository>) -> ApiResult<Json<Value>> {
    let stats = tours.stats().await?;
    Ok(Json(json!({
        "status": "success",
        "data": { "stats": stats },
    })))
}

pub async fn monthly_plan(
    State(tours): State<TourRepository>,
    Path(year): Path<String>,
) -> ApiResult<Json<Value>> {
    let year: i32 = year
        .parse()
        .map_err(|_| AppError::bad_request(format!("Invalid year: {}", year)))?;

    let plan = tours.monthly_plan(year).await?;
    Ok(Json(json!({
        "status": "success",
        "data": { "plan": plan },
    })))
}

/// `/tours-within/:distance/center/:latlng/unit/:unit`
pub async fn tours_within(
    State(tours): State<TourRepository>,
    Path((distance, latlng, unit)): Path<(String, String, String)>,
) -> ApiResult<Json<Value>> {
    let center = geo::parse_latlng(&latlng)?;
    let distance: f64 = distance
        .parse()
        .ok()
        .filter(|d: &f64| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| AppError::bad_request(format!("Invalid distance: {}", distance)))?;
    let unit: Unit = unit.parse().unwrap_or(Unit::Kilometres);
    let radius = unit.radius_radians(distance);

    let ids: Vec<Uuid> = tours
        .start_points()
        .await?
        .into_iter()
        .filter(|start| {
            Point::from_coordinates(&start.location.coordinates)
                .is_some_and(|point| geo::within(center, point, radius))
        })
        .map(|start| start.id)
        .collect();

    let found = tours.list_by_ids(&ids).await?;
    let data = found
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()
        .map_err(anyhow::Error::from)?;
    Ok(factory::many(data))
}

#[derive(Debug, Serialize)]
pub struct TourDistance {
    pub id: Uuid,
    pub name: String,
    pub distance: f64,
}

/// Distance from `center` to every tour's start, nearest first
pub fn rank_by_distance(
    center: Point,
    starts: impl IntoIterator<Item = (Uuid, String, Point)>,
    unit: Unit,
) -> Vec<TourDistance> {
    let mut ranked: Vec<TourDistance> = starts
        .into_iter()
        .map(|(id, name, point)| TourDistance {
            id,
            name,
            distance: geo::distance(center, point, unit),
        })
        .collect();
    ranked.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    ranked
}

/// `/distances/:latlng/unit/:unit`
pub async fn distances(
    State(tours): State<TourRepository>,
    Path((latlng, unit)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let center = geo::parse_latlng(&latlng)?;
    let unit: Unit = unit.parse().unwrap_or(Unit::Kilometres);

    let starts = tours.start_points().await?.into_iter().filter_map(|start| {
        Point::from_coordinates(&start.location.coordinates)
            .map(|point| (start.id, start.name, point))
    });

    Ok(Json(json!({
        "status": "success",
        "data": { "data": rank_by_distance(center, starts, unit) },
    })))
}

/// PATCH with optional `imageCover` and `images` files
///
/// Images are only processed when both fields are present, and never for
/// an unknown tour.
pub async fn update_tour(
    State(tours): State<TourRepository>,
    State(images): State<ImageStore>,
    ResourceId(id): ResourceId,
    mut payload: WithUploads<TourInput>,
) -> ApiResult<Json<Value>> {
    if !tours.exists(id).await? {
        return Err(AppError::no_document());
    }

    let gallery = payload.take_files("images");
    if let Some(cover) = payload.take_file("imageCover").filter(|_| !gallery.is_empty()) {
        let (cover, gallery) = images.save_tour_images(id, cover, gallery).await?;
        info!("Stored {} new images for tour {}", gallery.len() + 1, id);
        payload.data.image_cover = Some(cover);
        payload.data.images = Some(gallery);
    }

    let tour = tours
        .update(id, payload.data)
        .await?
        .ok_or_else(AppError::no_document)?;
    factory::single(&tour)
}
