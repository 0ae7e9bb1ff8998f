//! Generic CRUD handlers shared by every resource

use anyhow::Context;
use axum::{extract::State, http::StatusCode};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

use crate::error::{ApiResult, AppError};
use crate::extractors::{Json, Query, ResourceId};
use crate::features::{ApiFeatures, Retrieval};
use crate::repositories::Resource;

/// Raw query pairs, order preserved
pub type QueryPairs = Vec<(String, String)>;

/// `{status, data: {data}}`
pub fn single<T: Serialize>(record: &T) -> ApiResult<Json<Value>> {
    let data = serde_json::to_value(record).context("Failed to serialize record")?;
    Ok(Json(json!({
        "status": "success",
        "data": { "data": data },
    })))
}

/// `{status, results, data: {data: [...]}}` over already projected records
pub fn many(records: Vec<Value>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "results": records.len(),
        "data": { "data": records },
    }))
}

/// Run the query features over `base` and list the matching records
pub async fn list_with<R: Resource>(
    repo: &R,
    query: &[(String, String)],
    base: Retrieval,
) -> ApiResult<Json<Value>> {
    let retrieval = ApiFeatures::new(query, R::FIELDS, base)
        .filter()
        .sort()
        .limit_fields()
        .paginate()
        .build();

    let records = repo.list(&retrieval).await?;
    let projected = records
        .iter()
        .map(|record| serde_json::to_value(record).map(|value| retrieval.project(value)))
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to serialize records")?;

    Ok(many(projected))
}

pub async fn get_all<R: Resource>(
    State(repo): State<R>,
    Query(query): Query<QueryPairs>,
) -> ApiResult<Json<Value>> {
    list_with(&repo, &query, Retrieval::new()).await
}

pub async fn get_one<R: Resource>(
    State(repo): State<R>,
    ResourceId(id): ResourceId,
) -> ApiResult<Json<Value>> {
    let record = repo.find(id).await?.ok_or_else(AppError::no_document)?;
    single(&record)
}

pub async fn create_one<R: Resource>(
    State(repo): State<R>,
    Json(input): Json<R::Create>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let record = repo.create(input).await?;
    Ok((StatusCode::CREATED, single(&record)?))
}

pub async fn update_one<R: Resource>(
    State(repo): State<R>,
    ResourceId(id): ResourceId,
    Json(input): Json<R::Update>,
) -> ApiResult<Json<Value>> {
    let record = repo
        .update(id, input)
        .await?
        .ok_or_else(AppError::no_document)?;
    single(&record)
}

pub async fn delete_one<R: Resource>(
    State(repo): State<R>,
    ResourceId(id): ResourceId,
) -> ApiResult<StatusCode> {
    if !repo.delete(id).await? {
        return Err(AppError::no_document());
    }
    info!("Deleted record {}", id);
    Ok(StatusCode::NO_CONTENT)
}
