//! Request extractors whose rejections go through [`AppError`]

use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Multipart, Path, Request},
    http::{header, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::UserRow;
use crate::uploads::Upload;

/// JSON body and response
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// URL-encoded form body
#[derive(FromRequest)]
#[from_request(via(axum::Form), rejection(AppError))]
pub struct Form<T>(pub T);

/// Query string
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

/// Parse a path segment as a record id
pub fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::bad_request(format!("Invalid id: {}", raw)))
}

/// The single `:id` (or `:tourId`) path parameter
#[derive(Debug, Clone, Copy)]
pub struct ResourceId(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ResourceId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
        parse_id(&raw).map(ResourceId)
    }
}

/// The authenticated user, placed in the extensions by the auth middleware
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRow);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| {
                AppError::unauthorized("You are not logged in! Please log in to get access.")
            })
    }
}

/// `scheme://host` as seen by the client, for links in emails and redirects
#[derive(Debug, Clone)]
pub struct Origin(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Origin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_value = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        let scheme = header_value("x-forwarded-proto").unwrap_or_else(|| "http".to_string());
        let host = header_value(header::HOST.as_str())
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .unwrap_or_else(|| "localhost".to_string());

        Ok(Origin(format!("{}://{}", scheme, host)))
    }
}

/// A JSON body, or a multipart form whose text fields become the payload
/// and whose files are collected by field name
pub struct WithUploads<T> {
    pub data: T,
    pub files: HashMap<String, Vec<Upload>>,
}

impl<T> WithUploads<T> {
    /// Remove and return the first file sent under `name`
    pub fn take_file(&mut self, name: &str) -> Option<Upload> {
        let mut files = self.files.remove(name)?;
        (!files.is_empty()).then(|| files.remove(0))
    }

    pub fn take_files(&mut self, name: &str) -> Vec<Upload> {
        self.files.remove(name).unwrap_or_default()
    }
}

/// Numbers, booleans, arrays and objects are read as JSON, anything else as text
fn form_value(text: String) -> Value {
    match serde_json::from_str::<Value>(&text) {
        Ok(value) if !value.is_string() && !value.is_null() => value,
        _ => Value::String(text),
    }
}

#[async_trait]
impl<S, T> FromRequest<S> for WithUploads<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if !is_multipart {
            let Json(data) = Json::<T>::from_request(req, state).await?;
            return Ok(Self {
                data,
                files: HashMap::new(),
            });
        }

        let mut multipart = Multipart::from_request(req, state).await?;
        let mut fields = Map::new();
        let mut files: HashMap<String, Vec<Upload>> = HashMap::new();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if field.file_name().is_some() {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    files.entry(name).or_default().push(Upload {
                        content_type,
                        bytes,
                    });
                }
            } else {
                fields.insert(name, form_value(field.text().await?));
            }
        }

        let data = serde_json::from_value(Value::Object(fields))
            .map_err(|e| AppError::bad_request(format!("Invalid form data: {}", e)))?;
        Ok(Self { data, files })
    }
}
