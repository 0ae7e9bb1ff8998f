//! Image upload pipeline
//!
//! Uploaded images are decoded, cropped to a fixed size, re-encoded as JPEG
//! (quality 90) and written under `<public_dir>/img`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use axum::body::Bytes;
use axum::http::StatusCode;
use chrono::Utc;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiResult, AppError};

pub const USER_PHOTO_SIZE: (u32, u32) = (500, 500);
pub const TOUR_IMAGE_SIZE: (u32, u32) = (2000, 1333);
/// Gallery images kept per tour
pub const MAX_TOUR_IMAGES: usize = 3;

const JPEG_QUALITY: u8 = 90;

/// One uploaded file
#[derive(Debug, Clone)]
pub struct Upload {
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl Upload {
    fn ensure_image(&self) -> ApiResult<()> {
        match self.content_type.as_deref() {
            Some(content_type) if content_type.starts_with("image") => Ok(()),
            _ => Err(not_an_image()),
        }
    }
}

fn not_an_image() -> AppError {
    AppError::bad_request("Not an image! Please upload only images.")
}

/// Crop to `width` x `height` and re-encode as JPEG
pub fn resize_jpeg(bytes: &[u8], width: u32, height: u32) -> ApiResult<Vec<u8>> {
    let decoded = image::load_from_memory(bytes).map_err(|_| not_an_image())?;
    let rgb = decoded
        .resize_to_fill(width, height, FilterType::Lanczos3)
        .to_rgb8();

    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY)
        .encode_image(&rgb)
        .context("Failed to encode JPEG")?;
    Ok(buffer)
}

/// Writes processed images into the public image directory
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    /// `public_dir` is the static root; files land in `<public_dir>/img/...`
    pub fn new(public_dir: impl AsRef<Path>) -> Self {
        Self {
            root: public_dir.as_ref().join("img"),
        }
    }

    async fn process(
        &self,
        folder: &str,
        filename: String,
        upload: Upload,
        (width, height): (u32, u32),
    ) -> ApiResult<String> {
        upload.ensure_image()?;

        let jpeg = tokio::task::spawn_blocking(move || resize_jpeg(&upload.bytes, width, height))
            .await
            .context("Image worker panicked")??;

        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        tokio::fs::write(dir.join(&filename), jpeg)
            .await
            .with_context(|| format!("Failed to write {}", filename))?;

        info!("Stored image img/{}/{}", folder, filename);
        Ok(filename)
    }

    /// Square profile photo, returns the stored file name
    pub async fn save_user_photo(&self, user_id: Uuid, upload: Upload) -> ApiResult<String> {
        let filename = format!("user-{}-{}.jpeg", user_id, Utc::now().timestamp_millis());
        self.process("users", filename, upload, USER_PHOTO_SIZE).await
    }

    /// Cover plus gallery images, resized in parallel
    ///
    /// Returns the cover file name and the gallery file names in upload order.
    pub async fn save_tour_images(
        &self,
        tour_id: Uuid,
        cover: Upload,
        images: Vec<Upload>,
    ) -> ApiResult<(String, Vec<String>)> {
        if images.len() > MAX_TOUR_IMAGES {
            return Err(AppError::new(
                format!("A tour can have at most {} images", MAX_TOUR_IMAGES),
                StatusCode::BAD_REQUEST,
            ));
        }

        let stamp = Utc::now().timestamp_millis();
        let cover_name = format!("tour-{}-{}-cover.jpeg", tour_id, stamp);

        let gallery = images.into_iter().enumerate().map(|(i, upload)| {
            let filename = format!("tour-{}-{}-{}.jpeg", tour_id, stamp, i + 1);
            self.process("tours", filename, upload, TOUR_IMAGE_SIZE)
        });

        let (cover, gallery) = futures::future::try_join(
            self.process("tours", cover_name, cover, TOUR_IMAGE_SIZE),
            futures::future::try_join_all(gallery),
        )
        .await?;

        Ok((cover, gallery))
    }
}
