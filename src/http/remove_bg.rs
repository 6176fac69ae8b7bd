//! Removal endpoint handlers and the pipeline driver
//!
//! Both endpoints converge on [`process`]: validate, remove the background,
//! upload, assemble the success envelope. Any stage error propagates out and
//! is mapped to its status by the error type.

use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    Json,
};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::{Dimensions, InputSource, RemovalResponse};
use crate::validation::{self, MAX_IMAGE_SIZE_BYTES};

use super::AppState;

/// JSON body of the URL endpoint
#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    pub image_url: String,
}

/// POST /api/v1/remove-bg/binary, accepting the multipart field `image`
#[tracing::instrument(skip_all)]
pub async fn remove_bg_binary(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<RemovalResponse>> {
    let source = read_multipart_image(multipart).await?;
    let started = Instant::now();
    process(&state, source, started).await
}

/// POST /api/v1/remove-bg/url, accepting JSON `{"image_url": ...}`
#[tracing::instrument(skip_all)]
pub async fn remove_bg_url(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UrlRequest>, JsonRejection>,
) -> Result<Json<RemovalResponse>> {
    let Json(request) =
        payload.map_err(|e| Error::validation(format!("Invalid request body: {e}")))?;

    let started = Instant::now();
    let bytes = state.fetcher.fetch(&request.image_url).await?;
    let source = InputSource::Remote {
        url: request.image_url,
        bytes,
    };
    process(&state, source, started).await
}

/// Read the `image` multipart field, enforcing the size ceiling per chunk
async fn read_multipart_image(mut multipart: Multipart) -> Result<InputSource> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("image") {
            continue;
        }

        let declared_content_type = field.content_type().map(str::to_owned);
        match declared_content_type.as_deref() {
            Some(content_type) if validation::is_allowed_content_type(content_type) => {},
            _ => {
                return Err(Error::validation(
                    "Invalid image format. Use PNG, JPG, JPEG, or WEBP.",
                ))
            },
        }

        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| Error::validation(format!("Failed to read image data: {e}")))?
        {
            if bytes.len() + chunk.len() > MAX_IMAGE_SIZE_BYTES {
                return Err(Error::PayloadTooLarge);
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Err(Error::validation("Empty image file."));
        }

        return Ok(InputSource::Binary {
            bytes,
            declared_content_type,
        });
    }

    Err(Error::validation(
        "No image file provided. Use multipart field 'image'.",
    ))
}

/// Validate → remove background → upload → assemble the success envelope
async fn process(
    state: &AppState,
    source: InputSource,
    started: Instant,
) -> Result<Json<RemovalResponse>> {
    let decoded = validation::decode_image(source.bytes())?;
    let dimensions = Dimensions {
        width: decoded.width,
        height: decoded.height,
    };

    let cutout = state.remover.remove_background(decoded).await?;
    let stored = state.storage.store_png(cutout.png_bytes).await?;

    let elapsed = started.elapsed().as_secs_f64();
    tracing::info!(
        key = stored.key,
        width = dimensions.width,
        height = dimensions.height,
        elapsed,
        "background removal completed"
    );

    Ok(Json(RemovalResponse::new(
        source.original_url(),
        stored.url,
        elapsed,
        dimensions,
    )))
}
