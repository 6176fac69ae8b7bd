//! Input format and size validation
//!
//! Decodes the acquired byte buffer, enforces the format allow-list and the
//! size ceiling, and extracts dimensions. The size ceiling is re-checked here
//! even though acquisition already bounded the byte count.

use image::ImageFormat;

use crate::error::{Error, Result};
use crate::types::DecodedImage;

/// Maximum accepted input size: 10 MiB, checked before decoding
pub const MAX_IMAGE_SIZE_BYTES: usize = 10 * 1024 * 1024;

/// Input formats accepted by the pipeline; output is always PNG
pub const ALLOWED_FORMATS: &[ImageFormat] =
    &[ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP];

/// Content types accepted as a multipart declaration
pub const ALLOWED_CONTENT_TYPES: &[&str] =
    &["image/png", "image/jpeg", "image/jpg", "image/webp"];

/// Whether a declared multipart content type is on the allow-list
pub fn is_allowed_content_type(content_type: &str) -> bool {
    ALLOWED_CONTENT_TYPES.contains(&content_type.to_ascii_lowercase().as_str())
}

/// Decode raw bytes into a validated [`DecodedImage`].
///
/// # Errors
/// - [`Error::PayloadTooLarge`] when the buffer exceeds the size ceiling
/// - [`Error::Validation`] for empty buffers, undecodable bytes, or formats
///   outside the allow-list
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage> {
    if bytes.len() > MAX_IMAGE_SIZE_BYTES {
        return Err(Error::PayloadTooLarge);
    }
    if bytes.is_empty() {
        return Err(Error::validation("Empty image file."));
    }

    let format = image::guess_format(bytes).map_err(|e| {
        tracing::debug!(error = %e, "input bytes have no recognizable image signature");
        Error::validation("Invalid or corrupted image.")
    })?;

    if !ALLOWED_FORMATS.contains(&format) {
        return Err(Error::validation(
            "Invalid image format. Use PNG, JPG, JPEG, or WEBP.",
        ));
    }

    let image = image::load_from_memory_with_format(bytes, format).map_err(|e| {
        tracing::debug!(error = %e, ?format, "image decode failed");
        Error::validation("Invalid or corrupted image.")
    })?;

    let width = image.width();
    let height = image.height();
    Ok(DecodedImage {
        image,
        width,
        height,
        format,
    })
}
