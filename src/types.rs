//! Request-scoped data types flowing through the pipeline

use image::{DynamicImage, ImageFormat};
use serde::Serialize;

/// Where the input image came from, selected by endpoint
#[derive(Debug)]
pub enum InputSource {
    /// Raw bytes read from a multipart upload
    Binary {
        bytes: Vec<u8>,
        /// Content type declared by the client, if any
        declared_content_type: Option<String>,
    },
    /// Bytes fetched from a remote URL
    Remote { url: String, bytes: Vec<u8> },
}

impl InputSource {
    /// The URL echoed back as `original_url` on success.
    ///
    /// Empty string for binary uploads, the submitted URL otherwise.
    pub fn original_url(&self) -> &str {
        match self {
            Self::Binary { .. } => "",
            Self::Remote { url, .. } => url,
        }
    }

    /// The acquired raw bytes
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Binary { bytes, .. } | Self::Remote { bytes, .. } => bytes,
        }
    }
}

/// A successfully decoded input image with its detected format
pub struct DecodedImage {
    pub image: DynamicImage,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

/// Background-removed result, always PNG-encoded with an alpha channel.
///
/// Produced only by a [`crate::removal::BackgroundRemover`]; dimensions are
/// guaranteed to match the decoded input.
pub struct CutoutImage {
    pub png_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Width/height pair reported in the success envelope
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Success envelope returned by both removal endpoints
#[derive(Debug, Serialize)]
pub struct RemovalResponse {
    pub success: bool,
    pub original_url: String,
    pub processed_url: String,
    /// Elapsed wall-clock seconds, rounded to two decimals
    pub processing_time: f64,
    pub image_dimensions: Dimensions,
}

impl RemovalResponse {
    pub fn new(
        original_url: &str,
        processed_url: String,
        elapsed_secs: f64,
        dimensions: Dimensions,
    ) -> Self {
        Self {
            success: true,
            original_url: original_url.to_owned(),
            processed_url,
            processing_time: (elapsed_secs * 100.0).round() / 100.0,
            image_dimensions: dimensions,
        }
    }
}
