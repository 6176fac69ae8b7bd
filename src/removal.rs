//! Background removal boundary
//!
//! The pipeline talks to the removal model through the [`BackgroundRemover`]
//! trait so model backends can be swapped without touching the request flow.
//! The built-in [`MattingRemover`] estimates the dominant border color and
//! derives a per-pixel alpha mask from color distance. Removal work is
//! CPU-bound and runs on the blocking pool behind a semaphore so concurrent
//! load cannot exhaust shared compute.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tokio::sync::Semaphore;

use crate::error::{Error, Result};
use crate::types::{CutoutImage, DecodedImage};

/// Alpha ramp: color distances at or below the lower bound become fully
/// transparent, at or above the upper bound fully opaque.
const BACKGROUND_DISTANCE_MIN: f32 = 30.0;
const FOREGROUND_DISTANCE_MAX: f32 = 90.0;

/// Boundary contract with the background removal model.
///
/// Implementations must preserve input dimensions and encode the result as
/// PNG with an alpha channel.
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    /// Remove the background from a decoded image.
    ///
    /// # Errors
    /// Any backend failure surfaces as [`Error::Processing`]; it is never
    /// retried.
    async fn remove_background(&self, image: DecodedImage) -> Result<CutoutImage>;
}

/// Built-in border-sampling matting backend
pub struct MattingRemover {
    permits: Arc<Semaphore>,
}

impl MattingRemover {
    /// Create a remover allowing at most `max_concurrent` removals at once
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }
}

#[async_trait]
impl BackgroundRemover for MattingRemover {
    #[tracing::instrument(skip_all, fields(width = image.width, height = image.height))]
    async fn remove_background(&self, image: DecodedImage) -> Result<CutoutImage> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::processing("Background removal is shutting down."))?;

        tokio::task::spawn_blocking(move || cut_out(&image.image))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "background removal task panicked");
                Error::processing("Background removal failed.")
            })?
    }
}

/// Compute the alpha matte and encode the cutout as PNG.
fn cut_out(image: &DynamicImage) -> Result<CutoutImage> {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::processing("Background removal produced no output."));
    }

    let background = estimate_background_color(&rgba);

    let mut output = RgbaImage::new(width, height);
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let distance = color_distance(pixel, background);
        let matte = alpha_for_distance(distance);
        // Never raise alpha above what the source already had.
        let alpha = matte.min(pixel[3]);
        output.put_pixel(x, y, Rgba([pixel[0], pixel[1], pixel[2], alpha]));
    }

    let mut png_bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(output)
        .write_to(&mut png_bytes, ImageFormat::Png)
        .map_err(|e| {
            tracing::error!(error = %e, "failed to encode cutout as PNG");
            Error::processing("Background removal failed.")
        })?;

    Ok(CutoutImage {
        png_bytes: png_bytes.into_inner(),
        width,
        height,
    })
}

/// Mean color of the one-pixel border ring, the matting background estimate
fn estimate_background_color(rgba: &RgbaImage) -> [f32; 3] {
    let (width, height) = rgba.dimensions();
    let mut sum = [0.0f32; 3];
    let mut count = 0u32;

    let mut sample = |x: u32, y: u32| {
        let pixel = rgba.get_pixel(x, y);
        sum[0] += f32::from(pixel[0]);
        sum[1] += f32::from(pixel[1]);
        sum[2] += f32::from(pixel[2]);
        count += 1;
    };

    for x in 0..width {
        sample(x, 0);
        if height > 1 {
            sample(x, height - 1);
        }
    }
    for y in 1..height.saturating_sub(1) {
        sample(0, y);
        if width > 1 {
            sample(width - 1, y);
        }
    }

    let count = count.max(1) as f32;
    [sum[0] / count, sum[1] / count, sum[2] / count]
}

fn color_distance(pixel: &Rgba<u8>, background: [f32; 3]) -> f32 {
    let dr = f32::from(pixel[0]) - background[0];
    let dg = f32::from(pixel[1]) - background[1];
    let db = f32::from(pixel[2]) - background[2];
    (dr * dr + dg * dg + db * db).sqrt()
}

fn alpha_for_distance(distance: f32) -> u8 {
    if distance <= BACKGROUND_DISTANCE_MIN {
        0
    } else if distance >= FOREGROUND_DISTANCE_MAX {
        255
    } else {
        let t = (distance - BACKGROUND_DISTANCE_MIN)
            / (FOREGROUND_DISTANCE_MAX - BACKGROUND_DISTANCE_MIN);
        (t * 255.0).round() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    fn red_field_with_blue_center(size: u32) -> DecodedImage {
        let mut image = RgbImage::from_pixel(size, size, Rgb([255, 0, 0]));
        let third = size / 3;
        for y in third..(2 * third) {
            for x in third..(2 * third) {
                image.put_pixel(x, y, Rgb([0, 0, 255]));
            }
        }
        let image = DynamicImage::ImageRgb8(image);
        DecodedImage {
            width: image.width(),
            height: image.height(),
            format: ImageFormat::Png,
            image,
        }
    }

    #[tokio::test]
    async fn test_dimensions_preserved_and_output_is_png() {
        let remover = MattingRemover::new(2);
        let cutout = remover
            .remove_background(red_field_with_blue_center(30))
            .await
            .unwrap();
        assert_eq!((cutout.width, cutout.height), (30, 30));

        let format = image::guess_format(&cutout.png_bytes).unwrap();
        assert_eq!(format, ImageFormat::Png);

        let decoded = image::load_from_memory(&cutout.png_bytes).unwrap();
        assert_eq!(decoded.dimensions(), (30, 30));
    }

    #[tokio::test]
    async fn test_border_becomes_transparent_center_stays_opaque() {
        let remover = MattingRemover::new(1);
        let cutout = remover
            .remove_background(red_field_with_blue_center(30))
            .await
            .unwrap();

        let decoded = image::load_from_memory(&cutout.png_bytes)
            .unwrap()
            .to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0)[3], 0);
        assert_eq!(decoded.get_pixel(15, 15)[3], 255);
    }

    #[test]
    fn test_alpha_ramp_endpoints() {
        assert_eq!(alpha_for_distance(0.0), 0);
        assert_eq!(alpha_for_distance(BACKGROUND_DISTANCE_MIN), 0);
        assert_eq!(alpha_for_distance(FOREGROUND_DISTANCE_MAX), 255);
        assert_eq!(alpha_for_distance(500.0), 255);
        let mid = alpha_for_distance((BACKGROUND_DISTANCE_MIN + FOREGROUND_DISTANCE_MAX) / 2.0);
        assert!(mid > 0 && mid < 255);
    }

    #[test]
    fn test_background_estimate_ignores_center() {
        let decoded = red_field_with_blue_center(30);
        let background = estimate_background_color(&decoded.image.to_rgba8());
        assert!(background[0] > 200.0);
        assert!(background[2] < 50.0);
    }
}
