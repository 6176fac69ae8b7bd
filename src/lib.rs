//! # Background Removal API
//!
//! A stateless HTTP service that accepts a product image as a raw multipart
//! upload or a remote URL, removes its background, persists the PNG result in
//! S3-compatible object storage, and returns a uniform JSON envelope.
//!
//! The request pipeline is a linear stage sequence; any stage failure
//! short-circuits to the error mapper and nothing later runs:
//!
//! ```text
//! Auth Gate -> Input Acquisition -> Validator -> Removal Invoker
//!           -> Storage Uploader -> Response Assembler
//! ```
//!
//! - Accepted input formats: PNG, JPG, JPEG, WEBP; maximum size 10 MiB.
//! - Output is always PNG with an alpha channel, same dimensions as input.
//! - Stored objects are named `bg-removed-<token>.png` with a fresh opaque
//!   token per request, so identical inputs never collide.
//! - The retrieval URL is public when `PUBLIC_BASE_URL` is configured,
//!   otherwise a presigned GET valid for seven days.
//!
//! The background removal model and the object storage backend sit behind the
//! [`removal::BackgroundRemover`] and [`storage::ObjectStorage`] traits and
//! are swappable.

pub mod config;
pub mod download;
pub mod error;
pub mod http;
pub mod removal;
pub mod storage;
pub mod types;
pub mod validation;

pub use config::Config;
pub use error::{Error, Result};
pub use http::AppState;
pub use types::{CutoutImage, DecodedImage, Dimensions, InputSource, RemovalResponse};
