//! Error taxonomy for the processing pipeline.
//!
//! Per-file errors ([`MetadataError`], [`GeometryError`], [`OutputError`]) are
//! caught at the batch driver's per-file boundary and turned into report entries.
//! [`ConfigError`] and [`BatchError`] end the run.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("failed to run metadata probe `{tool}` on {path}: {source}")]
    Spawn {
        tool: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("metadata probe exited with status {status} on {path}: {stderr}")]
    ProbeFailed {
        path: PathBuf,
        status: i32,
        stderr: String,
    },
    #[error("malformed metadata for {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("invalid dimensions {width}x{height} for {path}")]
    InvalidDimensions {
        path: PathBuf,
        width: u32,
        height: u32,
    },
    #[error("failed to read image header of {path}: {source}")]
    Header {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("failed to run `{tool}` for {step}: {source}")]
    Spawn {
        tool: String,
        step: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{step} step exited with status {status}: {stderr}")]
    ToolFailed {
        step: &'static str,
        status: i32,
        stderr: String,
    },
    #[error("{step} step produced no output at {path}")]
    NoOutput { step: &'static str, path: PathBuf },
    #[error("image error during {step}: {source}")]
    Image {
        step: &'static str,
        #[source]
        source: image::ImageError,
    },
    #[error("resize error: {0}")]
    Resize(String),
    #[error("normalized image is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    WrongSize {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("failed to stage output in {dir}: {source}")]
    Stage {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode output image: {0}")]
    Encode(#[from] image::ImageError),
    #[error("failed to place output at {path}: {source}")]
    Place {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid log level '{0}'. Valid levels: CRITICAL, ERROR, WARNING, INFO, DEBUG, TRACE")]
    InvalidLogLevel(String),
    #[error("invalid size '{0}'. Use WIDTHxHEIGHT (e.g., 1024x768)")]
    InvalidSize(String),
    #[error("aspect tolerance must be a positive number, got {0}")]
    InvalidTolerance(f64),
    #[error("input path does not exist: {0}")]
    InputNotFound(PathBuf),
    #[error("no input paths given")]
    NoInputs,
    #[error("no output directory given")]
    MissingOutput,
    #[error("no valid extensions specified")]
    NoExtensions,
    #[error("invalid color '{0}'. Expected hex format like #RRGGBB")]
    InvalidColor(String),
    #[error("font size must be between 1 and 200 pixels, got {0}")]
    InvalidFontSize(u32),
    #[error("maximum caption length must be at least 4, got {0}")]
    InvalidCaptionLength(usize),
    #[error("JPEG quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),
    #[error("no usable font found for '{0}'")]
    FontUnavailable(String),
    #[error("ImageMagick backend selected but neither `magick` nor `convert` was found")]
    ImageMagickUnavailable,
    #[error("failed to load config file {path}: {reason}")]
    ConfigFile { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("catalog write failed: {0}")]
    Catalog(#[from] csv::Error),
    #[error("failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
