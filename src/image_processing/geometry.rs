//! Geometry normalization: every output is exactly the target box.
//!
//! The normalizer never crops. Under the default policy the source is first
//! letterboxed to the goal ratio and only then scaled, so proportions survive.
//! Raster work goes through a [`GeometryBackend`], file in and file out, so the
//! same policy drives ImageMagick or the in-process implementation.

use clap::ValueEnum;
use image::{Rgb, RgbImage};
use std::path::Path;
use strum_macros::Display;

use super::annotate::to_hex;
use super::aspect::{AspectPolicy, GeometrySpec};
use super::magick::{exit_code, stderr_text, ImageMagick};
use super::metadata::PhotoMetadata;
use super::resize::{pad_image, padded_canvas, resize_image};
use crate::error::GeometryError;

/// Which implementation performs raster operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Display)]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    /// In-process decoding and resampling
    #[default]
    Native,
    /// Delegate to ImageMagick's `convert` / `identify`
    #[value(name = "imagemagick")]
    ImageMagick,
}

/// Capability that pads or scales an image file into another file
pub trait GeometryBackend {
    /// Center `src` on a `width`x`height` canvas filled with `background`
    fn pad(
        &self,
        src: &Path,
        dst: &Path,
        width: u32,
        height: u32,
        background: Rgb<u8>,
    ) -> Result<(), GeometryError>;

    /// Scale `src` to exactly `width`x`height`
    fn resize(&self, src: &Path, dst: &Path, width: u32, height: u32) -> Result<(), GeometryError>;
}

/// Raster operations done in-process with `image` and `fast_image_resize`
pub struct NativeBackend;

impl NativeBackend {
    fn load(src: &Path, step: &'static str) -> Result<RgbImage, GeometryError> {
        image::open(src)
            .map(|img| img.to_rgb8())
            .map_err(|source| GeometryError::Image { step, source })
    }

    fn store(img: &RgbImage, dst: &Path, step: &'static str) -> Result<(), GeometryError> {
        img.save_with_format(dst, image::ImageFormat::Png)
            .map_err(|source| GeometryError::Image { step, source })
    }
}

impl GeometryBackend for NativeBackend {
    fn pad(
        &self,
        src: &Path,
        dst: &Path,
        width: u32,
        height: u32,
        background: Rgb<u8>,
    ) -> Result<(), GeometryError> {
        let img = Self::load(src, "pad")?;
        Self::store(&pad_image(&img, width, height, background), dst, "pad")
    }

    fn resize(&self, src: &Path, dst: &Path, width: u32, height: u32) -> Result<(), GeometryError> {
        let img = Self::load(src, "resize")?;
        Self::store(&resize_image(&img, width, height)?, dst, "resize")
    }
}

/// Raster operations delegated to ImageMagick
pub struct ImageMagickBackend {
    magick: ImageMagick,
}

impl ImageMagickBackend {
    pub fn new(magick: ImageMagick) -> Self {
        Self { magick }
    }

    fn run(&self, step: &'static str, args: &[String]) -> Result<(), GeometryError> {
        log::debug!("{} {}", self.magick.convert_program(), args.join(" "));

        let output = self
            .magick
            .convert()
            .args(args)
            .output()
            .map_err(|source| GeometryError::Spawn {
                tool: self.magick.convert_program().to_string(),
                step,
                source,
            })?;

        if !output.status.success() {
            return Err(GeometryError::ToolFailed {
                step,
                status: exit_code(&output),
                stderr: stderr_text(&output),
            });
        }

        Ok(())
    }
}

impl GeometryBackend for ImageMagickBackend {
    fn pad(
        &self,
        src: &Path,
        dst: &Path,
        width: u32,
        height: u32,
        background: Rgb<u8>,
    ) -> Result<(), GeometryError> {
        self.run("pad", &pad_args(src, dst, width, height, background))
    }

    fn resize(&self, src: &Path, dst: &Path, width: u32, height: u32) -> Result<(), GeometryError> {
        self.run("resize", &resize_args(src, dst, width, height))
    }
}

/// `convert` arguments centering `src` on a `width`x`height` canvas
pub fn pad_args(src: &Path, dst: &Path, width: u32, height: u32, background: Rgb<u8>) -> Vec<String> {
    vec![
        src.display().to_string(),
        "-gravity".to_string(),
        "center".to_string(),
        "-background".to_string(),
        to_hex(background),
        "-extent".to_string(),
        format!("{}x{}", width, height),
        dst.display().to_string(),
    ]
}

/// `convert` arguments scaling `src` to exactly `width`x`height`
pub fn resize_args(src: &Path, dst: &Path, width: u32, height: u32) -> Vec<String> {
    // `!` forces the exact box even when rounding leaves the ratio a pixel off
    vec![
        src.display().to_string(),
        "-resize".to_string(),
        format!("{}x{}!", width, height),
        dst.display().to_string(),
    ]
}

pub struct GeometryNormalizer {
    backend: Box<dyn GeometryBackend>,
    spec: GeometrySpec,
    policy: AspectPolicy,
    background: Rgb<u8>,
}

impl GeometryNormalizer {
    pub fn new(
        backend: Box<dyn GeometryBackend>,
        spec: GeometrySpec,
        policy: AspectPolicy,
        background: Rgb<u8>,
    ) -> Self {
        Self {
            backend,
            spec,
            policy,
            background,
        }
    }

    pub fn spec(&self) -> &GeometrySpec {
        &self.spec
    }

    pub fn policy(&self) -> AspectPolicy {
        self.policy
    }

    /// Produce a `target_width`x`target_height` image from `input`.
    ///
    /// Intermediate files are named after `scratch_stem` inside `scratch_dir`
    /// and are removed before returning.
    pub fn normalize(
        &self,
        input: &Path,
        metadata: &PhotoMetadata,
        scratch_dir: &Path,
        scratch_stem: &str,
    ) -> Result<RgbImage, GeometryError> {
        let padded = scratch_dir.join(format!("{}-padded.png", scratch_stem));
        let scaled = scratch_dir.join(format!("{}-scaled.png", scratch_stem));

        let result = self.run_steps(input, metadata, &padded, &scaled);

        for intermediate in [&padded, &scaled] {
            let _ = std::fs::remove_file(intermediate);
        }

        result
    }

    fn run_steps(
        &self,
        input: &Path,
        metadata: &PhotoMetadata,
        padded: &Path,
        scaled: &Path,
    ) -> Result<RgbImage, GeometryError> {
        let (target_width, target_height) = (self.spec.target_width, self.spec.target_height);

        let resize_source = match self.policy {
            AspectPolicy::Distort => input,
            AspectPolicy::Pad | AspectPolicy::Reject => {
                let (canvas_width, canvas_height) =
                    padded_canvas(metadata.width, metadata.height, target_width, target_height);
                log::debug!(
                    "Padding {}x{} to {}x{}",
                    metadata.width,
                    metadata.height,
                    canvas_width,
                    canvas_height
                );
                self.backend
                    .pad(input, padded, canvas_width, canvas_height, self.background)?;
                ensure_output("pad", padded)?;
                padded
            }
        };

        self.backend
            .resize(resize_source, scaled, target_width, target_height)?;
        ensure_output("resize", scaled)?;

        let img = image::open(scaled)
            .map_err(|source| GeometryError::Image {
                step: "load",
                source,
            })?
            .to_rgb8();

        let (actual_width, actual_height) = img.dimensions();
        if (actual_width, actual_height) != (target_width, target_height) {
            return Err(GeometryError::WrongSize {
                expected_width: target_width,
                expected_height: target_height,
                actual_width,
                actual_height,
            });
        }

        Ok(img)
    }
}

fn ensure_output(step: &'static str, path: &Path) -> Result<(), GeometryError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(GeometryError::NoOutput {
            step,
            path: path.to_path_buf(),
        }),
    }
}
