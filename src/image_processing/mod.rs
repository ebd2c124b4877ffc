pub mod annotate;
pub mod aspect;
pub mod batch;
pub mod caption;
pub mod catalog;
pub mod geometry;
pub mod magick;
pub mod metadata;
pub mod report;
pub mod resize;

#[cfg(test)]
pub(crate) mod testing;

use image::Rgb;
use log::debug;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::ConfigError;
use crate::utils::has_valid_extension;
use annotate::{BurnStyle, CaptionBurner, GlyphRenderer};
use aspect::{AspectPolicy, GeometrySpec};
use batch::{BatchDriver, BatchOptions, NamingMode};
use caption::{CaptionComposer, CaptionOptions};
use geometry::{BackendKind, GeometryBackend, GeometryNormalizer, ImageMagickBackend, NativeBackend};
use magick::ImageMagick;
use metadata::{ExifProbe, IdentifyProbe, MetadataProbe, MetadataReader};

/// Fully resolved settings for one run
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub geometry: GeometrySpec,
    pub aspect_policy: AspectPolicy,
    pub burn: bool,
    pub caption: CaptionOptions,
    pub naming: NamingMode,
    pub catalog_only: bool,
    pub extensions: Vec<String>,
    pub backend: BackendKind,
    pub font_name: String,
    pub font_size: u32,
    pub band_color: Rgb<u8>,
    pub text_color: Rgb<u8>,
    pub pad_color: Rgb<u8>,
    pub quality: u8,
}

impl ProcessingConfig {
    /// Wire up the capabilities this configuration asks for
    pub fn build_driver(&self) -> Result<BatchDriver, ConfigError> {
        let (probe, backend): (Box<dyn MetadataProbe>, Box<dyn GeometryBackend>) = match self.backend {
            BackendKind::Native => (Box::new(ExifProbe), Box::new(NativeBackend)),
            BackendKind::ImageMagick => {
                let magick = ImageMagick::detect().ok_or(ConfigError::ImageMagickUnavailable)?;
                debug!("Using ImageMagick via `{}`", magick.convert_program());
                (
                    Box::new(IdentifyProbe::new(magick)),
                    Box::new(ImageMagickBackend::new(magick)),
                )
            }
        };

        let burner = if self.burn && !self.catalog_only {
            let renderer = GlyphRenderer::load(&self.font_name, self.font_size)?;
            Some(CaptionBurner::new(
                Box::new(renderer),
                BurnStyle {
                    band_color: self.band_color,
                    text_color: self.text_color,
                    ..Default::default()
                },
            ))
        } else {
            None
        };

        Ok(BatchDriver::new(
            MetadataReader::new(probe),
            GeometryNormalizer::new(backend, self.geometry, self.aspect_policy, self.pad_color),
            CaptionComposer::new(self.caption.clone()),
            burner,
            BatchOptions {
                naming: self.naming,
                catalog_only: self.catalog_only,
                quality: self.quality,
            },
        ))
    }
}

/// Collect the image files under `inputs`, sorted for a stable processing order.
///
/// Directories are walked recursively and filtered by extension. Files named
/// directly are kept as given. `output_dir` is never descended into, so a
/// frame directory nested inside a photo tree does not feed its own outputs
/// back in.
pub fn discover_images(
    inputs: &[PathBuf],
    extensions: &[String],
    output_dir: Option<&Path>,
) -> Result<Vec<PathBuf>, walkdir::Error> {
    let excluded = output_dir.map(|dir| dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf()));
    let mut image_files = Vec::new();

    for input in inputs {
        if input.is_file() {
            image_files.push(input.clone());
            continue;
        }

        debug!("Scanning directory: {}", input.display());
        let walker = WalkDir::new(input)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir() && is_excluded(entry.path(), excluded.as_deref()))
            });
        for entry in walker {
            let entry = entry?;
            let path: &Path = entry.path();
            if entry.file_type().is_file() && has_valid_extension(path, extensions) {
                image_files.push(path.to_path_buf());
            }
        }
    }

    image_files.sort();
    image_files.dedup();

    debug!("Found {} image files", image_files.len());
    Ok(image_files)
}

fn is_excluded(dir: &Path, excluded: Option<&Path>) -> bool {
    let Some(excluded) = excluded else {
        return false;
    };
    if dir == excluded {
        return true;
    }
    match dir.canonicalize() {
        Ok(canonical) => canonical == excluded,
        Err(_) => false,
    }
}
