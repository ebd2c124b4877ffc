use clap::Parser;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::image_processing::annotate::{
    parse_color, DEFAULT_BAND_COLOR, DEFAULT_FONT, DEFAULT_PAD_COLOR, DEFAULT_POINT_SIZE,
    DEFAULT_TEXT_COLOR,
};
use crate::image_processing::aspect::{AspectPolicy, GeometrySpec, DEFAULT_TOLERANCE};
use crate::image_processing::batch::{NamingMode, DEFAULT_QUALITY};
use crate::image_processing::caption::{CaptionOptions, DEFAULT_MAX_CAPTION_LEN};
use crate::image_processing::catalog::DEFAULT_CATALOG_NAME;
use crate::image_processing::geometry::BackendKind;
use crate::image_processing::ProcessingConfig;
use crate::utils::write_verbose;

pub const DEFAULT_SIZE: &str = "1024x768";
pub const DEFAULT_EXTENSIONS: &str = "jpg,jpeg";
pub const DEFAULT_LOG_LEVEL: &str = "WARNING";

#[derive(Parser, Debug)]
#[command(
    name = "digiframe-processor",
    version,
    about = "Normalize JPEG photos for digital photo frames",
    long_about = "
Digital Frame - Photo Normalizer

Pads and scales every photo to the frame's exact resolution without cropping,
optionally burns a caption built from the embedded IPTC caption and capture date
into a band along the bottom edge, names outputs so they sort by capture time,
and records every photo in a CSV catalog.

Runs are idempotent: photos that already have an output are left alone.

Example Usage:
  # Normalize a photo tree for a 1024x768 frame
  digiframe-processor -i ~/Photos -o ~/frame

  # 800x600 frame with burned-in captions
  digiframe-processor -i ~/Photos -o ~/frame -s 800x600 --burn

  # Same caption on every photo, no dates
  digiframe-processor -i ~/Photos/Wedding -o ~/frame -b \\
    --caption \"Anna & Tom, June 2014\" --no-date-in-caption

  # Only write the catalog, to stdout
  digiframe-processor -i ~/Photos -o ~/frame --just-catalog -c -

  # Skip photos whose aspect ratio is off by more than 0.05
  digiframe-processor -i ~/Photos -o ~/frame --tolerance 0.05 --reject-bad-aspect

  # Use ImageMagick instead of the built-in raster code
  digiframe-processor -i ~/Photos -o ~/frame --backend imagemagick --loglevel INFO"
)]
pub struct Args {
    /// Input directories or single image files (can be specified multiple times)
    #[arg(
        short = 'i',
        long = "input",
        required_unless_present = "config_file",
        value_name = "DIR|FILE"
    )]
    pub input_paths: Vec<PathBuf>,

    /// Output directory for normalized images
    #[arg(
        short = 'o',
        long = "output",
        required_unless_present = "config_file",
        value_name = "DIR"
    )]
    pub output_dir: Option<PathBuf>,

    /// Target frame size (format: WIDTHxHEIGHT, e.g., 800x600)
    #[arg(
        short = 's',
        long = "size",
        default_value = DEFAULT_SIZE,
        value_name = "WIDTHxHEIGHT"
    )]
    pub size: String,

    /// Allowed difference between a photo's aspect ratio and the frame's
    #[arg(long = "tolerance", default_value_t = DEFAULT_TOLERANCE, value_name = "RATIO")]
    pub tolerance: f64,

    /// What to do with photos outside the aspect tolerance
    #[arg(long = "aspect-policy", value_enum, default_value_t = AspectPolicy::Pad)]
    pub aspect_policy: AspectPolicy,

    /// Do not write photos outside the aspect tolerance (same as --aspect-policy reject)
    #[arg(long = "reject-bad-aspect")]
    pub reject_bad_aspect: bool,

    /// Burn the caption into the bottom of each image
    #[arg(short = 'b', long = "burn")]
    pub burn: bool,

    /// Caption for every photo, replacing embedded captions
    #[arg(long = "caption", value_name = "TEXT")]
    pub caption: Option<String>,

    /// Caption for photos that have none of their own
    #[arg(long = "default-caption", default_value = "", value_name = "TEXT")]
    pub default_caption: String,

    /// Do not prefix captions with the capture date
    #[arg(long = "no-date-in-caption")]
    pub no_date_in_caption: bool,

    /// Longest caption burned into an image; longer ones end in "..."
    #[arg(long = "max-caption-len", default_value_t = DEFAULT_MAX_CAPTION_LEN, value_name = "CHARS")]
    pub max_caption_len: usize,

    /// Output file naming
    #[arg(long = "naming", value_enum, default_value_t = NamingMode::Timestamped)]
    pub naming: NamingMode,

    /// Catalog CSV file, or "-" for stdout [default: <output>/digitalframe-catalog.csv]
    #[arg(short = 'c', long = "catalog", value_name = "FILE|-")]
    pub catalog: Option<String>,

    /// Only write the catalog, do not create images
    #[arg(short = 'j', long = "just-catalog")]
    pub just_catalog: bool,

    /// Comma-separated list of image extensions to process
    #[arg(long = "extensions", default_value = DEFAULT_EXTENSIONS)]
    pub extensions_str: String,

    /// Raster backend for padding and scaling
    #[arg(long = "backend", value_enum, default_value_t = BackendKind::Native)]
    pub backend: BackendKind,

    /// Font specification for captions. Supports three formats:
    /// - Font name: "Arial" (searches system fonts)
    /// - Font filename: "arialbd.ttf" (searches in font directories)
    /// - Full path: "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf" (loads directly)
    #[arg(long = "font", default_value = DEFAULT_FONT, value_name = "FONT")]
    pub font: String,

    /// Font size for captions
    #[arg(long = "pointsize", default_value_t = DEFAULT_POINT_SIZE, value_name = "SIZE")]
    pub pointsize: u32,

    /// Color of the band behind captions (hex, e.g., #808080)
    #[arg(long = "band-color", default_value = DEFAULT_BAND_COLOR, value_name = "COLOR")]
    pub band_color: String,

    /// Caption text color (hex, e.g., #FFF8DC)
    #[arg(long = "text-color", default_value = DEFAULT_TEXT_COLOR, value_name = "COLOR")]
    pub text_color: String,

    /// Color of the padding added to reach the frame's aspect ratio
    #[arg(long = "pad-color", default_value = DEFAULT_PAD_COLOR, value_name = "COLOR")]
    pub pad_color: String,

    /// JPEG quality of the written images (1-100)
    #[arg(long = "quality", default_value_t = DEFAULT_QUALITY, value_name = "QUALITY")]
    pub quality: u8,

    /// Log level: CRITICAL, ERROR, WARNING, INFO, DEBUG or TRACE
    #[arg(long = "loglevel", default_value = DEFAULT_LOG_LEVEL, value_name = "LEVEL")]
    pub loglevel: String,

    /// Enable verbose output (at least INFO logging)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// JSON file with settings for options left at their defaults
    #[arg(long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,
}

/// Where catalog rows go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogTarget {
    Stdout,
    File(PathBuf),
}

impl CatalogTarget {
    /// Catalog rows own stdout; banners, verbose output and the report must
    /// go to stderr
    pub fn is_stdout(&self) -> bool {
        matches!(self, CatalogTarget::Stdout)
    }
}

impl Args {
    /// Parse the size string into width and height
    pub fn parse_size(&self) -> Result<(u32, u32), ConfigError> {
        let invalid = || ConfigError::InvalidSize(self.size.clone());

        let (width, height) = self.size.split_once(['x', 'X']).ok_or_else(invalid)?;
        let width = width.trim().parse::<u32>().map_err(|_| invalid())?;
        let height = height.trim().parse::<u32>().map_err(|_| invalid())?;

        if width == 0 || height == 0 || width > 10000 || height > 10000 {
            return Err(invalid());
        }

        Ok((width, height))
    }

    /// Parse the extensions string into a vector
    pub fn parse_extensions(&self) -> Vec<String> {
        self.extensions_str
            .split(',')
            .map(|s| s.trim().trim_start_matches('.').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn effective_aspect_policy(&self) -> AspectPolicy {
        if self.reject_bad_aspect {
            AspectPolicy::Reject
        } else {
            self.aspect_policy
        }
    }

    pub fn output_dir(&self) -> Result<&Path, ConfigError> {
        self.output_dir.as_deref().ok_or(ConfigError::MissingOutput)
    }

    pub fn catalog_target(&self) -> Result<CatalogTarget, ConfigError> {
        match self.catalog.as_deref() {
            Some("-") => Ok(CatalogTarget::Stdout),
            Some(path) => Ok(CatalogTarget::File(PathBuf::from(path))),
            None => Ok(CatalogTarget::File(self.output_dir()?.join(DEFAULT_CATALOG_NAME))),
        }
    }

    /// Describe the resolved configuration on `out` when verbose mode is on
    pub fn write_configuration<W: Write>(
        &self,
        out: &mut W,
        config: &ProcessingConfig,
        catalog_target: &CatalogTarget,
    ) -> io::Result<()> {
        let verbose = self.verbose;
        let (width, height) = (config.geometry.target_width, config.geometry.target_height);

        write_verbose(out, verbose, "Configuration:")?;
        write_verbose(
            out,
            verbose,
            &format!("  Input paths: {} path(s)", self.input_paths.len()),
        )?;
        for (i, path) in self.input_paths.iter().enumerate() {
            write_verbose(out, verbose, &format!("    {}: {}", i + 1, path.display()))?;
        }
        if let Some(output_dir) = &self.output_dir {
            write_verbose(out, verbose, &format!("  Output: {}", output_dir.display()))?;
        }
        write_verbose(
            out,
            verbose,
            &format!(
                "  Target size: {}x{} (tolerance {})",
                width, height, config.geometry.tolerance
            ),
        )?;
        write_verbose(out, verbose, &format!("  Aspect policy: {}", config.aspect_policy))?;
        write_verbose(out, verbose, &format!("  Backend: {}", config.backend))?;
        write_verbose(out, verbose, &format!("  Naming: {}", config.naming))?;
        write_verbose(out, verbose, &format!("  Burn captions: {}", config.burn))?;
        if config.burn {
            write_verbose(
                out,
                verbose,
                &format!("  Font: {} at {}pt", config.font_name, config.font_size),
            )?;
        }
        write_verbose(out, verbose, &format!("  Catalog only: {}", config.catalog_only))?;
        match catalog_target {
            CatalogTarget::Stdout => write_verbose(out, verbose, "  Catalog: stdout")?,
            CatalogTarget::File(path) => {
                write_verbose(out, verbose, &format!("  Catalog: {}", path.display()))?
            }
        }
        write_verbose(
            out,
            verbose,
            &format!("  Extensions: {}", config.extensions.join(", ")),
        )
    }

    /// Validate the arguments and resolve them into a [`ProcessingConfig`]
    pub fn processing_config(&self) -> Result<ProcessingConfig, ConfigError> {
        crate::utils::validate_inputs(self)?;

        let (target_width, target_height) = self.parse_size()?;

        Ok(ProcessingConfig {
            geometry: GeometrySpec {
                target_width,
                target_height,
                tolerance: self.tolerance,
            },
            aspect_policy: self.effective_aspect_policy(),
            burn: self.burn,
            caption: CaptionOptions {
                override_caption: self.caption.clone(),
                default_caption: self.default_caption.clone(),
                date_in_caption: !self.no_date_in_caption,
                max_len: self.max_caption_len,
            },
            naming: self.naming,
            catalog_only: self.just_catalog,
            extensions: self.parse_extensions(),
            backend: self.backend,
            font_name: self.font.clone(),
            font_size: self.pointsize,
            band_color: parse_color(&self.band_color)?,
            text_color: parse_color(&self.text_color)?,
            pad_color: parse_color(&self.pad_color)?,
            quality: self.quality,
        })
    }
}


// Default implementation for tests
#[cfg(test)]
impl Default for Args {
    fn default() -> Self {
        Self {
            input_paths: vec![],
            output_dir: None,
            size: DEFAULT_SIZE.to_string(),
            tolerance: DEFAULT_TOLERANCE,
            aspect_policy: AspectPolicy::Pad,
            reject_bad_aspect: false,
            burn: false,
            caption: None,
            default_caption: String::new(),
            no_date_in_caption: false,
            max_caption_len: DEFAULT_MAX_CAPTION_LEN,
            naming: NamingMode::Timestamped,
            catalog: None,
            just_catalog: false,
            extensions_str: DEFAULT_EXTENSIONS.to_string(),
            backend: BackendKind::Native,
            font: DEFAULT_FONT.to_string(),
            pointsize: DEFAULT_POINT_SIZE,
            band_color: DEFAULT_BAND_COLOR.to_string(),
            text_color: DEFAULT_TEXT_COLOR.to_string(),
            pad_color: DEFAULT_PAD_COLOR.to_string(),
            quality: DEFAULT_QUALITY,
            loglevel: DEFAULT_LOG_LEVEL.to_string(),
            verbose: false,
            config_file: None,
        }
    }
}
