use crate::cli::{Args, DEFAULT_EXTENSIONS, DEFAULT_LOG_LEVEL, DEFAULT_SIZE};
use crate::error::ConfigError;
use crate::image_processing::annotate::{
    DEFAULT_BAND_COLOR, DEFAULT_FONT, DEFAULT_PAD_COLOR, DEFAULT_POINT_SIZE, DEFAULT_TEXT_COLOR,
};
use crate::image_processing::aspect::{AspectPolicy, DEFAULT_TOLERANCE};
use crate::image_processing::batch::{NamingMode, DEFAULT_QUALITY};
use crate::image_processing::caption::DEFAULT_MAX_CAPTION_LEN;
use crate::image_processing::geometry::BackendKind;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings file format. Every field is optional.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigFile {
    pub input_paths: Option<Vec<PathBuf>>,
    pub output_path: Option<PathBuf>,
    pub size: Option<String>,
    pub tolerance: Option<f64>,
    pub aspect_policy: Option<String>,
    pub burn: Option<bool>,
    pub caption: Option<String>,
    pub default_caption: Option<String>,
    pub date_in_caption: Option<bool>,
    pub max_caption_len: Option<usize>,
    pub naming: Option<String>,
    pub catalog: Option<String>,
    pub just_catalog: Option<bool>,
    pub extensions: Option<String>,
    pub backend: Option<String>,
    pub font: Option<String>,
    pub pointsize: Option<u32>,
    pub band_color: Option<String>,
    pub text_color: Option<String>,
    pub pad_color: Option<String>,
    pub quality: Option<u8>,
    pub loglevel: Option<String>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config_error = |reason: String| ConfigError::ConfigFile {
            path: path.to_path_buf(),
            reason,
        };

        let contents = fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
        serde_json::from_str(&contents).map_err(|e| config_error(e.to_string()))
    }
}

impl Args {
    /// Load configuration from a JSON file and merge with command-line arguments.
    /// Command-line arguments take precedence over config file values.
    ///
    /// Returns the path that was loaded. This runs before logging is set up
    /// (the file may choose the log level), so reporting it is the caller's job.
    pub fn load_and_merge_config(&mut self) -> Result<Option<PathBuf>, ConfigError> {
        let Some(config_path) = self.config_file.clone() else {
            return Ok(None);
        };
        let config = ConfigFile::load(&config_path)?;
        self.merge_from_config(config, &config_path)?;
        Ok(Some(config_path))
    }

    /// Apply `config` to every option still at its default
    pub fn merge_from_config(&mut self, config: ConfigFile, path: &Path) -> Result<(), ConfigError> {
        let enum_error = |field: &str, value: &str| ConfigError::ConfigFile {
            path: path.to_path_buf(),
            reason: format!("invalid {} '{}'", field, value),
        };

        // Paths - only apply if not specified on CLI
        if self.input_paths.is_empty() {
            if let Some(inputs) = config.input_paths {
                self.input_paths = inputs;
            }
        }

        if self.output_dir.is_none() {
            self.output_dir = config.output_path;
        }

        if self.catalog.is_none() {
            self.catalog = config.catalog;
        }

        if self.caption.is_none() {
            self.caption = config.caption;
        }

        // Enums - only apply if using defaults
        if self.aspect_policy == AspectPolicy::Pad {
            if let Some(policy) = config.aspect_policy {
                self.aspect_policy = AspectPolicy::from_str(&policy, true)
                    .map_err(|_| enum_error("aspectPolicy", &policy))?;
            }
        }

        if self.naming == NamingMode::Timestamped {
            if let Some(naming) = config.naming {
                self.naming =
                    NamingMode::from_str(&naming, true).map_err(|_| enum_error("naming", &naming))?;
            }
        }

        if self.backend == BackendKind::Native {
            if let Some(backend) = config.backend {
                self.backend = BackendKind::from_str(&backend, true)
                    .map_err(|_| enum_error("backend", &backend))?;
            }
        }

        // Boolean flags - only apply if currently at their default
        if !self.burn {
            self.burn = config.burn.unwrap_or(false);
        }

        if !self.just_catalog {
            self.just_catalog = config.just_catalog.unwrap_or(false);
        }

        if !self.no_date_in_caption {
            self.no_date_in_caption = !config.date_in_caption.unwrap_or(true);
        }

        // Numeric parameters - only apply if using defaults
        if self.tolerance == DEFAULT_TOLERANCE {
            if let Some(tolerance) = config.tolerance {
                self.tolerance = tolerance;
            }
        }

        if self.max_caption_len == DEFAULT_MAX_CAPTION_LEN {
            if let Some(len) = config.max_caption_len {
                self.max_caption_len = len;
            }
        }

        if self.pointsize == DEFAULT_POINT_SIZE {
            if let Some(size) = config.pointsize {
                self.pointsize = size;
            }
        }

        if self.quality == DEFAULT_QUALITY {
            if let Some(quality) = config.quality {
                self.quality = quality;
            }
        }

        // String parameters - only apply if using defaults
        let strings = [
            (&mut self.size, DEFAULT_SIZE, config.size),
            (&mut self.default_caption, "", config.default_caption),
            (&mut self.extensions_str, DEFAULT_EXTENSIONS, config.extensions),
            (&mut self.font, DEFAULT_FONT, config.font),
            (&mut self.band_color, DEFAULT_BAND_COLOR, config.band_color),
            (&mut self.text_color, DEFAULT_TEXT_COLOR, config.text_color),
            (&mut self.pad_color, DEFAULT_PAD_COLOR, config.pad_color),
            (&mut self.loglevel, DEFAULT_LOG_LEVEL, config.loglevel),
        ];
        for (current, default, configured) in strings {
            if current.as_str() == default {
                if let Some(value) = configured {
                    *current = value;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(json: &str) -> ConfigFile {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_config_fills_defaults() {
        let mut args = Args::default();
        let config = parse(
            r##"{
                "inputPaths": ["/photos"],
                "outputPath": "/frame",
                "size": "800x600",
                "burn": true,
                "dateInCaption": false,
                "aspectPolicy": "reject",
                "backend": "imagemagick",
                "bandColor": "#000000",
                "quality": 80
            }"##,
        );

        args.merge_from_config(config, Path::new("frame.json")).unwrap();

        assert_eq!(args.input_paths, vec![PathBuf::from("/photos")]);
        assert_eq!(args.output_dir, Some(PathBuf::from("/frame")));
        assert_eq!(args.size, "800x600");
        assert!(args.burn);
        assert!(args.no_date_in_caption);
        assert_eq!(args.aspect_policy, AspectPolicy::Reject);
        assert_eq!(args.backend, BackendKind::ImageMagick);
        assert_eq!(args.band_color, "#000000");
        assert_eq!(args.quality, 80);
        assert_eq!(args.text_color, DEFAULT_TEXT_COLOR);
    }

    #[test]
    fn test_command_line_wins() {
        let mut args = Args {
            size: "640x480".to_string(),
            output_dir: Some(PathBuf::from("/cli")),
            naming: NamingMode::Plain,
            ..Default::default()
        };
        let config = parse(r#"{"size": "800x600", "outputPath": "/json", "naming": "timestamped"}"#);

        args.merge_from_config(config, Path::new("frame.json")).unwrap();

        assert_eq!(args.size, "640x480");
        assert_eq!(args.output_dir, Some(PathBuf::from("/cli")));
        assert_eq!(args.naming, NamingMode::Plain);
    }

    #[test]
    fn test_invalid_enum_is_config_error() {
        let mut args = Args::default();
        let config = parse(r#"{"backend": "gimp"}"#);

        assert!(matches!(
            args.merge_from_config(config, Path::new("frame.json")),
            Err(ConfigError::ConfigFile { .. })
        ));
    }

    #[test]
    fn test_load_reports_bad_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("frame.json");

        assert!(matches!(
            ConfigFile::load(&path),
            Err(ConfigError::ConfigFile { .. })
        ));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ConfigFile::load(&path),
            Err(ConfigError::ConfigFile { .. })
        ));

        std::fs::write(&path, r#"{"unknownKey": 1}"#).unwrap();
        assert!(matches!(
            ConfigFile::load(&path),
            Err(ConfigError::ConfigFile { .. })
        ));
    }

    #[test]
    fn test_load_and_merge_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("frame.json");
        std::fs::write(&path, r#"{"defaultCaption": "Family archive", "pointsize": 22}"#).unwrap();

        let mut args = Args {
            config_file: Some(path.clone()),
            ..Default::default()
        };
        assert_eq!(args.load_and_merge_config().unwrap(), Some(path));

        assert_eq!(args.default_caption, "Family archive");
        assert_eq!(args.pointsize, 22);
    }

    #[test]
    fn test_load_and_merge_without_file_is_noop() {
        let mut args = Args::default();
        assert_eq!(args.load_and_merge_config().unwrap(), None);
        assert_eq!(args.size, DEFAULT_SIZE);
    }

    #[test]
    fn test_config_file_can_choose_log_level() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("frame.json");
        std::fs::write(&path, r#"{"loglevel": "DEBUG"}"#).unwrap();

        let mut args = Args {
            config_file: Some(path),
            ..Default::default()
        };
        args.load_and_merge_config().unwrap();
        assert_eq!(args.loglevel, "DEBUG");
    }
}
