use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use crate::cli::Args;
use crate::error::ConfigError;
use crate::image_processing::annotate::parse_color;

/// Create a styled progress bar
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let template = ProgressStyle::with_template(
        "{spinner:.blue} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg} ({eta})",
    )
    .map(|style| style.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(template);
    pb
}

/// Format duration in a human-readable way
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{}m {}s", mins, secs)
    } else if total_secs > 0 {
        format!("{}.{:03}s", total_secs, millis)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Validate command line arguments before any file is touched
pub fn validate_inputs(args: &Args) -> Result<(), ConfigError> {
    // Validate input paths (directories or files)
    if args.input_paths.is_empty() {
        return Err(ConfigError::NoInputs);
    }
    for input_path in &args.input_paths {
        if !input_path.is_dir() && !input_path.is_file() {
            return Err(ConfigError::InputNotFound(input_path.clone()));
        }
    }

    args.output_dir()?;
    args.parse_size()?;

    if !(args.tolerance.is_finite() && args.tolerance > 0.0) {
        return Err(ConfigError::InvalidTolerance(args.tolerance));
    }

    // Validate extensions
    if args.parse_extensions().is_empty() {
        return Err(ConfigError::NoExtensions);
    }

    // Validate font size
    if args.pointsize == 0 || args.pointsize > 200 {
        return Err(ConfigError::InvalidFontSize(args.pointsize));
    }

    if args.max_caption_len < 4 {
        return Err(ConfigError::InvalidCaptionLength(args.max_caption_len));
    }

    if !(1..=100).contains(&args.quality) {
        return Err(ConfigError::InvalidQuality(args.quality));
    }

    // Validate color formats
    for color in [&args.band_color, &args.text_color, &args.pad_color] {
        parse_color(color)?;
    }

    Ok(())
}

/// Get file extension in lowercase
pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Check if a file has one of the specified extensions
pub fn has_valid_extension(path: &Path, extensions: &[String]) -> bool {
    if let Some(ext) = get_file_extension(path) {
        extensions.contains(&ext)
    } else {
        false
    }
}

/// Write verbose information to `out` if verbose mode is enabled
pub fn write_verbose<W: Write>(out: &mut W, verbose: bool, message: &str) -> io::Result<()> {
    if verbose {
        writeln!(out, "{} {}", style("[VERBOSE]").dim(), message)?;
    }
    Ok(())
}

/// Print error message
pub fn error_println(message: &str) {
    eprintln!("{} {}", style("[ERROR]").red().bold(), message);
}
