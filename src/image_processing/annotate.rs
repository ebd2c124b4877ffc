use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use log::debug;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::ConfigError;

/// Font used for captions unless one is given on the command line
pub const DEFAULT_FONT: &str = "arialbd.ttf";
pub const DEFAULT_POINT_SIZE: u32 = 15;
pub const DEFAULT_BAND_COLOR: &str = "#808080";
pub const DEFAULT_TEXT_COLOR: &str = "#FFF8DC";
pub const DEFAULT_PAD_COLOR: &str = "black";

/// Measures and draws caption text
pub trait TextRenderer {
    /// Width and height in pixels of `text` as it would be drawn
    fn measure(&self, text: &str) -> (u32, u32);

    /// Draw `text` with its top-left corner at (`x`, `y`)
    fn draw(&self, image: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>);
}

/// Renders text with a TrueType/OpenType font
pub struct GlyphRenderer {
    font: FontVec,
    scale: PxScale,
}

impl GlyphRenderer {
    /// Locate `font_spec` and prepare it at `point_size` pixels.
    ///
    /// `font_spec` may be:
    /// 1. A full path: "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf"
    /// 2. A font file name: "arialbd.ttf", searched in the system font directories
    /// 3. A family name: "Arial", mapped onto well-known file locations
    ///
    /// Names that cannot be found fall back to common bold sans fonts.
    pub fn load(font_spec: &str, point_size: u32) -> Result<Self, ConfigError> {
        let font = load_font(font_spec)?;
        Ok(Self {
            font,
            scale: PxScale::from(point_size as f32),
        })
    }
}

impl TextRenderer for GlyphRenderer {
    fn measure(&self, text: &str) -> (u32, u32) {
        text_size(self.scale, &self.font, text)
    }

    fn draw(&self, image: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
        draw_text_mut(image, color, x, y, self.scale, &self.font, text);
    }
}

/// Colors and spacing of the caption band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurnStyle {
    pub band_color: Rgb<u8>,
    pub text_color: Rgb<u8>,
    /// Rows of band above the text
    pub band_padding: u32,
}

impl Default for BurnStyle {
    fn default() -> Self {
        Self {
            band_color: Rgb([128, 128, 128]),
            text_color: Rgb([255, 248, 220]),
            band_padding: 4,
        }
    }
}

/// Top-left corner of a `text_width`x`text_height` caption centered along the
/// bottom edge of the image
pub fn placement(image_width: u32, image_height: u32, text_width: u32, text_height: u32) -> (i32, u32) {
    let x = ((image_width as f64 - text_width as f64) / 2.0).round().max(0.0) as i32;
    let y = image_height.saturating_sub(text_height);
    (x, y)
}

/// Overlays a caption on an opaque band at the bottom of the image
pub struct CaptionBurner {
    renderer: Box<dyn TextRenderer>,
    style: BurnStyle,
}

impl CaptionBurner {
    pub fn new(renderer: Box<dyn TextRenderer>, style: BurnStyle) -> Self {
        Self { renderer, style }
    }

    pub fn burn(&self, image: &mut RgbImage, text: &str) {
        if text.is_empty() {
            return;
        }

        let (image_width, image_height) = image.dimensions();
        let (text_width, text_height) = self.renderer.measure(text);
        let (x, y) = placement(image_width, image_height, text_width, text_height);

        let band_top = y.saturating_sub(self.style.band_padding);
        let band_height = image_height - band_top;
        if image_width > 0 && band_height > 0 {
            draw_filled_rect_mut(
                image,
                Rect::at(0, band_top as i32).of_size(image_width, band_height),
                self.style.band_color,
            );
        }

        debug!(
            "Caption '{}' measured {}x{}, drawn at ({}, {})",
            text, text_width, text_height, x, y
        );
        self.renderer
            .draw(image, x, y as i32, text, self.style.text_color);
    }
}

/// Parse a color given as `#RGB`, `#RRGGBB` or one of a few names
pub fn parse_color(color_str: &str) -> Result<Rgb<u8>, ConfigError> {
    let named = match color_str.to_lowercase().as_str() {
        "black" => Some([0, 0, 0]),
        "white" => Some([255, 255, 255]),
        "gray" | "grey" => Some([128, 128, 128]),
        "cornsilk" => Some([255, 248, 220]),
        _ => None,
    };
    if let Some(rgb) = named {
        return Ok(Rgb(rgb));
    }

    parse_hex_color(color_str)
}

/// Parse hex color string to RGB values
///
/// Supports formats: #RGB, #RRGGBB
pub fn parse_hex_color(color_str: &str) -> Result<Rgb<u8>, ConfigError> {
    let invalid = || ConfigError::InvalidColor(color_str.to_string());

    let hex = color_str.strip_prefix('#').ok_or_else(invalid)?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
    match hex.len() {
        3 => {
            // #RGB -> #RRGGBB
            let r = channel(&hex[0..1].repeat(2))?;
            let g = channel(&hex[1..2].repeat(2))?;
            let b = channel(&hex[2..3].repeat(2))?;
            Ok(Rgb([r, g, b]))
        }
        6 => {
            let r = channel(&hex[0..2])?;
            let g = channel(&hex[2..4])?;
            let b = channel(&hex[4..6])?;
            Ok(Rgb([r, g, b]))
        }
        _ => Err(invalid()),
    }
}

/// Format a color the way ImageMagick's `-background` expects it
pub fn to_hex(color: Rgb<u8>) -> String {
    format!("#{:02X}{:02X}{:02X}", color[0], color[1], color[2])
}

fn load_font(font_spec: &str) -> Result<FontVec, ConfigError> {
    // Strategy 1: a full path must load as given
    if Path::new(font_spec).is_absolute() || is_absolute_path(font_spec) {
        return load_font_from_path(Path::new(font_spec))
            .ok_or_else(|| ConfigError::FontUnavailable(font_spec.to_string()));
    }

    // Strategy 2: a font file name, searched in the font directories
    if is_font_filename(font_spec) {
        if let Some(font) = load_font_by_filename(font_spec) {
            return Ok(font);
        }
    }

    // Strategy 3: a family name at well-known locations
    if let Some(font) = system_font_paths(font_spec)
        .iter()
        .find_map(|path| load_font_from_path(&expand_path(path)))
    {
        return Ok(font);
    }

    // Strategy 4: any common bold sans font
    if let Some(font) = FALLBACK_FONTS
        .iter()
        .find_map(|path| load_font_from_path(Path::new(path)))
    {
        debug!("Font '{}' not found, using a fallback font", font_spec);
        return Ok(font);
    }

    Err(ConfigError::FontUnavailable(font_spec.to_string()))
}

const FALLBACK_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "/mnt/c/Windows/Fonts/arialbd.ttf",
];

/// Check if the input is an absolute path
fn is_absolute_path(path: &str) -> bool {
    path.starts_with('/') ||                           // Unix/Linux/macOS absolute path
    path.starts_with('\\') ||                          // Windows UNC path
    (path.len() > 2 && path.chars().nth(1) == Some(':')) // Windows drive path (C:, D:, etc.)
}

/// Check if the input looks like a font filename
fn is_font_filename(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    lower.ends_with(".ttf") || lower.ends_with(".otf") || lower.ends_with(".ttc")
}

fn load_font_from_path(path: &Path) -> Option<FontVec> {
    let data = std::fs::read(path).ok()?;
    match FontVec::try_from_vec(data) {
        Ok(font) => {
            debug!("Loaded font {}", path.display());
            Some(font)
        }
        Err(e) => {
            debug!("Failed to parse font {}: {}", path.display(), e);
            None
        }
    }
}

/// Search the font directories (and their subdirectories) for `filename`,
/// ignoring case
fn load_font_by_filename(filename: &str) -> Option<FontVec> {
    let wanted = filename.to_lowercase();

    font_directories()
        .iter()
        .map(|dir| expand_path(dir))
        .filter(|dir| dir.is_dir())
        .flat_map(|dir| WalkDir::new(dir).max_depth(4).into_iter().filter_map(|e| e.ok()))
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_string_lossy().to_lowercase() == wanted)
        .find_map(|entry| load_font_from_path(entry.path()))
}

/// Expand paths with ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return Path::new(&home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// Common system font directories for different platforms
fn font_directories() -> &'static [&'static str] {
    &[
        // macOS
        "/System/Library/Fonts",
        "/Library/Fonts",
        "~/Library/Fonts",
        // Linux
        "/usr/share/fonts",
        "/usr/local/share/fonts",
        "~/.fonts",
        "~/.local/share/fonts",
        // Windows (via WSL)
        "/mnt/c/Windows/Fonts",
    ]
}

/// Candidate files for a font family name
fn system_font_paths(font_name: &str) -> Vec<String> {
    let normalized = font_name.to_lowercase().replace([' ', '-'], "");

    let mut paths = vec![
        format!("/System/Library/Fonts/Supplemental/{}.ttf", font_name),
        format!("/Library/Fonts/{}.ttf", font_name),
        format!("~/Library/Fonts/{}.ttf", font_name),
        format!("/usr/share/fonts/truetype/{0}/{0}.ttf", normalized),
        format!("/usr/share/fonts/TTF/{}.ttf", font_name),
        format!("/mnt/c/Windows/Fonts/{}.ttf", font_name),
    ];

    match normalized.as_str() {
        "arial" | "arialbold" => {
            paths.push("/System/Library/Fonts/Supplemental/Arial Bold.ttf".to_string());
            paths.push("/mnt/c/Windows/Fonts/arialbd.ttf".to_string());
            paths.push("/usr/share/fonts/truetype/msttcorefonts/Arial_Bold.ttf".to_string());
        }
        "dejavusans" | "dejavusansbold" => {
            paths.push("/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf".to_string());
        }
        "liberationsans" | "liberationsansbold" => {
            paths.push("/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf".to_string());
        }
        "helvetica" | "helveticabold" => {
            paths.push("/System/Library/Fonts/Helvetica.ttc".to_string());
        }
        _ => {}
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processing::testing::BlockRenderer;

    fn burner() -> CaptionBurner {
        CaptionBurner::new(Box::new(BlockRenderer::new(6, 10)), BurnStyle::default())
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#000").unwrap(), Rgb([0, 0, 0]));
        assert_eq!(parse_hex_color("#FFF").unwrap(), Rgb([255, 255, 255]));
        assert_eq!(parse_hex_color("#FF0000").unwrap(), Rgb([255, 0, 0]));
        assert_eq!(parse_hex_color("#fff8dc").unwrap(), Rgb([255, 248, 220]));

        assert!(parse_hex_color("FF0000").is_err()); // Missing #
        assert!(parse_hex_color("#GG0000").is_err()); // Invalid hex
        assert!(parse_hex_color("#+1+2+3").is_err());
        assert!(parse_hex_color("#FF00").is_err());
    }

    #[test]
    fn test_parse_color_names_and_defaults() {
        assert_eq!(parse_color(DEFAULT_PAD_COLOR).unwrap(), Rgb([0, 0, 0]));
        assert_eq!(parse_color("Grey").unwrap(), Rgb([128, 128, 128]));
        assert_eq!(
            parse_color(DEFAULT_BAND_COLOR).unwrap(),
            BurnStyle::default().band_color
        );
        assert_eq!(
            parse_color(DEFAULT_TEXT_COLOR).unwrap(),
            BurnStyle::default().text_color
        );
        assert!(matches!(
            parse_color("chartreuse"),
            Err(ConfigError::InvalidColor(_))
        ));
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(Rgb([255, 248, 220])), "#FFF8DC");
        assert_eq!(to_hex(Rgb([0, 0, 0])), "#000000");
    }

    #[test]
    fn test_is_absolute_path() {
        assert!(is_absolute_path("/usr/share/fonts/font.ttf"));
        assert!(is_absolute_path("C:\\Windows\\Fonts\\arial.ttf"));
        assert!(is_absolute_path("\\\\server\\share\\fonts\\font.ttf"));

        assert!(!is_absolute_path("Arial.ttf"));
        assert!(!is_absolute_path("fonts/Arial.ttf"));
        assert!(!is_absolute_path("./Arial.ttf"));
    }

    #[test]
    fn test_is_font_filename() {
        assert!(is_font_filename("arialbd.ttf"));
        assert!(is_font_filename("Arial.TTF"));
        assert!(is_font_filename("font.otf"));
        assert!(is_font_filename("font.ttc"));

        assert!(!is_font_filename("Arial"));
        assert!(!is_font_filename("Arial.txt"));
    }

    #[test]
    fn test_missing_font_path_is_config_error() {
        let result = GlyphRenderer::load("/nonexistent/fonts/NoSuchFont.ttf", 15);
        assert!(matches!(result, Err(ConfigError::FontUnavailable(_))));
    }

    #[test]
    fn test_placement_centers_along_bottom() {
        assert_eq!(placement(800, 600, 200, 20), (300, 580));
        assert_eq!(placement(801, 600, 200, 20), (301, 580));
    }

    #[test]
    fn test_placement_wider_than_image_clamps_to_left_edge() {
        assert_eq!(placement(100, 50, 300, 20), (0, 30));
        assert_eq!(placement(100, 10, 50, 40), (25, 0));
    }

    #[test]
    fn test_burn_draws_band_and_text() {
        let mut img = RgbImage::from_pixel(100, 60, Rgb([0, 0, 255]));
        burner().burn(&mut img, "Hello");

        // Text is 30x10 at (35, 50); band starts 4 rows above it
        let style = BurnStyle::default();
        assert_eq!(img.get_pixel(0, 45), &Rgb([0, 0, 255]));
        assert_eq!(img.get_pixel(0, 46), &style.band_color);
        assert_eq!(img.get_pixel(99, 59), &style.band_color);
        assert_eq!(img.get_pixel(34, 55), &style.band_color);
        assert_eq!(img.get_pixel(35, 55), &style.text_color);
        assert_eq!(img.get_pixel(64, 59), &style.text_color);
        assert_eq!(img.get_pixel(65, 55), &style.band_color);
    }

    #[test]
    fn test_burn_empty_caption_is_noop() {
        let original = RgbImage::from_pixel(40, 30, Rgb([7, 8, 9]));
        let mut img = original.clone();
        burner().burn(&mut img, "");

        assert_eq!(img, original);
    }

    #[test]
    fn test_burn_text_taller_than_image() {
        let mut img = RgbImage::from_pixel(20, 5, Rgb([0, 0, 255]));
        burner().burn(&mut img, "Hi");

        assert_eq!(img.dimensions(), (20, 5));
        assert_eq!(img.get_pixel(0, 0), &BurnStyle::default().band_color);
    }

    #[test]
    fn test_burn_keeps_dimensions() {
        let mut img = RgbImage::from_pixel(64, 48, Rgb([0, 0, 0]));
        burner().burn(&mut img, &"x".repeat(40));

        assert_eq!(img.dimensions(), (64, 48));
    }
}
