//! Capture date, pixel dimensions and caption extraction.
//!
//! The reader is split in two layers. A [`MetadataProbe`] talks to whatever
//! actually understands the file (ImageMagick's `identify`, or the EXIF reader
//! plus image header) and returns raw text fields. [`MetadataReader`] turns those
//! fields into a [`PhotoMetadata`]: it validates dimensions, parses the timestamp
//! with a single fixed format and normalizes caption whitespace.
//!
//! An unparseable timestamp is not an error. Many photos carry no digitization
//! time, so the reader stores "unknown" and lets the pipeline continue.

use chrono::{Datelike, NaiveDateTime};
use exif::{In, Reader, Tag, Value};
use iptc::{IPTCTag, IPTC};
use std::path::Path;

use super::magick::{exit_code, stderr_text, ImageMagick};
use crate::error::MetadataError;

/// EXIF date format: "YYYY:MM:DD HH:MM:SS"
pub const CAPTURE_TIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Year used as the "unknown capture time" sentinel
pub const UNKNOWN_CAPTURE_YEAR: i32 = 1900;

const UNKNOWN_FILENAME_STAMP: &str = "19000101T000000";
const UNKNOWN_CATALOG_DATE: &str = "1900-01-01 00:00:00";

const FIELD_SEPARATOR: char = '\u{1f}';
const RECORD_SEPARATOR: char = '\u{1e}';

/// `identify -format` template: width, height, IPTC caption and EXIF digitization
/// time separated by ASCII unit separators and closed by a record separator.
pub const IDENTIFY_FORMAT: &str =
    "%w\u{1f}%h\u{1f}%[IPTC:2:120]\u{1f}%[EXIF:DateTimeDigitized]\u{1e}";

/// Metadata of a single photo, produced once per input file
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoMetadata {
    /// `None` is the "unknown" sentinel
    pub capture_timestamp: Option<NaiveDateTime>,
    pub width: u32,
    pub height: u32,
    pub embedded_caption: Option<String>,
}

impl PhotoMetadata {
    /// Timestamp prefix used for chronologically sortable output names
    pub fn filename_stamp(&self) -> String {
        match self.capture_timestamp {
            Some(timestamp) => timestamp.format("%Y%m%dT%H%M%S").to_string(),
            None => UNKNOWN_FILENAME_STAMP.to_string(),
        }
    }

    /// Date column of the catalog
    pub fn catalog_date(&self) -> String {
        format_catalog_date(self.capture_timestamp)
    }
}

pub fn format_catalog_date(timestamp: Option<NaiveDateTime>) -> String {
    match timestamp {
        Some(timestamp) => timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => UNKNOWN_CATALOG_DATE.to_string(),
    }
}

/// Raw fields reported by a metadata probe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOutput {
    pub width: u32,
    pub height: u32,
    pub caption: Option<String>,
    pub timestamp: Option<String>,
}

/// Capability that inspects a photo file and reports its raw metadata fields
pub trait MetadataProbe {
    fn probe(&self, path: &Path) -> Result<ProbeOutput, MetadataError>;
}

pub struct MetadataReader {
    probe: Box<dyn MetadataProbe>,
}

impl MetadataReader {
    pub fn new(probe: Box<dyn MetadataProbe>) -> Self {
        Self { probe }
    }

    pub fn read(&self, path: &Path) -> Result<PhotoMetadata, MetadataError> {
        let raw = self.probe.probe(path)?;

        if raw.width == 0 || raw.height == 0 {
            return Err(MetadataError::InvalidDimensions {
                path: path.to_path_buf(),
                width: raw.width,
                height: raw.height,
            });
        }

        let capture_timestamp = raw.timestamp.as_deref().and_then(parse_capture_time);
        if capture_timestamp.is_none() {
            log::debug!("No usable capture time for {}", path.display());
        }

        Ok(PhotoMetadata {
            capture_timestamp,
            width: raw.width,
            height: raw.height,
            embedded_caption: raw.caption.as_deref().and_then(normalize_caption),
        })
    }
}

/// Parse an EXIF timestamp. Malformed text and the 1900 sentinel yield `None`.
pub fn parse_capture_time(text: &str) -> Option<NaiveDateTime> {
    let trimmed = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    let timestamp = NaiveDateTime::parse_from_str(trimmed, CAPTURE_TIME_FORMAT).ok()?;
    (timestamp.year() != UNKNOWN_CAPTURE_YEAR).then_some(timestamp)
}

/// Collapse whitespace runs to single spaces; blank captions become `None`
pub fn normalize_caption(text: &str) -> Option<String> {
    let normalized = text
        .split(|c: char| c.is_whitespace() || c == '\0')
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!normalized.is_empty()).then_some(normalized)
}

/// Metadata probe backed by ImageMagick's `identify`
pub struct IdentifyProbe {
    magick: ImageMagick,
}

impl IdentifyProbe {
    pub fn new(magick: ImageMagick) -> Self {
        Self { magick }
    }
}

impl MetadataProbe for IdentifyProbe {
    fn probe(&self, path: &Path) -> Result<ProbeOutput, MetadataError> {
        let output = self
            .magick
            .identify()
            .arg("-format")
            .arg(IDENTIFY_FORMAT)
            .arg(path)
            .output()
            .map_err(|source| MetadataError::Spawn {
                tool: self.magick.identify_program().to_string(),
                path: path.to_path_buf(),
                source,
            })?;

        if !output.status.success() {
            return Err(MetadataError::ProbeFailed {
                path: path.to_path_buf(),
                status: exit_code(&output),
                stderr: stderr_text(&output),
            });
        }

        parse_identify_output(path, &String::from_utf8_lossy(&output.stdout))
    }
}

/// Strict fixed-field parser for [`IDENTIFY_FORMAT`] output.
///
/// Only the first record is used (multi-frame files print one per frame).
pub fn parse_identify_output(path: &Path, text: &str) -> Result<ProbeOutput, MetadataError> {
    let malformed = |reason: String| MetadataError::Malformed {
        path: path.to_path_buf(),
        reason,
    };

    let record = match text.find(RECORD_SEPARATOR) {
        Some(end) => &text[..end],
        None => return Err(malformed("missing record terminator".to_string())),
    };

    let fields: Vec<&str> = record.split(FIELD_SEPARATOR).collect();
    let [width, height, caption, timestamp] = fields.as_slice() else {
        return Err(malformed(format!(
            "expected 4 fields, found {}",
            fields.len()
        )));
    };

    let width = width
        .trim()
        .parse::<u32>()
        .map_err(|_| malformed(format!("width '{}' is not a positive integer", width)))?;
    let height = height
        .trim()
        .parse::<u32>()
        .map_err(|_| malformed(format!("height '{}' is not a positive integer", height)))?;

    Ok(ProbeOutput {
        width,
        height,
        caption: non_empty(caption),
        timestamp: non_empty(timestamp),
    })
}

fn non_empty(field: &str) -> Option<String> {
    let trimmed = field.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Metadata probe that reads the image header, IPTC and EXIF blocks in-process.
///
/// Dimensions are mandatory; a missing EXIF block only means no timestamp.
/// The caption is IPTC Caption/Abstract (2:120), where Picasa and most photo
/// managers write it, falling back to EXIF `ImageDescription`.
pub struct ExifProbe;

impl MetadataProbe for ExifProbe {
    fn probe(&self, path: &Path) -> Result<ProbeOutput, MetadataError> {
        let header_error = |source: image::ImageError| MetadataError::Header {
            path: path.to_path_buf(),
            source,
        };

        let (width, height) = image::ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| header_error(image::ImageError::IoError(e)))?
            .into_dimensions()
            .map_err(header_error)?;

        let exif = match read_exif(path) {
            Ok(exif) => Some(exif),
            Err(e) => {
                log::debug!("No EXIF block in {}: {}", path.display(), e);
                None
            }
        };

        let timestamp = exif
            .as_ref()
            .and_then(|exif| first_ascii_field(exif, &[Tag::DateTimeDigitized, Tag::DateTimeOriginal]));
        let caption = read_iptc_caption(path).or_else(|| {
            exif.as_ref()
                .and_then(|exif| first_ascii_field(exif, &[Tag::ImageDescription]))
        });

        Ok(ProbeOutput {
            width,
            height,
            caption,
            timestamp,
        })
    }
}

fn read_iptc_caption(path: &Path) -> Option<String> {
    match IPTC::read_from_path(path) {
        Ok(iptc) => non_empty(&iptc.get(IPTCTag::Caption)),
        Err(e) => {
            log::debug!("No IPTC block in {}: {}", path.display(), e);
            None
        }
    }
}

fn read_exif(path: &Path) -> Result<exif::Exif, exif::Error> {
    let file = std::fs::File::open(path)?;
    let mut buf_reader = std::io::BufReader::new(file);
    Reader::new().read_from_container(&mut buf_reader)
}

/// First non-blank ASCII value among `tags`, in order
fn first_ascii_field(exif: &exif::Exif, tags: &[Tag]) -> Option<String> {
    tags.iter().find_map(|&tag| {
        let field = exif.get_field(tag, In::PRIMARY)?;
        match &field.value {
            Value::Ascii(values) => values
                .first()
                .map(|bytes| String::from_utf8_lossy(bytes).to_string())
                .and_then(|text| non_empty(text.trim_matches('\0'))),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processing::testing::{write_jpeg_with_iptc_caption, StaticProbe};
    use chrono::NaiveDate;
    use image::RgbImage;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn record(fields: &[&str]) -> String {
        format!("{}{}", fields.join("\u{1f}"), RECORD_SEPARATOR)
    }

    #[test]
    fn test_parse_identify_output_full_record() {
        let text = record(&["4000", "3000", "Sunset hike", "2013:07:17 18:42:05"]);
        let output = parse_identify_output(Path::new("a.jpg"), &text).unwrap();

        assert_eq!(output.width, 4000);
        assert_eq!(output.height, 3000);
        assert_eq!(output.caption.as_deref(), Some("Sunset hike"));
        assert_eq!(output.timestamp.as_deref(), Some("2013:07:17 18:42:05"));
    }

    #[test]
    fn test_parse_identify_output_missing_optional_fields() {
        let text = record(&["800", "600", "", ""]);
        let output = parse_identify_output(Path::new("a.jpg"), &text).unwrap();

        assert_eq!(output.caption, None);
        assert_eq!(output.timestamp, None);
    }

    #[test]
    fn test_parse_identify_output_uses_first_frame_only() {
        let text = format!(
            "{}{}",
            record(&["640", "480", "first", ""]),
            record(&["320", "240", "second", ""])
        );
        let output = parse_identify_output(Path::new("a.gif"), &text).unwrap();
        assert_eq!((output.width, output.height), (640, 480));
        assert_eq!(output.caption.as_deref(), Some("first"));
    }

    #[test]
    fn test_parse_identify_output_keeps_code_like_captions_as_text() {
        let text = record(&["10", "10", "__import__('os').system('rm -rf /')", ""]);
        let output = parse_identify_output(Path::new("a.jpg"), &text).unwrap();
        assert_eq!(
            output.caption.as_deref(),
            Some("__import__('os').system('rm -rf /')")
        );
    }

    #[test]
    fn test_parse_identify_output_rejects_bad_shapes() {
        let path = Path::new("bad.jpg");
        assert!(parse_identify_output(path, "800\u{1f}600").is_err());
        assert!(parse_identify_output(path, &record(&["800", "600", "x"])).is_err());
        assert!(parse_identify_output(path, &record(&["wide", "600", "", ""])).is_err());
        assert!(parse_identify_output(path, &record(&["-5", "600", "", ""])).is_err());
        assert!(parse_identify_output(path, &record(&["8", "6", "a", "b", "c"])).is_err());
    }

    #[test]
    fn test_parse_capture_time() {
        let expected = NaiveDate::from_ymd_opt(2007, 11, 21)
            .unwrap()
            .and_hms_opt(11, 27, 6)
            .unwrap();
        assert_eq!(parse_capture_time("2007:11:21 11:27:06"), Some(expected));
        assert_eq!(parse_capture_time("2007:11:21 11:27:06\0"), Some(expected));

        assert_eq!(parse_capture_time("2007-11-21 11:27:06"), None);
        assert_eq!(parse_capture_time("0000:00:00 00:00:00"), None);
        assert_eq!(parse_capture_time("garbage"), None);
        assert_eq!(parse_capture_time("1900:01:01 00:00:00"), None);
    }

    #[test]
    fn test_normalize_caption() {
        assert_eq!(
            normalize_caption("  Sunset \n\t hike  ").as_deref(),
            Some("Sunset hike")
        );
        assert_eq!(normalize_caption("   \n "), None);
        assert_eq!(normalize_caption(""), None);
    }

    #[test]
    fn test_reader_builds_metadata() {
        let probe = StaticProbe::new().with(
            "a.jpg",
            ProbeOutput {
                width: 4000,
                height: 3000,
                caption: Some("Sunset   hike".to_string()),
                timestamp: Some("2013:07:17 18:42:05".to_string()),
            },
        );
        let reader = MetadataReader::new(Box::new(probe));
        let metadata = reader.read(Path::new("/photos/a.jpg")).unwrap();

        assert_eq!(metadata.width, 4000);
        assert_eq!(metadata.height, 3000);
        assert_eq!(metadata.embedded_caption.as_deref(), Some("Sunset hike"));
        assert_eq!(metadata.filename_stamp(), "20130717T184205");
        assert_eq!(metadata.catalog_date(), "2013-07-17 18:42:05");
    }

    #[test]
    fn test_reader_tolerates_malformed_timestamp() {
        let probe = StaticProbe::new().with(
            "a.jpg",
            ProbeOutput {
                width: 10,
                height: 10,
                caption: None,
                timestamp: Some("not a date".to_string()),
            },
        );
        let reader = MetadataReader::new(Box::new(probe));
        let metadata = reader.read(Path::new("a.jpg")).unwrap();

        assert_eq!(metadata.capture_timestamp, None);
        assert_eq!(metadata.filename_stamp(), "19000101T000000");
        assert_eq!(metadata.catalog_date(), "1900-01-01 00:00:00");
    }

    #[test]
    fn test_reader_rejects_zero_dimensions() {
        let probe = StaticProbe::new().with(
            "a.jpg",
            ProbeOutput {
                width: 0,
                height: 10,
                ..Default::default()
            },
        );
        let reader = MetadataReader::new(Box::new(probe));
        assert!(matches!(
            reader.read(Path::new("a.jpg")),
            Err(MetadataError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_exif_probe_reads_header_without_exif() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("plain.jpg");
        RgbImage::new(64, 48).save(&path).unwrap();

        let output = ExifProbe.probe(&path).unwrap();
        assert_eq!((output.width, output.height), (64, 48));
        assert_eq!(output.timestamp, None);
        assert_eq!(output.caption, None);
    }

    #[test]
    fn test_exif_probe_reads_iptc_caption() {
        let tmp = TempDir::new().unwrap();
        let path = write_jpeg_with_iptc_caption(tmp.path(), "captioned.jpg", 40, 30, "Sunset hike");

        let metadata = MetadataReader::new(Box::new(ExifProbe)).read(&path).unwrap();
        assert_eq!((metadata.width, metadata.height), (40, 30));
        assert_eq!(metadata.embedded_caption.as_deref(), Some("Sunset hike"));
    }

    #[test]
    fn test_exif_probe_fails_on_corrupt_file() {
        let tmp = TempDir::new().unwrap();
        let path: PathBuf = tmp.path().join("corrupt.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        assert!(matches!(
            ExifProbe.probe(&path),
            Err(MetadataError::Header { .. })
        ));
    }
}
