use chrono::NaiveDateTime;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::metadata::{format_catalog_date, PhotoMetadata};
use crate::error::BatchError;

/// File name of the catalog when none is given
pub const DEFAULT_CATALOG_NAME: &str = "digitalframe-catalog.csv";

const HEADER: [&str; 4] = ["Date", "Caption", "File", "FullPath"];

/// One catalog row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    pub capture_timestamp: Option<NaiveDateTime>,
    /// Full composed caption, never truncated
    pub caption: String,
    pub source_filename: String,
    pub source_path: PathBuf,
}

impl CatalogRecord {
    pub fn new(source_path: &Path, metadata: &PhotoMetadata, caption: &str) -> Self {
        Self {
            capture_timestamp: metadata.capture_timestamp,
            caption: caption.to_string(),
            source_filename: source_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            source_path: source_path.to_path_buf(),
        }
    }
}

/// Append-only CSV catalog
pub struct CatalogWriter<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl<W: Write> CatalogWriter<W> {
    /// Start a new catalog on `sink`, writing the header row
    pub fn new(sink: W) -> Result<Self, csv::Error> {
        Self::with_header(sink, true)
    }

    fn with_header(sink: W, write_header: bool) -> Result<Self, csv::Error> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(sink);
        if write_header {
            writer.write_record(HEADER)?;
            writer.flush()?;
        }
        Ok(Self { writer, rows: 0 })
    }

    /// Write one row and flush it to the sink
    pub fn append(&mut self, record: &CatalogRecord) -> Result<(), csv::Error> {
        let date = format_catalog_date(record.capture_timestamp);
        let full_path = record.source_path.display().to_string();

        self.writer.write_record([
            date.as_str(),
            record.caption.as_str(),
            record.source_filename.as_str(),
            full_path.as_str(),
        ])?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Rows appended through this writer, header excluded
    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> Result<W, csv::Error> {
        self.writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))
    }
}

impl CatalogWriter<File> {
    /// Open `path` for appending. The header is only written when the file is
    /// new or empty.
    pub fn open_append(path: &Path) -> Result<Self, BatchError> {
        let io_error = |source| BatchError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_error)?;
        let is_empty = file.metadata().map_err(io_error)?.len() == 0;

        Ok(Self::with_header(file, is_empty)?)
    }
}

impl CatalogWriter<File> {
    /// Create or truncate `path` and start a fresh catalog on it
    pub fn create(path: &Path) -> Result<Self, BatchError> {
        let file = File::create(path).map_err(|source| BatchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(file)?)
    }
}

impl CatalogWriter<io::Stdout> {
    pub fn stdout() -> Result<Self, csv::Error> {
        Self::new(io::stdout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn record(caption: &str, timestamp: Option<NaiveDateTime>) -> CatalogRecord {
        CatalogRecord {
            capture_timestamp: timestamp,
            caption: caption.to_string(),
            source_filename: "IMG_0001.jpg".to_string(),
            source_path: PathBuf::from("/photos/2013/IMG_0001.jpg"),
        }
    }

    fn output(writer: CatalogWriter<Vec<u8>>) -> String {
        String::from_utf8(writer.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_header_written_once() {
        let mut writer = CatalogWriter::new(Vec::new()).unwrap();
        let when = NaiveDate::from_ymd_opt(2013, 7, 17)
            .unwrap()
            .and_hms_opt(18, 42, 5)
            .unwrap();
        writer.append(&record("07/17/13: Sunset hike", Some(when))).unwrap();
        writer.append(&record("", None)).unwrap();
        assert_eq!(writer.rows_written(), 2);

        assert_eq!(
            output(writer),
            "Date,Caption,File,FullPath\n\
             2013-07-17 18:42:05,07/17/13: Sunset hike,IMG_0001.jpg,/photos/2013/IMG_0001.jpg\n\
             1900-01-01 00:00:00,,IMG_0001.jpg,/photos/2013/IMG_0001.jpg\n"
        );
    }

    #[test]
    fn test_header_only_when_nothing_appended() {
        let writer = CatalogWriter::new(Vec::new()).unwrap();
        assert_eq!(output(writer), "Date,Caption,File,FullPath\n");
    }

    #[test]
    fn test_captions_with_delimiters_are_quoted() {
        let mut writer = CatalogWriter::new(Vec::new()).unwrap();
        writer
            .append(&record("Mom, Dad and \"the kids\"", None))
            .unwrap();

        let text = output(writer);
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[1], "Mom, Dad and \"the kids\"");
        assert_eq!(row.len(), 4);
    }

    #[test]
    fn test_record_from_metadata() {
        let metadata = PhotoMetadata {
            capture_timestamp: None,
            width: 10,
            height: 10,
            embedded_caption: None,
        };
        let rec = CatalogRecord::new(Path::new("/in/My Photo (Modified).jpg"), &metadata, "x");

        assert_eq!(rec.source_filename, "My Photo (Modified).jpg");
        assert_eq!(rec.source_path, PathBuf::from("/in/My Photo (Modified).jpg"));
        assert_eq!(rec.caption, "x");
    }

    #[test]
    fn test_open_append_does_not_repeat_header() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CATALOG_NAME);

        let mut first = CatalogWriter::open_append(&path).unwrap();
        first.append(&record("one", None)).unwrap();
        drop(first);

        let mut second = CatalogWriter::open_append(&path).unwrap();
        second.append(&record("two", None)).unwrap();
        drop(second);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Date,Caption,File,FullPath");
        assert!(lines[1].contains(",one,"));
        assert!(lines[2].contains(",two,"));
    }

    #[test]
    fn test_create_replaces_previous_catalog() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CATALOG_NAME);

        for caption in ["first run", "second run"] {
            let mut writer = CatalogWriter::create(&path).unwrap();
            writer.append(&record(caption, None)).unwrap();
        }

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "Date,Caption,File,FullPath");
        assert!(lines[1].contains(",second run,"));
    }

    #[test]
    fn test_open_append_missing_directory_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing").join("catalog.csv");

        assert!(matches!(
            CatalogWriter::open_append(&path),
            Err(BatchError::Io { .. })
        ));
    }
}
