use clap::ValueEnum;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use log::{debug, info, warn};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use strum_macros::Display;

use super::annotate::CaptionBurner;
use super::aspect::{classify, AspectPolicy};
use super::caption::CaptionComposer;
use super::catalog::{CatalogRecord, CatalogWriter};
use super::geometry::GeometryNormalizer;
use super::metadata::MetadataReader;
use crate::error::{BatchError, OutputError};

pub const DEFAULT_QUALITY: u8 = 90;

/// How output files are named
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Display)]
#[strum(serialize_all = "lowercase")]
pub enum NamingMode {
    /// `<YYYYmmddTHHMMSS>-<name>`, sorting chronologically
    #[default]
    Timestamped,
    /// The normalized source name
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub naming: NamingMode,
    /// Only write catalog rows, no images
    pub catalog_only: bool,
    pub quality: u8,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            naming: NamingMode::Timestamped,
            catalog_only: false,
            quality: DEFAULT_QUALITY,
        }
    }
}

/// A file whose aspect ratio is outside the tolerance
#[derive(Debug, Clone, PartialEq)]
pub struct AspectDeviation {
    pub path: PathBuf,
    pub actual_ratio: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl FileFailure {
    fn new(path: &Path, reason: impl ToString) -> Self {
        Self {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Outcome of a batch run. Every visited input lands in exactly one of the
/// outcome lists, or in `cataloged` in catalog-only mode.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub visited: usize,
    pub written: Vec<PathBuf>,
    pub cataloged: usize,
    pub duplicates: Vec<PathBuf>,
    pub bad_metadata: Vec<FileFailure>,
    pub rejected: Vec<PathBuf>,
    pub geometry_failures: Vec<FileFailure>,
    pub output_failures: Vec<FileFailure>,
    /// Non-conforming files, largest deviation first. Not an outcome on its own.
    pub bad_aspect: Vec<AspectDeviation>,
    pub goal_ratio: f64,
    pub tolerance: f64,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.written.len()
    }

    pub fn failed(&self) -> usize {
        self.geometry_failures.len() + self.output_failures.len()
    }

    /// Number of inputs with a recorded outcome
    pub fn accounted(&self) -> usize {
        self.processed()
            + self.cataloged
            + self.duplicates.len()
            + self.bad_metadata.len()
            + self.rejected.len()
            + self.failed()
    }
}

/// Result of placing a finished image in the output directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Written,
    AlreadyExists,
}

/// Replace characters that cause trouble on photo frames and in shells
pub fn normalize_base_name(file_name: &str) -> String {
    file_name.replace(' ', "_").replace("(Modified)", "_modified_")
}

pub struct BatchDriver {
    reader: MetadataReader,
    normalizer: GeometryNormalizer,
    composer: CaptionComposer,
    burner: Option<CaptionBurner>,
    options: BatchOptions,
    cancel: Arc<AtomicBool>,
}

impl BatchDriver {
    pub fn new(
        reader: MetadataReader,
        normalizer: GeometryNormalizer,
        composer: CaptionComposer,
        burner: Option<CaptionBurner>,
        options: BatchOptions,
    ) -> Self {
        Self {
            reader,
            normalizer,
            composer,
            burner,
            options,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop between files once `flag` is set
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn run<W: Write>(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
        catalog: &mut CatalogWriter<W>,
    ) -> Result<BatchReport, BatchError> {
        self.run_with_progress(inputs, output_dir, catalog, |_, _| {})
    }

    /// Process `inputs` in order. `on_file` is called after each file with the
    /// number of files done so far.
    pub fn run_with_progress<W, F>(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
        catalog: &mut CatalogWriter<W>,
        mut on_file: F,
    ) -> Result<BatchReport, BatchError>
    where
        W: Write,
        F: FnMut(usize, &Path),
    {
        let start = Instant::now();
        let spec = self.normalizer.spec();
        let mut report = BatchReport {
            goal_ratio: spec.goal_ratio(),
            tolerance: spec.tolerance,
            ..Default::default()
        };

        if self.options.catalog_only {
            for input in inputs {
                if self.is_cancelled() {
                    report.cancelled = true;
                    break;
                }
                report.visited += 1;
                self.catalog_file(input, catalog, &mut report)?;
                on_file(report.visited, input);
            }
        } else {
            fs::create_dir_all(output_dir).map_err(|source| BatchError::Io {
                path: output_dir.to_path_buf(),
                source,
            })?;
            let scratch = tempfile::Builder::new()
                .prefix("digiframe-")
                .tempdir()
                .map_err(|source| BatchError::Io {
                    path: std::env::temp_dir(),
                    source,
                })?;
            let mut existing = existing_bases(output_dir, self.options.naming)?;

            for input in inputs {
                if self.is_cancelled() {
                    report.cancelled = true;
                    break;
                }
                report.visited += 1;
                self.process_file(
                    input,
                    output_dir,
                    scratch.path(),
                    report.visited,
                    &mut existing,
                    catalog,
                    &mut report,
                )?;
                on_file(report.visited, input);
            }
        }

        if report.cancelled {
            warn!(
                "Cancelled after {} of {} files",
                report.visited,
                inputs.len()
            );
        }

        report
            .bad_aspect
            .sort_by(|a, b| b.delta.total_cmp(&a.delta));
        report.elapsed = start.elapsed();
        Ok(report)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn catalog_file<W: Write>(
        &self,
        input: &Path,
        catalog: &mut CatalogWriter<W>,
        report: &mut BatchReport,
    ) -> Result<(), BatchError> {
        let metadata = match self.reader.read(input) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Could not read metadata from {}: {}", input.display(), e);
                report.bad_metadata.push(FileFailure::new(input, e));
                return Ok(());
            }
        };

        let caption = self.composer.compose(&metadata);
        catalog.append(&CatalogRecord::new(input, &metadata, &caption.full))?;
        debug!("Cataloged {}", input.display());
        report.cataloged += 1;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn process_file<W: Write>(
        &self,
        input: &Path,
        output_dir: &Path,
        scratch_dir: &Path,
        index: usize,
        existing: &mut HashSet<String>,
        catalog: &mut CatalogWriter<W>,
        report: &mut BatchReport,
    ) -> Result<(), BatchError> {
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let base = normalize_base_name(&file_name);

        if existing.contains(&base) {
            warn!("Not replacing existing output for {}", input.display());
            report.duplicates.push(input.to_path_buf());
            return Ok(());
        }

        let metadata = match self.reader.read(input) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Could not read metadata from {}, skipping: {}", input.display(), e);
                report.bad_metadata.push(FileFailure::new(input, e));
                return Ok(());
            }
        };

        let verdict = classify(&metadata, self.normalizer.spec());
        if !verdict.conforms {
            debug!(
                "{} has aspect {:.3}, goal {:.3}",
                input.display(),
                verdict.actual_ratio,
                verdict.goal_ratio
            );
            report.bad_aspect.push(AspectDeviation {
                path: input.to_path_buf(),
                actual_ratio: verdict.actual_ratio,
                delta: verdict.delta,
            });
            if self.normalizer.policy() == AspectPolicy::Reject {
                info!("Rejected {} for its aspect ratio", input.display());
                report.rejected.push(input.to_path_buf());
                return Ok(());
            }
        }

        let caption = self.composer.compose(&metadata);
        if self.burner.is_some() && caption.is_truncated() {
            info!(
                "Caption of {} shortened to {} characters for burning",
                input.display(),
                caption.burned.chars().count()
            );
        }

        let mut img = match self.normalizer.normalize(
            input,
            &metadata,
            scratch_dir,
            &format!("{:06}", index),
        ) {
            Ok(img) => img,
            Err(e) => {
                warn!("Could not normalize {}: {}", input.display(), e);
                report.geometry_failures.push(FileFailure::new(input, e));
                return Ok(());
            }
        };

        if let Some(burner) = &self.burner {
            burner.burn(&mut img, &caption.burned);
        }

        let final_name = match self.options.naming {
            NamingMode::Timestamped => format!("{}-{}", metadata.filename_stamp(), base),
            NamingMode::Plain => base.clone(),
        };
        let final_path = output_dir.join(final_name);

        match place_output(&img, output_dir, &final_path, self.options.quality) {
            Ok(Placement::Written) => {}
            Ok(Placement::AlreadyExists) => {
                warn!("Not replacing existing file {}", final_path.display());
                report.duplicates.push(input.to_path_buf());
                existing.insert(base);
                return Ok(());
            }
            Err(e) => {
                warn!("Could not write {}: {}", final_path.display(), e);
                report.output_failures.push(FileFailure::new(input, e));
                return Ok(());
            }
        }

        catalog.append(&CatalogRecord::new(input, &metadata, &caption.full))?;
        info!("Wrote {}", final_path.display());
        existing.insert(base);
        report.written.push(final_path);
        Ok(())
    }
}

/// Base names that already have an output in `output_dir`
fn existing_bases(output_dir: &Path, naming: NamingMode) -> Result<HashSet<String>, BatchError> {
    let entries = fs::read_dir(output_dir).map_err(|source| BatchError::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;
    let stamped = Regex::new(r"^\d{8}T\d{6}-(.+)$").ok();

    let names = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.file_name().to_string_lossy().into_owned());

    let bases = match (naming, stamped) {
        (NamingMode::Timestamped, Some(stamped)) => names
            .filter_map(|name| {
                stamped
                    .captures(&name)
                    .and_then(|caps| caps.get(1))
                    .map(|base| base.as_str().to_string())
            })
            .collect(),
        _ => names.collect(),
    };
    Ok(bases)
}

/// Encode `img` next to `final_path` and move it into place only if nothing
/// exists there yet
pub fn place_output(
    img: &RgbImage,
    output_dir: &Path,
    final_path: &Path,
    quality: u8,
) -> Result<Placement, OutputError> {
    let stage_error = |source| OutputError::Stage {
        dir: output_dir.to_path_buf(),
        source,
    };

    let mut staged = tempfile::Builder::new()
        .prefix(".digiframe-")
        .suffix(".part")
        .tempfile_in(output_dir)
        .map_err(stage_error)?;

    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        JpegEncoder::new_with_quality(&mut writer, quality).encode_image(img)?;
        writer.flush().map_err(stage_error)?;
    }

    match staged.persist_noclobber(final_path) {
        Ok(_) => Ok(Placement::Written),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(Placement::AlreadyExists),
        Err(e) => Err(OutputError::Place {
            path: final_path.to_path_buf(),
            source: e.error,
        }),
    }
}
