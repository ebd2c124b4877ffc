use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::ProgressBar;
use log::LevelFilter;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use digiframe_processor::cli::{Args, CatalogTarget};
use digiframe_processor::error::ConfigError;
use digiframe_processor::image_processing::batch::{BatchDriver, BatchReport};
use digiframe_processor::image_processing::catalog::CatalogWriter;
use digiframe_processor::image_processing::discover_images;
use digiframe_processor::image_processing::report::extract_filename;
use digiframe_processor::logging::{init_logger, parse_log_level};
use digiframe_processor::utils::{create_progress_bar, error_println};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error_println(&format!("{:#}", e));
            if e.downcast_ref::<ConfigError>().is_some() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run() -> Result<()> {
    let mut args = Args::parse();
    let loaded_config = args.load_and_merge_config()?;

    let mut level = parse_log_level(&args.loglevel)?;
    if args.verbose {
        level = level.max(LevelFilter::Info);
    }
    init_logger(level);
    if let Some(path) = &loaded_config {
        log::info!("Loaded configuration from: {}", path.display());
    }

    let config = args.processing_config()?;
    let output_dir = args.output_dir()?.to_path_buf();
    let catalog_target = args.catalog_target()?;

    // Catalog rows may own stdout; everything human-readable goes to stderr then
    let mut human: Box<dyn Write> = if catalog_target.is_stdout() {
        Box::new(io::stderr())
    } else {
        Box::new(io::stdout())
    };

    writeln!(
        human,
        "{}",
        style("Digital Frame Photo Processor").bold().blue()
    )?;
    writeln!(human)?;
    args.write_configuration(&mut human, &config, &catalog_target)?;

    let driver = config.build_driver()?;

    // The default catalog lives in the output directory
    std::fs::create_dir_all(&output_dir).with_context(|| {
        format!("Failed to create output directory: {}", output_dir.display())
    })?;

    let image_files = discover_images(&args.input_paths, &config.extensions, Some(&output_dir))
        .context("Failed to scan input paths")?;
    if image_files.is_empty() {
        writeln!(
            human,
            "{}",
            style("No images found in the specified input paths.").red()
        )?;
        return Ok(());
    }
    log::info!("Found {} image(s) to process", image_files.len());

    let pb = create_progress_bar(image_files.len() as u64);
    let report = match &catalog_target {
        CatalogTarget::Stdout => {
            let mut catalog = CatalogWriter::stdout().context("Failed to open catalog on stdout")?;
            run_batch(&driver, &image_files, &output_dir, &mut catalog, &pb)?
        }
        CatalogTarget::File(path) => {
            // A catalog-only run rebuilds the catalog; normal runs extend it
            let mut catalog = if config.catalog_only {
                CatalogWriter::create(path)?
            } else {
                CatalogWriter::open_append(path)?
            };
            run_batch(&driver, &image_files, &output_dir, &mut catalog, &pb)?
        }
    };

    report.write_to(&mut human)?;
    if let CatalogTarget::File(path) = &catalog_target {
        writeln!(human, "Catalog written to: {}", style(path.display()).bold())?;
    }

    Ok(())
}

fn run_batch<W: Write>(
    driver: &BatchDriver,
    image_files: &[PathBuf],
    output_dir: &Path,
    catalog: &mut CatalogWriter<W>,
    pb: &ProgressBar,
) -> Result<BatchReport> {
    let report = driver.run_with_progress(image_files, output_dir, catalog, |done, path| {
        pb.set_position(done as u64);
        pb.set_message(extract_filename(path));
    })?;
    pb.finish_and_clear();
    log::info!("Appended {} catalog row(s)", catalog.rows_written());
    Ok(report)
}
