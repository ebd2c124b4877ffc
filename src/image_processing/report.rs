//! Final batch report formatting
//!
//! Prints the outcome counts followed by tables of non-conforming files,
//! files with unreadable metadata and failed files.

use console::style;
use prettytable::{format, Cell, Row, Table};
use std::io::{self, Write};
use std::path::Path;

use super::batch::{BatchReport, FileFailure};
use crate::utils::format_duration;

impl BatchReport {
    /// Write the complete report to `out`
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out)?;
        writeln!(out, "{}", style("REPORT").bold().cyan())?;
        writeln!(out)?;

        if !self.bad_aspect.is_empty() {
            let action = if self.rejected.is_empty() {
                "All written anyhow."
            } else {
                "Rejected files were not written."
            };
            writeln!(
                out,
                "📐 Bad aspect in {} files. {} Goal aspect={:.3} tolerance={}\n",
                self.bad_aspect.len(),
                action,
                self.goal_ratio,
                self.tolerance
            )?;
            self.aspect_table().print(out)?;
            writeln!(out)?;
        }

        if !self.bad_metadata.is_empty() {
            writeln!(
                out,
                "🏷️  Bad metadata in {} files (they were skipped)\n",
                self.bad_metadata.len()
            )?;
            failure_table(&self.bad_metadata).print(out)?;
            writeln!(out)?;
        }

        let failures: Vec<FileFailure> = self
            .geometry_failures
            .iter()
            .chain(&self.output_failures)
            .cloned()
            .collect();
        if !failures.is_empty() {
            writeln!(out, "{}\n", style(format!("❌ Failed files ({})", failures.len())).red())?;
            failure_table(&failures).print(out)?;
            writeln!(out)?;
        }

        writeln!(out, "📊 Summary:")?;
        writeln!(out, "   • Files visited: {}", self.visited)?;
        writeln!(out, "   • Written: {}", style(self.processed()).green())?;
        if self.cataloged > 0 {
            writeln!(out, "   • Cataloged only: {}", self.cataloged)?;
        }
        writeln!(out, "   • Existing outputs kept: {}", self.duplicates.len())?;
        writeln!(out, "   • Bad metadata: {}", self.bad_metadata.len())?;
        writeln!(out, "   • Rejected for aspect: {}", self.rejected.len())?;
        writeln!(out, "   • Failed: {}", self.failed())?;
        writeln!(out, "   • Run time: {}", format_duration(self.elapsed))?;
        if self.cancelled {
            writeln!(
                out,
                "   • {}",
                style("Cancelled before all files were visited").yellow()
            )?;
        }
        writeln!(out)
    }

    /// Non-conforming files with their deviation and actual ratio
    pub fn aspect_table(&self) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BOX_CHARS);
        table.set_titles(Row::new(vec![
            Cell::new("Diff"),
            Cell::new("Actual"),
            Cell::new("File"),
        ]));

        for deviation in &self.bad_aspect {
            table.add_row(Row::new(vec![
                Cell::new(&format!("{:.3}", deviation.delta)),
                Cell::new(&format!("{:.3}", deviation.actual_ratio)),
                Cell::new(&deviation.path.display().to_string()),
            ]));
        }

        table
    }
}

/// Files with the reason they were skipped
pub fn failure_table(failures: &[FileFailure]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.set_titles(Row::new(vec![Cell::new("File"), Cell::new("Reason")]));

    for failure in failures {
        table.add_row(Row::new(vec![
            Cell::new(&truncate(&extract_filename(&failure.path), 40)),
            Cell::new(&truncate(&failure.reason, 80)),
        ]));
    }

    table
}

/// Truncate string to fit in column
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

/// Helper to extract filename from path
pub fn extract_filename(path: &Path) -> String {
    path.file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("unknown")
        .to_string()
}
