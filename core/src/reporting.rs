use crate::relocation::{FileFailure, MovedFile};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug, Error)]
pub enum ReportingError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Everything a sorting run did, in a form suitable for JSON output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub generated_at: String,
    pub root: PathBuf,
    /// Files considered for classification
    pub candidates: usize,
    pub moved: Vec<MovedFile>,
    pub classification_errors: Vec<FileFailure>,
    pub relocation_errors: Vec<FileFailure>,
    /// Files skipped because the run was cancelled
    pub cancelled: Vec<PathBuf>,
}

impl RunReport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            generated_at: timestamp(),
            root: root.into(),
            candidates: 0,
            moved: Vec::new(),
            classification_errors: Vec::new(),
            relocation_errors: Vec::new(),
            cancelled: Vec::new(),
        }
    }

    pub fn error_count(&self) -> usize {
        self.classification_errors.len() + self.relocation_errors.len()
    }

    pub fn is_clean(&self) -> bool {
        self.error_count() == 0 && self.cancelled.is_empty()
    }
}

fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

pub fn write_json(report: &RunReport, output_path: &Path) -> Result<(), ReportingError> {
    let file = File::create(output_path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

/// Human-readable summary: one line per moved file, then the failures.
pub fn write_summary<W: Write>(report: &RunReport, out: &mut W) -> io::Result<()> {
    for moved in &report.moved {
        writeln!(
            out,
            "[{}] {} -> {}",
            moved.label,
            moved.source.display(),
            moved.destination.display()
        )?;
        if let Some(companion) = &moved.companion {
            writeln!(out, "    companion -> {}", companion.display())?;
        }
    }
    write_failures(out, "Classification failed", &report.classification_errors)?;
    write_failures(out, "Could not move", &report.relocation_errors)?;
    if !report.cancelled.is_empty() {
        writeln!(out, "Cancelled before classification: {} file(s)", report.cancelled.len())?;
    }
    writeln!(
        out,
        "Sorted {} of {} file(s) in {}, {} error(s).",
        report.moved.len(),
        report.candidates,
        report.root.display(),
        report.error_count()
    )
}

fn write_failures<W: Write>(out: &mut W, heading: &str, failures: &[FileFailure]) -> io::Result<()> {
    if failures.is_empty() {
        return Ok(());
    }
    writeln!(out, "{}:", heading)?;
    for failure in failures {
        writeln!(out, "  {}: {}", failure.path.display(), failure.message)?;
    }
    Ok(())
}
