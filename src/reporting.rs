use imgsort_core::{write_summary, CaptionReport, RunReport};
use std::io::{self, Write};
use std::path::Path;

pub fn print_summary(report: &RunReport) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_summary(report, &mut out)?;
    out.flush()
}

pub fn print_count<W: Write>(out: &mut W, root: &Path, entries: u64, candidates: usize) -> io::Result<()> {
    writeln!(out, "{}", root.display())?;
    writeln!(out, "  entries:    {}", entries)?;
    writeln!(out, "  to classify: {}", candidates)
}

pub fn print_caption_report<W: Write>(out: &mut W, report: &CaptionReport) -> io::Result<()> {
    for failure in &report.errors {
        writeln!(out, "Could not update {}: {}", failure.path.display(), failure.message)?;
    }
    writeln!(out, "Updated {} caption file(s).", report.updated.len())
}
