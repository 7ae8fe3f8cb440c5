use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Classify the images in a folder and sort them into per-label subfolders.
#[derive(Debug, Parser)]
#[command(name = "imgsort", version, about)]
pub struct Cli {
    /// Increase log output (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Classify every image directly inside ROOT and move it into ROOT/<label>/
    Sort(SortArgs),

    /// Count the entries and sortable images in ROOT
    Count {
        root: PathBuf,
        /// Extension of caption files that are not counted as images
        #[arg(long = "companion-ext", default_value = imgsort_core::DEFAULT_COMPANION_EXTENSION)]
        companion_extension: String,
    },

    /// Prepend TEXT to every caption file under ROOT, recursively
    PrefixCaptions {
        root: PathBuf,
        text: String,
        /// Extension of the caption files to edit
        #[arg(long = "ext", default_value = imgsort_core::DEFAULT_COMPANION_EXTENSION)]
        extension: String,
    },
}

#[derive(Debug, Args)]
pub struct SortArgs {
    /// Folder holding the images to sort
    pub root: PathBuf,

    /// Configuration file (defaults to ./imgsort.toml, then the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum number of images classified at once
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Extension of the caption file moved along with each image
    #[arg(long = "companion-ext", conflicts_with = "no_companion")]
    pub companion_extension: Option<String>,

    /// Move images without their caption files
    #[arg(long)]
    pub no_companion: bool,

    /// Write a JSON report of the run to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}
