//! Progress events emitted while a batch runs, and the sinks that consume them.

use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

pub fn default_style() -> ProgressStyle {
    match ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
    {
        Ok(style) => style.progress_chars("##-"),
        Err(_) => ProgressStyle::default_bar(),
    }
}

/// Receiver of batch progress.
///
/// Called from worker threads; events from one runner arrive in the order the
/// runner emitted them.
pub trait ProgressSink: Send + Sync {
    /// Classification of `path` is starting.
    fn on_start(&self, path: &Path);
    /// Classification of `path` failed; the file stays where it is.
    fn on_error(&self, path: &Path, message: &str);
    /// Every task of the batch has finished.
    fn on_complete(&self);
}

/// Owned form of a progress callback, for sinks that queue events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    Started(PathBuf),
    Failed { path: PathBuf, message: String },
    Completed,
}

impl Display for ProgressEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started(path) => write!(f, "Classifying: {}", path.display()),
            Self::Failed { path, message } => {
                write!(f, "Error classifying {}: {}", path.display(), message)
            }
            Self::Completed => write!(f, "Classification complete"),
        }
    }
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_start(&self, _path: &Path) {}
    fn on_error(&self, _path: &Path, _message: &str) {}
    fn on_complete(&self) {}
}

/// Writes events to the `tracing` log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn on_start(&self, path: &Path) {
        tracing::info!(path = %path.display(), "classifying");
    }

    fn on_error(&self, path: &Path, message: &str) {
        tracing::warn!(path = %path.display(), error = message, "classification failed");
    }

    fn on_complete(&self) {
        tracing::info!("classification complete");
    }
}

/// Forwards events over a channel, for front ends that poll on their own thread.
///
/// Events sent after the receiver is dropped are discarded.
#[derive(Debug)]
pub struct ChannelSink {
    sender: Sender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(sender: Sender<ProgressEvent>) -> Self {
        Self { sender }
    }

    fn send(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }
}

impl ProgressSink for ChannelSink {
    fn on_start(&self, path: &Path) {
        self.send(ProgressEvent::Started(path.to_path_buf()));
    }

    fn on_error(&self, path: &Path, message: &str) {
        self.send(ProgressEvent::Failed {
            path: path.to_path_buf(),
            message: message.to_string(),
        });
    }

    fn on_complete(&self) {
        self.send(ProgressEvent::Completed);
    }
}

/// Drives a terminal progress bar: one tick per started file, failures
/// printed above the bar.
#[derive(Clone, Debug)]
pub struct ProgressBarSink {
    bar: ProgressBar,
}

impl ProgressBarSink {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

impl ProgressSink for ProgressBarSink {
    fn on_start(&self, path: &Path) {
        self.bar.inc(1);
        self.bar
            .set_message(ProgressEvent::Started(path.to_path_buf()).to_string());
    }

    fn on_error(&self, path: &Path, message: &str) {
        self.bar.println(
            ProgressEvent::Failed {
                path: path.to_path_buf(),
                message: message.to_string(),
            }
            .to_string(),
        );
    }

    fn on_complete(&self) {
        self.bar
            .finish_with_message(ProgressEvent::Completed.to_string());
    }
}
