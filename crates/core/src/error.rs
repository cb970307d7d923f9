//! Error types for row-to-slide deck generation.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a run.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open, read or write a file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A required input file is missing.
    #[error("Required file not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// The configuration file could not be parsed.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The template could not be prepared.
    #[error("Template error: {0}")]
    TemplateError(String),

    /// The workbook could not be read.
    #[error("Workbook error: {0}")]
    WorkbookError(String),

    /// The deck could not be assembled or written.
    #[error("Deck assembly error: {0}")]
    AssemblyError(String),

    /// ZIP archive error (for XLSX and PPTX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing error (for XLSX and PPTX).
    #[error("XML parsing error: {0}")]
    XmlError(String),
}

/// Errors produced while turning a media reference into embeddable bytes.
///
/// These never abort a run; the pipeline reports them per row.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A local reference points at a file that does not exist.
    #[error("local file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A local file exists but could not be read.
    #[error("failed to read {}: {message}", .path.display())]
    Unreadable { path: PathBuf, message: String },

    /// Every download attempt failed.
    #[error("giving up on {reference} after {attempts} attempt(s): {last_error}")]
    RetriesExhausted {
        reference: String,
        attempts: u32,
        last_error: FetchError,
    },
}

/// A single failed HTTP attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("HTTP status {0}")]
    Status(u16),

    /// Connection, timeout or body read failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors from the external page renderer.
#[derive(Error, Debug)]
pub enum RenderError {
    /// No usable browser executable was found.
    #[error("no headless browser found (tried: {0})")]
    BrowserNotFound(String),

    /// Writing the debug markup failed.
    #[error("failed to write debug markup {}: {source}", .path.display())]
    DebugMarkup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An image left over from an earlier run could not be removed.
    #[error("failed to remove stale image {}: {source}", .path.display())]
    StaleOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The image was produced but cannot be placed on a slide.
    #[error("unusable image {}: {message}", .path.display())]
    UnusableOutput { path: PathBuf, message: String },

    /// The browser process could not be started.
    #[error("failed to launch {}: {source}", .browser.display())]
    Spawn {
        browser: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The browser exited with a failure status.
    #[error("browser exited with {status}: {stderr}")]
    BrowserFailed { status: String, stderr: String },

    /// The browser exited cleanly but produced no image.
    #[error("no image produced at {}", .0.display())]
    MissingOutput(PathBuf),
}
