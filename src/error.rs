//! Error types for the edgequake-pdf-annotate library.
//!
//! Three error types match three distinct failure scopes:
//!
//! * [`AnnotatorError`] — **Fatal**: the job or render call cannot proceed
//!   (unreadable document, model backend down, bad caller input). During
//!   generation it becomes a single `error` event and the stream ends.
//!
//! * [`RepairError`] — **Per page**: the model answered, but nothing
//!   structured could be recovered from its text. The driver turns it into a
//!   visible diagnostic annotation and moves on to the next page.
//!
//! * [`CompletionError`] — the completion-client boundary. Connection and
//!   timeout failures stay distinguishable so the fatal message can say what
//!   to do about them.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf-annotate library.
#[derive(Debug, Error)]
pub enum AnnotatorError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read, but they are not a PDF.
    #[error("Input is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { magic: Vec<u8> },

    // ── Caller input ──────────────────────────────────────────────────────
    /// No document bytes were supplied.
    #[error("No PDF uploaded")]
    MissingDocument,

    /// Annotation instructions were empty or whitespace.
    #[error("No instructions provided")]
    MissingInstructions,

    /// The render call's annotation list is not a JSON array.
    #[error("Invalid annotations JSON: {0}")]
    InvalidAnnotations(String),

    // ── PDF errors ────────────────────────────────────────────────────────
    /// pdfium could not open the document.
    #[error("PDF is corrupt or unreadable: {detail}")]
    CorruptPdf { detail: String },

    /// The requested page range selects nothing.
    #[error("No pages found in that range ({from}-{to}, document has {total} pages).")]
    NoPagesInRange { from: usize, to: usize, total: usize },

    /// Page text could not be extracted.
    #[error("Text extraction failed for page {page}: {detail}")]
    ExtractionFailed { page: usize, detail: String },

    /// Drawing onto the document, or saving it, failed.
    #[error("PDF render error on page {page}: {detail}")]
    RenderFailed { page: usize, detail: String },

    // ── Model backend errors ──────────────────────────────────────────────
    /// The model backend could not be reached at all.
    #[error("Cannot connect to the model backend at {endpoint}.\nRun: ollama serve")]
    ModelUnreachable { endpoint: String },

    /// A single completion exceeded the per-call timeout.
    #[error("Model timed out after {secs}s. Try a faster/smaller model.")]
    ModelTimeout { secs: u64 },

    /// The backend answered with an error.
    #[error("Model API error: {message}")]
    ModelApiError { message: String },

    /// The configured hosted provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium system-wide, or set PDFIUM_LIB_PATH=/path/to/libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure at the completion-client boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompletionError {
    /// Backend unreachable (connection refused, DNS failure, reset).
    #[error("connection to {endpoint} failed: {detail}")]
    Connection { endpoint: String, detail: String },

    /// No answer within the per-call timeout.
    #[error("no response within {secs}s")]
    Timeout { secs: u64 },

    /// Anything else: HTTP error status, malformed envelope, provider error.
    #[error("{0}")]
    Other(String),
}

impl From<CompletionError> for AnnotatorError {
    fn from(e: CompletionError) -> Self {
        match e {
            CompletionError::Connection { endpoint, .. } => {
                AnnotatorError::ModelUnreachable { endpoint }
            }
            CompletionError::Timeout { secs } => AnnotatorError::ModelTimeout { secs },
            CompletionError::Other(message) => AnnotatorError::ModelApiError { message },
        }
    }
}

/// Nothing structured could be recovered from a model response.
///
/// `snippet` holds at most [`RepairError::SNIPPET_CHARS`] characters of the
/// raw text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("JSON repair failed. Raw output: {snippet:?}")]
pub struct RepairError {
    pub snippet: String,
}

impl RepairError {
    pub const SNIPPET_CHARS: usize = 300;

    pub fn from_raw(raw: &str) -> Self {
        Self {
            snippet: raw.chars().take(Self::SNIPPET_CHARS).collect(),
        }
    }
}
