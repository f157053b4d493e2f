//! Input resolution: load document bytes from a local path or a URL.
//!
//! ## Why bytes, not a path?
//!
//! The document is read twice, once for text extraction and once for the
//! render pass, and pdfium opens both from a byte slice. Holding the bytes
//! also makes the render pass independent of the source: a downloaded file
//! never needs a temp directory that must outlive the job. The `%PDF` magic
//! is checked up front so callers get a meaningful error rather than a
//! pdfium failure deep inside a job.

use crate::error::AnnotatorError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The four bytes every PDF starts with.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Reject anything that does not start with the PDF magic.
///
/// Empty input is reported as a missing document.
pub fn ensure_pdf(bytes: &[u8]) -> Result<(), AnnotatorError> {
    if bytes.is_empty() {
        return Err(AnnotatorError::MissingDocument);
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(AnnotatorError::NotAPdf {
            magic: bytes.iter().take(4).copied().collect(),
        });
    }
    Ok(())
}

/// Load the document bytes for `input`.
///
/// A URL is downloaded with `timeout_secs` as the request timeout; anything
/// else is treated as a local path.
pub async fn load_document(input: &str, timeout_secs: u64) -> Result<Vec<u8>, AnnotatorError> {
    if input.trim().is_empty() {
        return Err(AnnotatorError::InvalidInput {
            input: input.to_string(),
        });
    }
    let bytes = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(Path::new(input)).await?
    };
    ensure_pdf(&bytes)?;
    Ok(bytes)
}

async fn read_local(path: &Path) -> Result<Vec<u8>, AnnotatorError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(AnnotatorError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(AnnotatorError::FileNotFound {
            path: path.to_path_buf(),
        }),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, AnnotatorError> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| AnnotatorError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            AnnotatorError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

/// Default output path for a rendered copy: `<stem>_annotated.pdf` next to
/// a local input, or in the current directory for a URL.
pub fn annotated_output_path(input: &str) -> PathBuf {
    let stem = if is_url(input) {
        reqwest::Url::parse(input)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|mut s| s.next_back().map(str::to_string))
            })
            .filter(|s| !s.is_empty())
            .map(|name| stem_of(Path::new(&name)))
            .unwrap_or_else(|| "document".to_string())
    } else {
        stem_of(Path::new(input))
    };
    let file_name = format!("{stem}_annotated.pdf");
    if is_url(input) {
        PathBuf::from(file_name)
    } else {
        Path::new(input).with_file_name(file_name)
    }
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}
