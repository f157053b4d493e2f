//! Page text extraction via pdfium.
//!
//! ## Why extract up front?
//!
//! pdfium documents borrow both the library handle and the byte buffer, so
//! they cannot be held across `.await` points in the driver. Instead the
//! pages of the requested range are extracted in one `spawn_blocking` call
//! and handed to the driver as plain strings behind the [`PageSource`]
//! trait. Tests implement the same trait over in-memory text.

use crate::config::PageRange;
use crate::error::AnnotatorError;
use pdfium_render::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Source of per-page text for the annotation driver. Pages are 1-based.
pub trait PageSource: Send + Sync {
    /// Number of pages in the whole document.
    fn page_count(&self) -> usize;

    /// Text of one page. An `Err` here is fatal to the job.
    fn page_text(&self, page: usize) -> Result<String, AnnotatorError>;
}

/// Page text held in memory.
#[derive(Debug, Clone, Default)]
pub struct ExtractedPages {
    total_pages: usize,
    texts: BTreeMap<usize, String>,
}

impl ExtractedPages {
    /// Every page of a document, in order.
    pub fn new(pages: Vec<String>) -> Self {
        Self {
            total_pages: pages.len(),
            texts: pages.into_iter().enumerate().map(|(i, t)| (i + 1, t)).collect(),
        }
    }

    /// A subset of pages of a `total_pages`-page document.
    pub fn partial(total_pages: usize, texts: BTreeMap<usize, String>) -> Self {
        Self { total_pages, texts }
    }
}

impl PageSource for ExtractedPages {
    fn page_count(&self) -> usize {
        self.total_pages
    }

    fn page_text(&self, page: usize) -> Result<String, AnnotatorError> {
        self.texts
            .get(&page)
            .cloned()
            .ok_or_else(|| AnnotatorError::ExtractionFailed {
                page,
                detail: "page was not extracted".into(),
            })
    }
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// Extract the text of every page in `range` (clamped to the document).
///
/// A range selecting no page still succeeds and reports the page count, so
/// the caller can produce its own "no pages" message.
pub async fn extract_pages(bytes: Vec<u8>, range: PageRange) -> Result<ExtractedPages, AnnotatorError> {
    tokio::task::spawn_blocking(move || extract_pages_blocking(&bytes, range))
        .await
        .map_err(|e| AnnotatorError::Internal(format!("Extraction task panicked: {}", e)))?
}

fn extract_pages_blocking(bytes: &[u8], range: PageRange) -> Result<ExtractedPages, AnnotatorError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, bytes)?;
    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let mut texts = BTreeMap::new();
    if let Some((first, last)) = range.clamp(total_pages) {
        for page_num in first..=last {
            let failed = |e: PdfiumError| AnnotatorError::ExtractionFailed {
                page: page_num,
                detail: format!("{:?}", e),
            };
            let page = pages.get((page_num - 1) as u16).map_err(failed)?;
            let text = page.text().map_err(failed)?.all();
            debug!("Extracted page {} → {} chars", page_num, text.chars().count());
            texts.insert(page_num, text);
        }
    }

    Ok(ExtractedPages::partial(total_pages, texts))
}

/// Open the document and return its page count without extracting anything.
pub async fn inspect_page_count(bytes: Vec<u8>) -> Result<usize, AnnotatorError> {
    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium()?;
        let document = open_document(&pdfium, &bytes)?;
        Ok(document.pages().len() as usize)
    })
    .await
    .map_err(|e| AnnotatorError::Internal(format!("Inspect task panicked: {}", e)))?
}

pub(crate) fn open_document<'a>(
    pdfium: &'a Pdfium,
    bytes: &'a [u8],
) -> Result<PdfDocument<'a>, AnnotatorError> {
    pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| AnnotatorError::CorruptPdf {
            detail: format!("{:?}", e),
        })
}

/// Bind to a pdfium library.
///
/// Search order: `PDFIUM_LIB_PATH` (a library file or the directory holding
/// it), the executable's directory, the current directory, then the system
/// library path.
pub fn bind_pdfium() -> Result<Pdfium, AnnotatorError> {
    if let Some(path) = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from) {
        let lib = if path.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&path)
        } else {
            path.clone()
        };
        let bindings = Pdfium::bind_to_library(&lib).map_err(|e| {
            AnnotatorError::PdfiumBindingFailed(format!(
                "{:?} (PDFIUM_LIB_PATH={})",
                e,
                path.display()
            ))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    let mut candidates = Vec::new();
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(Pdfium::pdfium_platform_library_name_at_path(&dir));
    }
    candidates.push(Pdfium::pdfium_platform_library_name_at_path(Path::new(".")));

    for lib in candidates {
        if let Ok(bindings) = Pdfium::bind_to_library(&lib) {
            debug!("Bound pdfium at {}", lib.display());
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| AnnotatorError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}
