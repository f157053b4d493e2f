//! Render pass: draw highlights and margin callouts onto a copy of the PDF.
//!
//! ## Why a separate pass?
//!
//! Generation streams records as they are produced; the caller may inspect,
//! edit or filter them before anything is drawn. Rendering therefore takes
//! the full record list (each tagged with its page) and the original bytes,
//! and produces a new document. The original bytes are never modified.
//!
//! ## Submodules
//!
//! - [`style`]   — colours and labels per annotation type
//! - [`wrap`]    — character-budget word wrapping
//! - [`surface`] — drawing primitives, plus an in-memory recording surface
//! - [`layout`]  — box sizing, stacking and overflow
//! - [`pdfium`]  — the real surface, backed by pdfium

pub mod layout;
pub mod pdfium;
pub mod style;
pub mod surface;
pub mod wrap;

use crate::config::{LayoutConfig, PageRange};
use crate::error::AnnotatorError;
use crate::model::{Annotation, PageAnnotation};
use crate::pipeline::extract;
use std::collections::BTreeMap;
use surface::{DocumentSurface, PageCanvas};
use tracing::{debug, info};

/// Totals over one render call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub pages_drawn: usize,
    pub pages_skipped: usize,
    pub boxes: usize,
    pub highlights: usize,
    pub unmatched_quotes: usize,
}

/// Group records by page, keeping input order within each page.
pub fn group_by_page(annotations: &[PageAnnotation]) -> BTreeMap<usize, Vec<Annotation>> {
    let mut groups: BTreeMap<usize, Vec<Annotation>> = BTreeMap::new();
    for pa in annotations {
        groups.entry(pa.page).or_default().push(pa.annotation.clone());
    }
    groups
}

/// Draw every group onto `surface`.
///
/// Groups outside `range` or outside the document are skipped silently; any
/// drawing failure aborts the whole call.
pub fn render_annotations(
    surface: &mut dyn DocumentSurface,
    groups: &BTreeMap<usize, Vec<Annotation>>,
    range: PageRange,
    layout: &LayoutConfig,
) -> Result<RenderSummary, AnnotatorError> {
    let total = surface.page_count();
    let mut summary = RenderSummary::default();

    for (&page, annotations) in groups {
        if page == 0 || page > total || !range.contains(page) {
            debug!("Skipping {} annotation(s) for page {}", annotations.len(), page);
            summary.pages_skipped += 1;
            continue;
        }
        surface.with_page(page, &mut |canvas: &mut dyn PageCanvas| -> Result<(), AnnotatorError> {
            let report = layout::draw_page(canvas, annotations, layout)?;
            summary.boxes += report.boxes;
            summary.highlights += report.highlights;
            summary.unmatched_quotes += report.unmatched_quotes;
            Ok(())
        })?;
        summary.pages_drawn += 1;
    }

    info!(
        "Rendered {} box(es) and {} highlight(s) on {} page(s)",
        summary.boxes, summary.highlights, summary.pages_drawn
    );
    Ok(summary)
}

/// Render `annotations` onto a copy of the PDF in `bytes`.
///
/// Runs on a blocking thread because pdfium is synchronous.
pub async fn render_pdf(
    bytes: Vec<u8>,
    annotations: &[PageAnnotation],
    range: PageRange,
    layout: &LayoutConfig,
) -> Result<Vec<u8>, AnnotatorError> {
    crate::pipeline::input::ensure_pdf(&bytes)?;
    let groups = group_by_page(annotations);
    let layout = layout.clone();

    tokio::task::spawn_blocking(move || render_pdf_blocking(&bytes, &groups, range, &layout))
        .await
        .map_err(|e| AnnotatorError::Internal(format!("Render task panicked: {}", e)))?
}

fn render_pdf_blocking(
    bytes: &[u8],
    groups: &BTreeMap<usize, Vec<Annotation>>,
    range: PageRange,
    layout: &LayoutConfig,
) -> Result<Vec<u8>, AnnotatorError> {
    let bindings = extract::bind_pdfium()?;
    let document = extract::open_document(&bindings, bytes)?;
    let mut surface = pdfium::PdfiumSurface::new(document);
    render_annotations(&mut surface, groups, range, layout)?;
    surface.save()
}
