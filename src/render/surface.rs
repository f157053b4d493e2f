//! Drawing surface abstraction for the layout engine.
//!
//! The layout engine only needs a handful of primitives: page size, literal
//! text search, lines, rectangles and single-line text. Putting them behind
//! [`DocumentSurface`] / [`PageCanvas`] keeps the geometry testable without
//! a pdfium library: [`RecordingSurface`] records every call in memory.
//!
//! All coordinates are in PDF points, measured **top-down** from the page's
//! top-left corner. Surfaces that use another origin convert internally.

use crate::error::AnnotatorError;
use crate::render::style::Rgb;

/// A point in top-down page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle; `y0` is the top edge, `y1` the bottom edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

/// Fill and stroke of a drawn shape. Opacities are in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    pub fill: Option<(Rgb, f32)>,
    pub stroke: Option<Stroke>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Rgb,
    pub opacity: f32,
    pub width: f32,
}

/// Page width and height in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// One page being drawn on.
pub trait PageCanvas {
    fn size(&self) -> PageSize;

    /// Bounding boxes of up to `limit` literal occurrences of `needle`.
    ///
    /// One occurrence may produce several boxes when it spans lines. No
    /// match is an empty list, not an error.
    fn find_text(&mut self, needle: &str, limit: usize) -> Result<Vec<Rect>, AnnotatorError>;

    fn draw_line(&mut self, from: Point, to: Point, stroke: Stroke) -> Result<(), AnnotatorError>;

    fn draw_rect(&mut self, rect: Rect, paint: Paint) -> Result<(), AnnotatorError>;

    /// Draw one line of Helvetica text with its baseline starting at `origin`.
    fn draw_text(
        &mut self,
        origin: Point,
        text: &str,
        font_size: f32,
        color: Rgb,
    ) -> Result<(), AnnotatorError>;
}

/// A whole document whose pages can be drawn on one at a time.
pub trait DocumentSurface {
    fn page_count(&self) -> usize;

    /// Run `draw` against 1-based page `page`.
    fn with_page(
        &mut self,
        page: usize,
        draw: &mut dyn FnMut(&mut dyn PageCanvas) -> Result<(), AnnotatorError>,
    ) -> Result<(), AnnotatorError>;
}

// ── In-memory surface ────────────────────────────────────────────────────

/// A drawing call captured by [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Line {
        from: Point,
        to: Point,
        stroke: Stroke,
    },
    Rect {
        rect: Rect,
        paint: Paint,
    },
    Text {
        origin: Point,
        text: String,
        font_size: f32,
        color: Rgb,
    },
}

/// A page of [`RecordingSurface`]: fixed size, searchable text, recorded ops.
#[derive(Debug, Clone)]
pub struct RecordedPage {
    pub size: PageSize,
    pub text: String,
    pub ops: Vec<DrawOp>,
}

/// In-memory [`DocumentSurface`].
///
/// Text search is a literal substring search over each page's text; the
/// n-th match is reported as a 12-point-high box on the n-th text row.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    pub pages: Vec<RecordedPage>,
}

impl RecordingSurface {
    /// Letter-sized pages (612 × 792) with the given text.
    pub fn letter(texts: &[&str]) -> Self {
        Self::with_size(texts, PageSize { width: 612.0, height: 792.0 })
    }

    pub fn with_size(texts: &[&str], size: PageSize) -> Self {
        Self {
            pages: texts
                .iter()
                .map(|t| RecordedPage {
                    size,
                    text: t.to_string(),
                    ops: Vec::new(),
                })
                .collect(),
        }
    }

    /// Recorded ops of 1-based page `page`.
    pub fn ops(&self, page: usize) -> &[DrawOp] {
        page.checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .map(|p| p.ops.as_slice())
            .unwrap_or(&[])
    }
}

impl PageCanvas for RecordedPage {
    fn size(&self) -> PageSize {
        self.size
    }

    fn find_text(&mut self, needle: &str, limit: usize) -> Result<Vec<Rect>, AnnotatorError> {
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .text
            .match_indices(needle)
            .take(limit)
            .enumerate()
            .map(|(row, (offset, _))| {
                let y = 40.0 + row as f32 * 14.0;
                let x = 40.0 + (offset % 60) as f32;
                Rect::new(x, y, x + needle.chars().count() as f32 * 5.0, y + 12.0)
            })
            .collect())
    }

    fn draw_line(&mut self, from: Point, to: Point, stroke: Stroke) -> Result<(), AnnotatorError> {
        self.ops.push(DrawOp::Line { from, to, stroke });
        Ok(())
    }

    fn draw_rect(&mut self, rect: Rect, paint: Paint) -> Result<(), AnnotatorError> {
        self.ops.push(DrawOp::Rect { rect, paint });
        Ok(())
    }

    fn draw_text(
        &mut self,
        origin: Point,
        text: &str,
        font_size: f32,
        color: Rgb,
    ) -> Result<(), AnnotatorError> {
        self.ops.push(DrawOp::Text {
            origin,
            text: text.to_string(),
            font_size,
            color,
        });
        Ok(())
    }
}

impl DocumentSurface for RecordingSurface {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn with_page(
        &mut self,
        page: usize,
        draw: &mut dyn FnMut(&mut dyn PageCanvas) -> Result<(), AnnotatorError>,
    ) -> Result<(), AnnotatorError> {
        let recorded = page
            .checked_sub(1)
            .and_then(|i| self.pages.get_mut(i))
            .ok_or_else(|| AnnotatorError::RenderFailed {
                page,
                detail: "page out of bounds".into(),
            })?;
        draw(recorded)
    }
}
