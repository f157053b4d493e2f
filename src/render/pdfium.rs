//! pdfium-backed [`DocumentSurface`].
//!
//! pdfium measures y upwards from the bottom of the page; the layout engine
//! measures downwards from the top. Every coordinate is flipped here and
//! nowhere else.

use crate::error::AnnotatorError;
use crate::render::style::Rgb;
use crate::render::surface::{DocumentSurface, PageCanvas, PageSize, Paint, Point, Rect, Stroke};
use pdfium_render::prelude::*;

/// An opened document plus the Helvetica font used for all callout text.
pub struct PdfiumSurface<'a> {
    document: PdfDocument<'a>,
    font: PdfFontToken,
}

impl<'a> PdfiumSurface<'a> {
    pub fn new(mut document: PdfDocument<'a>) -> Self {
        let font = document.fonts_mut().helvetica();
        Self { document, font }
    }

    /// Serialise the document, including every drawn object, as a full copy.
    ///
    /// pdfium has no garbage-collection switch on save; unreferenced objects
    /// are kept and existing streams keep their filters.
    pub fn save(&self) -> Result<Vec<u8>, AnnotatorError> {
        self.document
            .save_to_bytes()
            .map_err(|e| AnnotatorError::RenderFailed {
                page: 0,
                detail: format!("save failed: {:?}", e),
            })
    }
}

impl DocumentSurface for PdfiumSurface<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn with_page(
        &mut self,
        page: usize,
        draw: &mut dyn FnMut(&mut dyn PageCanvas) -> Result<(), AnnotatorError>,
    ) -> Result<(), AnnotatorError> {
        let index = page
            .checked_sub(1)
            .and_then(|i| u16::try_from(i).ok())
            .ok_or_else(|| AnnotatorError::RenderFailed {
                page,
                detail: "page index out of range".into(),
            })?;
        let mut pdf_page = self
            .document
            .pages()
            .get(index)
            .map_err(|e| render_failed(page, e))?;
        let mut canvas = PdfiumCanvas {
            page_num: page,
            size: PageSize {
                width: pdf_page.width().value,
                height: pdf_page.height().value,
            },
            page: &mut pdf_page,
            font: self.font,
        };
        draw(&mut canvas)
    }
}

struct PdfiumCanvas<'p, 'a> {
    page_num: usize,
    size: PageSize,
    page: &'p mut PdfPage<'a>,
    font: PdfFontToken,
}

fn render_failed(page: usize, e: PdfiumError) -> AnnotatorError {
    AnnotatorError::RenderFailed {
        page,
        detail: format!("{:?}", e),
    }
}

fn color(rgb: Rgb, opacity: f32) -> PdfColor {
    let (r, g, b) = rgb.to_u8();
    PdfColor::new(r, g, b, (opacity.clamp(0.0, 1.0) * 255.0).round() as u8)
}

impl PdfiumCanvas<'_, '_> {
    fn flip(&self, y: f32) -> f32 {
        self.size.height - y
    }

    fn to_pdf_rect(&self, rect: Rect) -> PdfRect {
        PdfRect::new_from_values(self.flip(rect.y1), rect.x0, self.flip(rect.y0), rect.x1)
    }
}

impl PageCanvas for PdfiumCanvas<'_, '_> {
    fn size(&self) -> PageSize {
        self.size
    }

    fn find_text(&mut self, needle: &str, limit: usize) -> Result<Vec<Rect>, AnnotatorError> {
        let page_num = self.page_num;
        let height = self.size.height;
        let text = self.page.text().map_err(|e| render_failed(page_num, e))?;
        let search = text
            .search(needle, &PdfSearchOptions::new())
            .map_err(|e| render_failed(page_num, e))?;

        let mut rects = Vec::new();
        for segments in search.iter(PdfSearchDirection::SearchForward).take(limit) {
            for segment in segments.iter() {
                let b = segment.bounds();
                rects.push(Rect::new(
                    b.left.value,
                    height - b.top.value,
                    b.right.value,
                    height - b.bottom.value,
                ));
            }
        }
        Ok(rects)
    }

    fn draw_line(&mut self, from: Point, to: Point, stroke: Stroke) -> Result<(), AnnotatorError> {
        let (y0, y1) = (self.flip(from.y), self.flip(to.y));
        self.page
            .objects_mut()
            .create_path_object_line(
                PdfPoints::new(from.x),
                PdfPoints::new(y0),
                PdfPoints::new(to.x),
                PdfPoints::new(y1),
                color(stroke.color, stroke.opacity),
                PdfPoints::new(stroke.width),
            )
            .map_err(|e| render_failed(self.page_num, e))?;
        Ok(())
    }

    fn draw_rect(&mut self, rect: Rect, paint: Paint) -> Result<(), AnnotatorError> {
        let pdf_rect = self.to_pdf_rect(rect);
        let stroke_color = paint.stroke.map(|s| color(s.color, s.opacity));
        let stroke_width = paint.stroke.map(|s| PdfPoints::new(s.width));
        let fill_color = paint.fill.map(|(rgb, opacity)| color(rgb, opacity));
        self.page
            .objects_mut()
            .create_path_object_rect(pdf_rect, stroke_color, stroke_width, fill_color)
            .map_err(|e| render_failed(self.page_num, e))?;
        Ok(())
    }

    fn draw_text(
        &mut self,
        origin: Point,
        text: &str,
        font_size: f32,
        rgb: Rgb,
    ) -> Result<(), AnnotatorError> {
        let page_num = self.page_num;
        let y = self.flip(origin.y);
        let mut object = self
            .page
            .objects_mut()
            .create_text_object(
                PdfPoints::new(origin.x),
                PdfPoints::new(y),
                text,
                self.font,
                PdfPoints::new(font_size),
            )
            .map_err(|e| render_failed(page_num, e))?;
        object
            .set_fill_color(color(rgb, 1.0))
            .map_err(|e| render_failed(page_num, e))?;
        Ok(())
    }
}
