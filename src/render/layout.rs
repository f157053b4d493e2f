//! Margin-box layout: place annotation callouts in a strip on the right edge.
//!
//! ## Layout Model
//!
//! ```text
//! ┌──────────────────────────┬─┬──────────┐
//! │                          │ │▌DEF      │ ◀─ cursor starts at top_inset
//! │  page content            │ │▌"quote"  │
//! │  ░░highlighted quote░░   │ │▌body …   │
//! │                          │ │▌#tag     │
//! │                          │ ├──────────┤ ◀─ + box_gap
//! │                          │ │▌Q?  …    │
//! └──────────────────────────┴─┴──────────┘
//!                separator ──┘   margin strip
//! ```
//!
//! Boxes stack top to bottom in input order. A box that would cross the
//! bottom inset restarts at the top of the strip and may overlap earlier
//! boxes: text is never shrunk and nothing spills onto another page.
//!
//! Planning ([`plan_box`]) is pure; drawing ([`draw_page`]) only replays a
//! plan onto a [`PageCanvas`].

use crate::config::LayoutConfig;
use crate::error::AnnotatorError;
use crate::model::Annotation;
use crate::render::style::{self, TypeStyle};
use crate::render::surface::{PageCanvas, PageSize, Paint, Point, Rect, Stroke};
use crate::render::wrap;
use tracing::debug;

// ── Fixed drawing constants ──────────────────────────────────────────────

const SEPARATOR_GAP: f32 = 2.0;
const SEPARATOR_WIDTH: f32 = 0.5;
const SEPARATOR_OPACITY: f32 = 0.45;
const BOX_OFFSET: f32 = 3.0;
const BOX_WIDTH_TRIM: f32 = 5.0;
const TEXT_INSET: f32 = 5.0;
const LABEL_GAP: f32 = 2.5;
const QUOTE_BLOCK_GAP: f32 = 2.0;
const THEME_LINE_HEIGHT: f32 = 8.0;
const THEME_BASELINE_LIFT: f32 = 3.5;
const BODY_BOTTOM_GUARD: f32 = 2.0;
const BOX_FILL_OPACITY: f32 = 0.90;
const BOX_STROKE_OPACITY: f32 = 0.82;
const BOX_STROKE_WIDTH: f32 = 0.65;
const HIGHLIGHT_FILL_OPACITY: f32 = 0.32;
const HIGHLIGHT_STROKE_OPACITY: f32 = 0.55;
const HIGHLIGHT_STROKE_WIDTH: f32 = 0.5;

/// Strip geometry of one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginGeometry {
    pub page: PageSize,
    pub margin_width: f32,
    /// x of the separator line.
    pub separator_x: f32,
    pub box_x: f32,
    pub box_width: f32,
    /// Character budget per wrapped line.
    pub wrap_chars: usize,
}

impl MarginGeometry {
    pub fn new(page: PageSize, layout: &LayoutConfig) -> Self {
        let margin_width = layout.margin_width(page.width);
        let separator_x = page.width - margin_width - SEPARATOR_GAP;
        let box_width = margin_width - BOX_WIDTH_TRIM;
        Self {
            page,
            margin_width,
            separator_x,
            box_x: separator_x + BOX_OFFSET,
            box_width,
            wrap_chars: layout.wrap_chars(box_width),
        }
    }

    /// Lowest y a box may reach.
    pub fn bottom_limit(&self, layout: &LayoutConfig) -> f32 {
        self.page.height - layout.bottom_inset
    }
}

/// Everything needed to draw one box.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxPlan {
    pub rect: Rect,
    pub style: TypeStyle,
    pub quote_lines: Vec<String>,
    pub body_lines: Vec<String>,
    /// Joined `#tag` string; empty when there are no themes.
    pub themes: String,
}

/// Box height for the given wrapped content.
pub fn box_height(layout: &LayoutConfig, quote_lines: usize, body_lines: usize, has_themes: bool) -> f32 {
    let mut h = layout.box_padding * 2.0 + layout.label_font_size + LABEL_GAP;
    if quote_lines > 0 {
        h += quote_lines as f32 * layout.quote_line_height() + QUOTE_BLOCK_GAP;
    }
    h += body_lines as f32 * layout.body_line_height();
    if has_themes {
        h += THEME_LINE_HEIGHT;
    }
    h
}

/// Plan the box for `annotation` with the cursor at `cursor`.
///
/// Applies the overflow rule: a box that would end below the bottom limit
/// starts at `top_inset` instead.
pub fn plan_box(
    annotation: &Annotation,
    cursor: f32,
    geo: &MarginGeometry,
    layout: &LayoutConfig,
) -> BoxPlan {
    let body_lines = wrap::wrap(&annotation.annotation, geo.wrap_chars);
    let quote = wrap::quote_marked(&annotation.quote, layout.quote_max_chars);
    let quote_lines = wrap::wrap(&quote, geo.wrap_chars);
    let themes = wrap::theme_tags(&annotation.themes, layout.max_theme_tags);

    let h = box_height(layout, quote_lines.len(), body_lines.len(), !themes.is_empty());
    let top = if cursor + h > geo.bottom_limit(layout) {
        layout.top_inset
    } else {
        cursor
    };

    BoxPlan {
        rect: Rect::new(geo.box_x, top, geo.box_x + geo.box_width, top + h),
        style: style::style_for(annotation.kind),
        quote_lines,
        body_lines,
        themes,
    }
}

/// What happened on one page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageReport {
    pub boxes: usize,
    pub highlights: usize,
    /// Quotes long enough to search for that were not found on the page.
    pub unmatched_quotes: usize,
}

/// Draw the separator, highlights and boxes for `annotations` on one page.
pub fn draw_page(
    canvas: &mut dyn PageCanvas,
    annotations: &[Annotation],
    layout: &LayoutConfig,
) -> Result<PageReport, AnnotatorError> {
    let geo = MarginGeometry::new(canvas.size(), layout);
    let mut report = PageReport::default();

    canvas.draw_line(
        Point::new(geo.separator_x, layout.top_inset),
        Point::new(geo.separator_x, geo.page.height - layout.top_inset),
        Stroke {
            color: style::SEPARATOR_COLOR,
            opacity: SEPARATOR_OPACITY,
            width: SEPARATOR_WIDTH,
        },
    )?;

    let mut cursor = layout.top_inset;
    for annotation in annotations {
        let style = style::style_for(annotation.kind);

        // ── Highlight ──
        let quote = annotation.quote.trim();
        if quote.chars().count() >= layout.min_highlight_chars {
            let hits = canvas.find_text(quote, layout.max_highlights)?;
            if hits.is_empty() {
                debug!("Quote not found on page, skipping highlight: {:?}", quote);
                report.unmatched_quotes += 1;
            }
            for rect in hits {
                canvas.draw_rect(
                    rect,
                    Paint {
                        fill: Some((style.fill, HIGHLIGHT_FILL_OPACITY)),
                        stroke: Some(Stroke {
                            color: style.accent,
                            opacity: HIGHLIGHT_STROKE_OPACITY,
                            width: HIGHLIGHT_STROKE_WIDTH,
                        }),
                    },
                )?;
                report.highlights += 1;
            }
        }

        // ── Box ──
        let plan = plan_box(annotation, cursor, &geo, layout);
        draw_box(canvas, &plan, layout)?;
        report.boxes += 1;
        cursor = plan.rect.y1 + layout.box_gap;
    }

    Ok(report)
}

fn draw_box(canvas: &mut dyn PageCanvas, plan: &BoxPlan, layout: &LayoutConfig) -> Result<(), AnnotatorError> {
    let rect = plan.rect;
    let style = plan.style;

    canvas.draw_rect(
        rect,
        Paint {
            fill: Some((style.fill, BOX_FILL_OPACITY)),
            stroke: Some(Stroke {
                color: style.accent,
                opacity: BOX_STROKE_OPACITY,
                width: BOX_STROKE_WIDTH,
            }),
        },
    )?;
    canvas.draw_rect(
        Rect::new(rect.x0, rect.y0, rect.x0 + layout.accent_bar_width, rect.y1),
        Paint {
            fill: Some((style.accent, 1.0)),
            stroke: None,
        },
    )?;

    let tx = rect.x0 + TEXT_INSET;
    let mut ty = rect.y0 + layout.box_padding;

    canvas.draw_text(
        Point::new(tx, ty + layout.label_font_size),
        style.label,
        layout.label_font_size,
        style.accent,
    )?;
    ty += layout.label_font_size + LABEL_GAP;

    for line in &plan.quote_lines {
        canvas.draw_text(
            Point::new(tx, ty + layout.quote_font_size),
            line,
            layout.quote_font_size,
            style::QUOTE_COLOR,
        )?;
        ty += layout.quote_line_height();
    }
    if !plan.quote_lines.is_empty() {
        ty += QUOTE_BLOCK_GAP;
    }

    for line in &plan.body_lines {
        if ty + layout.body_line_height() > rect.y1 - BODY_BOTTOM_GUARD {
            break;
        }
        canvas.draw_text(
            Point::new(tx, ty + layout.body_font_size),
            line,
            layout.body_font_size,
            style::BODY_COLOR,
        )?;
        ty += layout.body_line_height();
    }

    // Tags sit left-aligned at the text inset, on the box's bottom line.
    if !plan.themes.is_empty() {
        canvas.draw_text(
            Point::new(tx, rect.y1 - THEME_BASELINE_LIFT),
            &plan.themes,
            layout.theme_font_size,
            style.accent,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnnotationType;

    fn letter() -> MarginGeometry {
        MarginGeometry::new(
            PageSize {
                width: 612.0,
                height: 792.0,
            },
            &LayoutConfig::default(),
        )
    }

    fn note(kind: AnnotationType, quote: &str, body: &str, themes: &[&str]) -> Annotation {
        Annotation {
            kind,
            quote: quote.into(),
            annotation: body.into(),
            themes: themes.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn letter_geometry() {
        let g = letter();
        assert!((g.margin_width - 140.76).abs() < 0.01);
        assert!((g.separator_x - 469.24).abs() < 0.01);
        assert!((g.box_x - 472.24).abs() < 0.01);
        assert!((g.box_width - 135.76).abs() < 0.01);
        assert_eq!(g.wrap_chars, 37);
    }

    #[test]
    fn height_of_bare_box() {
        let l = LayoutConfig::default();
        assert!((box_height(&l, 0, 0, false) - 16.3).abs() < 1e-4);
    }

    #[test]
    fn height_counts_every_part() {
        let l = LayoutConfig::default();
        let expected = 16.3 + 2.0 * 6.4 * 1.32 + 2.0 + 3.0 * 6.9 * 1.36 + 8.0;
        assert!((box_height(&l, 2, 3, true) - expected).abs() < 1e-3);
    }

    #[test]
    fn plan_places_box_at_cursor() {
        let l = LayoutConfig::default();
        let g = letter();
        let plan = plan_box(
            &note(AnnotationType::Theme, "food of love", "Love as appetite.", &["love"]),
            100.0,
            &g,
            &l,
        );
        assert_eq!(plan.rect.y0, 100.0);
        assert_eq!(plan.quote_lines, vec!["\"food of love\"".to_string()]);
        assert_eq!(plan.themes, "#love");
        assert_eq!(plan.style.label, "THM");
    }

    #[test]
    fn overflow_restarts_at_top() {
        let l = LayoutConfig::default();
        let g = letter();
        let plan = plan_box(&note(AnnotationType::Summary, "", "short", &[]), 780.0, &g, &l);
        assert_eq!(plan.rect.y0, l.top_inset);
    }

    #[test]
    fn box_that_just_fits_stays() {
        let l = LayoutConfig::default();
        let g = letter();
        let h = box_height(&l, 0, 1, false);
        let cursor = g.bottom_limit(&l) - h;
        let plan = plan_box(&note(AnnotationType::Summary, "", "short", &[]), cursor, &g, &l);
        assert_eq!(plan.rect.y0, cursor);
    }

    #[test]
    fn long_quote_is_shortened_before_wrapping() {
        let l = LayoutConfig::default();
        let g = letter();
        let quote = "word ".repeat(30);
        let plan = plan_box(&note(AnnotationType::Device, &quote, "b", &[]), 14.0, &g, &l);
        let joined = plan.quote_lines.join(" ");
        assert!(joined.ends_with("…\""));
        assert!(joined.chars().count() <= l.quote_max_chars + 4);
    }
}
