//! Margin layout tests against the in-memory recording surface.

use edgequake_pdf_annotate::render::layout::MarginGeometry;
use edgequake_pdf_annotate::render::surface::{DrawOp, PageSize, Rect, RecordingSurface};
use edgequake_pdf_annotate::render::{group_by_page, render_annotations};
use edgequake_pdf_annotate::{
    parse_page_annotations, Annotation, AnnotationType, AnnotatorError, LayoutConfig,
    PageAnnotation, PageRange,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn note(page: usize, kind: AnnotationType, quote: &str, body: &str) -> PageAnnotation {
    Annotation {
        kind,
        quote: quote.to_string(),
        annotation: body.to_string(),
        themes: Vec::new(),
    }
    .on_page(page)
}

fn letter() -> PageSize {
    PageSize {
        width: 612.0,
        height: 792.0,
    }
}

/// Outer rectangles of the margin boxes on one page, in drawing order.
fn boxes(surface: &RecordingSurface, page: usize, layout: &LayoutConfig) -> Vec<Rect> {
    let geo = MarginGeometry::new(letter(), layout);
    surface
        .ops(page)
        .iter()
        .filter_map(|op| match op {
            DrawOp::Rect { rect, paint } if paint.stroke.is_some() && rect.x0 >= geo.separator_x => {
                Some(*rect)
            }
            _ => None,
        })
        .collect()
}

/// Highlight rectangles: stroked rects left of the separator.
fn highlights(surface: &RecordingSurface, page: usize, layout: &LayoutConfig) -> Vec<Rect> {
    let geo = MarginGeometry::new(letter(), layout);
    surface
        .ops(page)
        .iter()
        .filter_map(|op| match op {
            DrawOp::Rect { rect, paint } if paint.stroke.is_some() && rect.x0 < geo.separator_x => {
                Some(*rect)
            }
            _ => None,
        })
        .collect()
}

fn texts(surface: &RecordingSurface, page: usize) -> Vec<String> {
    surface
        .ops(page)
        .iter()
        .filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

fn render(
    surface: &mut RecordingSurface,
    records: &[PageAnnotation],
    range: PageRange,
) -> edgequake_pdf_annotate::RenderSummary {
    render_annotations(surface, &group_by_page(records), range, &LayoutConfig::default())
        .expect("recording surface never fails")
}

// ── Highlights ───────────────────────────────────────────────────────────────

#[test]
fn found_quote_is_highlighted() {
    let mut surface = RecordingSurface::letter(&["Thou art wise, and thou art kind."]);
    let records = vec![note(1, AnnotationType::Definition, "thou art", "You are.")];
    let summary = render(&mut surface, &records, PageRange::default());

    assert_eq!(summary.highlights, 1);
    assert_eq!(summary.unmatched_quotes, 0);
    assert_eq!(highlights(&surface, 1, &LayoutConfig::default()).len(), 1);
}

#[test]
fn missing_quote_still_gets_a_box() {
    let mut surface = RecordingSurface::letter(&["Nothing to see here."]);
    let records = vec![note(1, AnnotationType::Question, "not on this page", "Why?")];
    let summary = render(&mut surface, &records, PageRange::default());

    assert_eq!(summary.highlights, 0);
    assert_eq!(summary.unmatched_quotes, 1);
    assert_eq!(summary.boxes, 1);
    assert!(texts(&surface, 1).contains(&"Q?".to_string()));
}

#[test]
fn short_quotes_are_not_searched() {
    let mut surface = RecordingSurface::letter(&["an an an an"]);
    let records = vec![note(1, AnnotationType::Notation, "an", "Short.")];
    let summary = render(&mut surface, &records, PageRange::default());
    assert_eq!(summary.highlights, 0);
    assert_eq!(summary.unmatched_quotes, 0);
}

#[test]
fn highlights_are_capped_per_quote() {
    let page = "the sea ".repeat(20);
    let mut surface = RecordingSurface::letter(&[&page]);
    let records = vec![note(1, AnnotationType::Theme, "the sea", "Recurring image.")];
    let summary = render(&mut surface, &records, PageRange::default());
    assert_eq!(summary.highlights, LayoutConfig::default().max_highlights);
}

// ── Box stacking ─────────────────────────────────────────────────────────────

#[test]
fn boxes_stack_top_down_in_input_order() {
    let layout = LayoutConfig::default();
    let mut surface = RecordingSurface::letter(&["text"]);
    let records: Vec<_> = (0..3)
        .map(|i| note(1, AnnotationType::Summary, "", &format!("Note {i}.")))
        .collect();
    render(&mut surface, &records, PageRange::default());

    let rects = boxes(&surface, 1, &layout);
    assert_eq!(rects.len(), 3);
    assert_eq!(rects[0].y0, layout.top_inset);
    for pair in rects.windows(2) {
        let expected = pair[0].y1 + layout.box_gap;
        assert!((pair[1].y0 - expected).abs() < 1e-3);
    }
}

#[test]
fn overflowing_box_restarts_at_the_top() {
    let layout = LayoutConfig::default();
    let mut surface = RecordingSurface::letter(&["text"]);
    let body = "A fairly long annotation body that will wrap over several lines in the narrow strip. "
        .repeat(3);
    let records: Vec<_> = (0..12)
        .map(|_| note(1, AnnotationType::Reaction, "", &body))
        .collect();
    render(&mut surface, &records, PageRange::default());

    let rects = boxes(&surface, 1, &layout);
    assert_eq!(rects.len(), 12);
    let limit = 792.0 - layout.bottom_inset;
    assert!(rects.iter().all(|r| r.y1 <= limit + 1e-3), "a box crossed the bottom inset");
    let restarts = rects
        .iter()
        .skip(1)
        .filter(|r| (r.y0 - layout.top_inset).abs() < 1e-3)
        .count();
    assert!(restarts >= 1, "expected at least one reset to the top");
}

#[test]
fn box_carries_label_quote_and_tags() {
    let mut surface = RecordingSurface::letter(&["If music be the food of love, play on."]);
    let record = Annotation {
        kind: AnnotationType::Theme,
        quote: "music be the food of love".into(),
        annotation: "Love as appetite.".into(),
        themes: vec!["love".into(), "music".into()],
    }
    .on_page(1);
    render(&mut surface, &[record], PageRange::default());

    let lines = texts(&surface, 1);
    assert_eq!(lines[0], "THM");
    assert!(lines.iter().any(|l| l.contains("music be the food")));
    assert!(lines.iter().any(|l| l == "Love as appetite."));
    assert!(lines.iter().any(|l| l.contains("#love") && l.contains("#music")));
}

#[test]
fn separator_is_drawn_on_every_annotated_page() {
    let layout = LayoutConfig::default();
    let geo = MarginGeometry::new(letter(), &layout);
    let mut surface = RecordingSurface::letter(&["one", "two"]);
    let records = vec![
        note(1, AnnotationType::Notation, "", "a"),
        note(2, AnnotationType::Notation, "", "b"),
    ];
    render(&mut surface, &records, PageRange::default());

    for page in 1..=2 {
        match &surface.ops(page)[0] {
            DrawOp::Line { from, to, .. } => {
                assert!((from.x - geo.separator_x).abs() < 1e-3);
                assert_eq!(from.x, to.x);
            }
            other => panic!("expected separator first, got {other:?}"),
        }
    }
}

// ── Page selection ───────────────────────────────────────────────────────────

#[test]
fn page_zero_and_pages_past_the_end_are_skipped() {
    let mut surface = RecordingSurface::letter(&["one", "two"]);
    let records = vec![
        note(0, AnnotationType::Notation, "", "orphan"),
        note(2, AnnotationType::Notation, "", "kept"),
        note(9, AnnotationType::Notation, "", "too far"),
    ];
    let summary = render(&mut surface, &records, PageRange::default());

    assert_eq!(summary.pages_drawn, 1);
    assert_eq!(summary.pages_skipped, 2);
    assert!(surface.ops(1).is_empty());
    assert!(texts(&surface, 2).contains(&"kept".to_string()));
}

#[test]
fn range_filters_which_pages_are_drawn() {
    let mut surface = RecordingSurface::letter(&["one", "two", "three"]);
    let records: Vec<_> = (1..=3)
        .map(|p| note(p, AnnotationType::Summary, "", "s"))
        .collect();
    let summary = render(&mut surface, &records, PageRange::new(2, Some(2)));

    assert_eq!(summary.pages_drawn, 1);
    assert!(surface.ops(1).is_empty());
    assert!(!surface.ops(2).is_empty());
    assert!(surface.ops(3).is_empty());
}

#[test]
fn no_records_draws_nothing() {
    let mut surface = RecordingSurface::letter(&["one"]);
    let summary = render(&mut surface, &[], PageRange::default());
    assert_eq!(summary, Default::default());
    assert!(surface.ops(1).is_empty());
}

// ── Render input parsing ─────────────────────────────────────────────────────

#[test]
fn render_input_round_trips_into_boxes() {
    let json = r#"[
        {"page": 1, "type": "device", "quote": "sea of troubles", "annotation": "Mixed metaphor.", "themes": []},
        {"page": "two", "type": "summary", "quote": "", "annotation": "Dropped.", "themes": []},
        "not an object"
    ]"#;
    let records = parse_page_annotations(json).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].page, 0);

    let mut surface = RecordingSurface::letter(&["To take arms against a sea of troubles"]);
    let summary = render(&mut surface, &records, PageRange::default());
    assert_eq!(summary.boxes, 1);
    assert_eq!(summary.highlights, 1);
    assert!(texts(&surface, 1).contains(&"LIT".to_string()));
}

#[test]
fn render_input_must_be_an_array() {
    assert!(matches!(
        parse_page_annotations(r#"{"page":1}"#),
        Err(AnnotatorError::InvalidAnnotations(_))
    ));
    assert!(matches!(
        parse_page_annotations("not json"),
        Err(AnnotatorError::InvalidAnnotations(_))
    ));
}
