//! Per-type colours and labels for margin boxes and highlights.

use crate::model::AnnotationType;

/// An RGB colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

impl Rgb {
    /// Components scaled to `0..=255`.
    pub fn to_u8(self) -> (u8, u8, u8) {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        (c(self.0), c(self.1), c(self.2))
    }
}

/// Visual style of one annotation type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeStyle {
    /// Border, left bar, label and theme tags.
    pub accent: Rgb,
    /// Box background and highlight fill.
    pub fill: Rgb,
    /// Short label printed at the top of the box.
    pub label: &'static str,
}

/// Quote text inside boxes.
pub const QUOTE_COLOR: Rgb = Rgb(0.28, 0.30, 0.40);
/// Annotation body text.
pub const BODY_COLOR: Rgb = Rgb(0.08, 0.10, 0.16);
/// Separator line between page content and the margin strip.
pub const SEPARATOR_COLOR: Rgb = Rgb(0.68, 0.72, 0.80);

pub fn style_for(kind: AnnotationType) -> TypeStyle {
    let (accent, fill, label) = match kind {
        AnnotationType::Definition => (Rgb(0.12, 0.75, 0.68), Rgb(0.88, 1.00, 0.98), "DEF"),
        AnnotationType::Question => (Rgb(0.90, 0.65, 0.05), Rgb(1.00, 0.97, 0.82), "Q?"),
        AnnotationType::Reaction => (Rgb(0.58, 0.45, 0.92), Rgb(0.96, 0.92, 1.00), "RXN"),
        AnnotationType::Device => (Rgb(0.18, 0.55, 0.92), Rgb(0.88, 0.95, 1.00), "LIT"),
        AnnotationType::Theme => (Rgb(0.92, 0.45, 0.12), Rgb(1.00, 0.93, 0.86), "THM"),
        AnnotationType::Notation => (Rgb(0.45, 0.50, 0.58), Rgb(0.94, 0.94, 0.96), "NB"),
        AnnotationType::Summary => (Rgb(0.18, 0.75, 0.38), Rgb(0.88, 1.00, 0.93), "SUM"),
    };
    TypeStyle {
        accent,
        fill,
        label,
    }
}
