//! Annotation data model shared by every pipeline stage.
//!
//! Records are created once by [`crate::pipeline::validate`], never mutated
//! afterwards, streamed to the caller during generation and finally consumed
//! by [`crate::render`] when the overlays are drawn.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Closed set of annotation kinds.
///
/// Anything the model invents outside this set folds to
/// [`AnnotationType::Notation`] instead of being rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationType {
    #[default]
    Notation,
    Definition,
    Question,
    Reaction,
    Device,
    Theme,
    Summary,
}

impl AnnotationType {
    /// Every variant, in prompt order.
    pub const ALL: [AnnotationType; 7] = [
        AnnotationType::Notation,
        AnnotationType::Definition,
        AnnotationType::Question,
        AnnotationType::Reaction,
        AnnotationType::Device,
        AnnotationType::Theme,
        AnnotationType::Summary,
    ];

    /// Lower-case wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            AnnotationType::Notation => "notation",
            AnnotationType::Definition => "definition",
            AnnotationType::Question => "question",
            AnnotationType::Reaction => "reaction",
            AnnotationType::Device => "device",
            AnnotationType::Theme => "theme",
            AnnotationType::Summary => "summary",
        }
    }

    /// Parse a type name leniently: trimmed, case-insensitive, unknown → `Notation`.
    pub fn from_lenient(raw: &str) -> Self {
        let wanted = raw.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .unwrap_or_default()
    }
}

impl fmt::Display for AnnotationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AnnotationType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_lenient(&raw))
    }
}

/// One structured note about a page, without its page number.
///
/// This is the `data` payload of an `annotation` stream event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Annotation kind; serialised as `type`.
    #[serde(rename = "type")]
    pub kind: AnnotationType,
    /// Phrase the note refers to. Expected, not guaranteed, to occur verbatim
    /// in the page text. Never contains a newline.
    #[serde(default)]
    pub quote: String,
    /// The note itself, one to three sentences. Never contains a newline.
    #[serde(default)]
    pub annotation: String,
    /// Short tags such as `"love"` or `"identity"`.
    #[serde(default)]
    pub themes: Vec<String>,
}

impl Annotation {
    /// A `notation` record with no quote and no themes, used for pipeline
    /// diagnostics ("no extractable text", "model returned no output", …).
    pub fn notice(message: impl Into<String>) -> Self {
        Self {
            kind: AnnotationType::Notation,
            quote: String::new(),
            annotation: message.into(),
            themes: Vec::new(),
        }
    }

    /// Attach a 1-based page number.
    pub fn on_page(self, page: usize) -> PageAnnotation {
        PageAnnotation {
            page,
            annotation: self,
        }
    }
}

/// An [`Annotation`] tagged with the 1-based page it belongs to.
///
/// Serialises flat (`{"page":1,"type":…,"quote":…}`), which is the shape the
/// render call accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageAnnotation {
    pub page: usize,
    #[serde(flatten)]
    pub annotation: Annotation,
}
