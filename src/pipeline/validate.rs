//! Annotation validator: untrusted JSON values → canonical [`Annotation`]s.
//!
//! Everything here is total. Non-object entries are dropped, missing fields
//! become empty, unknown types fold to `notation`. Nothing raises, because a
//! partially usable model answer is the normal case, not the exception.

use crate::error::AnnotatorError;
use crate::model::{Annotation, AnnotationType, PageAnnotation};
use serde_json::{Map, Value};
use tracing::debug;

/// Normalise repaired records into annotations, in input order.
///
/// The output is never longer than the input.
pub fn sanitize_records(records: &[Value]) -> Vec<Annotation> {
    let out: Vec<Annotation> = records
        .iter()
        .filter_map(Value::as_object)
        .map(sanitize_object)
        .collect();
    if out.len() < records.len() {
        debug!("Dropped {} non-object record(s)", records.len() - out.len());
    }
    out
}

fn sanitize_object(obj: &Map<String, Value>) -> Annotation {
    let kind = match obj.get("type") {
        Some(v) => AnnotationType::from_lenient(&coerce_string(v)),
        None => AnnotationType::Notation,
    };
    Annotation {
        kind,
        quote: single_line(obj.get("quote")),
        annotation: single_line(obj.get("annotation")),
        themes: match obj.get("themes") {
            Some(Value::Array(items)) => items.iter().map(coerce_string).collect(),
            _ => Vec::new(),
        },
    }
}

/// String values as-is, anything else as its JSON text, `null` as empty.
fn coerce_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn single_line(v: Option<&Value>) -> String {
    v.map(coerce_string)
        .unwrap_or_default()
        .replace(['\r', '\n'], " ")
        .trim()
        .to_string()
}

// ── Render input ─────────────────────────────────────────────────────────

/// Parse the render call's annotation list.
///
/// The text must be a JSON array. Each object element is sanitised like a
/// model record and keeps its `page`; a missing or non-integer `page` becomes
/// 0, which no document has, so the record is skipped at draw time.
pub fn parse_page_annotations(json: &str) -> Result<Vec<PageAnnotation>, AnnotatorError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| AnnotatorError::InvalidAnnotations(e.to_string()))?;
    page_annotations_from_value(&value)
}

/// Same as [`parse_page_annotations`] for an already parsed value.
pub fn page_annotations_from_value(value: &Value) -> Result<Vec<PageAnnotation>, AnnotatorError> {
    let items = value.as_array().ok_or_else(|| {
        AnnotatorError::InvalidAnnotations("expected a JSON array of annotations".into())
    })?;
    Ok(items
        .iter()
        .filter_map(Value::as_object)
        .map(|obj| {
            let page = obj
                .get("page")
                .and_then(Value::as_u64)
                .and_then(|p| usize::try_from(p).ok())
                .unwrap_or(0);
            sanitize_object(obj).on_page(page)
        })
        .collect())
}
