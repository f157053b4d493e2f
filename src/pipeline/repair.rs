//! Response repair: recover a list of records from unreliable model text.
//!
//! ## Why is repair necessary?
//!
//! Even with a strict output contract, small local models routinely produce
//! answers that are *almost* JSON:
//!
//! - a friendly sentence before and after the array
//! - the array wrapped in ```` ```json ```` fences
//! - raw newlines inside string values
//! - output cut off mid-object by the token limit
//! - single-quoted pseudo-JSON
//!
//! [`repair_json`] runs a fixed chain of strategies, each a pure function of
//! its input, and returns the result of the first one that yields a non-empty
//! structure. Determinism beats maximal recovery: a later strategy is never
//! consulted once an earlier one succeeded.
//!
//! ## Strategy Order
//!
//! 1. Parse the raw text directly
//! 2. Parse the span from the first `[` to the last `]`
//! 3. Same span with code-fence markers removed
//! 4. Same span with string-breaking newlines collapsed
//! 5. Truncation recovery: cut after the last `}` and close the array
//! 6. Raw recovery of individual `{…}` fragments (lossy, last resort)

use crate::error::RepairError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Which strategy produced the records. Exposed for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStrategy {
    Direct,
    ArraySpan,
    StripFences,
    CollapseNewlines,
    CloseTruncated,
    RawFragments,
}

/// Recover a non-empty list of JSON values from `raw`.
///
/// Never panics on malformed input. Returns [`RepairError`] carrying a
/// bounded snippet of `raw` when every strategy fails.
pub fn repair_json(raw: &str) -> Result<Vec<Value>, RepairError> {
    repair_json_with_strategy(raw).map(|(values, _)| values)
}

/// Like [`repair_json`], also reporting which strategy succeeded.
pub fn repair_json_with_strategy(
    raw: &str,
) -> Result<(Vec<Value>, RepairStrategy), RepairError> {
    // ── Strategy 1: direct ──────────────────────────────────────────────
    if let Some(values) = parse_records(raw) {
        return Ok(found(values, RepairStrategy::Direct));
    }

    let span = array_span(raw);

    // ── Strategies 2-4: variants of the array span ──────────────────────
    let attempts: [(RepairStrategy, fn(&str) -> String); 3] = [
        (RepairStrategy::ArraySpan, |s| s.to_string()),
        (RepairStrategy::StripFences, strip_code_fences),
        (RepairStrategy::CollapseNewlines, collapse_string_newlines),
    ];
    for (strategy, transform) in attempts {
        if let Some(values) = parse_span_records(&transform(span)) {
            return Ok(found(values, strategy));
        }
    }

    // ── Strategy 5: truncation recovery ─────────────────────────────────
    if let Some(closed) = close_truncated_array(array_start(raw)) {
        if let Some(values) = parse_span_records(&closed) {
            return Ok(found(values, RepairStrategy::CloseTruncated));
        }
    }

    // ── Strategy 6: raw fragment recovery ───────────────────────────────
    let mut fragments = recover_objects(span);
    if fragments.is_empty() && span.len() != raw.len() {
        fragments = recover_objects(raw);
    }
    if !fragments.is_empty() {
        return Ok(found(fragments, RepairStrategy::RawFragments));
    }

    Err(RepairError::from_raw(raw))
}

fn found(values: Vec<Value>, strategy: RepairStrategy) -> (Vec<Value>, RepairStrategy) {
    debug!("Recovered {} record(s) via {:?}", values.len(), strategy);
    (values, strategy)
}

/// Parse `s` as JSON and accept it only if it is a non-empty array, or a
/// single object (treated as a one-element list).
fn parse_records(s: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(s.trim()) {
        Ok(Value::Array(items)) if !items.is_empty() => Some(items),
        Ok(obj @ Value::Object(_)) => Some(vec![obj]),
        _ => None,
    }
}

/// [`parse_records`] for text cut out of a longer answer: the list must hold
/// at least one object, so a stray `["love"]` from inside a record does not
/// stand in for the record itself.
fn parse_span_records(s: &str) -> Option<Vec<Value>> {
    parse_records(s).filter(|items| items.iter().any(Value::is_object))
}

// ── Array span ───────────────────────────────────────────────────────────

/// The text from the first `[` to the last `]`, or all of `raw` when there
/// is no such well-ordered pair.
fn array_span(raw: &str) -> &str {
    match (raw.find('['), raw.rfind(']')) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => raw,
    }
}

/// The text from the first `[` to the end, for output that never got its
/// closing bracket.
fn array_start(raw: &str) -> &str {
    raw.find('[').map_or(raw, |start| &raw[start..])
}

// ── Strategy 3: code fences ──────────────────────────────────────────────

static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[A-Za-z0-9_-]*").unwrap());

fn strip_code_fences(input: &str) -> String {
    RE_FENCE.replace_all(input, "").trim().to_string()
}

// ── Strategy 4: newlines inside strings ──────────────────────────────────

/// Replace a newline with a space when it sits between a quote/word
/// character and a following quote/word/space character.
fn collapse_string_newlines(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            if c != '\n' || i == 0 {
                return c;
            }
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            let prev_ok = prev == '"' || is_word(prev);
            let next_ok = next.is_some_and(|n| n == '"' || n == ' ' || is_word(n));
            if prev_ok && next_ok {
                ' '
            } else {
                c
            }
        })
        .collect()
}

// ── Strategy 5: truncated output ─────────────────────────────────────────

/// Cut after the last `}` and append `]`, dropping a trailing partial object.
fn close_truncated_array(candidate: &str) -> Option<String> {
    let end = candidate.rfind('}')?;
    Some(format!("{}]", &candidate[..=end]))
}

// ── Strategy 6: raw recovery ─────────────────────────────────────────────

static RE_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[^{}]+\}").unwrap());

/// Lossy last resort: parse every brace-delimited fragment on its own.
///
/// Fragments are flattened to one line and tried as-is, then with single
/// quotes turned into double quotes. Nested objects, and fragments that
/// parse under neither form, are lost. Do not promote this to a primary path.
pub fn recover_objects(text: &str) -> Vec<Value> {
    RE_OBJECT
        .find_iter(text)
        .filter_map(|m| {
            let flat = m.as_str().replace('\n', " ");
            [flat.clone(), flat.replace('\'', "\"")]
                .iter()
                .find_map(|variant| match serde_json::from_str::<Value>(variant) {
                    Ok(v @ Value::Object(_)) => Some(v),
                    _ => None,
                })
        })
        .collect()
}
