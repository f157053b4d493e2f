//! Prompt construction for per-page annotation.
//!
//! Centralising the prompt here keeps the output contract in one place: the
//! repair strategies in [`crate::pipeline::repair`] are tuned against exactly
//! this wording, so any change to it should be made with them in view.
//!
//! The order of the sections is fixed: framing, instructions, page text,
//! then the output contract. Models weigh the last thing they read most, and
//! the contract is what keeps the response parseable.

/// Marker appended to page text that was cut to fit the prompt.
pub const TRUNCATION_MARKER: &str = "\n[truncated]";

/// Output contract appended after the page text.
pub const OUTPUT_CONTRACT: &str = r#"Return a JSON array. Each item must have EXACTLY these keys:
  "type"       : one of: notation, definition, question, reaction, device, theme, summary
  "quote"      : a SHORT verbatim phrase from the text (4-8 words). Must appear exactly in text.
  "annotation" : your annotation in 1-3 sentences. No newlines inside.
  "themes"     : array like ["love","identity"] or []

Rules:
- Produce 3 to 6 annotations per page
- The quote must be exact words from the text so they can be highlighted on the page
- No apostrophes inside string values (write out: do not instead of don't)
- No newlines inside any value
- Output ONLY the raw JSON array. No markdown. No code fences. No explanation.

Example output:
[{"type":"definition","quote":"thou art","annotation":"thou art means you are. An archaic second-person form used throughout Shakespeare.","themes":[]},
{"type":"theme","quote":"music be the food of love","annotation":"Orsino frames love as a hunger fed by music. This opens the central theme of love as an irresistible appetite.","themes":["love","music"]}]
"#;

/// Build the annotation prompt for one page.
///
/// `page_text` is expected to be already bounded (see [`truncate_page_text`]).
pub fn build_prompt(page_text: &str, instructions: &str, page_num: usize) -> String {
    format!(
        "You are a literary annotation assistant. Read the page text and produce annotations as JSON.\n\n\
         ANNOTATION INSTRUCTIONS:\n{instructions}\n\n\
         PAGE {page_num} TEXT:\n{page_text}\n\n\
         {OUTPUT_CONTRACT}"
    )
}

/// Cut `text` to at most `max_chars` characters, appending
/// [`TRUNCATION_MARKER`] when anything was dropped.
pub fn truncate_page_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}
