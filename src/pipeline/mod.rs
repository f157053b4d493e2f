//! Pipeline stages for page annotation.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the model backend can be swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ prompts ──▶ llm ──▶ repair ──▶ validate
//! (bytes)   (pdfium)    (text)     (model)  (JSON)     (records)
//! ```
//!
//! 1. [`input`]    — load document bytes from a path or URL, check `%PDF`
//! 2. [`extract`]  — page text via pdfium; runs in `spawn_blocking`
//! 3. [`llm`]      — one completion per page; the only stage with network I/O
//! 4. [`repair`]   — recover a JSON list from unreliable model text
//! 5. [`validate`] — normalise records into [`crate::model::Annotation`]s
//!
//! The per-page loop that ties these together is [`crate::stream`].

pub mod extract;
pub mod input;
pub mod llm;
pub mod repair;
pub mod validate;
