//! # edgequake-pdf-annotate
//!
//! Annotate PDF documents with a language model, then draw the notes back
//! onto the pages as highlighted quotes and colour-coded margin callouts.
//!
//! ## Why this crate?
//!
//! Asking a model to "annotate this page" is easy; getting something a PDF
//! renderer can rely on is not. Small local models wrap their JSON in prose,
//! break strings across lines, run out of tokens mid-object and invent
//! annotation types. This crate turns that unreliable text into a strictly
//! typed record list *without ever failing the job on a bad answer*, and
//! lays the records out in a fixed margin strip deterministically.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF + instructions
//!  │
//!  ├─ 1. Input     local file or URL → bytes (%PDF checked)
//!  ├─ 2. Extract   page text via pdfium (spawn_blocking)
//!  ├─ 3. Prompt    framing + instructions + page text + output contract
//!  ├─ 4. Model     Ollama /api/generate, or any edgequake-llm provider
//!  ├─ 5. Repair    six ordered strategies → JSON list
//!  ├─ 6. Validate  closed type set, single-line strings, themes list
//!  │      ⇣ stream of events (progress, page_start, annotation, error, done)
//!  └─ 7. Render    highlights + margin boxes on a copy of the PDF
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf_annotate::{annotate_stream, collect_annotations, render_pdf};
//! use edgequake_pdf_annotate::{AnnotatorConfig, PageRange};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnnotatorConfig::default(); // llama3.2 on localhost:11434
//!     let range = PageRange::new(1, Some(3));
//!     let events: Vec<_> = annotate_stream("play.pdf", "Define archaic words.", range, &config)
//!         .await?
//!         .collect()
//!         .await;
//!
//!     let records = collect_annotations(&events);
//!     let bytes = std::fs::read("play.pdf")?;
//!     let annotated = render_pdf(bytes, &records, range, &config.layout).await?;
//!     std::fs::write("play_annotated.pdf", annotated)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfannotate` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf-annotate = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod prompts;
pub mod render;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AnnotatorConfig, AnnotatorConfigBuilder, LayoutConfig, PageRange};
pub use error::{AnnotatorError, CompletionError, RepairError};
pub use model::{Annotation, AnnotationType, PageAnnotation};
pub use pipeline::extract::{inspect_page_count, ExtractedPages, PageSource};
pub use pipeline::input::load_document;
pub use pipeline::llm::{resolve_client, CompletionClient, OllamaClient, ProviderClient};
pub use pipeline::repair::repair_json;
pub use pipeline::validate::{parse_page_annotations, sanitize_records};
pub use render::{render_pdf, RenderSummary};
pub use stream::{
    annotate_bytes_stream, annotate_pages_stream, annotate_stream, collect_annotations,
    AnnotationEvent, EventStream,
};
