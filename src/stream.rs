//! Streaming annotation API: emit records as each page completes.
//!
//! ## Why stream?
//!
//! A local model needs tens of seconds per page, so a 20-page range takes
//! minutes. Streaming lets callers show each annotation as soon as its page
//! is done, drive a progress bar, and stop the job by simply dropping the
//! stream.
//!
//! ## Event Order
//!
//! ```text
//! per page:  progress ─▶ page_start ─▶ annotation*
//! success:   progress(93) ─▶ done
//! fatal:     error ─▶ progress(100, "Stopped") ─▶ done
//! ```
//!
//! Every stream that is not dropped early ends with exactly one
//! [`AnnotationEvent::Done`].
//!
//! ## Failure Scopes
//!
//! Empty page text and unrecoverable model output are per page: they become
//! a diagnostic `notation` record and the job moves on. An unreachable or
//! timed-out model, an unreadable document and an empty page range end the
//! job with one `error` event. Caller mistakes (no document, no
//! instructions) are returned as `Err` before the stream exists.

use crate::config::{AnnotatorConfig, PageRange};
use crate::error::AnnotatorError;
use crate::model::{Annotation, PageAnnotation};
use crate::pipeline::extract::{self, PageSource};
use crate::pipeline::llm::{self, CompletionClient};
use crate::pipeline::{input, repair, validate};
use crate::prompts;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, info, warn};

/// Progress reported once every page in range is annotated.
pub const PROGRESS_ANNOTATED: u8 = 93;

/// Per-page progress is scaled into `0..PROGRESS_PAGES_MAX`.
pub const PROGRESS_PAGES_MAX: u8 = 92;

/// Progress reported when the job ends, successfully or not.
pub const PROGRESS_FINISHED: u8 = 100;

/// Diagnostic text for a page without extractable text.
pub const NOTICE_NO_TEXT: &str = "No extractable text on this page (may be an image).";
/// Diagnostic text for an empty model response.
pub const NOTICE_NO_OUTPUT: &str = "Model returned no output.";
/// Diagnostic text for a response that repaired to zero usable records.
pub const NOTICE_NO_ANNOTATIONS: &str = "No annotations produced.";

/// Raw text kept in a parse-failure diagnostic.
const PARSE_FAILURE_RAW_CHARS: usize = 500;

const EVENT_BUFFER: usize = 64;

/// One event of the generation stream.
///
/// Serialises as an object tagged by `type`, e.g.
/// `{"type":"progress","pct":46,"label":"…"}` or `{"type":"done"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnotationEvent {
    Progress { pct: u8, label: String },
    PageStart { page: usize },
    Annotation { page: usize, data: Annotation },
    Error { message: String },
    Done,
}

impl AnnotationEvent {
    fn progress(pct: u8, label: impl Into<String>) -> Self {
        AnnotationEvent::Progress {
            pct,
            label: label.into(),
        }
    }

    /// The record carried by an `annotation` event, with its page attached.
    pub fn page_annotation(&self) -> Option<PageAnnotation> {
        match self {
            AnnotationEvent::Annotation { page, data } => Some(data.clone().on_page(*page)),
            _ => None,
        }
    }
}

/// A boxed stream of generation events.
pub type EventStream = Pin<Box<dyn Stream<Item = AnnotationEvent> + Send>>;

/// Annotate a PDF given as a local path or an HTTP(S) URL.
///
/// # Errors
/// Returns `Err` without starting a job when the instructions are empty, the
/// input cannot be read, or the bytes are not a PDF.
pub async fn annotate_stream(
    input_str: impl AsRef<str>,
    instructions: &str,
    range: PageRange,
    config: &AnnotatorConfig,
) -> Result<EventStream, AnnotatorError> {
    let input_str = input_str.as_ref();
    require_instructions(instructions)?;
    let bytes = input::load_document(input_str, config.api_timeout_secs).await?;
    info!("Starting annotation: {}", input_str);
    annotate_bytes_stream(bytes, instructions, range, config)
}

/// Annotate PDF bytes held in memory.
///
/// Text extraction happens inside the job; a document pdfium cannot open
/// becomes an `error` event rather than an `Err`.
pub fn annotate_bytes_stream(
    bytes: Vec<u8>,
    instructions: &str,
    range: PageRange,
    config: &AnnotatorConfig,
) -> Result<EventStream, AnnotatorError> {
    require_instructions(instructions)?;
    input::ensure_pdf(&bytes)?;
    let client = llm::resolve_client(config)?;
    let job = Job::new(client, instructions, range, config);

    Ok(spawn_job(move |tx| async move {
        let driver = Driver { job, tx };
        match extract::extract_pages(bytes, range).await {
            Ok(pages) => driver.run(&pages).await,
            Err(e) => driver.fail(e).await,
        }
    }))
}

/// Annotate pages from any [`PageSource`] with an explicit client.
///
/// This is the driver without document loading; `config.client` and
/// `config.provider` are ignored in favour of `client`.
pub fn annotate_pages_stream(
    source: Arc<dyn PageSource>,
    client: Arc<dyn CompletionClient>,
    instructions: &str,
    range: PageRange,
    config: &AnnotatorConfig,
) -> Result<EventStream, AnnotatorError> {
    require_instructions(instructions)?;
    let job = Job::new(client, instructions, range, config);
    Ok(spawn_job(move |tx| async move {
        Driver { job, tx }.run(source.as_ref()).await
    }))
}

/// Collect the records of a finished event list, in order.
pub fn collect_annotations<'a>(events: impl IntoIterator<Item = &'a AnnotationEvent>) -> Vec<PageAnnotation> {
    events
        .into_iter()
        .filter_map(AnnotationEvent::page_annotation)
        .collect()
}

fn require_instructions(instructions: &str) -> Result<(), AnnotatorError> {
    if instructions.trim().is_empty() {
        return Err(AnnotatorError::MissingInstructions);
    }
    Ok(())
}

fn spawn_job<F, Fut>(body: F) -> EventStream
where
    F: FnOnce(mpsc::Sender<AnnotationEvent>) -> Fut,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    tokio::spawn(body(tx));
    Box::pin(ReceiverStream::new(rx))
}

// ── Driver ───────────────────────────────────────────────────────────────

/// Everything one job needs, detached from the config.
struct Job {
    client: Arc<dyn CompletionClient>,
    model: String,
    instructions: String,
    range: PageRange,
    max_page_chars: usize,
}

impl Job {
    fn new(
        client: Arc<dyn CompletionClient>,
        instructions: &str,
        range: PageRange,
        config: &AnnotatorConfig,
    ) -> Self {
        Self {
            client,
            model: config.model.clone(),
            instructions: instructions.trim().to_string(),
            range,
            max_page_chars: config.max_page_chars,
        }
    }
}

/// Why the page loop stopped early.
enum Halt {
    /// The receiver was dropped; nobody is listening any more.
    Cancelled,
    Fatal(AnnotatorError),
}

impl From<AnnotatorError> for Halt {
    fn from(e: AnnotatorError) -> Self {
        Halt::Fatal(e)
    }
}

struct Driver {
    job: Job,
    tx: mpsc::Sender<AnnotationEvent>,
}

impl Driver {
    async fn emit(&self, event: AnnotationEvent) -> Result<(), Halt> {
        self.tx.send(event).await.map_err(|_| Halt::Cancelled)
    }

    async fn run(self, source: &dyn PageSource) {
        let start = Instant::now();
        let outcome = self.run_pages(source).await;
        match outcome {
            Ok(count) => {
                info!(
                    "Annotation finished: {} record(s) in {:.1}s",
                    count,
                    start.elapsed().as_secs_f64()
                );
                let _ = self
                    .emit(AnnotationEvent::progress(PROGRESS_ANNOTATED, "Annotations complete…"))
                    .await;
                let _ = self.emit(AnnotationEvent::Done).await;
            }
            Err(Halt::Cancelled) => info!("Annotation cancelled by the consumer"),
            Err(Halt::Fatal(e)) => self.fail(e).await,
        }
    }

    async fn fail(self, e: AnnotatorError) {
        warn!("Annotation stopped: {}", e);
        let _ = self
            .emit(AnnotationEvent::Error {
                message: e.to_string(),
            })
            .await;
        let _ = self
            .emit(AnnotationEvent::progress(PROGRESS_FINISHED, "Stopped"))
            .await;
        let _ = self.emit(AnnotationEvent::Done).await;
    }

    /// Returns the number of records emitted.
    async fn run_pages(&self, source: &dyn PageSource) -> Result<usize, Halt> {
        let total = source.page_count();
        let range = self.job.range;
        let (first, last) = range.clamp(total).ok_or(AnnotatorError::NoPagesInRange {
            from: range.from,
            to: range.to.unwrap_or(total),
            total,
        })?;
        let n = last - first + 1;
        info!(
            "Annotating pages {}-{} of {} with {}",
            first,
            last,
            total,
            self.job.client.describe()
        );

        let mut emitted = 0;
        for (i, page) in (first..=last).enumerate() {
            if self.tx.is_closed() {
                return Err(Halt::Cancelled);
            }
            let pct = (i * PROGRESS_PAGES_MAX as usize / n) as u8;
            self.emit(AnnotationEvent::progress(
                pct,
                format!("Annotating page {page} of {last}…"),
            ))
            .await?;
            self.emit(AnnotationEvent::PageStart { page }).await?;

            let text = source.page_text(page)?;
            for data in self.annotate_page(page, &text).await? {
                self.emit(AnnotationEvent::Annotation { page, data }).await?;
                emitted += 1;
            }
        }
        Ok(emitted)
    }

    async fn annotate_page(&self, page: usize, text: &str) -> Result<Vec<Annotation>, AnnotatorError> {
        let text = text.trim();
        if text.is_empty() {
            debug!("Page {}: no extractable text", page);
            return Ok(vec![Annotation::notice(NOTICE_NO_TEXT)]);
        }

        let body = prompts::truncate_page_text(text, self.job.max_page_chars);
        let prompt = prompts::build_prompt(&body, &self.job.instructions, page);

        let start = Instant::now();
        let raw = self.job.client.complete(&self.job.model, &prompt).await?;
        debug!("Page {}: model answered in {:?}", page, start.elapsed());

        Ok(records_from_response(page, &raw))
    }
}

/// Turn one raw model response into the records to emit for its page.
///
/// Never fails: every degenerate answer maps to a single diagnostic record.
pub fn records_from_response(page: usize, raw: &str) -> Vec<Annotation> {
    if raw.trim().is_empty() {
        warn!("Page {}: model returned no output", page);
        return vec![Annotation::notice(NOTICE_NO_OUTPUT)];
    }
    match repair::repair_json(raw) {
        Ok(values) => {
            let records = validate::sanitize_records(&values);
            debug!("Page {}: {} record(s)", page, records.len());
            if records.is_empty() {
                vec![Annotation::notice(NOTICE_NO_ANNOTATIONS)]
            } else {
                records
            }
        }
        Err(e) => {
            warn!("Page {}: {}", page, e);
            let snippet: String = raw.chars().take(PARSE_FAILURE_RAW_CHARS).collect();
            vec![Annotation::notice(format!("JSON parse failed. Raw: {snippet}"))]
        }
    }
}
