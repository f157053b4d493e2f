//! Generation pipeline tests.
//!
//! These drive the full event stream with in-memory page text and a scripted
//! completion client, so they need neither pdfium nor a model server.

use edgequake_pdf_annotate::stream::{NOTICE_NO_TEXT, PROGRESS_ANNOTATED, PROGRESS_FINISHED};
use edgequake_pdf_annotate::{
    annotate_pages_stream, collect_annotations, AnnotationEvent, AnnotationType, AnnotatorConfig,
    AnnotatorError, CompletionClient, CompletionError, ExtractedPages, PageRange,
};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LLMResponse, LlmError};
use edgequake_pdf_annotate::ProviderClient;
use futures::future::BoxFuture;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Replies with queued responses in order, and remembers every prompt.
#[derive(Default)]
struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    fn new(replies: Vec<Result<String, CompletionError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn prompt(&self, i: usize) -> String {
        self.prompts.lock().unwrap()[i].clone()
    }
}

impl CompletionClient for ScriptedClient {
    fn complete<'a>(
        &'a self,
        _model: &'a str,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<String, CompletionError>> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()));
        Box::pin(async move { reply })
    }
}

/// Route library logs to the test harness; `RUST_LOG=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn pages(texts: &[&str]) -> Arc<ExtractedPages> {
    Arc::new(ExtractedPages::new(texts.iter().map(|s| s.to_string()).collect()))
}

fn config() -> AnnotatorConfig {
    AnnotatorConfig::builder().model("test-model").build().unwrap()
}

async fn run(
    texts: &[&str],
    client: Arc<ScriptedClient>,
    range: PageRange,
) -> Vec<AnnotationEvent> {
    annotate_pages_stream(pages(texts), client, "define archaic words", range, &config())
        .expect("stream should start")
        .collect()
        .await
}

/// Events with progress stripped, for order assertions.
fn without_progress(events: &[AnnotationEvent]) -> Vec<AnnotationEvent> {
    events
        .iter()
        .filter(|e| !matches!(e, AnnotationEvent::Progress { .. }))
        .cloned()
        .collect()
}

const THOU_ART: &str = r#"[{"type":"definition","quote":"Thou art","annotation":"Archaic form of you are.","themes":[]}]"#;

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_page_definition() {
    let client = ScriptedClient::new(vec![Ok(THOU_ART.into())]);
    let events = run(&["Thou art wise."], client.clone(), PageRange::default()).await;

    let core = without_progress(&events);
    assert_eq!(core.len(), 3, "events: {core:?}");
    assert_eq!(core[0], AnnotationEvent::PageStart { page: 1 });
    match &core[1] {
        AnnotationEvent::Annotation { page, data } => {
            assert_eq!(*page, 1);
            assert_eq!(data.kind, AnnotationType::Definition);
            assert_eq!(data.quote, "Thou art");
            assert_eq!(data.annotation, "Archaic form of you are.");
            assert!(data.themes.is_empty());
        }
        other => panic!("expected annotation, got {other:?}"),
    }
    assert_eq!(core[2], AnnotationEvent::Done);

    let prompt = client.prompt(0);
    assert!(prompt.contains("define archaic words"));
    assert!(prompt.contains("PAGE 1 TEXT:\nThou art wise."));
}

#[tokio::test]
async fn prose_with_embedded_fragment() {
    let raw = r#"Here is what I found: {"type":"question","quote":"is this","annotation":"Rhetorical?","themes":[]} Let me know if you need more."#;
    let client = ScriptedClient::new(vec![Ok(raw.into())]);
    let events = run(&["But is this the end?"], client, PageRange::default()).await;

    let records = collect_annotations(&events);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].annotation.kind, AnnotationType::Question);
    assert_eq!(records[0].annotation.quote, "is this");
    assert_eq!(records[0].annotation.annotation, "Rhetorical?");
}

#[tokio::test]
async fn whitespace_page_skips_the_model() {
    let client = ScriptedClient::new(vec![]);
    let events = run(&["  \n\t "], client.clone(), PageRange::default()).await;

    let records = collect_annotations(&events);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].annotation.kind, AnnotationType::Notation);
    assert!(records[0].annotation.quote.is_empty());
    assert_eq!(records[0].annotation.annotation, NOTICE_NO_TEXT);
    assert_eq!(client.calls(), 0);
    assert_eq!(events.last(), Some(&AnnotationEvent::Done));
}

#[tokio::test]
async fn connection_failure_stops_the_job() {
    init_tracing();
    let client = ScriptedClient::new(vec![
        Ok(THOU_ART.into()),
        Err(CompletionError::Connection {
            endpoint: "http://localhost:11434".into(),
            detail: "connection refused".into(),
        }),
        Ok(THOU_ART.into()),
    ]);
    let events = run(&["Thou art wise.", "Page two.", "Page three."], client.clone(), PageRange::default()).await;

    let core = without_progress(&events);
    assert!(matches!(core[0], AnnotationEvent::PageStart { page: 1 }));
    assert!(matches!(core[1], AnnotationEvent::Annotation { page: 1, .. }));
    assert_eq!(core[2], AnnotationEvent::PageStart { page: 2 });
    match &core[3] {
        AnnotationEvent::Error { message } => assert!(message.contains("ollama serve"), "{message}"),
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(core[4], AnnotationEvent::Done);
    assert_eq!(core.len(), 5);

    let errors = events
        .iter()
        .filter(|e| matches!(e, AnnotationEvent::Error { .. }))
        .count();
    assert_eq!(errors, 1);
    assert!(!events
        .iter()
        .any(|e| matches!(e, AnnotationEvent::PageStart { page: 3 })));
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn timeout_is_fatal_and_progress_completes() {
    let client = ScriptedClient::new(vec![Err(CompletionError::Timeout { secs: 180 })]);
    let events = run(&["Some text."], client, PageRange::default()).await;

    let n = events.len();
    assert!(matches!(&events[n - 3], AnnotationEvent::Error { message } if message.contains("180s")));
    assert_eq!(
        events[n - 2],
        AnnotationEvent::Progress {
            pct: PROGRESS_FINISHED,
            label: "Stopped".into()
        }
    );
    assert_eq!(events[n - 1], AnnotationEvent::Done);
}

/// Hosted provider whose every call times out on its side.
struct TimingOutProvider;

#[async_trait::async_trait]
impl LLMProvider for TimingOutProvider {
    fn name(&self) -> &str {
        "slow"
    }

    fn model(&self) -> &str {
        "slow-model"
    }

    fn max_context_length(&self) -> usize {
        4096
    }

    async fn complete(&self, _prompt: &str) -> edgequake_llm::Result<LLMResponse> {
        Err(LlmError::Timeout)
    }

    async fn complete_with_options(
        &self,
        _prompt: &str,
        _options: &CompletionOptions,
    ) -> edgequake_llm::Result<LLMResponse> {
        Err(LlmError::Timeout)
    }

    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _options: Option<&CompletionOptions>,
    ) -> edgequake_llm::Result<LLMResponse> {
        Err(LlmError::Timeout)
    }
}

#[tokio::test]
async fn provider_timeout_surfaces_as_model_timeout() {
    let config = AnnotatorConfig::builder().api_timeout_secs(42).build().unwrap();
    let client = Arc::new(ProviderClient::new(Arc::new(TimingOutProvider), "slow", &config));
    let events: Vec<_> = annotate_pages_stream(
        pages(&["Some text.", "More text."]),
        client,
        "annotate",
        PageRange::default(),
        &config,
    )
    .unwrap()
    .collect()
    .await;

    let errors: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            AnnotationEvent::Error { message } => Some(message.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Model timed out after 42s"), "{}", errors[0]);
    assert!(!events
        .iter()
        .any(|e| matches!(e, AnnotationEvent::PageStart { page: 2 })));
}

// ── Per-page degradation ─────────────────────────────────────────────────────

#[tokio::test]
async fn repair_failure_is_a_diagnostic_not_an_error() {
    init_tracing();
    let client = ScriptedClient::new(vec![
        Ok("I'm sorry, I can't annotate this page.".into()),
        Ok(THOU_ART.into()),
    ]);
    let events = run(&["One.", "Thou art wise."], client, PageRange::default()).await;

    assert!(!events.iter().any(|e| matches!(e, AnnotationEvent::Error { .. })));
    let records = collect_annotations(&events);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].page, 1);
    assert!(records[0]
        .annotation
        .annotation
        .starts_with("JSON parse failed. Raw: I'm sorry"));
    assert_eq!(records[1].page, 2);
    assert_eq!(records[1].annotation.kind, AnnotationType::Definition);
}

#[tokio::test]
async fn empty_model_output_is_a_notice() {
    let client = ScriptedClient::new(vec![Ok("   ".into())]);
    let events = run(&["Text."], client, PageRange::default()).await;
    let records = collect_annotations(&events);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].annotation.annotation, "Model returned no output.");
}

#[tokio::test]
async fn unknown_types_and_bad_fields_are_normalised() {
    let raw = r#"```json
[{"type":"Metaphor","quote":"a\nb","annotation":"x","themes":"love"}, 42]
```"#;
    let client = ScriptedClient::new(vec![Ok(raw.into())]);
    let events = run(&["Text."], client, PageRange::default()).await;
    let records = collect_annotations(&events);
    assert_eq!(records.len(), 1);
    let a = &records[0].annotation;
    assert_eq!(a.kind, AnnotationType::Notation);
    assert_eq!(a.quote, "a b");
    assert!(a.themes.is_empty());
}

#[tokio::test]
async fn long_page_text_is_truncated_in_the_prompt() {
    let client = ScriptedClient::new(vec![Ok(THOU_ART.into())]);
    let long = "word ".repeat(2000);
    let config = AnnotatorConfig::builder().max_page_chars(100).build().unwrap();
    let _: Vec<_> = annotate_pages_stream(
        pages(&[&long]),
        client.clone(),
        "summarise",
        PageRange::default(),
        &config,
    )
    .unwrap()
    .collect()
    .await;

    let prompt = client.prompt(0);
    assert!(prompt.contains("\n[truncated]"));
    assert!(
        !prompt.contains(&"word ".repeat(30)),
        "prompt should not carry the full page"
    );
}

// ── Page range and progress ──────────────────────────────────────────────────

#[tokio::test]
async fn range_is_clamped_to_the_document() {
    let client = ScriptedClient::new(vec![Ok(THOU_ART.into()), Ok(THOU_ART.into())]);
    let events = run(&["a", "b", "c"], client.clone(), PageRange::new(2, Some(10))).await;

    let started: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            AnnotationEvent::PageStart { page } => Some(*page),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![2, 3]);
    assert!(events.iter().any(|e| matches!(
        e,
        AnnotationEvent::Progress { label, .. } if label == "Annotating page 2 of 3…"
    )));
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn empty_range_is_a_single_error() {
    let client = ScriptedClient::new(vec![]);
    let events = run(&["a", "b", "c"], client.clone(), PageRange::new(5, None)).await;

    match &events[0] {
        AnnotationEvent::Error { message } => {
            assert!(message.starts_with("No pages found in that range"), "{message}")
        }
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(events.last(), Some(&AnnotationEvent::Done));
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_93() {
    let client = ScriptedClient::new(vec![Ok(THOU_ART.into()); 4]);
    let events = run(&["a", "b", "c", "d"], client, PageRange::default()).await;

    let pcts: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            AnnotationEvent::Progress { pct, .. } => Some(*pct),
            _ => None,
        })
        .collect();
    assert_eq!(pcts, vec![0, 23, 46, 69, PROGRESS_ANNOTATED]);
    assert!(pcts.windows(2).all(|w| w[0] <= w[1]));

    let last_progress = events
        .iter()
        .rev()
        .find(|e| matches!(e, AnnotationEvent::Progress { .. }))
        .unwrap();
    assert!(matches!(
        last_progress,
        AnnotationEvent::Progress { label, .. } if label == "Annotations complete…"
    ));
}

#[tokio::test]
async fn events_serialise_as_tagged_json() {
    let client = ScriptedClient::new(vec![Ok(THOU_ART.into())]);
    let events = run(&["Thou art wise."], client, PageRange::default()).await;
    let lines: Vec<String> = events
        .iter()
        .map(|e| serde_json::to_string(e).unwrap())
        .collect();
    assert!(lines[0].starts_with(r#"{"type":"progress","pct":0"#));
    assert_eq!(lines.last().unwrap(), r#"{"type":"done"}"#);
    assert!(lines
        .iter()
        .any(|l| l.contains(r#""type":"annotation","page":1,"data":{"type":"definition""#)));
}

// ── Caller input ─────────────────────────────────────────────────────────────

#[test]
fn blank_instructions_are_rejected_before_the_job() {
    let client = ScriptedClient::new(vec![]);
    let result = annotate_pages_stream(pages(&["a"]), client, "   ", PageRange::default(), &config());
    assert!(matches!(result, Err(AnnotatorError::MissingInstructions)));
}

// ── Cancellation ─────────────────────────────────────────────────────────────

/// Each completion waits for a permit, so the test controls the pace.
struct GatedClient {
    gate: Semaphore,
    calls: AtomicUsize,
}

impl CompletionClient for GatedClient {
    fn complete<'a>(
        &'a self,
        _model: &'a str,
        _prompt: &'a str,
    ) -> BoxFuture<'a, Result<String, CompletionError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            self.gate
                .acquire()
                .await
                .map_err(|e| CompletionError::Other(e.to_string()))?
                .forget();
            Ok(THOU_ART.to_string())
        })
    }
}

#[tokio::test]
async fn dropping_the_stream_stops_further_pages() {
    let client = Arc::new(GatedClient {
        gate: Semaphore::new(1),
        calls: AtomicUsize::new(0),
    });
    let texts: Vec<&str> = vec!["page"; 6];
    let mut stream = annotate_pages_stream(
        pages(&texts),
        client.clone(),
        "annotate",
        PageRange::default(),
        &config(),
    )
    .unwrap();

    loop {
        match stream.next().await {
            Some(AnnotationEvent::Annotation { page: 1, .. }) => break,
            Some(_) => continue,
            None => panic!("stream ended early"),
        }
    }
    drop(stream);

    client.gate.add_permits(10);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(
        client.calls.load(Ordering::SeqCst) <= 2,
        "driver kept calling the model after the consumer left"
    );
}
