//! Split entry points: markdown document in, exactly N slides out.
//!
//! A split validates the request, chunks the document, asks the model for
//! `max(1, slideCount / chunks)` sections per chunk, one chunk at a time and
//! in source order, then reconciles the combined section list once.
//!
//! All or nothing: the first chunk that fails aborts the split and its error
//! is returned as is. Dropping the returned future abandons the in-flight
//! provider call and discards every section collected so far.

use crate::config::{ResolvedModel, SplitConfig};
use crate::error::SlidesError;
use crate::output::{SlideSet, SplitStats};
use crate::pipeline::adapter::ProviderRequest;
use crate::pipeline::chunk::{self, Chunk};
use crate::pipeline::llm::{HttpLlmClient, LlmClient};
use crate::pipeline::{parse, reconcile};
use crate::request::SlideRequest;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Split a document into slides using the HTTP provider named by the request.
///
/// # Errors
/// - [`SlidesError::InvalidInput`] for a blank document or a slide count
///   outside `1..=50`
/// - a configuration error for an unknown model or a missing credential
/// - [`SlidesError::Transport`], [`SlidesError::Timeout`] or
///   [`SlidesError::Provider`] when a model call fails
/// - [`SlidesError::MalformedResponse`] when a reply cannot be parsed
///
/// ```rust,no_run
/// use md2slides::{split, SlideRequest, SplitConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let request = SlideRequest::new("# Title\n\nIntro.\n\n## Details\n\n- a\n- b", 3);
/// let set = split(&request, &SplitConfig::default()).await?;
/// assert_eq!(set.slides.len(), 3);
/// # Ok(())
/// # }
/// ```
pub async fn split(request: &SlideRequest, config: &SplitConfig) -> Result<SlideSet, SlidesError> {
    let client = HttpLlmClient::new(config.api_timeout_secs)?;
    split_with_client(request, config, &client).await
}

/// [`split`] with a caller-supplied [`LlmClient`].
pub async fn split_with_client(
    request: &SlideRequest,
    config: &SplitConfig,
    client: &dyn LlmClient,
) -> Result<SlideSet, SlidesError> {
    let total_start = Instant::now();

    // ── Step 1: Validate before anything else ────────────────────────────
    let validated = request.validate(config)?;
    let target = validated.slide_count;
    let model = validated.model;
    info!(
        "Splitting {} chars into {} slides with {}",
        validated.document.chars().count(),
        target,
        model.id
    );

    // ── Step 2: Chunk ────────────────────────────────────────────────────
    let chunks = chunk::chunk_document(
        validated.document,
        config.max_chunk_chars,
        config.overlap_chars,
    );
    if chunks.is_empty() {
        return Err(SlidesError::invalid_input("document is empty"));
    }
    let total_chunks = chunks.len();
    let per_chunk = (target / total_chunks).max(1);
    debug!(
        "{} chunks, {} sections requested per chunk",
        total_chunks, per_chunk
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_split_start(total_chunks);
    }

    // ── Step 3: One model call per chunk, in order ───────────────────────
    let mut sections: Vec<String> = Vec::new();
    let mut retries = 0u32;
    let mut llm_duration = Duration::ZERO;

    for (idx, chunk) in chunks.iter().enumerate() {
        let chunk_num = idx + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_chunk_start(chunk_num, total_chunks);
        }

        match process_chunk(client, chunk, chunk_num, per_chunk, &model, config).await {
            Ok(outcome) => {
                info!(
                    "Chunk {}/{}: {} sections",
                    chunk_num,
                    total_chunks,
                    outcome.sections.len()
                );
                if let Some(ref cb) = config.progress_callback {
                    cb.on_chunk_complete(chunk_num, total_chunks, outcome.sections.len());
                }
                retries += outcome.retries;
                llm_duration += outcome.llm_duration;
                sections.extend(outcome.sections);
            }
            Err(e) => {
                warn!("Chunk {}/{} failed: {}", chunk_num, total_chunks, e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_chunk_error(chunk_num, total_chunks, &e.to_string());
                }
                return Err(e);
            }
        }
    }

    // ── Step 4: Reconcile once over everything ───────────────────────────
    let sections_returned = sections.len();
    let (slides, report) = reconcile::reconcile_with_report(sections, target, validated.document);

    let stats = SplitStats {
        model: model.id.clone(),
        chunks: total_chunks,
        sections_per_chunk: per_chunk,
        sections_returned,
        blank_sections_dropped: report.blank_dropped,
        remainder_appended: report.remainder_appended,
        merge_factor: report.merge_factor,
        padded_slides: report.padded,
        retries,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        llm_duration_ms: llm_duration.as_millis() as u64,
    };

    info!(
        "Split complete: {} sections from {} chunks into {} slides, {}ms total",
        sections_returned,
        total_chunks,
        slides.len(),
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_split_complete(slides.len());
    }

    Ok(SlideSet { slides, stats })
}

/// Synchronous wrapper around [`split`].
///
/// Creates a temporary tokio runtime internally.
pub fn split_sync(request: &SlideRequest, config: &SplitConfig) -> Result<SlideSet, SlidesError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SlidesError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(split(request, config))
}

/// Split and write the boundary response JSON to `output_path`.
///
/// The file is written to a temporary sibling first and renamed into place,
/// so readers never see a partial file.
pub async fn split_to_file(
    request: &SlideRequest,
    output_path: impl AsRef<Path>,
    config: &SplitConfig,
) -> Result<SlideSet, SlidesError> {
    let set = split(request, config).await?;
    write_response(output_path.as_ref(), &set)?;
    Ok(set)
}

// ── Internal helpers ─────────────────────────────────────────────────────

struct ChunkOutcome {
    sections: Vec<String>,
    retries: u32,
    llm_duration: Duration,
}

async fn process_chunk(
    client: &dyn LlmClient,
    chunk: &Chunk,
    chunk_num: usize,
    sections: usize,
    model: &ResolvedModel,
    config: &SplitConfig,
) -> Result<ChunkOutcome, SlidesError> {
    let request = model
        .adapter
        .build_request(chunk, sections, model, config);
    debug!(
        "Chunk {}: {} chars ({} overlap), asking for {} sections",
        chunk_num,
        chunk.char_len(),
        chunk.overlap().chars().count(),
        sections
    );

    let llm_start = Instant::now();
    let (body, retries) = invoke_with_retry(client, &request, chunk_num, config).await?;
    let llm_duration = llm_start.elapsed();

    let text = model.adapter.extract_text(&body)?;
    debug!("Chunk {}: model text {} chars", chunk_num, text.len());

    Ok(ChunkOutcome {
        sections: parse::parse(&text)?,
        retries,
        llm_duration,
    })
}

/// Call the provider, retrying transient failures when `max_retries > 0`.
///
/// Backoff doubles from `retry_backoff_ms`: with 500 ms and 3 retries the
/// waits are 500 ms, 1 s, 2 s.
async fn invoke_with_retry(
    client: &dyn LlmClient,
    request: &ProviderRequest,
    chunk_num: usize,
    config: &SplitConfig,
) -> Result<(String, u32), SlidesError> {
    let mut attempt = 0u32;
    loop {
        match client.invoke(request).await {
            Ok(body) => return Ok((body, attempt)),
            Err(e) if attempt < config.max_retries && e.is_retryable() => {
                attempt += 1;
                let backoff = config
                    .retry_backoff_ms
                    .saturating_mul(2u64.saturating_pow(attempt - 1));
                warn!(
                    "Chunk {}: retry {}/{} after {}ms ({})",
                    chunk_num, attempt, config.max_retries, backoff, e
                );
                sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn write_response(path: &Path, set: &SlideSet) -> Result<(), SlidesError> {
    let write_err = |source: std::io::Error| SlidesError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let json = serde_json::to_vec_pretty(&set.clone().into_response())
        .map_err(|e| SlidesError::Internal(format!("Failed to serialise slides: {e}")))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    tmp.write_all(&json).map_err(write_err)?;
    tmp.write_all(b"\n").map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CredentialRef, ModelEntry, ModelRegistry};
    use crate::pipeline::adapter::ModelAdapter;
    use crate::progress::SplitProgressCallback;
    use crate::request::SlideResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const SCENARIO: &str = "# Title\n\nPara one.\n\n## Sub\n\n- item a\n- item b";

    /// Replays canned results and records every request it saw.
    struct ScriptedClient {
        replies: Mutex<VecDeque<Result<String, SlidesError>>>,
        seen: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<String, SlidesError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn invoke(&self, request: &ProviderRequest) -> Result<String, SlidesError> {
            self.seen.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SlidesError::Internal("no scripted reply".into())))
        }
    }

    /// An OpenAI-style reply body carrying `slides`.
    fn chat_reply(slides: &[&str]) -> Result<String, SlidesError> {
        let content = json!({ "slides": slides }).to_string();
        Ok(json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
            .to_string())
    }

    fn provider_error(status: u16) -> Result<String, SlidesError> {
        Err(SlidesError::Provider {
            model: "fake".into(),
            status,
            body: "boom".into(),
        })
    }

    fn builder() -> crate::config::SplitConfigBuilder {
        let mut models = ModelRegistry::new();
        models.register(
            "fake",
            ModelEntry::new(
                "http://fake.invalid/v1/chat/completions",
                CredentialRef::Value("sk-test".into()),
                ModelAdapter::ChatMessages,
            ),
        );
        SplitConfig::builder()
            .models(models)
            .default_model("fake")
            .retry_backoff_ms(1)
    }

    #[derive(Default)]
    struct Events {
        started: AtomicUsize,
        completed: AtomicUsize,
        errors: AtomicUsize,
        slides: AtomicUsize,
    }

    impl SplitProgressCallback for Events {
        fn on_chunk_start(&self, _chunk: usize, _total: usize) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn on_chunk_complete(&self, _chunk: usize, _total: usize, _sections: usize) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_chunk_error(&self, _chunk: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        fn on_split_complete(&self, slides: usize) {
            self.slides.store(slides, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn single_chunk_exact_count() {
        let client = ScriptedClient::new(vec![chat_reply(&[
            "# Title",
            "Para one.",
            "## Sub\n- item a\n- item b",
        ])]);
        let config = builder().build().unwrap();

        let set = split_with_client(&SlideRequest::new(SCENARIO, 3), &config, &client)
            .await
            .unwrap();

        assert_eq!(set.slides, vec!["# Title", "Para one.", "## Sub\n- item a\n- item b"]);
        assert_eq!(set.stats.chunks, 1);
        assert_eq!(set.stats.sections_per_chunk, 3);
        assert!(!set.stats.remainder_appended);
        assert_eq!(client.calls(), 1);

        let seen = client.seen.lock().unwrap();
        let prompt = seen[0].body["messages"][1]["content"].as_str().unwrap();
        assert!(prompt.contains("exactly 3 sections"));
        assert!(prompt.contains("- item b"));
    }

    #[tokio::test]
    async fn short_reply_gets_remainder_and_padding() {
        let client = ScriptedClient::new(vec![chat_reply(&["# Title", "Para one."])]);
        let config = builder().build().unwrap();

        let set = split_with_client(&SlideRequest::new(SCENARIO, 5), &config, &client)
            .await
            .unwrap();

        assert_eq!(set.slides.len(), 5);
        assert_eq!(set.slides[2], "## Sub\n\n- item a\n- item b");
        assert_eq!(&set.slides[3..], ["", ""]);
        assert!(set.stats.remainder_appended);
        assert_eq!(set.stats.padded_slides, 2);
    }

    #[tokio::test]
    async fn sections_split_evenly_across_chunks() {
        let doc: String = (0..6)
            .map(|i| format!("## Part {i}\n\nBody of part {i}.\n\n"))
            .collect();
        let config = builder()
            .max_chunk_chars(60)
            .overlap_chars(10)
            .build()
            .unwrap();
        let chunks = chunk::chunk_document(&doc, 60, 10);
        let replies = chunks
            .iter()
            .map(|c| chat_reply(&[c.body().trim()]))
            .collect();
        let client = ScriptedClient::new(replies);

        let set = split_with_client(&SlideRequest::new(doc.clone(), 7), &config, &client)
            .await
            .unwrap();

        assert_eq!(client.calls(), chunks.len());
        assert_eq!(set.stats.sections_per_chunk, (7 / chunks.len()).max(1));
        assert_eq!(set.slides.len(), 7);
        assert!(!set.stats.remainder_appended);
    }

    #[tokio::test]
    async fn later_chunks_send_overlap_as_context_only() {
        let doc: String = (0..6)
            .map(|i| format!("## Part {i}\n\nBody of part {i}.\n\n"))
            .collect();
        let config = builder()
            .max_chunk_chars(60)
            .overlap_chars(10)
            .build()
            .unwrap();
        let chunks = chunk::chunk_document(&doc, 60, 10);
        let client = ScriptedClient::new(
            chunks.iter().map(|c| chat_reply(&[c.body().trim()])).collect(),
        );

        split_with_client(&SlideRequest::new(doc.clone(), 6), &config, &client)
            .await
            .unwrap();

        let seen = client.seen.lock().unwrap();
        let first = seen[0].body["messages"][1]["content"].as_str().unwrap();
        assert!(!first.contains("<<<CONTEXT"));
        for (req, chunk) in seen.iter().zip(&chunks).skip(1) {
            let user = req.body["messages"][1]["content"].as_str().unwrap();
            let context = format!("<<<CONTEXT\n{}\nCONTEXT>>>", chunk.prompt_context());
            let text = format!("<<<DOCUMENT\n{}\nDOCUMENT>>>", chunk.prompt_text());
            assert!(!chunk.prompt_context().is_empty());
            assert!(user.contains(&context), "{user}");
            assert!(user.contains(&text), "{user}");
        }
    }

    #[tokio::test]
    async fn provider_error_aborts_without_partial_result() {
        let doc: String = (0..6)
            .map(|i| format!("## Part {i}\n\nBody of part {i}.\n\n"))
            .collect();
        let events = Arc::new(Events::default());
        let config = builder()
            .max_chunk_chars(60)
            .overlap_chars(10)
            .progress_callback(events.clone())
            .build()
            .unwrap();
        let client = ScriptedClient::new(vec![chat_reply(&["ok"]), provider_error(500)]);

        let err = split_with_client(&SlideRequest::new(doc, 4), &config, &client)
            .await
            .unwrap_err();

        assert!(matches!(err, SlidesError::Provider { status: 500, .. }));
        assert_eq!(client.calls(), 2, "no call after the failing chunk");
        assert_eq!(events.completed.load(Ordering::SeqCst), 1);
        assert_eq!(events.errors.load(Ordering::SeqCst), 1);
        assert_eq!(events.slides.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_request_makes_no_calls() {
        let client = ScriptedClient::new(vec![]);
        let config = builder().build().unwrap();

        let err = split_with_client(&SlideRequest::new(SCENARIO, 0), &config, &client)
            .await
            .unwrap_err();
        assert!(matches!(err, SlidesError::InvalidInput { .. }));

        let err = split_with_client(
            &SlideRequest::new(SCENARIO, 3).with_model("nope"),
            &config,
            &client,
        )
        .await
        .unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn no_retry_by_default() {
        let client = ScriptedClient::new(vec![provider_error(503), chat_reply(&["x"])]);
        let config = builder().build().unwrap();

        let err = split_with_client(&SlideRequest::new("x", 1), &config, &client)
            .await
            .unwrap_err();
        assert!(matches!(err, SlidesError::Provider { status: 503, .. }));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors_when_enabled() {
        let client = ScriptedClient::new(vec![
            provider_error(429),
            Err(SlidesError::Transport {
                endpoint: "http://fake.invalid".into(),
                detail: "reset".into(),
            }),
            chat_reply(&["x"]),
        ]);
        let config = builder().max_retries(2).build().unwrap();

        let set = split_with_client(&SlideRequest::new("x", 1), &config, &client)
            .await
            .unwrap();
        assert_eq!(set.slides, vec!["x"]);
        assert_eq!(set.stats.retries, 2);
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn client_errors_and_parse_errors_are_not_retried() {
        let client = ScriptedClient::new(vec![provider_error(401)]);
        let config = builder().max_retries(3).build().unwrap();
        let err = split_with_client(&SlideRequest::new("x", 1), &config, &client)
            .await
            .unwrap_err();
        assert!(matches!(err, SlidesError::Provider { status: 401, .. }));
        assert_eq!(client.calls(), 1);

        let client = ScriptedClient::new(vec![Ok(
            json!({"choices": [{"message": {"content": "no json here"}}]}).to_string(),
        )]);
        let err = split_with_client(&SlideRequest::new("x", 1), &config, &client)
            .await
            .unwrap_err();
        assert!(matches!(err, SlidesError::MalformedResponse { .. }));
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn split_with_client_blocks_on_runtime() {
        let client = ScriptedClient::new(vec![chat_reply(&["a", "b"])]);
        let config = builder().build().unwrap();
        let set = tokio_test::block_on(split_with_client(
            &SlideRequest::new("a\n\nb", 2),
            &config,
            &client,
        ))
        .unwrap();
        assert_eq!(set.slides, vec!["a", "b"]);
    }

    #[test]
    fn write_response_is_boundary_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("slides.json");
        let set = SlideSet {
            slides: vec!["# A".into(), String::new()],
            stats: SplitStats::default(),
        };

        write_response(&path, &set).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let resp: SlideResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(resp.slides, set.slides);
        // Only the target file is left behind.
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}
