//! # md2slides
//!
//! Split a markdown document into a fixed number of presentation slides
//! using a large language model.
//!
//! ## Why an LLM?
//!
//! Cutting a document into *N* slides by character count breaks sentences,
//! separates headings from their paragraphs and ignores how the content is
//! organised. A model can pick natural break points. Models also miscount,
//! skip text and wrap their answers in stray formatting, so the crate does
//! the bookkeeping around the model: it chunks long documents, cleans the
//! replies, puts back any text the model dropped, and forces the result to
//! exactly the requested number of slides.
//!
//! ## Pipeline Overview
//!
//! ```text
//! markdown + slideCount
//!  │
//!  ├─ 1. Validate   non-empty document, 1 ≤ slideCount ≤ 50, known model
//!  ├─ 2. Chunk      structural boundaries, ≤ 3000 chars, 700 chars overlap
//!  ├─ 3. Prompt     per-provider payload (chat / prompt / content parts)
//!  ├─ 4. Invoke     one HTTP call per chunk, sequential, in order
//!  ├─ 5. Parse      strip fences and escapes → ordered sections
//!  └─ 6. Reconcile  append missed text, merge or pad → exactly N slides
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2slides::{split, SlideRequest, SplitConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // gpt-4o-mini by default; reads OPENAI_API_KEY
//!     let config = SplitConfig::default();
//!     let request = SlideRequest::new(std::fs::read_to_string("talk.md")?, 8);
//!     let set = split(&request, &config).await?;
//!     for (i, slide) in set.slides.iter().enumerate() {
//!         println!("--- slide {} ---\n{}", i + 1, slide);
//!     }
//!     eprintln!("{} chunks, {}ms", set.stats.chunks, set.stats.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2slides` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ```toml
//! md2slides = { version = "0.1", default-features = false }
//! ```
//!
//! ## Models
//!
//! | Model id | Shape | Credential |
//! |----------|-------|------------|
//! | `gpt-4o-mini` (default), `gpt-4o`, `gpt-4.1-mini`, `gpt-4.1-nano` | chat messages | `OPENAI_API_KEY` |
//! | `gemini-2.0-flash`, `gemini-2.5-flash` | content parts | `GEMINI_API_KEY` |
//! | `llama3.2` | single prompt (Ollama) | none |
//!
//! Any OpenAI-compatible, Ollama-style or Gemini-style endpoint can be added
//! with [`ModelRegistry::register`] or a JSON file
//! ([`ModelRegistry::from_json_file`]).

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod request;
pub mod split;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    CredentialRef, ModelEntry, ModelRegistry, ResolvedModel, SplitConfig, SplitConfigBuilder,
    DEFAULT_MODEL,
};
pub use error::{ErrorKind, SlidesError};
pub use output::{SlideSet, SplitStats};
pub use pipeline::adapter::ModelAdapter;
pub use pipeline::llm::{HttpLlmClient, LlmClient};
pub use progress::{NoopProgressCallback, ProgressCallback, SplitProgressCallback};
pub use request::{SlideRequest, SlideResponse, MAX_SLIDES, MIN_SLIDES};
pub use split::{split, split_sync, split_to_file, split_with_client};
