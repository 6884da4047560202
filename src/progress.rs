//! Progress-callback trait for per-chunk split events.
//!
//! Inject an [`Arc<dyn SplitProgressCallback>`] via
//! [`crate::config::SplitConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through each chunk.
//!
//! # Example
//!
//! ```rust
//! use md2slides::{SplitConfig, SplitProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     sections: AtomicUsize,
//! }
//!
//! impl SplitProgressCallback for CountingCallback {
//!     fn on_chunk_complete(&self, chunk: usize, total_chunks: usize, sections: usize) {
//!         self.sections.fetch_add(sections, Ordering::SeqCst);
//!         eprintln!("chunk {}/{}: {} sections", chunk, total_chunks, sections);
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { sections: AtomicUsize::new(0) });
//!
//! let config = SplitConfig::builder()
//!     .progress_callback(cb as Arc<dyn SplitProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each chunk.
///
/// Chunks are processed one at a time, in source order, so events for one
/// request never interleave. Implementations must still be `Send + Sync`
/// because the config can be shared across concurrent requests. All methods
/// default to no-ops.
pub trait SplitProgressCallback: Send + Sync {
    /// Called once after chunking, before the first model call.
    fn on_split_start(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// Called just before the model request for a chunk is sent.
    ///
    /// `chunk` is 1-indexed.
    fn on_chunk_start(&self, chunk: usize, total_chunks: usize) {
        let _ = (chunk, total_chunks);
    }

    /// Called when a chunk's response parsed into `sections` sections.
    fn on_chunk_complete(&self, chunk: usize, total_chunks: usize, sections: usize) {
        let _ = (chunk, total_chunks, sections);
    }

    /// Called when a chunk fails. The whole split aborts right after.
    fn on_chunk_error(&self, chunk: usize, total_chunks: usize, error: &str) {
        let _ = (chunk, total_chunks, error);
    }

    /// Called once after reconciliation with the final slide count.
    fn on_split_complete(&self, slides: usize) {
        let _ = slides;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SplitProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::SplitConfig`].
pub type ProgressCallback = Arc<dyn SplitProgressCallback>;
