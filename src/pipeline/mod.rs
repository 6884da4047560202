//! Pipeline stages for markdown-to-slides splitting.
//!
//! Each submodule implements exactly one transformation step. Only
//! [`adapter`] knows which provider is on the other end; the other stages
//! see plain strings.
//!
//! ## Data Flow
//!
//! ```text
//! chunk ──▶ adapter ──▶ llm ──▶ adapter ──▶ parse ──▶ reconcile
//! (split)   (payload)   (HTTP)  (reply text) (JSON)    (exact count)
//! ```
//!
//! 1. [`chunk`]     — cut the document at headings, list items and
//!    paragraph breaks into size-bounded chunks with trailing overlap
//! 2. [`adapter`]   — build the provider payload for one chunk, and later
//!    pull the generated text out of the reply
//! 3. [`llm`]       — POST the payload; the only stage with network I/O
//! 4. [`parse`]     — strip fences and escapes, decode the section list
//! 5. [`reconcile`] — runs once over all chunks' sections: append missed
//!    text, merge or pad to the requested count

pub mod adapter;
pub mod chunk;
pub mod llm;
pub mod parse;
pub mod reconcile;
