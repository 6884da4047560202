//! Structural chunking: cut a markdown document into model-sized pieces.
//!
//! The document is first cut into *segments* at markdown structure:
//! immediately before heading lines, before list items, and before the first
//! line of a paragraph that follows a blank line. Fenced code blocks are
//! never cut. Segments are then packed greedily into chunks of at most
//! `max_chunk_chars` characters.
//!
//! When a chunk closes, its last `overlap_chars` characters are copied to the
//! front of the next chunk so the model sees where the previous piece ended.
//! That prefix is context only: it is tracked separately
//! ([`Chunk::overlap`]), sent to the model in its own block marked as already
//! covered ([`Chunk::prompt_context`]), and the bodies ([`Chunk::body`]) of
//! all chunks concatenate back to the exact source document.
//!
//! A single segment longer than `max_chunk_chars` is sent whole; that is the
//! only case where a chunk exceeds the bound.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}(?:[ \t]|\r?\n|$)").unwrap());

static RE_LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*(?:[-*+]|\d{1,9}[.)])[ \t]").unwrap());

static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[ ]{0,3}(?:```|~~~)").unwrap());

/// One model-sized piece of the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    text: String,
    overlap_len: usize,
}

impl Chunk {
    /// Full chunk text: overlap prefix followed by the body.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Context carried over from the previous chunk. Empty for the first chunk.
    pub fn overlap(&self) -> &str {
        &self.text[..self.overlap_len]
    }

    /// The part of the source document this chunk is responsible for.
    pub fn body(&self) -> &str {
        &self.text[self.overlap_len..]
    }

    /// Text the model divides: the body with outer whitespace trimmed.
    pub fn prompt_text(&self) -> &str {
        self.body().trim()
    }

    /// Overlap shown to the model as context only, trimmed.
    pub fn prompt_context(&self) -> &str {
        self.overlap().trim()
    }

    /// Length in characters, overlap included.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Cut `document` into structural segments.
///
/// Every segment is a contiguous slice and the slices concatenate back to the
/// input. Blank lines stay at the end of the segment they follow.
pub fn segments(document: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut offset = 0usize;
    let mut in_fence = false;
    let mut prev_blank = false;

    for line in document.split_inclusive('\n') {
        let is_blank = line.trim().is_empty();
        let is_fence = RE_FENCE.is_match(line);

        let boundary = offset > 0
            && !in_fence
            && (RE_HEADING.is_match(line)
                || RE_LIST_ITEM.is_match(line)
                || (prev_blank && !is_blank));

        if boundary && offset > start {
            out.push(&document[start..offset]);
            start = offset;
        }

        if is_fence {
            in_fence = !in_fence;
        }
        prev_blank = is_blank;
        offset += line.len();
    }

    if start < document.len() {
        out.push(&document[start..]);
    }
    out
}

/// Split `document` into ordered chunks of at most `max_chunk_chars`
/// characters, each carrying up to `overlap_chars` characters of the previous
/// chunk as leading context.
///
/// An empty or whitespace-only document yields no chunks.
pub fn chunk_document(document: &str, max_chunk_chars: usize, overlap_chars: usize) -> Vec<Chunk> {
    if document.trim().is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut text = String::new();
    let mut text_chars = 0usize;
    let mut overlap_len = 0usize;
    let mut body_empty = true;

    for segment in segments(document) {
        let segment_chars = segment.chars().count();

        if !body_empty && text_chars + segment_chars > max_chunk_chars {
            let closed = std::mem::take(&mut text);
            // Shrink the carry so overlap + segment still fits when it can.
            let carry_chars = overlap_chars.min(max_chunk_chars.saturating_sub(segment_chars));
            let carry = tail_chars(&closed, carry_chars).to_string();

            chunks.push(Chunk {
                text: closed,
                overlap_len,
            });

            text_chars = carry.chars().count();
            overlap_len = carry.len();
            text = carry;
        }

        text.push_str(segment);
        text_chars += segment_chars;
        body_empty = false;
    }

    if !body_empty {
        chunks.push(Chunk { text, overlap_len });
    }

    debug!(
        "Chunked {} chars into {} chunks (max {}, overlap {})",
        document.chars().count(),
        chunks.len(),
        max_chunk_chars,
        overlap_chars
    );
    chunks
}

/// The last `n` characters of `s`.
fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = "# Title\n\nPara one.\n\n## Sub\n\n- item a\n- item b";

    fn long_doc() -> String {
        (0..10)
            .map(|i| format!("## Section {i}\n\nBody text number {i} goes here.\n\n"))
            .collect()
    }

    #[test]
    fn segments_split_before_structure() {
        assert_eq!(
            segments(SCENARIO),
            vec!["# Title\n\n", "Para one.\n\n", "## Sub\n\n", "- item a\n", "- item b"]
        );
    }

    #[test]
    fn segments_reassemble_exactly() {
        let doc = long_doc();
        assert_eq!(segments(&doc).concat(), doc);
    }

    #[test]
    fn numbered_items_are_boundaries() {
        let doc = "Steps:\n1. one\n2) two\n   still two\n";
        assert_eq!(segments(doc), vec!["Steps:\n", "1. one\n", "2) two\n   still two\n"]);
    }

    #[test]
    fn fenced_code_is_never_cut() {
        let doc = "Intro\n\n```sh\n# not a heading\n- not a list\n\nstill code\n```\nafter\n";
        let segs = segments(doc);
        assert_eq!(segs.len(), 2, "got {segs:?}");
        assert!(segs[1].starts_with("```sh"));
        assert!(segs[1].ends_with("after\n"));
    }

    #[test]
    fn hashtag_without_space_is_not_a_heading() {
        assert_eq!(segments("intro\n#hashtag\n").len(), 1);
    }

    #[test]
    fn small_document_is_one_chunk() {
        let chunks = chunk_document(SCENARIO, 3000, 700);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text(), SCENARIO);
        assert!(chunks[0].overlap().is_empty());
    }

    #[test]
    fn empty_document_yields_nothing() {
        assert!(chunk_document("", 100, 10).is_empty());
        assert!(chunk_document(" \n\n\t", 100, 10).is_empty());
    }

    #[test]
    fn chunks_respect_bound_and_reassemble() {
        let doc = long_doc();
        let chunks = chunk_document(&doc, 60, 10);
        assert!(chunks.len() > 1);

        let bodies: String = chunks.iter().map(Chunk::body).collect();
        assert_eq!(bodies, doc);

        for c in &chunks {
            assert!(c.char_len() <= 60, "chunk too long: {:?}", c.text());
        }
    }

    #[test]
    fn overlap_is_tail_of_previous_chunk() {
        let doc = long_doc();
        let chunks = chunk_document(&doc, 60, 10);
        for pair in chunks.windows(2) {
            let overlap = pair[1].overlap();
            assert!(overlap.chars().count() <= 10);
            assert!(!overlap.is_empty());
            assert!(pair[0].text().ends_with(overlap));
        }
    }

    #[test]
    fn oversized_segment_is_kept_whole() {
        let big = "x".repeat(250);
        let doc = format!("# A\n\n{big}\n\n# B\n");
        let chunks = chunk_document(&doc, 100, 20);

        let holder = chunks
            .iter()
            .find(|c| c.body().contains(&big))
            .expect("oversized paragraph must survive intact");
        assert!(holder.char_len() > 100);
        assert!(holder.overlap().is_empty(), "no room for overlap");

        let bodies: String = chunks.iter().map(Chunk::body).collect();
        assert_eq!(bodies, doc);
    }

    #[test]
    fn prompt_text_is_trimmed() {
        let chunks = chunk_document("\n\n# Title\n\nBody\n\n", 3000, 10);
        assert_eq!(chunks[0].prompt_text(), "# Title\n\nBody");
        assert_eq!(chunks[0].prompt_context(), "");
    }

    #[test]
    fn prompt_text_excludes_overlap() {
        let chunks = chunk_document(&long_doc(), 60, 10);
        let second = &chunks[1];
        assert!(!second.overlap().is_empty());
        assert_eq!(second.prompt_text(), second.body().trim());
        assert_eq!(second.prompt_context(), second.overlap().trim());
    }

    #[test]
    fn tail_chars_respects_char_boundaries() {
        assert_eq!(tail_chars("héllo wörld", 5), "wörld");
        assert_eq!(tail_chars("ab", 10), "ab");
        assert_eq!(tail_chars("ab", 0), "");
    }
}
