//! Prompts for LLM-driven slide splitting.
//!
//! Every instruction the model sees is assembled here so that adapters only
//! decide *where* the text goes in a payload, never *what* it says. Callers
//! can override the system prompt via
//! [`crate::config::SplitConfig::system_prompt`]; the per-chunk instruction
//! is always built by [`split_instruction`].

/// Default system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant that divides markdown documents \
into presentation slides. You follow the requested output format exactly and never add \
commentary.";

/// Build the deterministic per-chunk instruction.
///
/// `context` is the text carried over from the previous chunk. It is shown
/// to the model in its own block and marked as already covered, so it does
/// not reappear in this chunk's sections. Pass `""` for the first chunk.
///
/// The output contract is always a single JSON object
/// `{"slides": ["...", ...]}`; the sanitizer also tolerates a bare array,
/// but nothing here asks for one.
pub fn split_instruction(context: &str, chunk: &str, sections: usize) -> String {
    let noun = if sections == 1 { "section" } else { "sections" };
    let context_block = if context.trim().is_empty() {
        String::new()
    } else {
        format!(
            "Preceding context, already covered by earlier slides. Read it for \
continuity only and do not include any of it in your sections:\n\n\
<<<CONTEXT\n{}\nCONTEXT>>>\n\n",
            context.trim()
        )
    };
    format!(
        r#"You are given part of a markdown document.

Rules:
- Divide the text into exactly {sections} {noun}.
- Break at structural boundaries, in this order of preference:
  - before headings (#, ##, ###, ...)
  - before list items (-, *, 1.)
  - at paragraph breaks (blank lines)
  - at the end of a sentence
- Keep every word of the text. If preserving all content requires more than
  {sections} {noun}, return more. Never summarise, shorten or omit anything.
- Keep the markdown inside each section as it is.

{context_block}Text to divide:

<<<DOCUMENT
{chunk}
DOCUMENT>>>

Output format:
Respond with one JSON object and nothing else:
{{"slides": ["section text", "section text", "..."]}}
No explanations, headings or code fences before or after the JSON."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_embeds_count_and_chunk() {
        let p = split_instruction("", "# Title\n\nBody", 4);
        assert!(p.contains("exactly 4 sections"));
        assert!(p.contains("<<<DOCUMENT\n# Title\n\nBody\nDOCUMENT>>>"));
        assert!(p.contains(r#"{"slides": ["#));
        assert!(!p.contains("<<<CONTEXT"));
    }

    #[test]
    fn context_is_a_separate_block_before_the_text() {
        let p = split_instruction("  earlier tail\n", "## Next\n\nBody", 2);
        let ctx = p.find("<<<CONTEXT\nearlier tail\nCONTEXT>>>").unwrap();
        let doc = p.find("<<<DOCUMENT\n## Next\n\nBody\nDOCUMENT>>>").unwrap();
        assert!(ctx < doc);
        assert!(p.contains("do not include any of it"));
        // The carried text is not part of the text to divide.
        assert!(!p[doc..].contains("earlier tail"));
    }

    #[test]
    fn instruction_singular() {
        assert!(split_instruction("", "x", 1).contains("exactly 1 section."));
    }

    #[test]
    fn instruction_is_deterministic() {
        assert_eq!(
            split_instruction("ctx", "abc", 3),
            split_instruction("ctx", "abc", 3)
        );
    }
}
