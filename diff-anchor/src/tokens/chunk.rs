//! Line-aligned chunking under a token ceiling.

use serde::Serialize;
use tracing::{debug, warn};

use super::TokenCounter;

/// Contiguous slice of a larger text that fits the token ceiling.
///
/// Line indices are 1-based and inclusive, relative to the chunked text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenChunk {
    /// 1-based index of this chunk.
    pub index: usize,
    /// Total number of chunks produced for the text.
    pub total: usize,
    pub start_line: usize,
    pub end_line: usize,
    /// Chunk text; every line is terminated by `\n`.
    pub text: String,
    pub tokens: usize,
}

/// Split `text` into chunks of at most `max_tokens` tokens, breaking only at
/// line boundaries.
///
/// A line that alone exceeds the ceiling still becomes its own chunk; that
/// overflow is accepted and logged. Concatenating the chunk texts gives back
/// every line of `text` in order, each followed by `\n`.
pub fn chunk(counter: &TokenCounter, text: &str, max_tokens: usize) -> Vec<TokenChunk> {
    chunk_sections(counter, text, max_tokens, |_| false)
}

/// Like [`chunk`], for documents made of sections that each open with a
/// heading line (`is_heading`).
///
/// A chunk that starts inside a section gets that section's heading repeated
/// in front of its first non-blank line, so every line of every chunk can be
/// attributed to its section. The repeated heading counts against the budget;
/// `start_line`/`end_line` still refer to lines of `text`.
pub fn chunk_sections<F>(
    counter: &TokenCounter,
    text: &str,
    max_tokens: usize,
    is_heading: F,
) -> Vec<TokenChunk>
where
    F: Fn(&str) -> bool,
{
    let mut chunks: Vec<TokenChunk> = Vec::new();
    let mut current = String::new();
    let mut start_line = 1usize;
    let mut lines_in_current = 0usize;
    let mut section_heading: Option<&str> = None;
    // Current chunk already shows the heading of the section being filled.
    let mut heading_shown = false;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let opens_section = is_heading(line);
        if opens_section {
            section_heading = Some(line);
        }
        let carried = if opens_section || line.is_empty() {
            None
        } else {
            section_heading
        };

        let mut candidate = current.clone();
        if let (Some(h), false) = (carried, heading_shown) {
            candidate.push_str(h);
            candidate.push('\n');
        }
        candidate.push_str(line);
        candidate.push('\n');

        if lines_in_current > 0 && !counter.fits(&candidate, max_tokens) {
            seal(&mut chunks, counter, &mut current, start_line, line_no - 1);
            start_line = line_no;
            if let Some(h) = carried {
                current.push_str(h);
                current.push('\n');
            }
            current.push_str(line);
            current.push('\n');
            lines_in_current = 1;
            heading_shown = opens_section || carried.is_some();
        } else {
            current = candidate;
            lines_in_current += 1;
            heading_shown = heading_shown || opens_section || carried.is_some();
        }
    }

    if lines_in_current > 0 {
        let end = start_line + lines_in_current - 1;
        seal(&mut chunks, counter, &mut current, start_line, end);
    }

    let total = chunks.len();
    for c in &mut chunks {
        c.total = total;
        if c.tokens > max_tokens {
            warn!(
                "chunk: chunk {} (line {}) alone exceeds budget: {} > {}",
                c.index, c.start_line, c.tokens, max_tokens
            );
        }
    }
    debug!("chunk: produced {} chunks (max_tokens={})", total, max_tokens);
    chunks
}

fn seal(
    chunks: &mut Vec<TokenChunk>,
    counter: &TokenCounter,
    current: &mut String,
    start_line: usize,
    end_line: usize,
) {
    let text = std::mem::take(current);
    chunks.push(TokenChunk {
        index: chunks.len() + 1,
        total: 0,
        start_line,
        end_line,
        tokens: counter.count(&text),
        text,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::TokenizerProfile;

    fn words() -> TokenCounter {
        TokenCounter::new(TokenizerProfile::Words)
    }

    #[test]
    fn small_text_is_one_chunk() {
        let chunks = chunk(&words(), "a b\nc d\n", 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "a b\nc d\n");
        assert_eq!((chunks[0].index, chunks[0].total), (1, 1));
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 2));
    }

    #[test]
    fn splits_on_line_boundaries_in_order() {
        let text = "one two\nthree four\nfive six\nseven eight\n";
        let chunks = chunk(&words(), text, 4);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "one two\nthree four\n");
        assert_eq!(chunks[1].text, "five six\nseven eight\n");
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (3, 4));
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn oversized_line_becomes_its_own_chunk() {
        let text = "a\nb c d e f g\nh\n";
        let chunks = chunk(&words(), text, 2);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a\n", "b c d e f g\n", "h\n"]);
        for c in &chunks {
            assert!(c.tokens <= 2 || c.start_line == c.end_line);
        }
    }

    #[test]
    fn no_chunk_exceeds_budget_unless_single_line() {
        let text: String = (0..200)
            .map(|i| format!("+ let value_{i} = compute(a, b, {i});\n"))
            .collect();
        for budget in [1usize, 7, 30, 100, 10_000] {
            let chunks = chunk(&words(), &text, budget);
            for c in &chunks {
                assert!(c.tokens <= budget || c.start_line == c.end_line);
            }
            let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
            assert_eq!(joined, text);
        }
    }

    #[test]
    fn missing_trailing_newline_is_reinserted() {
        let chunks = chunk(&words(), "x\ny", 100);
        assert_eq!(chunks[0].text, "x\ny\n");
    }

    fn is_heading(line: &str) -> bool {
        line.starts_with("## ")
    }

    #[test]
    fn chunks_starting_mid_section_repeat_the_heading() {
        let mut text = String::from("## a\n");
        for i in 1..=6 {
            text.push_str(&format!("a{i} x y\n"));
        }
        text.push_str("\n## b\nb1 x y\nb2 x y\n");

        let chunks = chunk_sections(&words(), &text, 8, is_heading);
        assert!(chunks.len() > 2);

        // Attribute every line through the headings visible inside its chunk.
        let mut attributed: Vec<(String, String)> = Vec::new();
        for c in &chunks {
            let mut section: Option<&str> = None;
            for line in c.text.lines() {
                if is_heading(line) {
                    section = Some(line);
                } else if !line.is_empty() {
                    let section = section.expect("line without a heading in its chunk");
                    attributed.push((section.to_string(), line.to_string()));
                }
            }
        }
        let expected: Vec<(String, String)> = (1..=6)
            .map(|i| ("## a".to_string(), format!("a{i} x y")))
            .chain((1..=2).map(|i| ("## b".to_string(), format!("b{i} x y"))))
            .collect();
        assert_eq!(attributed, expected);

        for c in &chunks {
            assert!(c.tokens <= 8 || c.start_line == c.end_line);
        }
        assert_eq!(chunks.last().map(|c| c.end_line), Some(text.lines().count()));
    }

    #[test]
    fn plain_chunking_never_repeats_headings() {
        let text = "## a\none two\nthree four\nfive six\n";
        let chunks = chunk(&words(), text, 4);
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(chunk(&words(), "", 10).is_empty());
    }
}
