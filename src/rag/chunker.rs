//! Recursive character splitter.
//!
//! Splits on the largest structural boundary available (paragraph, then
//! line, then word, then raw characters) so each chunk stays under the size
//! cap, while keeping an overlap between consecutive chunks from the same
//! file. The overlap is a retrieval-quality requirement: a statement that
//! straddles a chunk boundary must survive intact in at least one chunk.

use crate::models::DocumentChunk;
use crate::rag::loader::RepoDocument;

/// Maximum characters per chunk.
pub const MAX_CHUNK_CHARS: usize = 800;
/// Target overlap carried from one chunk into the next.
pub const CHUNK_OVERLAP_CHARS: usize = 150;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Chunk a set of loaded documents, tagging each chunk with its provenance.
/// Deterministic: the same documents in the same order always produce the
/// same chunk sequence.
pub fn chunk_documents(repo: &str, docs: &[RepoDocument]) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();
    for doc in docs {
        for (chunk_index, content) in split_text(&doc.content).into_iter().enumerate() {
            chunks.push(DocumentChunk {
                repo: repo.to_string(),
                file_path: doc.path.clone(),
                chunk_index,
                content,
            });
        }
    }
    chunks
}

/// Split one text into overlapping chunks of at most [`MAX_CHUNK_CHARS`].
pub fn split_text(text: &str) -> Vec<String> {
    split_with_separators(text, &SEPARATORS)
        .into_iter()
        .filter(|c| !c.trim().is_empty())
        .collect()
}

fn split_with_separators(text: &str, separators: &[&'static str]) -> Vec<String> {
    let (sep, rest) = pick_separator(text, separators);
    if sep.is_empty() {
        return hard_split(text);
    }

    let pieces = split_keep_separator(text, sep);
    let mut chunks = Vec::new();
    let mut pending: Vec<String> = Vec::new();

    for piece in pieces {
        if char_len(&piece) <= MAX_CHUNK_CHARS {
            pending.push(piece);
        } else {
            // Flush what we have, then descend to the next-finer boundary
            // for the oversized piece.
            if !pending.is_empty() {
                merge_pieces(&pending, &mut chunks);
                pending.clear();
            }
            chunks.extend(split_with_separators(&piece, rest));
        }
    }

    if !pending.is_empty() {
        merge_pieces(&pending, &mut chunks);
    }

    chunks
}

/// First separator that actually occurs in the text; the empty separator
/// (raw character split) is the unconditional last resort.
fn pick_separator(
    text: &str,
    separators: &[&'static str],
) -> (&'static str, &'static [&'static str]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            return ("", &[]);
        }
        if text.contains(sep) {
            // `separators` is always a suffix of SEPARATORS, so the tail
            // after `sep` can be re-borrowed from the 'static array.
            let offset = SEPARATORS.len() - separators.len();
            return (sep, &SEPARATORS[offset + i + 1..]);
        }
    }
    ("", &[])
}

/// Split on `sep`, keeping the separator attached to the preceding piece so
/// chunk concatenation reproduces the original text.
fn split_keep_separator(text: &str, sep: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(idx) = rest.find(sep) {
        out.push(rest[..idx + sep.len()].to_string());
        rest = &rest[idx + sep.len()..];
    }
    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    out
}

/// Greedily merge small pieces into chunks up to the size cap, carrying a
/// tail of roughly [`CHUNK_OVERLAP_CHARS`] into the next chunk.
fn merge_pieces(pieces: &[String], out: &mut Vec<String>) {
    let mut window: std::collections::VecDeque<&String> = std::collections::VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let len = char_len(piece);
        if total + len > MAX_CHUNK_CHARS && !window.is_empty() {
            out.push(window.iter().map(|s| s.as_str()).collect::<String>());
            // Drop from the front until the retained tail fits the overlap
            // budget and leaves room for the incoming piece.
            while total > CHUNK_OVERLAP_CHARS
                || (total + len > MAX_CHUNK_CHARS && total > 0)
            {
                match window.pop_front() {
                    Some(front) => total -= char_len(front),
                    None => break,
                }
            }
        }
        window.push_back(piece);
        total += len;
    }

    if !window.is_empty() {
        out.push(window.iter().map(|s| s.as_str()).collect::<String>());
    }
}

/// Raw character windows with a fixed overlap; last resort for text with no
/// usable structure at all.
fn hard_split(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let step = MAX_CHUNK_CHARS - CHUNK_OVERLAP_CHARS;
    let mut out = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + MAX_CHUNK_CHARS).min(chars.len());
        out.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    out
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Longest overlap between the end of `a` and the start of `b`, in
    /// bytes (test inputs are ASCII).
    fn overlap_len(a: &str, b: &str) -> usize {
        (1..=a.len().min(b.len()))
            .rev()
            .find(|&k| a.ends_with(&b[..k]))
            .unwrap_or(0)
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = split_text("fn main() { println!(\"hi\"); }");
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_empty_and_whitespace_yield_nothing() {
        assert!(split_text("").is_empty());
        assert!(split_text("  \n\n   \n ").is_empty());
    }

    #[test]
    fn test_chunks_respect_size_cap() {
        let words: String = (0..2000).map(|i| format!("word{i} ")).collect();
        for chunk in split_text(&words) {
            assert!(
                chunk.chars().count() <= MAX_CHUNK_CHARS,
                "chunk of {} chars exceeds cap",
                chunk.chars().count()
            );
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let words: String = (0..2000).map(|i| format!("word{i} ")).collect();
        let chunks = split_text(&words);
        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            assert!(
                overlap_len(&pair[0], &pair[1]) > 0,
                "expected overlap between consecutive chunks"
            );
        }
    }

    #[test]
    fn test_splits_at_paragraph_boundary_first() {
        let para1: String = (0..90).map(|i| format!("alpha{i} ")).collect();
        let para2: String = (0..90).map(|i| format!("beta{i} ")).collect();
        let text = format!("{}\n\n{}", para1.trim_end(), para2.trim_end());

        let chunks = split_text(&text);
        assert!(chunks.len() >= 2);
        // No chunk mixes the two paragraphs without the paragraph break:
        // the first chunk is paragraph one (plus its separator).
        assert!(chunks[0].contains("alpha0"));
        assert!(!chunks[0].contains("beta"));
    }

    #[test]
    fn test_unbroken_text_uses_character_windows() {
        // Varied letters, no whitespace anywhere.
        let text: String = (0..2000)
            .map(|i| char::from(b'a' + ((i * i) % 26) as u8))
            .collect();
        let chunks = split_text(&text);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_CHUNK_CHARS));
        // Fixed-step windows: each chunk starts where the previous one left
        // off minus the configured overlap.
        let step = MAX_CHUNK_CHARS - CHUNK_OVERLAP_CHARS;
        assert_eq!(chunks[0], text[..MAX_CHUNK_CHARS]);
        assert_eq!(chunks[1], text[step..step + MAX_CHUNK_CHARS]);
    }

    #[test]
    fn test_boundary_spanning_sentence_survives_whole() {
        let filler: String = (0..95).map(|i| format!("pad{i} ")).collect();
        let sentence = "the auth middleware validates every session token";
        let text = format!("{filler}{sentence} trailing words here");

        let chunks = split_text(&text);
        assert!(
            chunks.iter().any(|c| c.contains(sentence)),
            "sentence should appear intact in at least one chunk"
        );
    }

    #[test]
    fn test_deterministic() {
        let text: String = (0..1500).map(|i| format!("line {i}\n")).collect();
        assert_eq!(split_text(&text), split_text(&text));
    }

    #[test]
    fn test_chunk_documents_provenance() {
        let docs = vec![
            RepoDocument {
                path: "src/a.rs".to_string(),
                content: (0..400).map(|i| format!("fn f{i}() {{}}\n")).collect(),
            },
            RepoDocument {
                path: "src/b.rs".to_string(),
                content: "fn only() {}".to_string(),
            },
        ];

        let chunks = chunk_documents("owner/name", &docs);
        assert!(chunks.len() > 2);
        assert!(chunks.iter().all(|c| c.repo == "owner/name"));

        let a_chunks: Vec<_> = chunks.iter().filter(|c| c.file_path == "src/a.rs").collect();
        for (i, c) in a_chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
        }
        let b_chunks: Vec<_> = chunks.iter().filter(|c| c.file_path == "src/b.rs").collect();
        assert_eq!(b_chunks.len(), 1);
        assert_eq!(b_chunks[0].chunk_index, 0);
    }
}
