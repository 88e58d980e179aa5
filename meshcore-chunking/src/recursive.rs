//! Recursive Character Splitter (spec §4.5).

use std::sync::Arc;

use meshcore_core::errors::{ChunkingError, CoreResult};
use meshcore_core::models::{Chunk, ChunkingMethod};
use meshcore_core::traits::TextChunker;

pub type LengthFn = Arc<dyn Fn(&str) -> usize + Send + Sync>;

pub fn byte_length(s: &str) -> usize {
    s.len()
}

/// spec §4.5 default separator precedence.
pub fn default_separators() -> Vec<String> {
    [
        "\n\n\n", "\n\n", "\n", ". ", "! ", "? ", "; ", ": ", ", ", " ", "",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Clone)]
pub struct RecursiveCharacterSplitter {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub keep_separator: bool,
    pub separators: Vec<String>,
    pub length_fn: LengthFn,
}

impl RecursiveCharacterSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            keep_separator: true,
            separators: default_separators(),
            length_fn: Arc::new(byte_length),
        }
    }

    pub fn with_length_fn(mut self, f: LengthFn) -> Self {
        self.length_fn = f;
        self
    }

    fn pick_separator<'a>(&self, text: &str, seps: &'a [String]) -> (&'a str, &'a [String]) {
        for (idx, sep) in seps.iter().enumerate() {
            if sep.is_empty() || text.contains(sep.as_str()) {
                return (sep.as_str(), &seps[idx + 1..]);
            }
        }
        ("", &[])
    }

    fn split_on(text: &str, sep: &str, keep: bool) -> Vec<String> {
        if sep.is_empty() {
            return text.chars().map(|c| c.to_string()).collect();
        }
        let parts: Vec<&str> = text.split(sep).collect();
        let mut out = Vec::new();
        let n = parts.len();
        for (idx, part) in parts.into_iter().enumerate() {
            if idx + 1 < n {
                if keep {
                    out.push(format!("{part}{sep}"));
                } else if !part.is_empty() {
                    out.push(part.to_string());
                }
            } else if !part.is_empty() {
                out.push(part.to_string());
            }
        }
        out
    }

    fn recursive_split(&self, text: &str, seps: &[String]) -> Vec<String> {
        if text.is_empty() {
            return vec![];
        }
        let (sep, remaining) = self.pick_separator(text, seps);
        let pieces = Self::split_on(text, sep, self.keep_separator);

        let mut result = Vec::new();
        for piece in pieces {
            let len = (self.length_fn)(&piece);
            if len < self.chunk_size {
                result.push(piece);
            } else if !remaining.is_empty() {
                result.extend(self.recursive_split(&piece, remaining));
            } else {
                result.extend(self.force_split(&piece));
            }
        }
        result
    }

    /// Force-split at the first space found between `chunk_size/2` and
    /// `chunk_size`, falling back to a hard cut at `chunk_size`.
    fn force_split(&self, piece: &str) -> Vec<String> {
        let chars: Vec<char> = piece.chars().collect();
        let mut out = Vec::new();
        let mut start = 0usize;
        let lower = self.chunk_size / 2;
        let upper = self.chunk_size.max(1);

        while start < chars.len() {
            let mut split_at = None;
            let mut hard_cut = start;
            let mut idx = start;
            while idx < chars.len() {
                let candidate: String = chars[start..=idx].iter().collect();
                let l = (self.length_fn)(&candidate);
                if l > upper {
                    break;
                }
                hard_cut = idx + 1;
                if l >= lower && chars[idx] == ' ' {
                    split_at = Some(idx + 1);
                }
                idx += 1;
            }
            let end = split_at
                .unwrap_or(hard_cut)
                .max(start + 1)
                .min(chars.len());
            out.push(chars[start..end].iter().collect());
            start = end;
        }
        out
    }

    /// Builds an overlap suffix from the tail of `content`, accumulating
    /// whole words until `overlap_length >= chunk_overlap`, allowing up to
    /// 20% overflow to avoid a mid-sentence cut.
    fn compute_overlap(&self, content: &str) -> String {
        if self.chunk_overlap == 0 {
            return String::new();
        }
        let words: Vec<&str> = content.split_inclusive(' ').collect();
        let max_len = ((self.chunk_overlap as f64) * 1.2).ceil() as usize;

        let mut suffix = String::new();
        for word in words.iter().rev() {
            let candidate = format!("{word}{suffix}");
            let candidate_len = (self.length_fn)(&candidate);
            if candidate_len > max_len && !suffix.is_empty() {
                break;
            }
            suffix = candidate;
            if (self.length_fn)(&suffix) >= self.chunk_overlap {
                break;
            }
        }
        suffix
    }

    fn merge(&self, pieces: Vec<String>) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut current_pieces: Vec<String> = Vec::new();
        let mut current_len = 0usize;
        let mut chunk_start_char = 0usize;
        let mut chunk_index = 0usize;

        let config = self.config_json();

        let mut flush = |pieces: &mut Vec<String>,
                          len: &mut usize,
                          start_char: &mut usize,
                          chunk_index: &mut usize,
                          chunks: &mut Vec<Chunk>| {
            if pieces.is_empty() {
                return String::new();
            }
            let content: String = pieces.concat();
            let char_len = content.chars().count();
            let end_char = *start_char + char_len;
            chunks.push(Chunk {
                content: content.clone(),
                chunk_index: *chunk_index,
                start_char: *start_char,
                end_char,
                token_count: *len,
                chunking_method: ChunkingMethod::RecursiveCharacter,
                config: config.clone(),
                metadata: serde_json::json!({}),
            });
            *chunk_index += 1;
            let overlap = self.compute_overlap(&content);
            *start_char = end_char - overlap.chars().count();
            overlap
        };

        for piece in pieces {
            let piece_len = (self.length_fn)(&piece);
            if current_len + piece_len > self.chunk_size && !current_pieces.is_empty() {
                let overlap = flush(
                    &mut current_pieces,
                    &mut current_len,
                    &mut chunk_start_char,
                    &mut chunk_index,
                    &mut chunks,
                );
                current_len = (self.length_fn)(&overlap);
                current_pieces = if overlap.is_empty() {
                    Vec::new()
                } else {
                    vec![overlap]
                };
            }
            current_pieces.push(piece.clone());
            current_len += piece_len;
        }

        if !current_pieces.is_empty() {
            flush(
                &mut current_pieces,
                &mut current_len,
                &mut chunk_start_char,
                &mut chunk_index,
                &mut chunks,
            );
        }

        chunks
    }
}

impl TextChunker for RecursiveCharacterSplitter {
    fn chunk(&self, text: &str) -> CoreResult<Vec<Chunk>> {
        if self.chunk_size == 0 {
            return Err(ChunkingError::InvalidConfig("chunk_size must be > 0".into()).into());
        }
        let pieces = self.recursive_split(text, &self.separators);
        Ok(self.merge(pieces))
    }

    fn config_json(&self) -> serde_json::Value {
        serde_json::json!({
            "chunk_size": self.chunk_size,
            "chunk_overlap": self.chunk_overlap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_count(s: &str) -> usize {
        s.split_whitespace().count()
    }

    /// Scenario 6 (spec §8): forced split on a long repeated sentence.
    #[test]
    fn forces_split_on_long_text_with_word_count_length_fn() {
        let sentence =
            "This is a very long sentence that goes on and on without any good breaking points. ";
        let text = sentence.repeat(20);

        let splitter = RecursiveCharacterSplitter {
            chunk_size: 200,
            chunk_overlap: 20,
            keep_separator: true,
            separators: default_separators(),
            length_fn: Arc::new(word_count),
        };

        let chunks = splitter.chunk(&text).unwrap();
        assert!(chunks.len() >= 3);
        for c in &chunks {
            assert!(word_count(&c.content) <= 200);
        }
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let splitter = RecursiveCharacterSplitter::new(1000, 200);
        let chunks = splitter.chunk("A short paragraph.\n\nAnother short one.").unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn overlap_carries_into_next_chunk() {
        let splitter = RecursiveCharacterSplitter::new(40, 10);
        let text = "Alpha beta gamma delta. Epsilon zeta eta theta. Iota kappa lambda mu nu xi.";
        let chunks = splitter.chunk(text).unwrap();
        assert!(chunks.len() >= 2);
        // some trailing word of chunk 0 should reappear at the start of chunk 1
        let last_word_of_first = chunks[0]
            .content
            .split_whitespace()
            .last()
            .unwrap_or_default();
        assert!(chunks[1].content.contains(last_word_of_first));
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let splitter = RecursiveCharacterSplitter::new(0, 0);
        assert!(splitter.chunk("text").is_err());
    }
}
