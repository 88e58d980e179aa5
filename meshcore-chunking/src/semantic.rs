//! Semantic Chunker (spec §4.5).

use std::sync::Arc;

use meshcore_core::config::SemanticChunkerConfig;
use meshcore_core::errors::CoreResult;
use meshcore_core::models::{Chunk, ChunkingMethod};
use meshcore_core::traits::{SentenceSplit, TextChunker, Tokenizer};

use crate::splitter::SentenceSplitter;

const TOPIC_SHIFT_CUES: &[&str] = &[
    "however,",
    "furthermore,",
    "in conclusion,",
    "first,",
    "second,",
    "finally,",
    "moreover,",
    "additionally,",
    "meanwhile,",
    "therefore,",
    "thus,",
    "next,",
    "in addition,",
];

fn starts_with_topic_shift(sentence: &str) -> bool {
    let lower = sentence.trim().to_lowercase();
    TOPIC_SHIFT_CUES.iter().any(|cue| lower.starts_with(cue))
}

fn starts_with_list_marker(sentence: &str) -> bool {
    let s = sentence.trim_start();
    if s.starts_with('-') || s.starts_with('*') || s.starts_with('•') {
        return true;
    }
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if !digits.is_empty() {
        let rest = &s[digits.len()..];
        return rest.starts_with(". ") || rest.starts_with(") ");
    }
    false
}

fn looks_like_header(sentence: &str) -> bool {
    let trimmed = sentence.trim();
    if trimmed.is_empty() || trimmed.chars().count() >= 100 {
        return false;
    }
    let ends_with_sentence_punct = trimmed.ends_with('.') || trimmed.ends_with('!') || trimmed.ends_with('?');
    let starts_capitalized = trimmed.chars().next().map(|c| c.is_uppercase()).unwrap_or(false);
    !ends_with_sentence_punct && starts_capitalized
}

/// Token-aware semantic chunker producing context-preserving chunks.
pub struct SemanticChunker {
    pub config: SemanticChunkerConfig,
    tokenizer: Arc<dyn Tokenizer>,
    splitter: SentenceSplitter,
}

impl SemanticChunker {
    pub fn new(config: SemanticChunkerConfig, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            config,
            tokenizer,
            splitter: SentenceSplitter::new(),
        }
    }

    fn is_semantic_boundary(&self, sentences: &[String], i: usize, last_of_paragraph: &[bool]) -> bool {
        if i + 1 >= sentences.len() {
            return true;
        }
        if last_of_paragraph[i] {
            return true;
        }
        let next = &sentences[i + 1];
        looks_like_header(next) || starts_with_topic_shift(next) || starts_with_list_marker(next)
    }

    /// Forced word-level split for a single sentence that alone exceeds
    /// `max_chunk_size` tokens, carrying overlap between resulting pieces.
    fn force_split_sentence(&self, sentence: &str) -> Vec<String> {
        let words: Vec<&str> = sentence.split_whitespace().collect();
        let mut pieces = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for word in words {
            current.push(word);
            if self.tokenizer.count_tokens(&current.join(" ")) >= self.config.max_chunk_size {
                pieces.push(current.join(" "));
                let overlap_words: Vec<&str> = current
                    .iter()
                    .rev()
                    .take(self.config.overlap_size.min(current.len()))
                    .rev()
                    .copied()
                    .collect();
                current = overlap_words;
            }
        }
        if !current.is_empty() {
            pieces.push(current.join(" "));
        }
        if pieces.is_empty() {
            pieces.push(sentence.to_string());
        }
        pieces
    }

    fn build_overlap(&self, flushed_sentences: &[String]) -> Vec<String> {
        if self.config.overlap_size == 0 {
            return Vec::new();
        }
        let max_tokens = ((self.config.overlap_size as f64) * 1.2).ceil() as usize;
        let mut overlap: Vec<String> = Vec::new();
        let mut tokens = 0usize;

        for sentence in flushed_sentences.iter().rev() {
            let t = self.tokenizer.count_tokens(sentence);
            if tokens + t > max_tokens && !overlap.is_empty() {
                break;
            }
            overlap.insert(0, sentence.clone());
            tokens += t;
            if tokens >= self.config.overlap_size {
                break;
            }
        }
        overlap
    }

    fn make_chunk(
        &self,
        sentences: &[String],
        chunk_index: usize,
        start_char: usize,
    ) -> Chunk {
        let content = sentences.join(" ");
        let token_count = self.tokenizer.count_tokens(&content);
        let end_char = start_char + content.chars().count();
        Chunk {
            content,
            chunk_index,
            start_char,
            end_char,
            token_count,
            chunking_method: ChunkingMethod::Semantic,
            config: self.config_json(),
            metadata: serde_json::json!({}),
        }
    }

    /// Drops trailing words from `chunk.content` until it is back within
    /// `max_chunk_size` tokens (spec §4.5 step 6, "final safety pass").
    fn trim_to_max(&self, chunk: &mut Chunk) {
        if chunk.token_count <= self.config.max_chunk_size {
            return;
        }
        let mut words: Vec<&str> = chunk.content.split_whitespace().collect();
        while words.len() > 1 {
            words.pop();
            let candidate = words.join(" ");
            if self.tokenizer.count_tokens(&candidate) <= self.config.max_chunk_size {
                chunk.content = candidate;
                chunk.token_count = self.tokenizer.count_tokens(&chunk.content);
                chunk.end_char = chunk.start_char + chunk.content.chars().count();
                return;
            }
        }
    }
}

impl TextChunker for SemanticChunker {
    fn chunk(&self, text: &str) -> CoreResult<Vec<Chunk>> {
        let paragraphs: Vec<&str> = text.split("\n\n").collect();
        let mut sentences: Vec<String> = Vec::new();
        let mut last_of_paragraph: Vec<bool> = Vec::new();

        for paragraph in &paragraphs {
            let para_sentences = self.splitter.split(paragraph);
            let n = para_sentences.len();
            for (idx, sentence) in para_sentences.into_iter().enumerate() {
                sentences.push(sentence);
                last_of_paragraph.push(idx + 1 == n);
            }
        }

        if sentences.is_empty() {
            return Ok(vec![]);
        }

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut chunk_index = 0usize;
        let mut start_char = 0usize;

        let mut i = 0usize;
        while i < sentences.len() {
            let sentence = sentences[i].clone();
            let sentence_tokens = self.tokenizer.count_tokens(&sentence);

            if sentence_tokens > self.config.max_chunk_size {
                if !current.is_empty() {
                    let c = self.make_chunk(&current, chunk_index, start_char);
                    start_char = c.end_char;
                    chunk_index += 1;
                    chunks.push(c);
                    current.clear();
                }
                for piece in self.force_split_sentence(&sentence) {
                    let c = self.make_chunk(&[piece], chunk_index, start_char);
                    start_char = c.end_char;
                    chunk_index += 1;
                    chunks.push(c);
                }
                i += 1;
                continue;
            }

            let current_tokens: usize = self.tokenizer.count_tokens(&current.join(" "));
            if !current.is_empty() && current_tokens + sentence_tokens > self.config.max_chunk_size
            {
                let c = self.make_chunk(&current, chunk_index, start_char);
                start_char = c.end_char;
                chunk_index += 1;
                let overlap = self.build_overlap(&current);
                chunks.push(c);
                current = overlap;
                continue;
            }

            current.push(sentence.clone());
            let current_tokens: usize = self.tokenizer.count_tokens(&current.join(" "));

            let at_paragraph_boundary = last_of_paragraph[i];
            let hit_target_at_boundary =
                current_tokens >= self.config.target_chunk_size && self.is_semantic_boundary(&sentences, i, &last_of_paragraph);
            let next_would_exceed = i + 1 < sentences.len()
                && current_tokens + self.tokenizer.count_tokens(&sentences[i + 1])
                    > self.config.max_chunk_size;

            let should_split = (at_paragraph_boundary && current_tokens >= self.config.min_chunk_size)
                || hit_target_at_boundary
                || next_would_exceed;

            if should_split {
                let c = self.make_chunk(&current, chunk_index, start_char);
                start_char = c.end_char;
                chunk_index += 1;
                let overlap = self.build_overlap(&current);
                chunks.push(c);
                current = overlap;
            }

            i += 1;
        }

        if !current.is_empty() {
            let residual_tokens = self.tokenizer.count_tokens(&current.join(" "));
            if residual_tokens >= self.config.min_chunk_size || chunks.is_empty() {
                let c = self.make_chunk(&current, chunk_index, start_char);
                chunks.push(c);
            } else if let Some(last) = chunks.last().cloned() {
                let merged_content = format!("{} {}", last.content, current.join(" "));
                let merged_tokens = self.tokenizer.count_tokens(&merged_content);
                if merged_tokens <= self.config.max_chunk_size {
                    let idx = chunks.len() - 1;
                    let end_char = last.start_char + merged_content.chars().count();
                    chunks[idx] = Chunk {
                        content: merged_content,
                        token_count: merged_tokens,
                        end_char,
                        ..last
                    };
                } else {
                    let c = self.make_chunk(&current, chunk_index, start_char);
                    chunks.push(c);
                }
            } else {
                let c = self.make_chunk(&current, chunk_index, start_char);
                chunks.push(c);
            }
        }

        for chunk in chunks.iter_mut() {
            self.trim_to_max(chunk);
        }

        Ok(chunks)
    }

    fn config_json(&self) -> serde_json::Value {
        serde_json::json!({
            "target_size": self.config.target_chunk_size,
            "overlap": self.config.overlap_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::WordCountTokenizer;

    fn chunker(min: usize, max: usize, target: usize, overlap: usize) -> SemanticChunker {
        SemanticChunker::new(
            SemanticChunkerConfig {
                min_chunk_size: min,
                max_chunk_size: max,
                target_chunk_size: target,
                overlap_size: overlap,
                similarity_threshold: 0.75,
            },
            Arc::new(WordCountTokenizer),
        )
    }

    const ML_DOC: &str = "Introduction to Machine Learning is a broad field of study. It covers algorithms that learn from data. Researchers have studied it for decades.\n\nTypes of Machine Learning include supervised, unsupervised, and reinforcement learning. Supervised learning uses labeled examples to train models. Unsupervised learning finds structure without labels. Reinforcement learning optimizes an agent's behavior through rewards.\n\nDeep Learning is a subset of machine learning based on neural networks. Deep networks stack many layers to learn hierarchical representations. They have driven much of the recent progress in the field.\n\nIn conclusion, machine learning continues to transform many industries. Researchers expect the pace of progress to continue.";

    /// Scenario 5 (spec §8).
    #[test]
    fn chunks_the_ml_document_within_bounds_and_preserves_key_phrases() {
        let c = chunker(20, 80, 50, 10);
        let chunks = c.chunk(ML_DOC).unwrap();

        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.token_count <= 80);
            assert_eq!(chunk.chunking_method, ChunkingMethod::Semantic);
        }

        let joined = chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        for phrase in [
            "Introduction to Machine Learning",
            "Types of Machine Learning",
            "Deep Learning",
            "In conclusion",
        ] {
            assert!(joined.contains(phrase), "missing phrase: {phrase}");
        }
    }

    #[test]
    fn forces_split_on_oversized_single_sentence() {
        let c = chunker(5, 20, 10, 3);
        let huge_sentence = (0..40)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ")
            + ".";
        let chunks = c.chunk(&huge_sentence).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.token_count <= 20);
        }
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let c = chunker(10, 50, 30, 5);
        assert!(c.chunk("").unwrap().is_empty());
    }
}
