use serde::{Deserialize, Serialize};

/// spec §6 "Chunk metadata shape". The reserved keys below must never be
/// overwritten by consumer-supplied metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingMethod {
    RecursiveCharacter,
    Semantic,
}

impl ChunkingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkingMethod::RecursiveCharacter => "recursive_character",
            ChunkingMethod::Semantic => "semantic",
        }
    }
}

/// A single emitted chunk plus its positional/overlap metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub chunk_index: usize,
    pub start_char: usize,
    pub end_char: usize,
    /// Count produced by whatever `length_fn`/tokenizer was configured.
    /// Field name is kept stable per spec §9 Open Question even though its
    /// semantics (bytes vs tokens) differ by chunker.
    pub token_count: usize,
    pub chunking_method: ChunkingMethod,
    pub config: serde_json::Value,
    pub metadata: serde_json::Value,
}
