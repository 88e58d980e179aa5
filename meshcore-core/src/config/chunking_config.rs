use serde::{Deserialize, Serialize};

/// Recursive character splitter configuration (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecursiveChunkerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub keep_separator: bool,
    pub separators: Vec<String>,
}

impl Default for RecursiveChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            keep_separator: true,
            separators: vec![
                "\n\n\n".into(),
                "\n\n".into(),
                "\n".into(),
                ". ".into(),
                "! ".into(),
                "? ".into(),
                "; ".into(),
                ": ".into(),
                ", ".into(),
                " ".into(),
                "".into(),
            ],
        }
    }
}

/// Semantic chunker configuration (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticChunkerConfig {
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
    pub target_chunk_size: usize,
    pub overlap_size: usize,
    pub similarity_threshold: f64,
}

impl Default for SemanticChunkerConfig {
    fn default() -> Self {
        Self {
            min_chunk_size: 100,
            max_chunk_size: 500,
            target_chunk_size: 300,
            overlap_size: 50,
            similarity_threshold: 0.75,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub recursive: RecursiveChunkerConfig,
    pub semantic: SemanticChunkerConfig,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            recursive: RecursiveChunkerConfig::default(),
            semantic: SemanticChunkerConfig::default(),
        }
    }
}
