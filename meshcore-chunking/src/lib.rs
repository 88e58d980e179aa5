//! Sentence Splitter and chunking strategies (spec §4.5): a rule-based
//! sentence boundary scanner plus Recursive Character and Semantic
//! chunkers, both implementing [`meshcore_core::traits::TextChunker`].

pub mod recursive;
pub mod semantic;
pub mod splitter;
pub mod tokenizer;

pub use recursive::{byte_length, default_separators, LengthFn, RecursiveCharacterSplitter};
pub use semantic::SemanticChunker;
pub use splitter::SentenceSplitter;
pub use tokenizer::{TiktokenTokenizer, WordCountTokenizer};
