//! `{CountTokens}` tokenizer implementations (spec §9 "Interface
//! polymorphism").

use meshcore_core::traits::Tokenizer;
use tiktoken_rs::CoreBPE;

/// Token counter backed by the `cl100k_base` BPE vocabulary (the encoding
/// used by the embedding-capable chat models this control plane routes
/// to), so chunk sizes measured here line up with what providers bill.
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    pub fn cl100k_base() -> Result<Self, String> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| e.to_string())?;
        Ok(Self { bpe })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Simple whitespace-word tokenizer, useful for tests and for callers that
/// don't want the bundled BPE vocabulary loaded.
#[derive(Debug, Default, Clone, Copy)]
pub struct WordCountTokenizer;

impl Tokenizer for WordCountTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_tokenizer_counts_whitespace_separated_tokens() {
        let t = WordCountTokenizer;
        assert_eq!(t.count_tokens("one two three"), 3);
    }

    #[test]
    fn tiktoken_tokenizer_counts_a_known_phrase() {
        let t = TiktokenTokenizer::cl100k_base().unwrap();
        assert!(t.count_tokens("hello world") > 0);
    }
}
