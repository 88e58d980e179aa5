//! Rule-based sentence boundary detector (spec §4.5 "Sentence Splitter").
//!
//! A single rune-level pass tracks abbreviations, ellipses, decimal
//! points, and paren balance so that `. ! ?` only terminate a sentence
//! when none of those conditions veto it.

use meshcore_core::traits::SentenceSplit;

const TITLES: &[&str] = &["mr", "mrs", "ms", "dr", "prof", "sr", "jr"];

const COMMON_ABBREVIATIONS: &[&str] = &[
    "inc", "corp", "co", "ltd", "llc", "vs", "etc", "i.e", "e.g", "cf", "al", "et",
];

const MONTHS: &[&str] = &[
    "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep", "sept", "oct", "nov", "dec",
];

const DAYS: &[&str] = &["mon", "tue", "tues", "wed", "thu", "thurs", "fri", "sat", "sun"];

const MEASUREMENTS: &[&str] = &["mm", "cm", "km", "kg", "lb", "ft", "in", "oz", "mph", "kmh"];

const GEOGRAPHY: &[&str] = &["st", "ave", "blvd", "rd", "mt"];

const TECH: &[&str] = &[
    "api", "sdk", "ui", "ux", "db", "os", "cpu", "gpu", "ram", "ssd", "http", "https", "ftp",
    "ssh", "oauth",
];

const SENTENCE_STARTERS: &[&str] = &[
    "the", "this", "these", "those", "it", "he", "she", "they", "we", "i", "however",
    "furthermore", "additionally", "moreover", "meanwhile", "therefore", "thus", "also", "but",
    "and", "so", "in", "first", "second", "finally",
];

fn is_abbreviation(word: &str) -> bool {
    let w = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
    TITLES.contains(&w.as_str())
        || COMMON_ABBREVIATIONS.contains(&w.as_str())
        || MONTHS.contains(&w.as_str())
        || DAYS.contains(&w.as_str())
        || MEASUREMENTS.contains(&w.as_str())
        || GEOGRAPHY.contains(&w.as_str())
        || TECH.contains(&w.as_str())
}

fn is_title(word: &str) -> bool {
    let w = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
    TITLES.contains(&w.as_str())
}

fn is_sentence_starter(word: &str) -> bool {
    let w = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
    SENTENCE_STARTERS.contains(&w.as_str())
}

/// Rule-based sentence splitter implementing spec §4.5.
#[derive(Debug, Default, Clone, Copy)]
pub struct SentenceSplitter;

impl SentenceSplitter {
    pub fn new() -> Self {
        Self
    }

    /// Returns the word immediately preceding `chars[..=idx]`'s end, i.e.
    /// the token that the punctuation at `idx` is attached to.
    fn preceding_word(chars: &[char], idx: usize) -> String {
        let mut start = idx;
        while start > 0 && (chars[start - 1].is_alphanumeric() || chars[start - 1] == '.') {
            start -= 1;
        }
        chars[start..idx].iter().collect()
    }

    fn following_word(chars: &[char], mut idx: usize) -> Option<String> {
        while idx < chars.len() && chars[idx].is_whitespace() {
            idx += 1;
        }
        if idx >= chars.len() {
            return None;
        }
        let start = idx;
        while idx < chars.len() && !chars[idx].is_whitespace() {
            idx += 1;
        }
        Some(chars[start..idx].iter().collect())
    }
}

impl SentenceSplit for SentenceSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut sentences = Vec::new();
        let mut start = 0usize;
        let mut paren_depth: i32 = 0;
        let mut i = 0usize;

        while i < chars.len() {
            let c = chars[i];

            match c {
                '(' => paren_depth += 1,
                ')' => paren_depth = (paren_depth - 1).max(0),
                '\n' if i + 1 < chars.len() && chars[i + 1] == '\n' => {
                    let sentence: String = chars[start..i].iter().collect();
                    let trimmed = sentence.trim();
                    if !trimmed.is_empty() {
                        sentences.push(trimmed.to_string());
                    }
                    // Skip all consecutive blank-line whitespace.
                    let mut j = i;
                    while j < chars.len() && chars[j].is_whitespace() {
                        j += 1;
                    }
                    i = j;
                    start = i;
                    continue;
                }
                '.' | '!' | '?' => {
                    if Self::is_boundary(&chars, i, paren_depth) {
                        // Absorb trailing closing punctuation (quotes/brackets).
                        let mut end = i + 1;
                        while end < chars.len()
                            && matches!(chars[end], '"' | '\'' | ')' | ']' | '}')
                        {
                            if chars[end] == ')' {
                                paren_depth = (paren_depth - 1).max(0);
                            }
                            end += 1;
                        }
                        let sentence: String = chars[start..end].iter().collect();
                        let trimmed = sentence.trim();
                        if !trimmed.is_empty() {
                            sentences.push(trimmed.to_string());
                        }
                        let mut j = end;
                        while j < chars.len() && chars[j].is_whitespace() {
                            j += 1;
                        }
                        i = j;
                        start = i;
                        continue;
                    }
                }
                _ => {}
            }

            i += 1;
        }

        if start < chars.len() {
            let tail: String = chars[start..].iter().collect();
            let trimmed = tail.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
        }

        sentences
    }
}

impl SentenceSplitter {
    fn is_boundary(chars: &[char], i: usize, paren_depth: i32) -> bool {
        let c = chars[i];

        if c == '.' {
            // (i) ellipsis: any run of 2+ dots around this position never splits.
            let prev_is_dot = i > 0 && chars[i - 1] == '.';
            let next_is_dot = i + 1 < chars.len() && chars[i + 1] == '.';
            if prev_is_dot || next_is_dot {
                return false;
            }

            // (ii) decimal point between digits.
            let prev_digit = i > 0 && chars[i - 1].is_ascii_digit();
            let next_digit = i + 1 < chars.len() && chars[i + 1].is_ascii_digit();
            if prev_digit && next_digit {
                return false;
            }
        }

        // (iii) unbalanced parens unless the very next char closes them.
        if paren_depth > 0 {
            let next_closes = chars.get(i + 1) == Some(&')');
            if !next_closes {
                return false;
            }
        }

        if c == '.' {
            let word = Self::preceding_word(chars, i);
            if !word.is_empty() && is_abbreviation(&word) {
                if is_title(&word) {
                    // (iv) titles never split before a name, no exceptions.
                    return false;
                }
                // Non-title abbreviations still split if what follows looks
                // like the start of a new sentence.
                return match Self::following_word(chars, i + 1) {
                    Some(next) => {
                        is_sentence_starter(&next)
                            || (next.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
                                && !is_abbreviation(&next))
                    }
                    None => true,
                };
            }
        }

        // Must be followed by whitespace/EOF/closing punctuation to count
        // as sentence-final rather than mid-token punctuation (e.g. "3.5").
        match chars.get(i + 1) {
            None => true,
            Some(next) => {
                next.is_whitespace() || matches!(next, '"' | '\'' | ')' | ']' | '}')
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(text: &str) -> Vec<String> {
        SentenceSplitter::new().split(text)
    }

    #[test]
    fn splits_on_simple_periods() {
        let s = split("This is one sentence. This is another.");
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn does_not_split_on_ellipsis() {
        let s = split("Wait for it... Here it comes!");
        assert_eq!(s.len(), 1);
        assert!(s[0].contains("Here it comes"));
    }

    #[test]
    fn does_not_split_decimal_points() {
        let s = split("The value is 3.14 and it matters.");
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn title_abbreviation_never_splits_before_name() {
        let s = split("We met Dr. Smith yesterday.");
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn non_title_abbreviation_splits_before_capitalized_sentence_starter() {
        let s = split("They made great progress etc. However, more work remains.");
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn paragraph_break_always_terminates() {
        let s = split("First paragraph here\n\nSecond paragraph here");
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn trailing_quote_is_absorbed() {
        let s = split("She said \"hello.\" Then she left.");
        assert_eq!(s.len(), 2);
        assert!(s[0].ends_with('"'));
    }

    #[test]
    fn unbalanced_paren_suppresses_split_unless_closing() {
        let s = split("A note (see section 2. continued) ends here.");
        assert_eq!(s.len(), 1);
    }
}
