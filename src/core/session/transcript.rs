//! Sentence assembly for streamed assistant transcripts.
//!
//! Deltas arrive a few characters at a time. Complete clauses are cut at
//! ASCII or full-width punctuation and emitted as soon as they close; the
//! unterminated tail is carried over as the remainder.

/// Returns true for characters that close a clause.
#[inline]
pub fn is_boundary(c: char) -> bool {
    matches!(
        c,
        ',' | '.' | '?' | '!' | ':' | '，' | '。' | '？' | '！' | '：'
    )
}

/// Split `remainder + new_text` into completed sentences and a new remainder.
///
/// A fragment closed by a boundary is emitted only if it contains at least
/// one alphanumeric character; otherwise it is dropped. Either way the
/// accumulator restarts after the boundary.
pub fn feed(remainder: &str, new_text: &str) -> (Vec<String>, String) {
    let mut sentences = Vec::new();
    let mut current = String::with_capacity(remainder.len() + new_text.len());
    current.push_str(remainder);

    for c in new_text.chars() {
        current.push(c);
        if is_boundary(c) {
            if current.chars().any(char::is_alphanumeric) {
                sentences.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }

    (sentences, current)
}

/// Stateful wrapper around [`feed`] that owns the remainder.
#[derive(Debug, Clone, Default)]
pub struct TranscriptAssembler {
    remainder: String,
}

impl TranscriptAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one delta and return the sentences it completed.
    pub fn push(&mut self, delta: &str) -> Vec<String> {
        let (sentences, remainder) = feed(&self.remainder, delta);
        self.remainder = remainder;
        sentences
    }

    /// Text received since the last boundary.
    pub fn remainder(&self) -> &str {
        &self.remainder
    }

    /// Take the remainder, leaving the assembler empty.
    pub fn take_remainder(&mut self) -> String {
        std::mem::take(&mut self.remainder)
    }

    pub fn reset(&mut self) {
        self.remainder.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_at_punctuation() {
        let (sentences, remainder) = feed("", "Hello, world. How are");
        assert_eq!(sentences, vec!["Hello,", " world."]);
        assert_eq!(remainder, " How are");
    }

    #[test]
    fn test_remainder_is_carried_over() {
        let (sentences, remainder) = feed("Hel", "lo!");
        assert_eq!(sentences, vec!["Hello!"]);
        assert!(remainder.is_empty());
    }

    #[test]
    fn test_full_width_punctuation() {
        let (sentences, remainder) = feed("", "你好，世界。今天");
        assert_eq!(sentences, vec!["你好，", "世界。"]);
        assert_eq!(remainder, "今天");

        let (sentences, _) = feed("", "注意：小心！");
        assert_eq!(sentences, vec!["注意：", "小心！"]);
    }

    #[test]
    fn test_colon_is_boundary() {
        let (sentences, remainder) = feed("", "Note: done");
        assert_eq!(sentences, vec!["Note:"]);
        assert_eq!(remainder, " done");
    }

    #[test]
    fn test_punctuation_only_fragments_are_dropped() {
        let (sentences, remainder) = feed("", "...Hi.");
        // "." alone has no alphanumeric and resets the accumulator.
        assert_eq!(sentences, vec!["Hi."]);
        assert!(remainder.is_empty());

        let (sentences, remainder) = feed("  ", "?!");
        assert!(sentences.is_empty());
        assert!(remainder.is_empty());
    }

    #[test]
    fn test_concatenation_reproduces_input() {
        let deltas = ["The wea", "ther is ni", "ce. Shall we", " go out? Yes, le", "t's go"];
        let mut assembler = TranscriptAssembler::new();
        let mut emitted = String::new();
        for delta in deltas {
            for sentence in assembler.push(delta) {
                emitted.push_str(&sentence);
            }
        }
        emitted.push_str(assembler.remainder());
        assert_eq!(emitted, deltas.concat());
    }

    #[test]
    fn test_every_sentence_ends_at_boundary_and_has_content() {
        let mut assembler = TranscriptAssembler::new();
        let mut sentences = assembler.push("One. Two, three? 4! five");
        sentences.extend(assembler.push(" six."));
        for sentence in &sentences {
            assert!(is_boundary(sentence.chars().last().unwrap()));
            assert!(sentence.chars().any(char::is_alphanumeric));
        }
        assert_eq!(sentences.len(), 5);
    }

    #[test]
    fn test_take_remainder_and_reset() {
        let mut assembler = TranscriptAssembler::new();
        assert!(assembler.push("Hello there").is_empty());
        assert_eq!(assembler.take_remainder(), "Hello there");
        assert_eq!(assembler.remainder(), "");

        assembler.push("partial");
        assembler.reset();
        assert_eq!(assembler.remainder(), "");
    }
}
