//! Sentence-like splitting of policy text.

use crate::config::{CHUNK_DELIMITER, MIN_CHUNK_CHARS};

/// A chunk of text cut from a source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Index of this chunk among the kept chunks of its document (0-based)
    pub index: usize,
    /// Trimmed piece with its trailing delimiter restored
    pub text: String,
}

/// Splits text on a literal delimiter and keeps pieces long enough to be
/// meaningful on their own.
///
/// Every piece is trimmed and kept only when it is longer than `min_chars`
/// Unicode scalar values. Kept pieces get the delimiter re-appended. There is
/// no overlap and no deduplication, so a sentence repeated in the source is
/// repeated in the output.
#[derive(Debug, Clone, Copy)]
pub struct SentenceSplitter {
    delimiter: char,
    min_chars: usize,
}

impl Default for SentenceSplitter {
    fn default() -> Self {
        Self::new(MIN_CHUNK_CHARS)
    }
}

impl SentenceSplitter {
    pub fn new(min_chars: usize) -> Self {
        Self {
            delimiter: CHUNK_DELIMITER,
            min_chars,
        }
    }

    pub fn min_chars(&self) -> usize {
        self.min_chars
    }

    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        text.split(self.delimiter)
            .map(str::trim)
            .filter(|piece| piece.chars().count() > self.min_chars)
            .enumerate()
            .map(|(index, piece)| TextChunk {
                index,
                text: format!("{}{}", piece, self.delimiter),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: Vec<TextChunk>) -> Vec<String> {
        chunks.into_iter().map(|c| c.text).collect()
    }

    #[test]
    fn test_short_pieces_dropped_and_period_restored() {
        let text = "Leave can be carried forward up to 10 days. Notice period is 30 days.";
        let chunks = SentenceSplitter::default().split(text);
        // "Notice period is 30 days" is 24 characters and falls under the minimum
        assert_eq!(
            texts(chunks),
            vec!["Leave can be carried forward up to 10 days."]
        );
    }

    #[test]
    fn test_pieces_are_trimmed_and_indexed() {
        let text = "\n  Employees may work from home two days per week.\n\n   \
                    The notice period for all permanent staff is 30 days.  ";
        let chunks = SentenceSplitter::default().split(text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(
            chunks[0].text,
            "Employees may work from home two days per week."
        );
        assert_eq!(chunks[1].index, 1);
        assert_eq!(
            chunks[1].text,
            "The notice period for all permanent staff is 30 days."
        );
    }

    #[test]
    fn test_minimum_is_exclusive_and_counts_chars() {
        let exactly_30 = "a".repeat(30);
        let just_over = "b".repeat(31);
        let text = format!("{}.{}.", exactly_30, just_over);
        assert_eq!(
            texts(SentenceSplitter::default().split(&text)),
            vec![format!("{}.", just_over)]
        );

        // 31 scalar values, 62 bytes
        let accented = "é".repeat(31);
        assert_eq!(SentenceSplitter::default().split(&accented).len(), 1);
        assert!(SentenceSplitter::default().split(&"é".repeat(30)).is_empty());
    }

    #[test]
    fn test_no_dedup() {
        let sentence = "All employees must complete the annual compliance training";
        let text = format!("{s}. {s}.", s = sentence);
        assert_eq!(SentenceSplitter::default().split(&text).len(), 2);
    }

    #[test]
    fn test_empty_and_delimiter_only() {
        let splitter = SentenceSplitter::default();
        assert!(splitter.split("").is_empty());
        assert!(splitter.split("....").is_empty());
    }

    #[test]
    fn test_decimal_points_split_literally() {
        let text = "The relocation allowance is 1.5 times the monthly base salary.";
        let chunks = SentenceSplitter::default().split(text);
        // "The relocation allowance is 1" (29 chars) is dropped
        assert_eq!(texts(chunks), vec!["5 times the monthly base salary."]);
    }
}
