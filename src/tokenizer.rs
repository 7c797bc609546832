//! Tokenizer (spec §4.2): turns raw elements into `TokenGroup`s.

use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;

use crate::core::config::SimFunc;
use crate::core::errors::{Result, SilkMothError};
use crate::core::model::{RawElement, RawSet, Token, TokenGroup, TokenSeq, TokenizedSet};

/// Produces `TokenGroup`s from raw elements according to the configured
/// element-level similarity.
///
/// Grounded on `original_source/src/silkmoth/tokenizer.py`; the q-gram
/// slicing additionally uses grapheme clusters (not bytes) so multi-byte
/// characters are never split across a q-gram boundary, preserving the
/// Python original's code-point-aware behaviour.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    sim_func: SimFunc,
}

impl Tokenizer {
    /// Create a tokenizer for the given similarity function.
    pub fn new(sim_func: SimFunc) -> Self {
        Self { sim_func }
    }

    /// Tokenize an entire raw set.
    pub fn tokenize_set(&self, raw: &RawSet) -> Result<TokenizedSet> {
        raw.iter()
            .enumerate()
            .map(|(idx, elem)| self.tokenize_element(idx, elem))
            .collect()
    }

    /// Tokenize a single element, warning (but not failing) on empty input.
    fn tokenize_element(&self, idx: usize, elem: &RawElement) -> Result<TokenGroup> {
        let joined = coerce_to_string(elem)?;
        let words: Vec<&str> = joined.split_whitespace().collect();
        if words.is_empty() {
            warn!(element_index = idx, "element is empty and will be skipped");
            return Ok(TokenGroup::Empty);
        }

        match self.sim_func {
            SimFunc::Jaccard => {
                let set = words.into_iter().map(|w| w.to_string()).collect();
                Ok(TokenGroup::Set(set))
            }
            SimFunc::Edit | SimFunc::NormEdit => {
                // q is supplied by callers that need q-grams (candidate
                // selection, signature generation); the stored group keeps
                // only the normalized joined text's word boundaries so that
                // q can change without re-tokenizing raw input. The engine
                // re-derives q-grams via `Tokenizer::q_grams` at the
                // currently configured `q`.
                Ok(TokenGroup::Sequence(
                    words.into_iter().map(|w| w.to_string()).collect::<TokenSeq>(),
                ))
            }
        }
    }

    /// Join an element's (possibly cached) word tokens back into the
    /// normalized string used as the basis for q-gram slicing.
    pub fn joined_words(words: &[Token]) -> String {
        words.join(" ")
    }

    /// Step-1 sliding-window q-grams over an element's joined string, used
    /// for matching and inverted-index construction under edit similarity.
    pub fn q_grams(words: &[Token], q: usize) -> Vec<Token> {
        let joined = Self::joined_words(words);
        let graphemes: Vec<&str> = joined.graphemes(true).collect();
        if graphemes.len() < q {
            return Vec::new();
        }
        (0..=graphemes.len() - q)
            .map(|i| graphemes[i..i + q].concat())
            .collect()
    }

    /// Non-overlapping, step-q chunks over an element's joined string, used
    /// only by signature construction (spec §4.4).
    pub fn q_chunks(words: &[Token], q: usize) -> Vec<Token> {
        let joined = Self::joined_words(words);
        let graphemes: Vec<&str> = joined.graphemes(true).collect();
        if graphemes.len() < q {
            return Vec::new();
        }
        let mut chunks = Vec::new();
        let mut j = 0;
        while j + q <= graphemes.len() {
            chunks.push(graphemes[j..j + q].concat());
            j += q;
        }
        chunks
    }
}

/// Coerce a raw element to its flattened string form
/// (`original_source/utils.py::flatten_tokens`): scalars stringify directly,
/// nested sequences flatten with a `" "` separator.
fn coerce_to_string(elem: &RawElement) -> Result<String> {
    match elem {
        RawElement::Scalar(s) => Ok(s.clone()),
        RawElement::Sequence(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    RawElement::Scalar(s) => parts.push(s.clone()),
                    RawElement::Sequence(_) => {
                        return Err(SilkMothError::unsupported_element_type(
                            "nested sequences deeper than one level are not supported",
                        ))
                    }
                }
            }
            Ok(parts.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_tokenizes_on_whitespace() {
        let tok = Tokenizer::new(SimFunc::Jaccard);
        let raw: RawSet = vec!["77 Mass Ave Boston MA".to_string()].into();
        let tokenized = tok.tokenize_set(&raw).unwrap();
        match &tokenized[0] {
            TokenGroup::Set(set) => {
                assert_eq!(set.len(), 5);
                assert!(set.contains("Mass"));
            }
            _ => panic!("expected a Set group"),
        }
    }

    #[test]
    fn empty_element_yields_empty_group_with_warning() {
        let tok = Tokenizer::new(SimFunc::Jaccard);
        let raw: RawSet = vec!["   ".to_string()].into();
        let tokenized = tok.tokenize_set(&raw).unwrap();
        assert!(tokenized[0].is_empty());
    }

    #[test]
    fn q_grams_step_one_reconstructs_joined_string() {
        let words = vec!["abc".to_string(), "def".to_string()];
        let grams = Tokenizer::q_grams(&words, 3);
        assert_eq!(grams.len(), "abc def".len() - 3 + 1);
        assert_eq!(crate::core::model::reverse_qgrams(&grams), "abc def");
    }

    #[test]
    fn q_chunks_are_non_overlapping() {
        let words = vec!["abcdefgh".to_string()];
        let chunks = Tokenizer::q_chunks(&words, 3);
        assert_eq!(chunks, vec!["abc", "def"]);
    }

    #[test]
    fn flatten_tokens_joins_nested_sequence() {
        let elem = RawElement::Sequence(vec!["a".into(), "b".into()]);
        assert_eq!(coerce_to_string(&elem).unwrap(), "a b");
    }
}
