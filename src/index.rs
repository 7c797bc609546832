//! Inverted index (spec §4.3).

use indexmap::IndexMap;

use crate::core::config::SimFunc;
use crate::core::errors::{Result, SilkMothError};
use crate::core::model::{Posting, Token, TokenizedSet};
use crate::tokenizer::Tokenizer;

/// Maps tokens to ordered, deduplicated posting lists, and owns the
/// tokenized source collection.
///
/// Grounded on `original_source/src/silkmoth/inverted_index.py`: postings are
/// appended in encounter order and a posting is skipped if identical to the
/// immediately preceding one (collapsing duplicate tokens within a single
/// element). Under edit similarity the index is built over step-1 q-grams
/// rather than whitespace tokens, re-derived from each element's stored word
/// boundaries at the configured `q` (spec §4.2).
#[derive(Debug, Clone)]
pub struct InvertedIndex {
    lookup: IndexMap<Token, Vec<Posting>>,
    token_sets: Vec<TokenizedSet>,
}

impl InvertedIndex {
    /// Build an index from already-tokenized source sets.
    pub fn build(token_sets: Vec<TokenizedSet>, sim_func: SimFunc, q: usize) -> Self {
        let mut lookup: IndexMap<Token, Vec<Posting>> = IndexMap::new();

        for (set_idx, token_set) in token_sets.iter().enumerate() {
            for (elem_idx, group) in token_set.iter().enumerate() {
                let posting = Posting::new(set_idx, elem_idx);
                let tokens: Vec<Token> = match (sim_func.is_edit(), group.words()) {
                    (true, Some(words)) => Tokenizer::q_grams(words, q),
                    _ => group.iter().cloned().collect(),
                };
                for token in tokens {
                    let entries = lookup.entry(token).or_default();
                    if entries.last() != Some(&posting) {
                        entries.push(posting);
                    }
                }
            }
        }

        Self { lookup, token_sets }
    }

    /// Ordered posting list for a token. Unknown tokens are a caller-level
    /// concern (spec §7: locally suppressed); this returns an empty slice
    /// rather than an error so hot-path probes don't pay for `Result`
    /// unwrapping, matching how `postings_in_set` and candidate probing treat
    /// absent tokens.
    pub fn postings(&self, token: &str) -> &[Posting] {
        self.lookup.get(token).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Postings for `token` restricted to a single set, located via binary
    /// search over the sorted, contiguous posting list (O(log n)).
    pub fn postings_in_set(&self, token: &str, set_idx: usize) -> &[Posting] {
        let postings = self.postings(token);
        let start = postings.partition_point(|p| p.set_idx < set_idx);
        let end = postings.partition_point(|p| p.set_idx <= set_idx);
        &postings[start..end]
    }

    /// Access the tokenized source set at `set_idx`.
    pub fn set(&self, set_idx: usize) -> Result<&TokenizedSet> {
        self.token_sets
            .get(set_idx)
            .ok_or_else(|| SilkMothError::invalid_set_id(set_idx, self.token_sets.len()))
    }

    /// Number of source sets stored in the index.
    pub fn len(&self) -> usize {
        self.token_sets.len()
    }

    /// True if the index holds no source sets.
    pub fn is_empty(&self) -> bool {
        self.token_sets.is_empty()
    }

    /// All known tokens, in first-seen order.
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.lookup.keys()
    }

    /// Cost of a token for signature generation: its posting-list length, or
    /// `f64::INFINITY` if the token is absent from the index (spec §4.4's
    /// greedy heap deprioritizes unknown tokens this way).
    pub fn token_cost(&self, token: &str) -> f64 {
        let postings = self.postings(token);
        if postings.is_empty() {
            f64::INFINITY
        } else {
            postings.len() as f64
        }
    }
}
