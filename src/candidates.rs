//! Candidate selection and refinement (spec §4.5): probe + size filter,
//! check filter, and nearest-neighbour filter.
//!
//! Grounded on `original_source/src/silkmoth/candidate_selector.py`'s
//! `get_candidates`/`verify_size`, `check_filter`/`create_match_map`, and
//! `nn_filter`/`_nn_search`/`calc_base_loss`.

use std::collections::HashSet;

use indexmap::IndexMap;
use indexmap::IndexSet;

use crate::core::config::{EngineConfig, SimFunc, SimMetric};
use crate::core::model::{Token, TokenGroup, TokenizedSet};
use crate::index::InvertedIndex;
use crate::similarity::{edit_similarity, jaccard_similarity, norm_edit_similarity};
use crate::tokenizer::Tokenizer;

/// `r_idx -> max similarity`, dense over `0..reference.len()` since `|R|` is
/// known up front; `None` means `r_i` has no recorded match.
pub type MatchMap = Vec<Option<f64>>;

/// Implements the probe, check, and NN refinement steps over an
/// [`InvertedIndex`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateSelector;

impl CandidateSelector {
    /// Construct a candidate selector.
    pub fn new() -> Self {
        Self
    }

    /// Candidate probe: every source set containing at least one signature
    /// token, restricted by the size filter.
    pub fn get_candidates(
        &self,
        signature: &[Token],
        index: &InvertedIndex,
        ref_size: usize,
        config: &EngineConfig,
    ) -> HashSet<usize> {
        let mut candidates = HashSet::new();
        for token in signature {
            for posting in index.postings(token) {
                if candidates.contains(&posting.set_idx) {
                    continue;
                }
                let src_size = index
                    .set(posting.set_idx)
                    .map(TokenizedSet::len)
                    .unwrap_or(0);
                if verify_size(ref_size, src_size, config) {
                    candidates.insert(posting.set_idx);
                }
            }
        }
        candidates
    }

    /// Check filter: drop candidates that cannot provide, for any single
    /// `r_i`, an element meeting the per-element loss bound.
    pub fn check_filter(
        &self,
        reference: &TokenizedSet,
        signature: &IndexSet<Token>,
        candidates: &HashSet<usize>,
        index: &InvertedIndex,
        config: &EngineConfig,
    ) -> (HashSet<usize>, IndexMap<usize, MatchMap>) {
        let k_i_sets: Vec<IndexSet<Token>> = reference
            .iter()
            .map(|group| element_signature_tokens(group, config.sim_func, config.q, signature))
            .collect();

        let mut filtered = HashSet::new();
        let mut match_map = IndexMap::new();
        for &c_idx in candidates {
            let matched = self.create_match_map(reference, &k_i_sets, c_idx, index, config);
            if matched.iter().any(Option::is_some) {
                filtered.insert(c_idx);
                match_map.insert(c_idx, matched);
            }
        }
        (filtered, match_map)
    }

    fn create_match_map(
        &self,
        reference: &TokenizedSet,
        k_i_sets: &[IndexSet<Token>],
        c_idx: usize,
        index: &InvertedIndex,
        config: &EngineConfig,
    ) -> MatchMap {
        let mut matched = vec![None; reference.len()];
        let Ok(candidate_set) = index.set(c_idx) else {
            return matched;
        };

        for (r_idx, (r_group, k_i)) in reference.iter().zip(k_i_sets.iter()).enumerate() {
            if r_group.is_empty() || k_i.is_empty() {
                continue;
            }

            let r_len = element_r_len(r_group, config.sim_func, config.q);
            let threshold = check_filter_threshold(r_len, k_i.len(), config.sim_func, config.q);

            let mut max_sim = 0.0;
            for token in k_i {
                for posting in index.postings_in_set(token, c_idx) {
                    let elem = &candidate_set[posting.elem_idx];
                    let sim = element_similarity(r_group, elem, config.sim_func, config.alpha, config.q);
                    if sim >= threshold {
                        max_sim = f64::max(max_sim, sim);
                    }
                }
            }

            if max_sim >= threshold {
                matched[r_idx] = Some(max_sim);
            }
        }

        matched
    }

    /// Nearest-neighbour filter (Algorithm 2 from the SILKMOTH paper):
    /// bounds relatedness from above using per-`r_i` nearest-neighbour
    /// similarities, aborting early once the running total can no longer
    /// reach `θ = δ·|R|`.
    pub fn nn_filter(
        &self,
        reference: &TokenizedSet,
        signature: &IndexSet<Token>,
        candidates: &HashSet<usize>,
        index: &InvertedIndex,
        match_map: &IndexMap<usize, MatchMap>,
        config: &EngineConfig,
    ) -> HashSet<usize> {
        let n = reference.len();
        let theta = config.delta * n as f64;

        let k_i_sets: Vec<IndexSet<Token>> = reference
            .iter()
            .map(|group| element_signature_tokens(group, config.sim_func, config.q, signature))
            .collect();
        let r_lens: Vec<usize> = reference
            .iter()
            .map(|g| element_r_len(g, config.sim_func, config.q))
            .collect();

        let total_init: f64 = (0..n)
            .filter(|&i| !reference[i].is_empty())
            .map(|i| base_loss(r_lens[i], k_i_sets[i].len(), config.sim_func, config.q))
            .sum();

        let mut final_filtered = HashSet::new();
        for &c_idx in candidates {
            let Ok(candidate_set) = index.set(c_idx) else {
                continue;
            };
            let candidate_tokens: IndexSet<Token> = if config.alpha > 0.0 {
                candidate_set
                    .iter()
                    .flat_map(|elem| candidate_element_tokens(elem, config.sim_func, config.q))
                    .collect()
            } else {
                IndexSet::new()
            };

            let matched = match_map.get(&c_idx);
            let mut total = total_init;

            if let Some(matched) = matched {
                for (r_idx, sim) in matched.iter().enumerate() {
                    if let Some(sim) = sim {
                        if reference[r_idx].is_empty() {
                            continue;
                        }
                        let loss = base_loss(r_lens[r_idx], k_i_sets[r_idx].len(), config.sim_func, config.q);
                        total += sim - loss;
                    }
                }
            }

            let mut passed = true;
            for r_idx in 0..n {
                if reference[r_idx].is_empty() {
                    continue;
                }
                if matched.map(|m| m[r_idx].is_some()).unwrap_or(false) {
                    continue;
                }
                let k_i = &k_i_sets[r_idx];
                let loss = base_loss(r_lens[r_idx], k_i.len(), config.sim_func, config.q);

                let m_i = ((1.0 - config.alpha) * r_lens[r_idx] as f64).floor() as usize + 1;
                let shortcut = config.alpha > 0.0
                    && k_i.len() >= m_i
                    && k_i.is_disjoint(&candidate_tokens);

                let nn_sim = if shortcut {
                    0.0
                } else {
                    self.nn_search(&reference[r_idx], candidate_set, c_idx, index, config)
                };

                total += nn_sim - loss;
                if total < theta {
                    passed = false;
                    break;
                }
            }

            if passed && total >= theta {
                final_filtered.insert(c_idx);
            }
        }

        final_filtered
    }

    fn nn_search(
        &self,
        r_group: &TokenGroup,
        candidate_set: &TokenizedSet,
        c_idx: usize,
        index: &InvertedIndex,
        config: &EngineConfig,
    ) -> f64 {
        let mut max_sim = 0.0f64;
        let r_tokens = element_r_tokens(r_group, config.sim_func, config.q);
        for token in &r_tokens {
            for posting in index.postings_in_set(token, c_idx) {
                let elem = &candidate_set[posting.elem_idx];
                let sim = element_similarity(r_group, elem, config.sim_func, config.alpha, config.q);
                max_sim = f64::max(max_sim, sim);
            }
        }
        max_sim
    }
}

/// Whether `ref_size` and `src_size` could possibly be related under the
/// configured set-level metric.
fn verify_size(ref_size: usize, src_size: usize, config: &EngineConfig) -> bool {
    match config.sim_metric {
        SimMetric::SetContainment => ref_size <= src_size,
        SimMetric::SetSimilarity => {
            let lo = ref_size.min(src_size) as f64;
            let hi = ref_size.max(src_size) as f64;
            lo >= config.delta * hi
        }
    }
}

/// `r_i`'s own token multiset intersected with the signature: the element's
/// words for Jaccard, or its q-grams for edit-based similarities.
fn element_signature_tokens(
    group: &TokenGroup,
    sim_func: SimFunc,
    q: usize,
    signature: &IndexSet<Token>,
) -> IndexSet<Token> {
    element_r_tokens(group, sim_func, q)
        .into_iter()
        .filter(|t| signature.contains(t))
        .collect()
}

/// `r_i`'s full token multiset (deduplicated), in the token space used for
/// this similarity function.
fn element_r_tokens(group: &TokenGroup, sim_func: SimFunc, q: usize) -> IndexSet<Token> {
    if sim_func.is_edit() {
        match group.words() {
            Some(words) => Tokenizer::q_grams(words, q).into_iter().collect(),
            None => IndexSet::new(),
        }
    } else {
        group.as_set()
    }
}

/// Tokens contributed by a candidate-set element to the NN filter's
/// disjointness shortcut, in the same token space as `element_r_tokens`.
fn candidate_element_tokens(group: &TokenGroup, sim_func: SimFunc, q: usize) -> IndexSet<Token> {
    element_r_tokens(group, sim_func, q)
}

/// `|r_i|` as used in the loss-bound formulas: the q-gram *list* length
/// (duplicates counted) for edit-based similarities, the distinct word count
/// for Jaccard.
fn element_r_len(group: &TokenGroup, sim_func: SimFunc, q: usize) -> usize {
    if sim_func.is_edit() {
        match group.words() {
            Some(words) => Tokenizer::q_grams(words, q).len(),
            None => 0,
        }
    } else {
        group.len_as_set()
    }
}

/// The check filter's per-element acceptance threshold.
fn check_filter_threshold(r_len: usize, k_len: usize, sim_func: SimFunc, q: usize) -> f64 {
    if sim_func.is_edit() {
        let denom = r_len as f64 + (r_len as f64 / q as f64).ceil() - k_len as f64;
        if denom != 0.0 {
            r_len as f64 / denom
        } else {
            0.0
        }
    } else if r_len != 0 {
        (r_len as f64 - k_len as f64) / r_len as f64
    } else {
        0.0
    }
}

/// The NN filter's base-loss term. Distinct from [`check_filter_threshold`]
/// for edit similarities (`1 - B_i` rather than `B_i`); identical for
/// Jaccard.
fn base_loss(r_len: usize, k_len: usize, sim_func: SimFunc, q: usize) -> f64 {
    if sim_func.is_edit() {
        let denom = r_len as f64 + (r_len as f64 / q as f64).ceil() - k_len as f64;
        let b_i = if denom != 0.0 { r_len as f64 / denom } else { 0.0 };
        1.0 - b_i
    } else if r_len != 0 {
        (r_len as f64 - k_len as f64) / r_len as f64
    } else {
        0.0
    }
}

/// φ(r_i, s, α) for a reference element against a candidate element, in
/// whichever similarity space `sim_func` selects. Shared with the verifier,
/// which computes the same pairwise similarity as bipartite edge weights.
pub(crate) fn element_similarity(r_group: &TokenGroup, s_group: &TokenGroup, sim_func: SimFunc, alpha: f64, q: usize) -> f64 {
    match sim_func {
        SimFunc::Jaccard => {
            let r_set = r_group.as_set();
            let s_set = s_group.as_set();
            jaccard_similarity(r_set.iter(), s_set.iter(), alpha)
        }
        SimFunc::Edit => {
            let r_grams = r_group.words().map(|w| Tokenizer::q_grams(w, q)).unwrap_or_default();
            let s_grams = s_group.words().map(|w| Tokenizer::q_grams(w, q)).unwrap_or_default();
            edit_similarity(&r_grams, &s_grams, alpha)
        }
        SimFunc::NormEdit => {
            let r_grams = r_group.words().map(|w| Tokenizer::q_grams(w, q)).unwrap_or_default();
            let s_grams = s_group.words().map(|w| Tokenizer::q_grams(w, q)).unwrap_or_default();
            norm_edit_similarity(&r_grams, &s_grams, alpha)
        }
    }
}
