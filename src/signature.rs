//! Signature generation (spec §4.4): chooses a subset of the reference set's
//! tokens cheap enough to probe the inverted index with, while still
//! guaranteeing every source within the δ-relatedness threshold shares at
//! least one signature token with the reference.
//!
//! Grounded line-for-line on
//! `original_source/src/silkmoth/signature_generator.py`'s greedy loop: a
//! min-heap of `cost / value` ratios, `total_loss` bookkeeping against the
//! `θ = δ·|R|` budget, and the δ=1 "cover every element" edge case. SKYLINE
//! and DICHOTOMY build on the WEIGHTED base per element; the edit-similarity
//! q-bound infeasibility fallback and the α-augmented WEIGHTED variant follow
//! spec §4.4 exactly.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use indexmap::IndexSet;
use tracing::warn;

use crate::core::config::{EngineConfig, SigType, SimFunc};
use crate::core::errors::{Result, SilkMothError};
use crate::core::model::{Token, TokenGroup, TokenizedSet};
use crate::index::InvertedIndex;
use crate::similarity::OrderedF64;
use crate::tokenizer::Tokenizer;

/// Produces signatures for a reference set under a given [`EngineConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureGenerator;

impl SignatureGenerator {
    /// Construct a signature generator.
    pub fn new() -> Self {
        Self
    }

    /// Compute the signature for `reference` under `config`, probing `index`
    /// for token costs.
    pub fn generate(
        &self,
        reference: &TokenizedSet,
        index: &InvertedIndex,
        config: &EngineConfig,
    ) -> Result<Vec<Token>> {
        match config.sig_type {
            SigType::Weighted => {
                let base = weighted_base(reference, index, config.delta, config.sim_func, config.q)?;
                if config.sim_func.is_edit() && config.alpha > 0.0 {
                    Ok(augment_edit_alpha(reference, index, base, config.alpha, config.q))
                } else {
                    Ok(base)
                }
            }
            SigType::Skyline => skyline_core(reference, index, config),
            SigType::Dichotomy => dichotomy_core(reference, index, config),
        }
    }
}

/// The per-element token set used for signature purposes: the element's word
/// set under Jaccard, or its deduplicated non-overlapping q-chunks under an
/// edit-based similarity (spec §4.4's WEIGHTED edit variant uses q-chunks as
/// its token space, and SKYLINE/DICHOTOMY inherit that choice).
fn element_token_set(group: &TokenGroup, sim_func: SimFunc, q: usize) -> IndexSet<Token> {
    if sim_func.is_edit() {
        match group.words() {
            Some(words) => Tokenizer::q_chunks(words, q).into_iter().collect(),
            None => IndexSet::new(),
        }
    } else {
        group.as_set()
    }
}

fn weighted_base(
    reference: &TokenizedSet,
    index: &InvertedIndex,
    delta: f64,
    sim_func: SimFunc,
    q: usize,
) -> Result<Vec<Token>> {
    if sim_func.is_edit() {
        weighted_edit_core(reference, index, delta, q)
    } else {
        Ok(weighted_greedy(
            &reference
                .iter()
                .map(|g| element_token_set(g, sim_func, q))
                .collect::<Vec<_>>(),
            index,
            delta,
        ))
    }
}

/// Greedy minimum-cost signature over a fixed token space: a min-heap of
/// `cost / value` ratios is drained until the aggregate per-element loss
/// drops below `θ = δ·n`, mirroring the original's `total_loss` bookkeeping.
fn weighted_greedy(element_sets: &[IndexSet<Token>], index: &InvertedIndex, delta: f64) -> Vec<Token> {
    if delta <= 0.0 {
        return Vec::new();
    }
    let n = element_sets.len();
    let theta = delta * n as f64;
    let r_sizes: Vec<usize> = element_sets.iter().map(IndexSet::len).collect();

    let mut token_value: HashMap<Token, f64> = HashMap::new();
    for set in element_sets {
        if set.is_empty() {
            continue;
        }
        let weight = 1.0 / set.len() as f64;
        for t in set {
            *token_value.entry(t.clone()).or_insert(0.0) += weight;
        }
    }

    let mut heap: BinaryHeap<Reverse<(OrderedF64, Token)>> = BinaryHeap::new();
    for (t, value) in &token_value {
        if *value <= 0.0 {
            continue;
        }
        let cost = index.token_cost(t);
        heap.push(Reverse((OrderedF64(cost / value), t.clone())));
    }

    let mut selected: IndexSet<Token> = IndexSet::new();
    let mut k_counts = vec![0usize; n];
    let mut total_loss = n as f64;

    while !heap.is_empty() && total_loss >= theta {
        let Reverse((OrderedF64(ratio), t)) = heap.pop().unwrap();
        if selected.contains(&t) {
            continue;
        }
        if ratio.is_infinite() {
            break;
        }
        selected.insert(t);
        for i in 0..n {
            if r_sizes[i] == 0 {
                continue;
            }
            k_counts[i] = element_sets[i].intersection(&selected).count();
        }
        total_loss = (0..n)
            .filter(|&i| r_sizes[i] > 0)
            .map(|i| (r_sizes[i] - k_counts[i]) as f64 / r_sizes[i] as f64)
            .sum();
    }

    // At delta = 1 every nonempty element must be covered by at least one
    // signature token; the aggregate loss bound alone can be satisfied while
    // leaving individual elements untouched, so top up any stragglers with
    // their own cheapest token.
    if delta >= 1.0 {
        for i in 0..n {
            if r_sizes[i] == 0 || k_counts[i] > 0 {
                continue;
            }
            if let Some(cheapest) = element_sets[i]
                .iter()
                .min_by(|a, b| index.token_cost(a).partial_cmp(&index.token_cost(b)).unwrap())
            {
                selected.insert(cheapest.clone());
            }
        }
    }

    selected.into_iter().collect()
}

/// WEIGHTED edit-similarity core: q-chunks as the token space, with a
/// brute-force fallback when `q` makes no weighted signature feasible.
fn weighted_edit_core(
    reference: &TokenizedSet,
    index: &InvertedIndex,
    delta: f64,
    q: usize,
) -> Result<Vec<Token>> {
    if delta <= 0.0 {
        return Ok(Vec::new());
    }
    if delta >= 1.0 {
        return Err(SilkMothError::config(
            "delta must be in (0, 1) for edit-similarity signatures",
        ));
    }

    let q_bound = delta / (1.0 - delta);
    if (q as f64) >= q_bound {
        warn!(
            q,
            delta, q_bound, "no valid weighted signature exists at this q; falling back to brute-force q-chunks"
        );
        let mut all = IndexSet::new();
        for group in reference {
            if let Some(words) = group.words() {
                for chunk in Tokenizer::q_chunks(words, q) {
                    all.insert(chunk);
                }
            }
        }
        return Ok(all.into_iter().collect());
    }

    let element_sets: Vec<IndexSet<Token>> = reference
        .iter()
        .map(|g| element_token_set(g, SimFunc::Edit, q))
        .collect();
    Ok(weighted_greedy(&element_sets, index, delta))
}

/// Augments an edit-similarity WEIGHTED signature so every element also
/// satisfies sim-thresh validity at threshold `α` (spec §4.4): per element,
/// add the cheapest uncovered q-chunks until at least `m_i` are selected.
fn augment_edit_alpha(
    reference: &TokenizedSet,
    index: &InvertedIndex,
    base: Vec<Token>,
    alpha: f64,
    q: usize,
) -> Vec<Token> {
    let mut selected: IndexSet<Token> = base.into_iter().collect();
    for group in reference {
        let words = match group.words() {
            Some(w) => w,
            None => continue,
        };
        let chunk_set: IndexSet<Token> = Tokenizer::q_chunks(words, q).into_iter().collect();
        if chunk_set.is_empty() {
            continue;
        }
        let m_i = ((1.0 - alpha) * chunk_set.len() as f64).floor() as usize + 1;
        let mut have = selected.intersection(&chunk_set).count();
        if have >= m_i {
            continue;
        }
        let mut remaining: Vec<Token> = chunk_set
            .iter()
            .filter(|c| !selected.contains(*c))
            .cloned()
            .collect();
        remaining.sort_by(|a, b| {
            index
                .token_cost(a)
                .partial_cmp(&index.token_cost(b))
                .unwrap()
                .then_with(|| a.cmp(b))
        });
        for chunk in remaining {
            if have >= m_i {
                break;
            }
            selected.insert(chunk);
            have += 1;
        }
    }
    selected.into_iter().collect()
}

/// SKYLINE scheme: per element, either take the full WEIGHTED intersection
/// (if it's already under the `m_i` cap) or the `m_i` cheapest tokens of the
/// element, guaranteeing sim-thresh validity at `α` regardless of `δ`.
fn skyline_core(reference: &TokenizedSet, index: &InvertedIndex, config: &EngineConfig) -> Result<Vec<Token>> {
    let weighted: IndexSet<Token> =
        weighted_base(reference, index, config.delta, config.sim_func, config.q)?
            .into_iter()
            .collect();

    let mut out: IndexSet<Token> = IndexSet::new();
    for group in reference {
        if group.is_empty() {
            continue;
        }
        let r_i = element_token_set(group, config.sim_func, config.q);
        if r_i.is_empty() {
            continue;
        }
        let k_i: IndexSet<Token> = weighted.intersection(&r_i).cloned().collect();
        let m_i = ((1.0 - config.alpha) * r_i.len() as f64).floor() as usize + 1;

        if k_i.len() < m_i {
            out.extend(k_i);
        } else {
            let mut tokens: Vec<Token> = k_i.into_iter().collect();
            tokens.sort_by(|a, b| {
                index
                    .token_cost(a)
                    .partial_cmp(&index.token_cost(b))
                    .unwrap()
                    .then_with(|| a.cmp(b))
            });
            out.extend(tokens.into_iter().take(m_i));
        }
    }
    Ok(out.into_iter().collect())
}

/// DICHOTOMY scheme: per element, take the WEIGHTED intersection if it's a
/// subset of the `m_i` cheapest tokens, otherwise take the whole element.
fn dichotomy_core(reference: &TokenizedSet, index: &InvertedIndex, config: &EngineConfig) -> Result<Vec<Token>> {
    let weighted: IndexSet<Token> =
        weighted_base(reference, index, config.delta, config.sim_func, config.q)?
            .into_iter()
            .collect();

    let mut out: IndexSet<Token> = IndexSet::new();
    for group in reference {
        if group.is_empty() {
            continue;
        }
        let r_i = element_token_set(group, config.sim_func, config.q);
        if r_i.is_empty() {
            continue;
        }
        let k_i: IndexSet<Token> = weighted.intersection(&r_i).cloned().collect();
        let m_i_size = ((1.0 - config.alpha) * r_i.len() as f64).floor() as usize + 1;

        let mut by_cost: Vec<Token> = r_i.iter().cloned().collect();
        by_cost.sort_by(|a, b| {
            index
                .token_cost(a)
                .partial_cmp(&index.token_cost(b))
                .unwrap()
                .then_with(|| a.cmp(b))
        });
        let m_i: IndexSet<Token> = by_cost.into_iter().take(m_i_size).collect();

        if k_i.is_subset(&m_i) {
            out.extend(k_i);
        } else {
            out.extend(r_i);
        }
    }
    Ok(out.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{SigType, SimMetric};
    use crate::core::model::RawSet;

    fn jaccard_index(sets: Vec<Vec<&str>>) -> (InvertedIndex, Vec<TokenizedSet>) {
        let tok = Tokenizer::new(SimFunc::Jaccard);
        let token_sets: Vec<TokenizedSet> = sets
            .into_iter()
            .map(|s| {
                let raw: RawSet = s.into();
                tok.tokenize_set(&raw).unwrap()
            })
            .collect();
        let index = InvertedIndex::build(token_sets.clone(), SimFunc::Jaccard, 3);
        (index, token_sets)
    }

    fn base_config(delta: f64) -> EngineConfig {
        EngineConfig {
            delta,
            alpha: 0.0,
            q: 3,
            sim_metric: SimMetric::SetContainment,
            sim_func: SimFunc::Jaccard,
            sig_type: SigType::Weighted,
            reduction: false,
            check_filter: true,
            nn_filter: true,
        }
    }

    #[test]
    fn delta_zero_yields_empty_signature() {
        let (index, sets) = jaccard_index(vec![vec!["Apple Pear", "Car Sun"]]);
        let gen = SignatureGenerator::new();
        let config = base_config(0.0);
        let sig = gen.generate(&sets[0], &index, &config).unwrap();
        assert!(sig.is_empty());
    }

    #[test]
    fn delta_one_covers_every_nonempty_element() {
        let (index, sets) = jaccard_index(vec![vec!["Apple Pear", "Car Sun"]]);
        let gen = SignatureGenerator::new();
        let config = base_config(1.0);
        let sig: IndexSet<Token> = gen.generate(&sets[0], &index, &config).unwrap().into_iter().collect();
        let elem0: IndexSet<Token> = sets[0][0].as_set();
        let elem1: IndexSet<Token> = sets[0][1].as_set();
        assert!(sig.intersection(&elem0).count() >= 1);
        assert!(sig.intersection(&elem1).count() >= 1);
    }

    #[test]
    fn weighted_signature_is_subset_of_reference_tokens() {
        let (index, sets) = jaccard_index(vec![vec!["Apple Pear Car Sun", "Berlin Oslo"]]);
        let gen = SignatureGenerator::new();
        let config = base_config(0.5);
        let sig = gen.generate(&sets[0], &index, &config).unwrap();
        let all_tokens: IndexSet<Token> = sets[0].iter().flat_map(TokenGroup::as_set).collect();
        for t in &sig {
            assert!(all_tokens.contains(t));
        }
    }

    #[test]
    fn skyline_signature_contains_at_least_one_token_per_element() {
        let (index, sets) = jaccard_index(vec![vec!["Apple Pear Car", "Sun Moon Star"]]);
        let gen = SignatureGenerator::new();
        let mut config = base_config(0.3);
        config.sig_type = SigType::Skyline;
        let sig: IndexSet<Token> = gen.generate(&sets[0], &index, &config).unwrap().into_iter().collect();
        for group in &sets[0] {
            let elem: IndexSet<Token> = group.as_set();
            assert!(sig.intersection(&elem).count() >= 1);
        }
    }

    #[test]
    fn dichotomy_signature_is_per_element_subset_or_whole() {
        let (index, sets) = jaccard_index(vec![vec!["Apple Pear Car", "Sun Moon Star"]]);
        let gen = SignatureGenerator::new();
        let mut config = base_config(0.3);
        config.sig_type = SigType::Dichotomy;
        let sig: IndexSet<Token> = gen.generate(&sets[0], &index, &config).unwrap().into_iter().collect();
        let all_tokens: IndexSet<Token> = sets[0].iter().flat_map(TokenGroup::as_set).collect();
        for t in &sig {
            assert!(all_tokens.contains(t));
        }
    }

    #[test]
    fn edit_signature_rejects_delta_outside_open_interval() {
        let tok = Tokenizer::new(SimFunc::Edit);
        let raw: RawSet = vec!["abcdef".to_string()].into();
        let token_sets = vec![tok.tokenize_set(&raw).unwrap()];
        let index = InvertedIndex::build(token_sets.clone(), SimFunc::Edit, 3);
        let gen = SignatureGenerator::new();
        let mut config = base_config(1.0);
        config.sim_func = SimFunc::Edit;
        assert!(gen.generate(&token_sets[0], &index, &config).is_err());
    }

    #[test]
    fn edit_signature_falls_back_to_brute_force_when_q_too_large() {
        let tok = Tokenizer::new(SimFunc::Edit);
        let raw: RawSet = vec!["abcdefgh".to_string()].into();
        let token_sets = vec![tok.tokenize_set(&raw).unwrap()];
        let index = InvertedIndex::build(token_sets.clone(), SimFunc::Edit, 7);
        let gen = SignatureGenerator::new();
        let mut config = base_config(0.86); // q_bound = 0.86/0.14 ~= 6.14
        config.sim_func = SimFunc::Edit;
        config.q = 7; // q >= q_bound: no weighted signature is feasible.
        let sig = gen.generate(&token_sets[0], &index, &config).unwrap();
        // q=7 >= q_bound (~6.14) triggers the brute-force fallback: the
        // result is exactly the set of non-overlapping q-chunks.
        let expected: IndexSet<Token> = Tokenizer::q_chunks(token_sets[0][0].words().unwrap(), 7)
            .into_iter()
            .collect();
        let got: IndexSet<Token> = sig.into_iter().collect();
        assert_eq!(got, expected);
    }
}
