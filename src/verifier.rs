//! Verifier (spec §4.6): exact maximum-weight bipartite matching between a
//! reference set and a surviving candidate, plus the optional
//! triangle-inequality reduction.
//!
//! Grounded on `original_source/src/silkmoth/verifier.py`'s matching and
//! reduction steps. Edge weights are `φ(r_i, c_j, α)` in `[0, 1]`; the
//! teacher's declared-but-unused `pathfinding` dependency supplies exact
//! Kuhn–Munkres assignment, scaled to fixed-point `i64` since the algorithm
//! requires an `Ord` weight type.
//!
//! [`pathfinding::kuhn_munkres`] further requires the matrix to have no more
//! rows than columns; when `|R| > |S|` the weight matrix is transposed
//! before solving (the optimum is invariant under transposition).

use pathfinding::kuhn_munkres::kuhn_munkres;
use pathfinding::matrix::Matrix;
use tracing::warn;

use crate::candidates::element_similarity;
use crate::core::config::{EngineConfig, SimFunc, SimMetric};
use crate::core::errors::Result;
use crate::core::model::{TokenGroup, TokenizedSet};
use crate::index::InvertedIndex;
use crate::similarity::{set_containment, set_similarity};

/// Fixed-point scale applied to `[0, 1]` similarity weights before handing
/// them to `kuhn_munkres`, which requires `Ord` (not `PartialOrd`) weights.
const FIXED_POINT_SCALE: f64 = 1_000_000.0;

/// Computes relatedness between a reference set and a candidate source set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Verifier;

impl Verifier {
    /// Construct a verifier.
    pub fn new() -> Self {
        Self
    }

    /// Verify one candidate: compute the maximum weighted matching and the
    /// resulting `ρ`, returning `Some((candidate_idx, relatedness))` if
    /// `relatedness >= δ`.
    pub fn verify(
        &self,
        reference: &TokenizedSet,
        candidate_idx: usize,
        index: &InvertedIndex,
        config: &EngineConfig,
    ) -> Result<Option<(usize, f64)>> {
        let candidate = index.set(candidate_idx)?;
        let m = self.max_weight_matching(reference, candidate, config);

        let relatedness = match config.sim_metric {
            SimMetric::SetSimilarity => set_similarity(reference.len(), candidate.len(), m),
            SimMetric::SetContainment => set_containment(reference.len(), candidate.len(), m)?,
        };

        Ok((relatedness >= config.delta).then_some((candidate_idx, relatedness)))
    }

    /// Verify every candidate, returning the survivors in ascending index
    /// order.
    pub fn verify_candidates(
        &self,
        reference: &TokenizedSet,
        candidates: &std::collections::HashSet<usize>,
        index: &InvertedIndex,
        config: &EngineConfig,
    ) -> Result<Vec<(usize, f64)>> {
        let mut out = Vec::new();
        for &c_idx in candidates {
            if let Some(pair) = self.verify(reference, c_idx, index, config)? {
                out.push(pair);
            }
        }
        out.sort_by_key(|&(idx, _)| idx);
        Ok(out)
    }

    /// Sum of matched edge weights `m` for the maximum weighted matching
    /// between `reference` and `candidate`, optionally applying the
    /// triangle-inequality reduction first.
    fn max_weight_matching(&self, reference: &TokenizedSet, candidate: &TokenizedSet, config: &EngineConfig) -> f64 {
        let effective_reduction = config.reduction && config.alpha == 0.0;
        if config.reduction && config.alpha > 0.0 {
            warn!("triangle-inequality reduction requires alpha = 0; ignoring for this search");
        }

        let (residue_rows, residue_cols, exact_matches) = if effective_reduction {
            reduce_exact_matches(reference, candidate, config.sim_func)
        } else {
            (
                (0..reference.len()).collect(),
                (0..candidate.len()).collect(),
                0,
            )
        };

        if residue_rows.is_empty() || residue_cols.is_empty() {
            return exact_matches as f64;
        }

        let weights: Vec<Vec<i64>> = residue_rows
            .iter()
            .map(|&i| {
                residue_cols
                    .iter()
                    .map(|&j| {
                        let sim = element_similarity(
                            &reference[i],
                            &candidate[j],
                            config.sim_func,
                            config.alpha,
                            config.q,
                        );
                        scale(sim)
                    })
                    .collect()
            })
            .collect();

        let residue_total = solve_assignment(&weights) as f64 / FIXED_POINT_SCALE;
        exact_matches as f64 + residue_total
    }
}

fn scale(weight: f64) -> i64 {
    (weight * FIXED_POINT_SCALE).round() as i64
}

/// Greedily removes element pairs that are exact token-level duplicates
/// across `reference`/`candidate`, returning the unmatched row/column
/// indices and the count of removed pairs (each contributing weight `1.0`).
fn reduce_exact_matches(
    reference: &TokenizedSet,
    candidate: &TokenizedSet,
    sim_func: SimFunc,
) -> (Vec<usize>, Vec<usize>, usize) {
    let mut used_cols = vec![false; candidate.len()];
    let mut residue_rows = Vec::new();
    let mut exact_matches = 0usize;

    for (i, r) in reference.iter().enumerate() {
        let mut matched = false;
        if !r.is_empty() {
            for (j, c) in candidate.iter().enumerate() {
                if !used_cols[j] && elements_identical(r, c, sim_func) {
                    used_cols[j] = true;
                    exact_matches += 1;
                    matched = true;
                    break;
                }
            }
        }
        if !matched {
            residue_rows.push(i);
        }
    }

    let residue_cols: Vec<usize> = (0..candidate.len()).filter(|&j| !used_cols[j]).collect();
    (residue_rows, residue_cols, exact_matches)
}

fn elements_identical(a: &TokenGroup, b: &TokenGroup, sim_func: SimFunc) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if sim_func.is_edit() {
        a.words() == b.words()
    } else {
        a.as_set() == b.as_set()
    }
}

/// Exact maximum-weight bipartite matching over a dense `rows x cols` weight
/// matrix, transposing first if there are more rows than columns (required
/// by `kuhn_munkres`; the optimal total is unaffected).
fn solve_assignment(weights: &[Vec<i64>]) -> i64 {
    let rows = weights.len();
    if rows == 0 {
        return 0;
    }
    let cols = weights[0].len();
    if cols == 0 {
        return 0;
    }

    let (final_rows, final_cols, data): (usize, usize, Vec<i64>) = if rows <= cols {
        (rows, cols, weights.iter().flatten().copied().collect())
    } else {
        let mut transposed = Vec::with_capacity(rows * cols);
        for c in 0..cols {
            for row in weights {
                transposed.push(row[c]);
            }
        }
        (cols, rows, transposed)
    };

    let matrix = Matrix::from_vec(final_rows, final_cols, data)
        .expect("row/column counts are derived from the same data, always consistent");
    let (total, _assignment) = kuhn_munkres(&matrix);
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SigType;
    use crate::core::model::RawSet;
    use crate::tokenizer::Tokenizer;

    fn tokenize(sets: Vec<Vec<&str>>) -> Vec<TokenizedSet> {
        let tok = Tokenizer::new(SimFunc::Jaccard);
        sets.into_iter()
            .map(|s| {
                let raw: RawSet = s.into();
                tok.tokenize_set(&raw).unwrap()
            })
            .collect()
    }

    fn config(delta: f64, sim_metric: SimMetric) -> EngineConfig {
        EngineConfig {
            delta,
            alpha: 0.0,
            q: 3,
            sim_metric,
            sim_func: SimFunc::Jaccard,
            sig_type: SigType::Weighted,
            reduction: false,
            check_filter: true,
            nn_filter: true,
        }
    }

    #[test]
    fn identical_sets_match_perfectly() {
        let sets = tokenize(vec![vec!["Apple Pear", "Car Sun"], vec!["Apple Pear", "Car Sun"]]);
        let index = InvertedIndex::build(sets.clone(), SimFunc::Jaccard, 3);
        let verifier = Verifier::new();
        let cfg = config(0.9, SimMetric::SetContainment);
        let result = verifier.verify(&sets[0], 1, &index, &cfg).unwrap();
        let (idx, relatedness) = result.unwrap();
        assert_eq!(idx, 1);
        assert!((relatedness - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unrelated_sets_are_rejected() {
        let sets = tokenize(vec![vec!["Apple Pear"], vec!["Totally Different"]]);
        let index = InvertedIndex::build(sets.clone(), SimFunc::Jaccard, 3);
        let verifier = Verifier::new();
        let cfg = config(0.5, SimMetric::SetContainment);
        assert!(verifier.verify(&sets[0], 1, &index, &cfg).unwrap().is_none());
    }

    #[test]
    fn reduction_matches_unreduced_result_when_alpha_is_zero() {
        let sets = tokenize(vec![
            vec!["Apple Pear", "Car Sun", "Moon Star"],
            vec!["Car Sun", "Moon Star", "Apple Pear"],
        ]);
        let index = InvertedIndex::build(sets.clone(), SimFunc::Jaccard, 3);
        let verifier = Verifier::new();
        let mut cfg = config(0.9, SimMetric::SetContainment);
        let without_reduction = verifier.max_weight_matching(&sets[0], &sets[1], &cfg);
        cfg.reduction = true;
        let with_reduction = verifier.max_weight_matching(&sets[0], &sets[1], &cfg);
        assert!((without_reduction - with_reduction).abs() < 1e-6);
    }

    #[test]
    fn reduction_is_ignored_with_a_warning_when_alpha_is_nonzero() {
        let sets = tokenize(vec![vec!["Apple Pear"], vec!["Apple Pear"]]);
        let index = InvertedIndex::build(sets.clone(), SimFunc::Jaccard, 3);
        let verifier = Verifier::new();
        let mut cfg = config(0.9, SimMetric::SetContainment);
        cfg.reduction = true;
        cfg.alpha = 0.1;
        let result = verifier.verify(&sets[0], 1, &index, &cfg).unwrap();
        assert!(result.is_some());
    }

    #[test]
    fn asymmetric_sizes_transpose_without_changing_the_optimum() {
        let sets = tokenize(vec![
            vec!["Apple", "Pear", "Car"],
            vec!["Apple", "Other"],
        ]);
        let index = InvertedIndex::build(sets.clone(), SimFunc::Jaccard, 3);
        let verifier = Verifier::new();
        let cfg = config(0.1, SimMetric::SetSimilarity);
        // |R| = 3 > |S| = 2: exercises the transpose path in solve_assignment.
        let result = verifier.verify(&sets[0], 1, &index, &cfg).unwrap();
        assert!(result.is_some());
    }
}
