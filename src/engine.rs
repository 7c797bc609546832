//! Engine façade (spec §4.7): wires the tokenizer, inverted index, signature
//! generator, candidate selector, and verifier into the public `search` /
//! `discover` operations.
//!
//! Grounded on `original_source/src/silkmoth/silkmoth_engine.py`'s
//! `SilkMothEngine` (`build_index`, `search_sets`); `discover_sets` was left
//! unimplemented (`pass`) in the retrieved source, so its pair-emission rule
//! here follows the canonical description only.

use std::sync::Arc;

use indexmap::IndexSet;
use tracing::warn;

use crate::candidates::{CandidateSelector, MatchMap};
use crate::core::config::{EngineConfig, SigType, SimMetric};
use crate::core::errors::Result;
use crate::core::model::{RawSet, Token, TokenizedSet};
use crate::index::InvertedIndex;
use crate::signature::SignatureGenerator;
use crate::tokenizer::Tokenizer;
use crate::verifier::Verifier;

/// Result of a single `search`: related candidates plus before/after
/// candidate-set sizes (for observability into filter effectiveness).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// `(candidate_idx, relatedness)` pairs meeting `δ`, in ascending index
    /// order.
    pub related: Vec<(usize, f64)>,
    /// Number of candidates surviving the probe + size filter.
    pub candidates_before: usize,
    /// Number of candidates surviving the check/NN filters, i.e. entering
    /// verification.
    pub candidates_after: usize,
}

/// Result of `discover`: related pairs found across a collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiscoverResult {
    /// `(reference_idx, source_idx, relatedness)` triples.
    pub pairs: Vec<(usize, usize, f64)>,
}

/// The SILKMOTH search engine: holds configuration, the built index, and its
/// pipeline collaborators.
#[derive(Debug, Clone)]
pub struct Engine {
    sources: Vec<RawSet>,
    config: EngineConfig,
    tokenizer: Tokenizer,
    index: Arc<InvertedIndex>,
    signature_gen: SignatureGenerator,
    candidate_selector: CandidateSelector,
    verifier: Verifier,
}

impl Engine {
    /// Build an engine over `sources`, tokenizing and indexing them
    /// up-front.
    pub fn new(sources: Vec<RawSet>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let tokenizer = Tokenizer::new(config.sim_func);
        let token_sets = tokenize_all(&tokenizer, &sources)?;
        let index = Arc::new(InvertedIndex::build(token_sets, config.sim_func, config.q));

        Ok(Self {
            sources,
            config,
            tokenizer,
            index,
            signature_gen: SignatureGenerator::new(),
            candidate_selector: CandidateSelector::new(),
            verifier: Verifier::new(),
        })
    }

    /// Current configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of indexed source sets.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True if the engine holds no source sets.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Find every indexed source set related to `reference` at the
    /// configured `δ`.
    pub fn search(&self, reference: &RawSet) -> Result<SearchResult> {
        let r_tokens = self.tokenizer.tokenize_set(reference)?;

        let signature = self
            .signature_gen
            .generate(&r_tokens, &self.index, &self.config)?;
        let candidates =
            self.candidate_selector
                .get_candidates(&signature, &self.index, r_tokens.len(), &self.config);
        let candidates_before = candidates.len();

        let signature_set: IndexSet<Token> = signature.into_iter().collect();
        let mut survivors = candidates;
        let mut match_map: indexmap::IndexMap<usize, MatchMap> = indexmap::IndexMap::new();

        if self.config.check_filter {
            let (filtered, mm) = self.candidate_selector.check_filter(
                &r_tokens,
                &signature_set,
                &survivors,
                &self.index,
                &self.config,
            );
            survivors = filtered;
            match_map = mm;
        }

        if self.config.nn_filter {
            survivors = self.candidate_selector.nn_filter(
                &r_tokens,
                &signature_set,
                &survivors,
                &self.index,
                &match_map,
                &self.config,
            );
        }
        let candidates_after = survivors.len();

        let related = self
            .verifier
            .verify_candidates(&r_tokens, &survivors, &self.index, &self.config)?;

        Ok(SearchResult {
            related,
            candidates_before,
            candidates_after,
        })
    }

    /// Run `search` with every element of `sets` as the reference in turn,
    /// collecting related pairs across the whole collection.
    ///
    /// For the symmetric set-similarity metric, only `(i, j)` with `j > i`
    /// are kept (each unordered pair is reported once); set-containment is
    /// asymmetric, so both `(i, j)` and `(j, i)` may be reported. A
    /// reference is never reported as related to itself.
    pub fn discover(&self, sets: &[RawSet]) -> Result<DiscoverResult> {
        let mut pairs = Vec::new();
        for (i, reference) in sets.iter().enumerate() {
            let result = self.search(reference)?;
            for (j, relatedness) in result.related {
                if j == i {
                    continue;
                }
                if self.config.sim_metric == SimMetric::SetSimilarity && j <= i {
                    continue;
                }
                pairs.push((i, j, relatedness));
            }
        }
        Ok(DiscoverResult { pairs })
    }

    /// Set the relatedness threshold δ.
    pub fn set_delta(&mut self, delta: f64) -> Result<()> {
        let mut candidate = self.config.clone();
        candidate.delta = delta;
        candidate.validate()?;
        self.config = candidate;
        Ok(())
    }

    /// Set the similarity threshold α, disabling triangle-inequality
    /// reduction (with a warning) if it was enabled.
    pub fn set_alpha(&mut self, alpha: f64) -> Result<()> {
        let mut candidate = self.config.clone();
        candidate.alpha = alpha;
        candidate.validate()?;
        if candidate.reduction && candidate.alpha > 0.0 {
            warn!("alpha > 0 is incompatible with triangle-inequality reduction; disabling reduction");
            candidate.reduction = false;
        }
        self.config = candidate;
        Ok(())
    }

    /// Set the q-gram length, rebuilding the index from scratch since tokens
    /// under edit-based similarities depend on `q`.
    pub fn set_q(&mut self, q: usize) -> Result<()> {
        let mut candidate = self.config.clone();
        candidate.q = q;
        candidate.validate()?;
        self.config = candidate;
        self.rebuild_index()
    }

    /// Set the signature generation scheme.
    pub fn set_sig_type(&mut self, sig_type: SigType) {
        self.config.sig_type = sig_type;
    }

    /// Enable or disable the check filter.
    pub fn set_check_filter(&mut self, enabled: bool) {
        self.config.check_filter = enabled;
    }

    /// Enable or disable the nearest-neighbour filter.
    pub fn set_nn_filter(&mut self, enabled: bool) {
        self.config.nn_filter = enabled;
    }

    /// Enable or disable triangle-inequality reduction. Ignored with a
    /// warning if α > 0.
    pub fn set_reduction(&mut self, enabled: bool) {
        if enabled && self.config.alpha > 0.0 {
            warn!("cannot enable triangle-inequality reduction while alpha > 0");
            return;
        }
        self.config.reduction = enabled;
    }

    fn rebuild_index(&mut self) -> Result<()> {
        self.tokenizer = Tokenizer::new(self.config.sim_func);
        let token_sets = tokenize_all(&self.tokenizer, &self.sources)?;
        self.index = Arc::new(InvertedIndex::build(token_sets, self.config.sim_func, self.config.q));
        Ok(())
    }
}

fn tokenize_all(tokenizer: &Tokenizer, sources: &[RawSet]) -> Result<Vec<TokenizedSet>> {
    sources.iter().map(|s| tokenizer.tokenize_set(s)).collect()
}
