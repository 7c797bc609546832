//! Configuration types for the SILKMOTH engine (spec §6).

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SilkMothError};

/// Element-level similarity function φ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimFunc {
    /// Jaccard similarity over whitespace-delimited token sets.
    Jaccard,
    /// Edit similarity over q-gram strings (recovers the original string).
    Edit,
    /// Normalized edit similarity, same q-gram recovery with `|·|`-based
    /// normalization.
    NormEdit,
}

impl SimFunc {
    /// True for the two edit-distance-based variants.
    pub fn is_edit(self) -> bool {
        matches!(self, SimFunc::Edit | SimFunc::NormEdit)
    }
}

/// Set-level metric ρ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimMetric {
    /// Symmetric set-similarity: `m / (|R| + |S| - m)`.
    SetSimilarity,
    /// Asymmetric set-containment: `m / |R|`, requires `|R| <= |S|`.
    SetContainment,
}

/// Signature generation scheme (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigType {
    /// Greedy minimum-cost approximation; weighted-valid only.
    Weighted,
    /// WEIGHTED augmented per element to also satisfy sim-thresh validity.
    Skyline,
    /// Per-element choice between the WEIGHTED part and the full element.
    Dichotomy,
}

/// Engine configuration: thresholds, similarity choice, and filter flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Relatedness threshold δ ∈ (0, 1].
    pub delta: f64,
    /// Similarity threshold α ∈ \[0, 1).
    pub alpha: f64,
    /// q-gram length, used only when `sim_func` is edit-based.
    pub q: usize,
    /// Set-level metric ρ.
    pub sim_metric: SimMetric,
    /// Element-level similarity φ.
    pub sim_func: SimFunc,
    /// Signature scheme.
    pub sig_type: SigType,
    /// Enable triangle-inequality reduction in the verifier (only valid
    /// with α = 0; disabled with a warning otherwise).
    pub reduction: bool,
    /// Enable the check filter during candidate refinement.
    pub check_filter: bool,
    /// Enable the nearest-neighbour filter during candidate refinement.
    pub nn_filter: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            delta: 0.5,
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
}

impl EngineConfig {
    /// Validate the configuration: threshold ranges and q-gram length.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.delta) {
            return Err(SilkMothError::config("delta must be in [0, 1]"));
        }
        if !(0.0..1.0).contains(&self.alpha) {
            return Err(SilkMothError::config("alpha must be in [0, 1)"));
        }
        if self.q == 0 {
            return Err(SilkMothError::config("q must be greater than 0"));
        }
        Ok(())
    }

    /// Serialize to a JSON string, for persisting engine configuration
    /// alongside a search session.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(SilkMothError::serialization)
    }

    /// Parse a previously serialized configuration, validating it before
    /// returning.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(SilkMothError::serialization)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_delta() {
        let cfg = EngineConfig {
            delta: 1.5,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_alpha_equal_to_one() {
        let cfg = EngineConfig {
            alpha: 1.0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_q() {
        let cfg = EngineConfig {
            q: 0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn json_round_trips() {
        let cfg = EngineConfig {
            delta: 0.65,
            sim_func: SimFunc::Edit,
            sig_type: SigType::Skyline,
            ..EngineConfig::default()
        };
        let json = cfg.to_json().expect("should serialize");
        let parsed = EngineConfig::from_json(&json).expect("should deserialize");
        assert_eq!(cfg, parsed);
    }

    #[test]
    fn from_json_rejects_an_invalid_deserialized_config() {
        let json = r#"{"delta":1.5,"alpha":0.0,"q":3,"sim_metric":"SetContainment","sim_func":"Jaccard","sig_type":"Weighted","reduction":false,"check_filter":true,"nn_filter":true}"#;
        assert!(EngineConfig::from_json(json).is_err());
    }
}
