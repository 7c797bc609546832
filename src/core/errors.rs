//! Error types for silkmoth-rs.
//!
//! Errors follow the policy of spec §7: pure-arithmetic contracts (set sizes,
//! configuration) are strict and surface to the caller, while index-absence
//! (an unknown token) is locally suppressed by the component that probes for
//! it and never reaches this enum. `SignatureInfeasible` and
//! `ReductionIncompatible` likewise never become `Err` values — both degrade
//! or disable the offending feature and emit a `tracing::warn!` at the call
//! site instead of aborting (see `signature.rs` and `engine.rs`).

use thiserror::Error;

/// Result type used throughout silkmoth-rs.
pub type Result<T> = std::result::Result<T, SilkMothError>;

/// Errors surfaced by the SILKMOTH pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SilkMothError {
    /// A set index was out of range for the inverted index's source
    /// collection.
    #[error("invalid set id {set_id} (collection has {len} sets)")]
    InvalidSetId {
        /// The offending index.
        set_id: usize,
        /// Number of sets actually stored.
        len: usize,
    },

    /// Set-containment was requested with `|R| > |S|`, which `ρ_con` does not
    /// define.
    #[error("reference set too large: |R|={reference_size} > |S|={source_size}")]
    ReferenceTooLarge {
        /// Size of the reference set.
        reference_size: usize,
        /// Size of the source set.
        source_size: usize,
    },

    /// An unsupported combination of similarity function / set metric was
    /// requested.
    #[error("unsupported similarity configuration: {message}")]
    UnsupportedSimilarity {
        /// Description of what was unsupported.
        message: String,
    },

    /// A raw element could not be coerced into tokens (e.g. a nested map).
    #[error("unsupported element type: {message}")]
    UnsupportedElementType {
        /// Description of the offending value.
        message: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the violated constraint.
        message: String,
    },

    /// Configuration JSON failed to serialize or parse.
    #[error("configuration serialization error: {message}")]
    Serialization {
        /// The underlying `serde_json` error message.
        message: String,
    },
}

impl SilkMothError {
    /// Construct a [`SilkMothError::Serialization`] from any displayable
    /// error (e.g. `serde_json::Error`).
    pub fn serialization(err: impl std::fmt::Display) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }

    /// Construct an [`SilkMothError::InvalidSetId`].
    pub fn invalid_set_id(set_id: usize, len: usize) -> Self {
        Self::InvalidSetId { set_id, len }
    }

    /// Construct a [`SilkMothError::ReferenceTooLarge`].
    pub fn reference_too_large(reference_size: usize, source_size: usize) -> Self {
        Self::ReferenceTooLarge {
            reference_size,
            source_size,
        }
    }

    /// Construct a [`SilkMothError::UnsupportedSimilarity`].
    pub fn unsupported_similarity(message: impl Into<String>) -> Self {
        Self::UnsupportedSimilarity {
            message: message.into(),
        }
    }

    /// Construct a [`SilkMothError::UnsupportedElementType`].
    pub fn unsupported_element_type(message: impl Into<String>) -> Self {
        Self::UnsupportedElementType {
            message: message.into(),
        }
    }

    /// Construct a [`SilkMothError::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result extension trait for adding static context to an error.
pub trait ResultExt<T> {
    /// Wrap a configuration-style error with additional static context.
    fn context(self, msg: &'static str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| SilkMothError::config(format!("{msg}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_set_id_formats_message() {
        let err = SilkMothError::invalid_set_id(5, 3);
        assert_eq!(err.to_string(), "invalid set id 5 (collection has 3 sets)");
    }

    #[test]
    fn reference_too_large_formats_message() {
        let err = SilkMothError::reference_too_large(4, 2);
        assert!(err.to_string().contains("4"));
        assert!(err.to_string().contains("2"));
    }
}
