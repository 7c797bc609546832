//! # silkmoth-rs: set-relatedness search via maximum weighted bipartite matching
//!
//! This crate implements the SILKMOTH method for finding, among a collection
//! of *source sets*, those whose relatedness to a *reference set* — measured
//! by the maximum weighted bipartite matching of their elements under a
//! chosen element-level similarity — meets or exceeds a threshold δ.
//!
//! ## Pipeline
//!
//! ```text
//! tokenize(R) -> signature(R, index) -> candidates(signature, index, |R|)
//!   -> check filter -> nearest-neighbour filter -> verifier -> related sets
//! ```
//!
//! ## Quick start
//!
//! ```
//! use silkmoth_rs::{Engine, EngineConfig, RawSet};
//!
//! let sources: Vec<RawSet> = vec![
//!     vec!["a b c".to_string(), "d e f".to_string()].into(),
//!     vec!["a b x".to_string(), "d e y".to_string()].into(),
//! ];
//! let config = EngineConfig {
//!     delta: 0.5,
//!     ..EngineConfig::default()
//! };
//! let engine = Engine::new(sources, config).unwrap();
//! let reference: RawSet = vec!["a b c".to_string(), "d e f".to_string()].into();
//! let result = engine.search(&reference).unwrap();
//! assert!(result.related.iter().any(|&(idx, _)| idx == 0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_arguments)]

pub mod core;

mod tokenizer;
mod index;
mod similarity;
mod signature;
mod candidates;
mod verifier;
mod engine;

pub use crate::core::config::{EngineConfig, SigType, SimFunc, SimMetric};
pub use crate::core::errors::{Result, SilkMothError};
pub use crate::core::model::{Posting, RawSet, Token, TokenGroup, TokenSeq, TokenizedSet};
pub use engine::{DiscoverResult, Engine, SearchResult};
pub use index::InvertedIndex;
pub use signature::SignatureGenerator;
pub use tokenizer::Tokenizer;
