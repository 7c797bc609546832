//! Data model shared across the SILKMOTH pipeline (spec §3).

use indexmap::IndexSet;
use smallvec::SmallVec;

/// An opaque token, compared by equality.
pub type Token = String;

/// An element's word/q-gram sequence. Elements are typically short phrases,
/// so this stays on the stack for the common case.
pub type TokenSeq = SmallVec<[Token; 8]>;

/// A raw, untokenized element of a source or reference set.
///
/// Scalars stringify directly; nested sequences are flattened with a space
/// separator before tokenization (`original_source/utils.py::flatten_tokens`).
#[derive(Debug, Clone, PartialEq)]
pub enum RawElement {
    /// A leaf string value.
    Scalar(String),
    /// A nested sequence, flattened with `" "`.join at tokenization time.
    Sequence(Vec<RawElement>),
}

impl From<&str> for RawElement {
    fn from(value: &str) -> Self {
        RawElement::Scalar(value.to_string())
    }
}

impl From<String> for RawElement {
    fn from(value: String) -> Self {
        RawElement::Scalar(value)
    }
}

impl From<Vec<RawElement>> for RawElement {
    fn from(value: Vec<RawElement>) -> Self {
        RawElement::Sequence(value)
    }
}

/// A finite ordered sequence of raw elements: one source or reference set.
pub type RawSet = Vec<RawElement>;

impl From<Vec<String>> for RawSet {
    fn from(value: Vec<String>) -> Self {
        value.into_iter().map(RawElement::from).collect()
    }
}

impl From<Vec<&str>> for RawSet {
    fn from(value: Vec<&str>) -> Self {
        value.into_iter().map(RawElement::from).collect()
    }
}

/// One element's tokens, shaped according to the configured similarity
/// function.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TokenGroup {
    /// Jaccard: the element's unique whitespace-delimited tokens.
    Set(IndexSet<Token>),
    /// Edit / normalized-edit: the element's step-1 q-grams, order preserved
    /// with duplicates retained; dedupe on demand via [`TokenGroup::as_set`].
    Sequence(TokenSeq),
    /// No tokens could be produced (an empty element).
    #[default]
    Empty,
}

impl TokenGroup {
    /// Number of tokens, counting a `Sequence`'s duplicates once each (i.e.
    /// `|r_i|` as used throughout spec §4).
    pub fn len_as_set(&self) -> usize {
        match self {
            TokenGroup::Set(s) => s.len(),
            TokenGroup::Sequence(seq) => seq.iter().collect::<IndexSet<_>>().len(),
            TokenGroup::Empty => 0,
        }
    }

    /// True if this group contributes no tokens.
    pub fn is_empty(&self) -> bool {
        match self {
            TokenGroup::Set(s) => s.is_empty(),
            TokenGroup::Sequence(seq) => seq.is_empty(),
            TokenGroup::Empty => true,
        }
    }

    /// Deduplicated view of the group's tokens, in first-seen order.
    pub fn as_set(&self) -> IndexSet<Token> {
        match self {
            TokenGroup::Set(s) => s.clone(),
            TokenGroup::Sequence(seq) => seq.iter().cloned().collect(),
            TokenGroup::Empty => IndexSet::new(),
        }
    }

    /// Iterate the group's tokens; for `Sequence`, preserves order and
    /// duplicates.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &Token> + '_> {
        match self {
            TokenGroup::Set(s) => Box::new(s.iter()),
            TokenGroup::Sequence(seq) => Box::new(seq.iter()),
            TokenGroup::Empty => Box::new(std::iter::empty()),
        }
    }

    /// The element's raw word tokens, for edit-similarity groups only. Used
    /// by callers that need to re-derive q-grams at a given `q` (the group
    /// itself only stores word boundaries, not a fixed q).
    pub fn words(&self) -> Option<&[Token]> {
        match self {
            TokenGroup::Sequence(seq) => Some(seq.as_slice()),
            _ => None,
        }
    }
}

/// A raw or reference set after tokenization: one `TokenGroup` per element.
pub type TokenizedSet = Vec<TokenGroup>;

/// A posting locating one occurrence of a token: `(setIndex, elementIndex)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Posting {
    /// Index of the source set.
    pub set_idx: usize,
    /// Index of the element within that set.
    pub elem_idx: usize,
}

impl Posting {
    /// Construct a new posting.
    pub fn new(set_idx: usize, elem_idx: usize) -> Self {
        Self { set_idx, elem_idx }
    }
}

/// Reconstruct the underlying string from an ordered, step-1 q-gram
/// representation (inverse of the sliding-window tokenization).
///
/// Mirrors `original_source/utils.py::reverse_qgrams`: every q-gram after the
/// first contributes exactly one new leading character, so the original
/// string is the first character of each q-gram but the last, followed by
/// the last q-gram in full.
pub fn reverse_qgrams(qgrams: &[Token]) -> String {
    match qgrams.len() {
        0 => String::new(),
        1 => qgrams[0].clone(),
        n => {
            let mut out = String::new();
            for gram in &qgrams[..n - 1] {
                if let Some(first) = gram.chars().next() {
                    out.push(first);
                }
            }
            out.push_str(&qgrams[n - 1]);
            out
        }
    }
}
