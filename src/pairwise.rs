//! Pairwise identity between two aligned sequences.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{Alignment, GAP};

/// Identity over the columns where neither sequence has a gap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairwiseIdentity {
    /// Fraction of identical residues, in `[0, 1]`
    pub identity: f64,
    /// Number of gap-free columns
    pub aligned_length: usize,
}

/// Compares the aligned sequences of two tips.
///
/// Columns where either sequence has a gap are left out entirely. With no
/// gap-free column the identity is `0.0`.
pub fn pairwise_identity(alignment: &Alignment, tip1: &str, tip2: &str) -> Result<PairwiseIdentity> {
    let a = alignment
        .get(tip1)
        .ok_or_else(|| Error::MissingSequence(tip1.to_string()))?;
    let b = alignment
        .get(tip2)
        .ok_or_else(|| Error::MissingSequence(tip2.to_string()))?;

    let (matches, aligned_length) = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .filter(|&(&x, &y)| x != GAP && y != GAP)
        .fold((0usize, 0usize), |(m, n), (x, y)| (m + usize::from(x == y), n + 1));

    let identity = if aligned_length == 0 {
        0.0
    } else {
        matches as f64 / aligned_length as f64
    };
    Ok(PairwiseIdentity {
        identity,
        aligned_length,
    })
}
