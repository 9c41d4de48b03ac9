//! Data model for aligned sequences.
//!
//! This module contains the data structures of the sequence store:
//! - `Sequence`: one named, possibly gapped, sequence
//! - `Alignment`: equal-width sequences addressable by tip name
//!
//! Sequences are kept exactly as loaded (case and gap characters included).

use std::collections::HashMap;
use std::ops::Range;

use crate::formats::fasta::FastaError;

/// Gap character used in aligned sequences.
pub const GAP: u8 = b'-';

/// Represents a single sequence with its identifier and data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    /// The sequence identifier (from FASTA header, without '>')
    pub id: String,
    /// The sequence data (nucleotides or amino acids, possibly gapped)
    data: String,
}

impl Sequence {
    /// Creates a new sequence.
    pub fn new(id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
        }
    }

    /// Returns the length of the sequence, gaps included.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the sequence as a string slice.
    pub fn as_str(&self) -> &str {
        &self.data
    }

    /// Returns the sequence as raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_bytes()
    }

    /// Number of non-gap characters.
    pub fn ungapped_len(&self) -> usize {
        self.data.bytes().filter(|&b| b != GAP).count()
    }

    /// Gets the columns of a 0-based, half-open column range.
    ///
    /// The range is clipped to the sequence.
    pub fn columns(&self, range: Range<usize>) -> &str {
        let end = range.end.min(self.data.len());
        let start = range.start.min(end);
        &self.data[start..end]
    }

    /// Maps 1-based ungapped positions to 0-based alignment columns.
    ///
    /// Returns the columns holding the `start`-th and the `end`-th non-gap
    /// character, or `None` when `end` exceeds the ungapped length or the
    /// positions are not a valid ordered pair.
    pub fn ungapped_to_columns(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        if start == 0 || start > end {
            return None;
        }
        let mut seen = 0;
        let mut first = None;
        for (col, &b) in self.as_bytes().iter().enumerate() {
            if b == GAP {
                continue;
            }
            seen += 1;
            if seen == start {
                first = Some(col);
            }
            if seen == end {
                return first.map(|first| (first, col));
            }
        }
        None
    }
}

/// Represents an alignment of multiple sequences.
///
/// All sequences have the same length (the alignment width) and distinct
/// identifiers. Insertion order is preserved.
#[derive(Debug, Clone, Default)]
pub struct Alignment {
    /// All sequences in the alignment, in input order
    sequences: Vec<Sequence>,
    /// Position of each identifier in `sequences`
    index: HashMap<String, usize>,
    /// Common length of all sequences
    width: usize,
}

impl Alignment {
    /// Creates a new alignment from a vector of sequences.
    ///
    /// Fails when two sequences share an identifier or differ in length.
    pub fn new(sequences: Vec<Sequence>) -> Result<Self, FastaError> {
        let width = sequences.first().map(Sequence::len).unwrap_or(0);
        let mut index = HashMap::with_capacity(sequences.len());

        for (i, seq) in sequences.iter().enumerate() {
            if seq.len() != width {
                return Err(FastaError::LengthMismatch {
                    name: seq.id.clone(),
                    expected: width,
                    found: seq.len(),
                });
            }
            if index.insert(seq.id.clone(), i).is_some() {
                return Err(FastaError::DuplicateName(seq.id.clone()));
            }
        }

        Ok(Self {
            sequences,
            index,
            width,
        })
    }

    /// Returns the number of sequences.
    pub fn sequence_count(&self) -> usize {
        self.sequences.len()
    }

    /// Returns the alignment width (common sequence length).
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns true if the alignment is empty.
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Gets a sequence by tip name.
    pub fn get(&self, name: &str) -> Option<&Sequence> {
        self.index.get(name).map(|&i| &self.sequences[i])
    }

    /// Returns true if the tip has an aligned sequence.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Iterates over the sequences in input order.
    pub fn iter(&self) -> impl Iterator<Item = &Sequence> {
        self.sequences.iter()
    }

    /// Iterates over the tip names in input order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sequences.iter().map(|s| s.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_creation() {
        let seq = Sequence::new("seq1", "AC-GT");
        assert_eq!(seq.id, "seq1");
        assert_eq!(seq.as_str(), "AC-GT");
        assert_eq!(seq.len(), 5);
        assert_eq!(seq.ungapped_len(), 4);
    }

    #[test]
    fn test_sequence_columns() {
        let seq = Sequence::new("seq1", "ACGTAC");
        assert_eq!(seq.columns(1..4), "CGT");
        assert_eq!(seq.columns(4..11), "AC");
        assert_eq!(seq.columns(7..10), "");
        assert_eq!(seq.columns(0..0), "");
    }

    #[test]
    fn test_ungapped_to_columns() {
        let seq = Sequence::new("ref", "-AC--GT-");
        assert_eq!(seq.ungapped_to_columns(1, 1), Some((1, 1)));
        assert_eq!(seq.ungapped_to_columns(2, 3), Some((2, 5)));
        assert_eq!(seq.ungapped_to_columns(1, 4), Some((1, 6)));
        assert_eq!(seq.ungapped_to_columns(1, 5), None);
        assert_eq!(seq.ungapped_to_columns(0, 2), None);
        assert_eq!(seq.ungapped_to_columns(3, 2), None);
    }

    #[test]
    fn test_alignment_valid() {
        let seqs = vec![Sequence::new("seq1", "ACGT"), Sequence::new("seq2", "TGCA")];
        let alignment = Alignment::new(seqs).unwrap();
        assert_eq!(alignment.width(), 4);
        assert_eq!(alignment.sequence_count(), 2);
        assert_eq!(alignment.get("seq2").unwrap().as_str(), "TGCA");
        assert!(alignment.get("seq3").is_none());
        assert_eq!(alignment.names().collect::<Vec<_>>(), vec!["seq1", "seq2"]);
    }

    #[test]
    fn test_alignment_length_mismatch() {
        let seqs = vec![Sequence::new("seq1", "ACGT"), Sequence::new("seq2", "TG")];
        let result = Alignment::new(seqs);
        assert!(matches!(
            result,
            Err(FastaError::LengthMismatch { expected: 4, found: 2, .. })
        ));
    }

    #[test]
    fn test_alignment_duplicate_name() {
        let seqs = vec![Sequence::new("seq1", "ACGT"), Sequence::new("seq1", "TGCA")];
        let result = Alignment::new(seqs);
        assert!(matches!(result, Err(FastaError::DuplicateName(name)) if name == "seq1"));
    }
}
