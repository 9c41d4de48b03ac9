//! FASTA parser and writer.
//!
//! This module handles reading FASTA text into an [`Alignment`] (or a plain
//! list of records, for marker files that need not be aligned) and writing
//! records back out. Both single-line and multi-line sequences are supported.
//!
//! ## FASTA Format
//!
//! ```text
//! >sequence_identifier optional description
//! ACGTACGTACGT...
//! >another_sequence
//! TGCATGCATGCA...
//! ```

use std::io::{self, Write};

use thiserror::Error;

use crate::model::{Alignment, Sequence};

/// Errors that can occur during FASTA parsing.
#[derive(Error, Debug)]
pub enum FastaError {
    #[error("Empty FASTA input")]
    EmptyFile,

    #[error("Invalid FASTA format: {0}")]
    InvalidFormat(String),

    #[error("Sequence without header at line {0}")]
    SequenceWithoutHeader(usize),

    #[error("Duplicate sequence name '{0}'")]
    DuplicateName(String),

    #[error("Sequence '{name}' has length {found}, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
}

impl FastaError {
    /// True for well-formed FASTA that violates the alignment invariants.
    pub fn is_format_violation(&self) -> bool {
        matches!(
            self,
            FastaError::DuplicateName(_) | FastaError::LengthMismatch { .. }
        )
    }
}

/// Result type for FASTA operations.
pub type FastaResult<T> = Result<T, FastaError>;

/// Parses FASTA text into an [`Alignment`].
///
/// Fails if the text is not FASTA, if two records share a name or if the
/// records differ in length.
///
/// # Examples
///
/// ```
/// use phylotip::formats::fasta::load_alignment;
///
/// let alignment = load_alignment(">a\nAC-T\n>b\nACGT\n").unwrap();
/// assert_eq!(alignment.width(), 4);
/// ```
pub fn load_alignment(content: &str) -> FastaResult<Alignment> {
    let records = parse_records(content)?;
    Alignment::new(records)
}

/// Parses FASTA text into records, without requiring equal lengths.
///
/// Avoids per-line allocations by working with slices and bytes.
pub fn parse_records(content: &str) -> FastaResult<Vec<Sequence>> {
    let mut sequences = Vec::new();

    let mut current_id: Option<&str> = None;
    let mut current_seq: Vec<u8> = Vec::new();
    let mut prev_seq_len: usize = 1000;

    for (line_index, line) in content.lines().enumerate() {
        let line_number = line_index + 1;
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix('>') {
            if let Some(id) = current_id.take() {
                prev_seq_len = current_seq.len();
                sequences.push(finish_record(id, std::mem::take(&mut current_seq)));
            }

            // Take everything before the first space as the identifier
            let id = header.split_whitespace().next().unwrap_or(header);
            if id.is_empty() {
                return Err(FastaError::InvalidFormat(format!(
                    "Empty sequence identifier at line {}",
                    line_number
                )));
            }

            current_id = Some(id);
            // Alignments have uniform length
            current_seq = Vec::with_capacity(prev_seq_len);
        } else {
            if current_id.is_none() {
                return Err(FastaError::SequenceWithoutHeader(line_number));
            }
            if !line.is_ascii() {
                return Err(FastaError::InvalidFormat(format!(
                    "Non-ASCII sequence data at line {}",
                    line_number
                )));
            }

            if line.bytes().all(|b| !b.is_ascii_whitespace()) {
                current_seq.extend_from_slice(line.as_bytes());
            } else {
                current_seq.extend(line.bytes().filter(|b| !b.is_ascii_whitespace()));
            }
        }
    }

    if let Some(id) = current_id {
        sequences.push(finish_record(id, current_seq));
    }

    if sequences.is_empty() {
        return Err(FastaError::EmptyFile);
    }

    Ok(sequences)
}

fn finish_record(id: &str, mut data: Vec<u8>) -> Sequence {
    data.shrink_to_fit();
    // Only ASCII bytes are ever pushed.
    let data = String::from_utf8(data).unwrap_or_default();
    Sequence::new(id, data)
}

/// Writes one FASTA record, sequence on a single line.
pub fn write_record<W: Write>(out: &mut W, id: &str, data: &str) -> io::Result<()> {
    writeln!(out, ">{}", id)?;
    writeln!(out, "{}", data)
}
