//! Subtree export as FASTA or Newick.
//!
//! The tip set of an export is the subtree of a node plus any extra tips,
//! without repetitions. Alignment exports may be narrowed to a window of
//! columns, given either directly or in ungapped coordinates of a reference
//! sequence.

use std::collections::HashSet;
use std::ops::Range;

use log::debug;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::formats::fasta;
use crate::model::Alignment;
use crate::tree::{NodeId, Tree};

pub const FASTA_CONTENT_TYPE: &str = "text/x-fasta";
pub const NEWICK_CONTENT_TYPE: &str = "text/plain";

/// Column selection for an alignment export.
///
/// All coordinates are 1-based and inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnWindow {
    pub col_start: Option<usize>,
    pub col_end: Option<usize>,
    /// Reference tip for ungapped coordinates
    pub ref_seq: Option<String>,
    pub ref_start: Option<usize>,
    pub ref_end: Option<usize>,
}

impl ColumnWindow {
    /// Window given in alignment columns.
    pub fn columns(start: usize, end: usize) -> Self {
        Self {
            col_start: Some(start),
            col_end: Some(end),
            ..Self::default()
        }
    }

    /// Window given in ungapped positions of `reference`.
    pub fn reference(reference: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            ref_seq: Some(reference.into()),
            ref_start: Some(start),
            ref_end: Some(end),
            ..Self::default()
        }
    }

    /// Resolves the window to a 0-based, half-open column range.
    ///
    /// A complete reference window takes precedence over column bounds;
    /// without either the full width is used, even when it is zero.
    pub fn resolve(&self, alignment: &Alignment) -> Result<Range<usize>> {
        let width = alignment.width();

        if let (Some(reference), Some(start), Some(end)) = (&self.ref_seq, self.ref_start, self.ref_end) {
            let seq = alignment
                .get(reference)
                .ok_or_else(|| Error::MissingSequence(reference.clone()))?;
            let (first, last) = seq.ungapped_to_columns(start, end).ok_or_else(|| {
                Error::Range(format!(
                    "reference window {}..{} outside {} (ungapped length {})",
                    start,
                    end,
                    reference,
                    seq.ungapped_len()
                ))
            })?;
            return Ok(first..last + 1);
        }

        if self.col_start.is_none() && self.col_end.is_none() {
            return Ok(0..width);
        }

        let start = self.col_start.unwrap_or(1).max(1);
        let end = self.col_end.unwrap_or(width).min(width);
        if start > end {
            return Err(Error::Range(format!(
                "empty column window {}..{} (width {})",
                self.col_start.unwrap_or(1),
                self.col_end.unwrap_or(width),
                width
            )));
        }
        Ok(start - 1..end)
    }
}

/// Outcome marker of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    Success,
}

/// Exported document with its delivery metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPayload {
    pub status: ExportStatus,
    pub content_type: &'static str,
    /// Suggested file name for the download
    pub file_name: String,
    pub body: Vec<u8>,
}

/// Subtree tips followed by extra tips, each once.
///
/// Extra names must be tips of the tree.
pub fn export_tip_set<'a, S: AsRef<str>>(tree: &'a Tree, node: NodeId, extra_tips: &'a [S]) -> Result<Vec<&'a str>> {
    let mut tips = tree.subtree_tips(node)?;
    let mut seen: HashSet<&str> = tips.iter().copied().collect();
    for name in extra_tips {
        let name = name.as_ref();
        if !tree.contains_tip(name) {
            return Err(Error::UnknownTip(name.to_string()));
        }
        if seen.insert(name) {
            tips.push(name);
        }
    }
    Ok(tips)
}

/// Exports the aligned sequences of a subtree as FASTA.
///
/// Tips without a sequence are skipped. Every record is cut to the same
/// column window.
pub fn export_alignment<S: AsRef<str>>(
    tree: &Tree,
    alignment: &Alignment,
    node: NodeId,
    extra_tips: &[S],
    window: &ColumnWindow,
) -> Result<ExportPayload> {
    let tips = export_tip_set(tree, node, extra_tips)?;
    let columns = window.resolve(alignment)?;
    debug!("Exporting node {} ({} tips) over columns {:?}", node, tips.len(), columns);

    let mut body = Vec::with_capacity(tips.len() * (columns.len() + 32));
    let mut written = 0;
    for tip in tips {
        let Some(seq) = alignment.get(tip) else {
            continue;
        };
        fasta::write_record(&mut body, tip, seq.columns(columns.clone())).map_err(|e| Error::io("<export>", e))?;
        written += 1;
    }
    debug!("Exported {} sequences for node {}", written, node);

    Ok(ExportPayload {
        status: ExportStatus::Success,
        content_type: FASTA_CONTENT_TYPE,
        file_name: format!("export_node{}.fasta", node),
        body,
    })
}

/// Exports the subtree rooted at `node` as Newick.
pub fn export_newick(tree: &Tree, node: NodeId) -> Result<ExportPayload> {
    let newick = tree.induced_subtree_newick::<&str>(node, &[])?;
    Ok(ExportPayload {
        status: ExportStatus::Success,
        content_type: NEWICK_CONTENT_TYPE,
        file_name: format!("node{}.nwk", node),
        body: newick.into_bytes(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::formats::fasta::load_alignment;
    use crate::formats::newick::parse_newick;

    const NONE: &[&str] = &[];

    fn data() -> (Tree, Alignment) {
        let tree = parse_newick("((tipA:0.1,tipB:0.2)90:0.3,tipC:0.4);").unwrap();
        let alignment = load_alignment(">tipA\nMKT-AA\n>tipB\nMKTGAA\n>tipC\nMKTG-A\n").unwrap();
        (tree, alignment)
    }

    fn body(payload: &ExportPayload) -> &str {
        std::str::from_utf8(&payload.body).unwrap()
    }

    #[test]
    fn test_full_export_of_root() {
        let (tree, aln) = data();
        let payload = export_alignment(&tree, &aln, 0, NONE, &ColumnWindow::default()).unwrap();
        assert_eq!(payload.status, ExportStatus::Success);
        assert_eq!(payload.file_name, "export_node0.fasta");
        assert_eq!(body(&payload), ">tipA\nMKT-AA\n>tipB\nMKTGAA\n>tipC\nMKTG-A\n");
    }

    #[test]
    fn test_extra_tips_follow_subtree() {
        let (tree, aln) = data();
        let payload = export_alignment(&tree, &aln, 1, &["tipC", "tipA", "tipC"], &ColumnWindow::default()).unwrap();
        assert_eq!(body(&payload), ">tipA\nMKT-AA\n>tipB\nMKTGAA\n>tipC\nMKTG-A\n");
    }

    #[test]
    fn test_tip_without_sequence_skipped() {
        let (tree, _) = data();
        let aln = load_alignment(">tipB\nMKTGAA\n").unwrap();
        let payload = export_alignment(&tree, &aln, 0, NONE, &ColumnWindow::default()).unwrap();
        assert_eq!(body(&payload), ">tipB\nMKTGAA\n");
    }

    #[test]
    fn test_column_window() {
        let (tree, aln) = data();
        let payload = export_alignment(&tree, &aln, 1, NONE, &ColumnWindow::columns(2, 4)).unwrap();
        assert_eq!(body(&payload), ">tipA\nKT-\n>tipB\nKTG\n");
    }

    #[test]
    fn test_column_window_clipped() {
        let (_, aln) = data();
        let window = ColumnWindow {
            col_start: Some(0),
            col_end: Some(99),
            ..ColumnWindow::default()
        };
        assert_eq!(window.resolve(&aln).unwrap(), 0..6);

        let open_end = ColumnWindow {
            col_start: Some(5),
            ..ColumnWindow::default()
        };
        assert_eq!(open_end.resolve(&aln).unwrap(), 4..6);
    }

    #[test]
    fn test_empty_column_window() {
        let (_, aln) = data();
        let err = ColumnWindow::columns(5, 2).resolve(&aln).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[test]
    fn test_column_window_past_end() {
        let (tree, aln) = data();
        let err = ColumnWindow::columns(10, 20).resolve(&aln).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);

        let start_only = ColumnWindow {
            col_start: Some(7),
            ..ColumnWindow::default()
        };
        assert_eq!(start_only.resolve(&aln).unwrap_err().kind(), ErrorKind::Range);

        let err = export_alignment(&tree, &aln, 0, NONE, &ColumnWindow::columns(10, 20)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);

        assert_eq!(ColumnWindow::columns(6, 20).resolve(&aln).unwrap(), 5..6);
    }

    #[test]
    fn test_zero_width_alignment() {
        let tree = parse_newick("(a,b);").unwrap();
        let aln = load_alignment(">a\n>b\n").unwrap();
        assert_eq!(aln.width(), 0);

        let payload = export_alignment(&tree, &aln, 0, NONE, &ColumnWindow::default()).unwrap();
        assert_eq!(body(&payload), ">a\n\n>b\n\n");

        let err = ColumnWindow::columns(1, 1).resolve(&aln).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[test]
    fn test_export_newick_deep_tree() {
        let depth = 20_000;
        let mut input = "(".repeat(depth);
        input.push_str("t0");
        for i in 1..=depth {
            input.push_str(&format!(",t{})", i));
        }
        input.push(';');
        let tree = parse_newick(&input).unwrap();

        let payload = export_newick(&tree, tree.root()).unwrap();
        assert_eq!(payload.body, input.as_bytes());
    }

    #[test]
    fn test_reference_window() {
        let (tree, aln) = data();
        // Ungapped positions 3..4 of tipA are T and A, at columns 2 and 4
        let window = ColumnWindow::reference("tipA", 3, 4);
        assert_eq!(window.resolve(&aln).unwrap(), 2..5);

        let payload = export_alignment(&tree, &aln, 0, NONE, &window).unwrap();
        assert_eq!(body(&payload), ">tipA\nT-A\n>tipB\nTGA\n>tipC\nTG-\n");
    }

    #[test]
    fn test_reference_overrides_columns() {
        let (_, aln) = data();
        let window = ColumnWindow {
            col_start: Some(1),
            col_end: Some(1),
            ..ColumnWindow::reference("tipB", 6, 6)
        };
        assert_eq!(window.resolve(&aln).unwrap(), 5..6);
    }

    #[test]
    fn test_incomplete_reference_ignored() {
        let (_, aln) = data();
        let window = ColumnWindow {
            ref_seq: Some("tipA".to_string()),
            ref_start: Some(1),
            ..ColumnWindow::default()
        };
        assert_eq!(window.resolve(&aln).unwrap(), 0..6);
    }

    #[test]
    fn test_reference_window_past_end() {
        let (tree, aln) = data();
        // tipA has five non-gap residues
        let err = export_alignment(&tree, &aln, 0, NONE, &ColumnWindow::reference("tipA", 2, 6)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);

        assert!(ColumnWindow::reference("tipA", 1, 5).resolve(&aln).is_ok());
        assert_eq!(
            ColumnWindow::reference("tipA", 0, 2).resolve(&aln).unwrap_err().kind(),
            ErrorKind::Range
        );
    }

    #[test]
    fn test_unknown_reference() {
        let (_, aln) = data();
        let err = ColumnWindow::reference("nope", 1, 2).resolve(&aln).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_unknown_node_and_tip() {
        let (tree, aln) = data();
        let err = export_alignment(&tree, &aln, 42, NONE, &ColumnWindow::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownNode(42)));

        let err = export_alignment(&tree, &aln, 1, &["ghost"], &ColumnWindow::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownTip(_)));
    }

    #[test]
    fn test_export_newick() {
        let (tree, _) = data();
        let payload = export_newick(&tree, 1).unwrap();
        assert_eq!(payload.file_name, "node1.nwk");
        assert!(payload.body.ends_with(b";"));

        let subtree = parse_newick(std::str::from_utf8(&payload.body).unwrap()).unwrap();
        assert_eq!(subtree.tips_of(), vec!["tipA", "tipB"]);
    }
}
