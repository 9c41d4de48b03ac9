//! Session lifecycle and the query operations over loaded data.
//!
//! A [`Session`] starts unloaded. [`Session::load`] reads a data directory
//! and replaces the current data only when every present input parsed;
//! [`Session::reset`] discards it. Queries borrow the session immutably, so
//! loading and resetting cannot overlap with them.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::ser::Serializer;
use serde::Serialize;

use crate::config::LoadConfig;
use crate::error::{Error, Result};
use crate::export::{self, ColumnWindow, ExportPayload};
use crate::formats::dataset::{self, DatasetTable, DatasetView};
use crate::formats::{self, fasta, newick};
use crate::model::Alignment;
use crate::pairwise::{self, PairwiseIdentity};
use crate::search::{self, MotifMatches, SearchMode};
use crate::species::{self, SpeciesSet, SpeciesSummary};
use crate::tree::{NodeId, Tree, TreeView};

/// Everything read from one data directory.
#[derive(Debug)]
struct LoadedData {
    input_dir: PathBuf,
    tree: Tree,
    alignment: Option<Alignment>,
    species: SpeciesSet,
    /// Dataset tables by file name, in load order
    datasets: Vec<(String, DatasetTable)>,
}

impl LoadedData {
    fn read(dir: &Path, config: &LoadConfig) -> Result<Self> {
        let inputs = formats::discover_inputs(dir, config)?;

        let tree_path = inputs.tree.ok_or(Error::MissingInput("tree"))?;
        let tree = newick::parse_newick(&formats::read_text(&tree_path)?)?;
        info!(
            "Loaded tree {} ({} nodes, {} tips)",
            tree_path.display(),
            tree.num_nodes(),
            tree.num_tips()
        );

        let alignment = match &inputs.alignment {
            Some(path) => {
                let alignment = fasta::load_alignment(&formats::read_text(path)?)?;
                info!(
                    "Loaded alignment {} ({} sequences, width {})",
                    path.display(),
                    alignment.sequence_count(),
                    alignment.width()
                );
                check_overlap(&tree, &alignment);
                Some(alignment)
            }
            None => {
                debug!("No alignment in {}", dir.display());
                None
            }
        };

        let species = species::load_species_files(&inputs.species_files)?;
        if !species.is_empty() {
            info!("Loaded {} species", species.len());
        }

        let tips = tree.tips_of();
        let mut datasets = Vec::with_capacity(inputs.dataset_files.len());
        for path in &inputs.dataset_files {
            let name = formats::file_name(path);
            let table = dataset::load_dataset(&formats::read_text(path)?, &tips)
                .map_err(|e| match e {
                    Error::Dataset(msg) => Error::Dataset(format!("{}: {}", name, msg)),
                    other => other,
                })?;
            if table.unmatched_row_count() > 0 {
                warn!(
                    "Dataset {}: {} rows do not match any tip",
                    name,
                    table.unmatched_row_count()
                );
            }
            info!(
                "Loaded dataset {} ({} conditions, {} matched rows)",
                name,
                table.conditions().len(),
                table.matched_row_count()
            );
            datasets.push((name, table));
        }

        Ok(Self {
            input_dir: dir.to_path_buf(),
            tree,
            alignment,
            species,
            datasets,
        })
    }
}

/// Warns about names that only one of tree and alignment knows.
fn check_overlap(tree: &Tree, alignment: &Alignment) {
    let orphans = alignment.names().filter(|name| !tree.contains_tip(name)).count();
    if orphans > 0 {
        warn!("{} alignment sequences are not tips of the tree", orphans);
    }
    let missing = tree.tips_of().into_iter().filter(|tip| !alignment.contains(tip)).count();
    if missing > 0 {
        warn!("{} tree tips have no aligned sequence", missing);
    }
}

#[derive(Debug, Default)]
enum SessionState {
    #[default]
    Unloaded,
    Loaded(Box<LoadedData>),
}

/// Holds the data of the current analysis.
#[derive(Debug, Default)]
pub struct Session {
    config: LoadConfig,
    state: SessionState,
}

// ============================================================================
// Operation results
// ============================================================================

/// Result of [`Session::load`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadOutcome {
    pub success: bool,
    pub error: Option<String>,
}

/// Result of [`Session::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub loaded: bool,
    pub has_fasta: bool,
    pub dataset_files: Vec<String>,
    pub input_dir: Option<String>,
}

/// Result of [`Session::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResetResult {
    pub ok: bool,
}

/// Tip names in tree order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TipNames<'a> {
    pub tips: Vec<&'a str>,
}

/// Dataset file names in load order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetNames<'a> {
    pub datasets: Vec<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeTips<'a> {
    pub node_id: NodeId,
    pub tips: Vec<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TipSequence<'a> {
    pub name: &'a str,
    pub seq: &'a str,
}

/// Ungapped length of every aligned tip, in alignment order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipLengths<'a>(pub Vec<(&'a str, usize)>);

impl Serialize for TipLengths<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().copied())
    }
}

impl Session {
    pub fn new(config: LoadConfig) -> Self {
        Self {
            config,
            state: SessionState::Unloaded,
        }
    }

    fn data(&self) -> Result<&LoadedData> {
        match &self.state {
            SessionState::Loaded(data) => Ok(&**data),
            SessionState::Unloaded => Err(Error::NotLoaded),
        }
    }

    fn alignment(&self) -> Result<&Alignment> {
        self.data()?.alignment.as_ref().ok_or(Error::MissingInput("alignment"))
    }

    /// Loads a data directory, replacing the current data on success.
    ///
    /// On failure the previous data is kept and the error message is
    /// returned in the outcome.
    pub fn load<P: AsRef<Path>>(&mut self, dir: P) -> LoadOutcome {
        let dir = dir.as_ref();
        match LoadedData::read(dir, &self.config) {
            Ok(data) => {
                info!("Session loaded from {}", dir.display());
                self.state = SessionState::Loaded(Box::new(data));
                LoadOutcome {
                    success: true,
                    error: None,
                }
            }
            Err(e) => {
                warn!("Failed to load {}: {}", dir.display(), e);
                LoadOutcome {
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub fn status(&self) -> Status {
        match &self.state {
            SessionState::Loaded(data) => Status {
                loaded: true,
                has_fasta: data.alignment.is_some(),
                dataset_files: data.datasets.iter().map(|(name, _)| name.clone()).collect(),
                input_dir: Some(data.input_dir.display().to_string()),
            },
            SessionState::Unloaded => Status {
                loaded: false,
                has_fasta: false,
                dataset_files: Vec::new(),
                input_dir: None,
            },
        }
    }

    /// Discards all loaded data.
    pub fn reset(&mut self) -> ResetResult {
        if matches!(self.state, SessionState::Loaded(_)) {
            info!("Session reset");
        }
        self.state = SessionState::Unloaded;
        ResetResult { ok: true }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, SessionState::Loaded(_))
    }

    /// The loaded tree.
    pub fn tree(&self) -> Result<&Tree> {
        Ok(&self.data()?.tree)
    }

    /// Nested tree rooted at the tree root, tips tagged with their species.
    pub fn get_tree(&self) -> Result<TreeView<'_>> {
        let data = self.data()?;
        let species_of = |tip: &str| data.species.species_of(tip).map(str::to_string);
        data.tree.view(data.tree.root(), &species_of)
    }

    pub fn get_species(&self) -> Result<SpeciesSummary<'_>> {
        Ok(self.data()?.species.summary())
    }

    pub fn tip_names(&self) -> Result<TipNames<'_>> {
        Ok(TipNames {
            tips: self.data()?.tree.tips_of(),
        })
    }

    /// Dataset file names, in load order.
    pub fn list_datasets(&self) -> Result<DatasetNames<'_>> {
        Ok(DatasetNames {
            datasets: self
                .data()?
                .datasets
                .iter()
                .map(|(name, _)| name.as_str())
                .collect(),
        })
    }

    pub fn get_dataset(&self, name: &str) -> Result<DatasetView<'_>> {
        self.data()?
            .datasets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(n, table)| table.view(n))
            .ok_or_else(|| Error::UnknownDataset(name.to_string()))
    }

    pub fn search_motif<'a>(&'a self, pattern: &'a str, mode: SearchMode) -> Result<MotifMatches<'a>> {
        let matched_tips = search::search_motif(self.alignment()?, pattern, mode)?;
        Ok(MotifMatches {
            pattern,
            mode,
            matched_tips,
        })
    }

    pub fn pairwise_identity(&self, tip1: &str, tip2: &str) -> Result<PairwiseIdentity> {
        pairwise::pairwise_identity(self.alignment()?, tip1, tip2)
    }

    pub fn node_tips(&self, node_id: NodeId) -> Result<NodeTips<'_>> {
        Ok(NodeTips {
            node_id,
            tips: self.data()?.tree.subtree_tips(node_id)?,
        })
    }

    /// FASTA export of a subtree; see [`export::export_alignment`].
    pub fn export_alignment<S: AsRef<str>>(
        &self,
        node_id: NodeId,
        extra_tips: &[S],
        window: &ColumnWindow,
    ) -> Result<ExportPayload> {
        let tree = &self.data()?.tree;
        export::export_alignment(tree, self.alignment()?, node_id, extra_tips, window)
    }

    pub fn export_newick(&self, node_id: NodeId) -> Result<ExportPayload> {
        export::export_newick(&self.data()?.tree, node_id)
    }

    pub fn tip_sequence<'a>(&'a self, name: &str) -> Result<TipSequence<'a>> {
        let seq = self
            .alignment()?
            .get(name)
            .ok_or_else(|| Error::MissingSequence(name.to_string()))?;
        Ok(TipSequence {
            name: seq.id.as_str(),
            seq: seq.as_str(),
        })
    }

    pub fn tip_lengths(&self) -> Result<TipLengths<'_>> {
        Ok(TipLengths(
            self.alignment()?
                .iter()
                .map(|seq| (seq.id.as_str(), seq.ungapped_len()))
                .collect(),
        ))
    }

    /// Internal nodes holding every listed species and none of `exclude`.
    pub fn nodes_by_species<S: AsRef<str>>(&self, species: &[S], exclude: &[S]) -> Result<Vec<NodeId>> {
        let data = self.data()?;
        data.species.nodes_by_species(&data.tree, species, exclude)
    }
}
