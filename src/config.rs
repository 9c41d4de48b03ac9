//! Loading configuration.
//!
//! [`LoadConfig`] captures the naming conventions used to find the inputs of
//! a data directory. The defaults match the layout written by the usual
//! orthology pipelines:
//!
//! ```text
//! data/
//! ├── species.nwk
//! ├── species.aa.fa
//! ├── orthofinder-input/
//! │   ├── speciesA.fa
//! │   └── speciesB.fa
//! └── dataset/
//!     └── heatmap.txt
//! ```

/// Default extensions of tree files.
pub const DEFAULT_TREE_EXTENSIONS: &[&str] = &["nwk", "newick", "tree", "tre"];

/// Default extensions of FASTA files.
pub const DEFAULT_ALIGNMENT_EXTENSIONS: &[&str] = &["fa", "fas", "fasta", "faa", "fna", "aln"];

/// Default sub-directory holding one marker FASTA file per species.
pub const DEFAULT_SPECIES_DIR: &str = "orthofinder-input";

/// Default sub-directory holding dataset tables.
pub const DEFAULT_DATASET_DIR: &str = "dataset";

/// Naming conventions for discovering the inputs of a data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadConfig {
    /// Lower-case extensions recognised as Newick trees
    pub tree_extensions: Vec<String>,
    /// Lower-case extensions recognised as FASTA
    pub alignment_extensions: Vec<String>,
    /// Name of the species marker sub-directory
    pub species_dir: String,
    /// Name of the dataset sub-directory
    pub dataset_dir: String,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            tree_extensions: DEFAULT_TREE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            alignment_extensions: DEFAULT_ALIGNMENT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            species_dir: DEFAULT_SPECIES_DIR.to_string(),
            dataset_dir: DEFAULT_DATASET_DIR.to_string(),
        }
    }
}

impl LoadConfig {
    /// Sets the species marker sub-directory.
    pub fn with_species_dir(mut self, dir: impl Into<String>) -> Self {
        self.species_dir = dir.into();
        self
    }

    /// Sets the dataset sub-directory.
    pub fn with_dataset_dir(mut self, dir: impl Into<String>) -> Self {
        self.dataset_dir = dir.into();
        self
    }

    /// Adds a tree file extension (case-insensitive).
    pub fn with_tree_extension(mut self, ext: &str) -> Self {
        self.tree_extensions.push(ext.to_lowercase());
        self
    }

    /// Adds a FASTA file extension (case-insensitive).
    pub fn with_alignment_extension(mut self, ext: &str) -> Self {
        self.alignment_extensions.push(ext.to_lowercase());
        self
    }
}
