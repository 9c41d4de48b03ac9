//! Species marker sets.
//!
//! Each marker FASTA file describes one species: the species identifier is
//! the file stem and its tips are the record names of the file.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::LoadConfig;
use crate::error::{Error, Result};
use crate::formats::{self, fasta, InputKind};
use crate::tree::{NodeId, Tree};

/// Mapping from species identifier to the tip names of its marker file.
///
/// Species keep load order (sorted by file name); tip names keep file order
/// without repetitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeciesSet {
    species: Vec<(String, Vec<String>)>,
    tip_to_species: HashMap<String, usize>,
}

impl SpeciesSet {
    /// Adds one species with its tip names.
    ///
    /// A tip already claimed by an earlier species stays with that species.
    pub fn insert<I, S>(&mut self, species: impl Into<String>, tips: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index = self.species.len();
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for tip in tips {
            let tip = tip.into();
            if seen.insert(tip.clone()) {
                self.tip_to_species.entry(tip.clone()).or_insert(index);
                names.push(tip);
            }
        }
        self.species.push((species.into(), names));
    }

    /// Species identifiers in load order.
    pub fn species(&self) -> impl Iterator<Item = &str> {
        self.species.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// Tip names of one species.
    pub fn tips(&self, species: &str) -> Option<&[String]> {
        self.species
            .iter()
            .find(|(name, _)| name == species)
            .map(|(_, tips)| tips.as_slice())
    }

    /// Species a tip belongs to.
    pub fn species_of(&self, tip: &str) -> Option<&str> {
        self.tip_to_species
            .get(tip)
            .map(|&i| self.species[i].0.as_str())
    }

    fn index_of(&self, species: &str) -> Result<usize> {
        self.species
            .iter()
            .position(|(name, _)| name == species)
            .ok_or_else(|| Error::UnknownSpecies(species.to_string()))
    }

    /// Internal nodes whose clade holds every `wanted` species and none of
    /// the `excluded` ones, sorted by id.
    ///
    /// An empty `wanted` list selects nothing.
    pub fn nodes_by_species<S: AsRef<str>>(&self, tree: &Tree, wanted: &[S], excluded: &[S]) -> Result<Vec<NodeId>> {
        let wanted: Vec<usize> = wanted.iter().map(|s| self.index_of(s.as_ref())).collect::<Result<_>>()?;
        let excluded: HashSet<usize> = excluded.iter().map(|s| self.index_of(s.as_ref())).collect::<Result<_>>()?;
        if wanted.is_empty() || tree.num_nodes() == 0 {
            return Ok(Vec::new());
        }

        // Per node: which wanted species occur below it, and whether an excluded one does
        let mut covered = vec![vec![false; wanted.len()]; tree.num_nodes()];
        let mut tainted = vec![false; tree.num_nodes()];

        // Pre-order reversed visits children before their parent
        for id in tree.preorder(tree.root())?.into_iter().rev() {
            let node = &tree[id];
            if node.is_tip() {
                let Some(species) = node.label().and_then(|tip| self.tip_to_species.get(tip)) else {
                    continue;
                };
                for (slot, want) in wanted.iter().enumerate() {
                    covered[id][slot] |= want == species;
                }
                tainted[id] = excluded.contains(species);
            } else {
                for &child in node.children() {
                    for slot in 0..wanted.len() {
                        covered[id][slot] |= covered[child][slot];
                    }
                    tainted[id] |= tainted[child];
                }
            }
        }

        Ok((0..tree.num_nodes())
            .filter(|&id| !tree[id].is_tip() && !tainted[id] && covered[id].iter().all(|&c| c))
            .collect())
    }

    /// Serializable summary: species list and species-to-tips mapping.
    pub fn summary(&self) -> SpeciesSummary<'_> {
        SpeciesSummary {
            species: self.species().collect(),
            species_to_tips: self
                .species
                .iter()
                .map(|(name, tips)| (name.as_str(), tips.as_slice()))
                .collect(),
        }
    }
}

/// Result of the species query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesSummary<'a> {
    pub species: Vec<&'a str>,
    pub species_to_tips: std::collections::BTreeMap<&'a str, &'a [String]>,
}

/// Species identifier of a marker file: its file stem.
pub fn species_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Loads every FASTA file of a directory as one species, in file name order.
pub fn load_species_set<P: AsRef<Path>>(dir: P, config: &LoadConfig) -> Result<SpeciesSet> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if path.is_file() && formats::detect_kind_from_extension(&path, config) == Some(InputKind::Fasta) {
            files.push(path);
        }
    }
    files.sort();
    load_species_files(&files)
}

/// Loads the given marker files, one species per file.
pub fn load_species_files(files: &[PathBuf]) -> Result<SpeciesSet> {
    let mut set = SpeciesSet::default();
    for path in files {
        let text = formats::read_text(path)?;
        let records = fasta::parse_records(&text)?;
        set.insert(species_id(path), records.into_iter().map(|r| r.id));
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::newick::parse_newick;

    fn small_set() -> SpeciesSet {
        let mut set = SpeciesSet::default();
        set.insert("speciesA", ["tipA", "tipB"]);
        set.insert("speciesB", ["tipC"]);
        set
    }

    #[test]
    fn test_lookup() {
        let set = small_set();
        assert_eq!(set.species().collect::<Vec<_>>(), vec!["speciesA", "speciesB"]);
        assert_eq!(set.species_of("tipB"), Some("speciesA"));
        assert_eq!(set.species_of("tipX"), None);
        assert_eq!(set.tips("speciesB").unwrap(), &["tipC".to_string()]);
    }

    #[test]
    fn test_duplicate_tips_in_file() {
        let mut set = SpeciesSet::default();
        set.insert("s", ["a", "a", "b"]);
        assert_eq!(set.tips("s").unwrap().len(), 2);
    }

    #[test]
    fn test_nodes_by_species() {
        let tree = parse_newick("((tipA:0.1,tipB:0.2)90:0.3,tipC:0.4);").unwrap();
        let set = small_set();

        assert_eq!(set.nodes_by_species(&tree, &["speciesA"], &[]).unwrap(), vec![0, 1]);
        assert_eq!(set.nodes_by_species(&tree, &["speciesA", "speciesB"], &[]).unwrap(), vec![0]);
        assert_eq!(set.nodes_by_species(&tree, &["speciesA"], &["speciesB"]).unwrap(), vec![1]);
        assert!(set.nodes_by_species::<&str>(&tree, &[], &[]).unwrap().is_empty());
    }

    #[test]
    fn test_nodes_by_unknown_species() {
        let tree = parse_newick("(tipA,tipC);").unwrap();
        let result = small_set().nodes_by_species(&tree, &["nope"], &[]);
        assert!(matches!(result, Err(Error::UnknownSpecies(_))));
    }

    #[test]
    fn test_summary_serialization() {
        let set = small_set();
        let json = serde_json::to_value(set.summary()).unwrap();
        assert_eq!(json["species"][1], "speciesB");
        assert_eq!(json["species_to_tips"]["speciesA"][1], "tipB");
    }

    #[test]
    fn test_load_species_set() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("speciesB.fa"), ">tipC\nATG\n").unwrap();
        std::fs::write(dir.path().join("speciesA.fa"), ">tipA\nATG\n>tipB\nATGC\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let set = load_species_set(dir.path(), &LoadConfig::default()).unwrap();
        assert_eq!(set.species().collect::<Vec<_>>(), vec!["speciesA", "speciesB"]);
        assert_eq!(set.species_of("tipC"), Some("speciesB"));
    }
}
