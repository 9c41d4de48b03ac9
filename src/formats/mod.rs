//! Input file formats and discovery.
//!
//! Supports:
//! - Newick trees (see [`newick`])
//! - FASTA alignments and marker files (see [`fasta`])
//! - Tab-separated dataset tables (see [`dataset`])
//!
//! A data directory is recognised by naming conventions held in
//! [`LoadConfig`]: the tree and the alignment sit at the top level and are
//! detected from their extension, species marker files live in one
//! sub-directory and dataset tables in another.

pub mod dataset;
pub mod fasta;
pub mod newick;

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use log::debug;

use crate::config::LoadConfig;
use crate::error::{Error, Result};

/// Kind of a top-level input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Newick,
    Fasta,
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputKind::Newick => write!(f, "Newick"),
            InputKind::Fasta => write!(f, "FASTA"),
        }
    }
}

/// Detects the input kind from the file extension.
pub fn detect_kind_from_extension<P: AsRef<Path>>(path: P, config: &LoadConfig) -> Option<InputKind> {
    let ext = path.as_ref().extension().and_then(OsStr::to_str)?.to_lowercase();
    if config.tree_extensions.iter().any(|e| *e == ext) {
        Some(InputKind::Newick)
    } else if config.alignment_extensions.iter().any(|e| *e == ext) {
        Some(InputKind::Fasta)
    } else {
        None
    }
}

/// Reads a whole text file.
pub fn read_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let file_size = file.metadata().map(|m| m.len() as usize).unwrap_or(0);

    let mut reader = BufReader::with_capacity(1024 * 1024, file);
    let mut content = String::with_capacity(file_size);
    reader
        .read_to_string(&mut content)
        .map_err(|e| Error::io(path, e))?;
    Ok(content)
}

/// Files found in a data directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredInputs {
    pub tree: Option<PathBuf>,
    pub alignment: Option<PathBuf>,
    /// Species marker files, sorted by file name
    pub species_files: Vec<PathBuf>,
    /// Dataset tables, sorted by file name
    pub dataset_files: Vec<PathBuf>,
}

/// Scans `dir` for inputs.
///
/// The first tree and the first alignment in lexical order are taken.
/// Missing sub-directories simply yield no files.
pub fn discover_inputs<P: AsRef<Path>>(dir: P, config: &LoadConfig) -> Result<DiscoveredInputs> {
    let dir = dir.as_ref();
    let mut inputs = DiscoveredInputs::default();

    for path in sorted_files(dir)? {
        match detect_kind_from_extension(&path, config) {
            Some(InputKind::Newick) if inputs.tree.is_none() => inputs.tree = Some(path),
            Some(InputKind::Fasta) if inputs.alignment.is_none() => inputs.alignment = Some(path),
            Some(kind) => debug!("Ignoring additional {} file {}", kind, path.display()),
            None => {}
        }
    }

    let species_dir = dir.join(&config.species_dir);
    if species_dir.is_dir() {
        inputs.species_files = sorted_files(&species_dir)?
            .into_iter()
            .filter(|p| detect_kind_from_extension(p, config) == Some(InputKind::Fasta))
            .collect();
    }

    let dataset_dir = dir.join(&config.dataset_dir);
    if dataset_dir.is_dir() {
        inputs.dataset_files = sorted_files(&dataset_dir)?
            .into_iter()
            .filter(|p| !is_hidden(p))
            .collect();
    }

    debug!("Discovered inputs in {}: {:?}", dir.display(), inputs);
    Ok(inputs)
}

/// Regular files directly inside `dir`, sorted by path.
fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(OsStr::to_str)
        .is_some_and(|name| name.starts_with('.'))
}

/// File name of a path as an owned string.
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
