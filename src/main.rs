//! phylotip - Phylogenetic tree analysis from the command line
//!
//! Loads a data directory and runs one query against it.
//!
//! ## Usage
//!
//! ```bash
//! phylotip <data_dir> status
//! phylotip <data_dir> motif KT --mode regex
//! phylotip <data_dir> export 3 --col-start 10 --col-end 80 -o clade.fasta
//! ```
//!
//! ## Data directory layout
//!
//! - a Newick tree (.nwk, .newick, .tree, .tre), required
//! - an alignment (.fa, .fasta, ...), optional
//! - `orthofinder-input/`: one FASTA file per species, optional
//! - `dataset/`: tab-separated tables, optional
//!
//! Query results are printed as JSON. Exports write the document itself.

// Use jemalloc for better memory management (returns memory to OS)
#[cfg(not(windows))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use phylotip::config::LoadConfig;
use phylotip::export::{ColumnWindow, ExportPayload};
use phylotip::search::SearchMode;
use phylotip::session::Session;
use phylotip::tree::NodeId;

/// Motif interpretation for command line
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Plain substring
    Literal,
    /// Regular expression
    Regex,
}

impl From<ModeArg> for SearchMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Literal => SearchMode::Literal,
            ModeArg::Regex => SearchMode::Regex,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show what was loaded
    Status,
    /// Print the tree as nested JSON
    Tree,
    /// List species and their tips
    Species,
    /// List tip names in tree order
    Tips,
    /// List dataset file names
    Datasets,
    /// Show one dataset reconciled with the tree tips
    Dataset { name: String },
    /// Find tips whose aligned sequence contains a motif
    Motif {
        pattern: String,
        #[arg(short = 'm', long = "mode", value_enum, default_value = "literal")]
        mode: ModeArg,
    },
    /// Identity between two aligned tips
    Pairwise { tip1: String, tip2: String },
    /// Tips below a node
    NodeTips { node: NodeId },
    /// Export the alignment of a subtree as FASTA
    Export {
        node: NodeId,
        /// Additional tips to include (repeatable)
        #[arg(short = 'x', long = "extra")]
        extra: Vec<String>,
        /// First alignment column (1-based)
        #[arg(long = "col-start")]
        col_start: Option<usize>,
        /// Last alignment column (1-based, inclusive)
        #[arg(long = "col-end")]
        col_end: Option<usize>,
        /// Reference tip for ungapped coordinates
        #[arg(long = "ref")]
        ref_seq: Option<String>,
        /// First ungapped reference position (1-based)
        #[arg(long = "ref-start")]
        ref_start: Option<usize>,
        /// Last ungapped reference position (1-based, inclusive)
        #[arg(long = "ref-end")]
        ref_end: Option<usize>,
    },
    /// Export a subtree as Newick
    ExportNewick { node: NodeId },
    /// Aligned sequence of one tip
    TipSeq { name: String },
    /// Ungapped length of every aligned tip
    TipLengths,
    /// Internal nodes holding all given species
    NodesBySpecies {
        #[arg(required = true)]
        species: Vec<String>,
        /// Species that must not occur below the node (repeatable)
        #[arg(short = 'e', long = "exclude")]
        exclude: Vec<String>,
    },
}

/// phylotip - Query a phylogenetic tree and the data attached to its tips
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data directory holding the tree and its companion files
    dir: PathBuf,

    /// Sub-directory holding one FASTA file per species
    #[arg(long = "species-dir", default_value = phylotip::config::DEFAULT_SPECIES_DIR)]
    species_dir: String,

    /// Sub-directory holding dataset tables
    #[arg(long = "dataset-dir", default_value = phylotip::config::DEFAULT_DATASET_DIR)]
    dataset_dir: String,

    /// Additional tree file extension (repeatable)
    #[arg(long = "tree-ext")]
    tree_ext: Vec<String>,

    /// Additional alignment file extension (repeatable)
    #[arg(long = "aln-ext")]
    aln_ext: Vec<String>,

    /// Output file for exports. Use "-" for stdout.
    #[arg(short = 'o', long = "output", default_value = "-")]
    output: String,

    #[command(subcommand)]
    command: Command,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, value)?;
    writeln!(handle)?;
    Ok(())
}

/// Writes an export body to stdout or to a file.
fn write_payload(payload: &ExportPayload, output: &str) -> Result<()> {
    if output == "-" {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(&payload.body)?;
        if !payload.body.ends_with(b"\n") {
            writeln!(handle)?;
        }
    } else {
        std::fs::write(output, &payload.body)?;
        eprintln!("Wrote {} ({} bytes) to {}", payload.file_name, payload.body.len(), output);
    }
    Ok(())
}

fn run(session: &Session, command: Command, output: &str) -> Result<()> {
    match command {
        Command::Status => print_json(&session.status()),
        Command::Tree => print_json(&session.get_tree()?),
        Command::Species => print_json(&session.get_species()?),
        Command::Tips => print_json(&session.tip_names()?),
        Command::Datasets => print_json(&session.list_datasets()?),
        Command::Dataset { name } => print_json(&session.get_dataset(&name)?),
        Command::Motif { pattern, mode } => print_json(&session.search_motif(&pattern, mode.into())?),
        Command::Pairwise { tip1, tip2 } => print_json(&session.pairwise_identity(&tip1, &tip2)?),
        Command::NodeTips { node } => print_json(&session.node_tips(node)?),
        Command::Export {
            node,
            extra,
            col_start,
            col_end,
            ref_seq,
            ref_start,
            ref_end,
        } => {
            let window = ColumnWindow {
                col_start,
                col_end,
                ref_seq,
                ref_start,
                ref_end,
            };
            write_payload(&session.export_alignment(node, &extra, &window)?, output)
        }
        Command::ExportNewick { node } => write_payload(&session.export_newick(node)?, output),
        Command::TipSeq { name } => print_json(&session.tip_sequence(&name)?),
        Command::TipLengths => print_json(&session.tip_lengths()?),
        Command::NodesBySpecies { species, exclude } => {
            print_json(&session.nodes_by_species(&species, &exclude)?)
        }
    }
}

fn main() -> Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();

    let mut config = LoadConfig::default()
        .with_species_dir(args.species_dir)
        .with_dataset_dir(args.dataset_dir);
    for ext in &args.tree_ext {
        config = config.with_tree_extension(ext);
    }
    for ext in &args.aln_ext {
        config = config.with_alignment_extension(ext);
    }
    let mut session = Session::new(config);

    let outcome = session.load(&args.dir);
    if !outcome.success {
        anyhow::bail!(
            "Cannot load {}: {}",
            args.dir.display(),
            outcome.error.unwrap_or_default()
        );
    }

    run(&session, args.command, &args.output)
}
