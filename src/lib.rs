//! # phylotip - Phylogenetic tree analysis engine
//!
//! Loads a rooted tree together with the data attached to its tips and
//! answers queries over them.
//!
//! ## Architecture
//!
//! - `tree`: Arena tree with stable node ids and traversal queries
//! - `model`: Sequences and the alignment store
//! - `formats`: Newick, FASTA and dataset table readers, input discovery
//! - `species`: Species marker sets and species-based node selection
//! - `search`: Literal and regex motif search
//! - `pairwise`: Gap-aware pairwise identity
//! - `export`: FASTA and Newick export of subtrees
//! - `config`: Naming conventions of a data directory
//! - `session`: Load/reset lifecycle and every query operation
//!
//! ## Example
//!
//! ```no_run
//! use phylotip::session::Session;
//!
//! let mut session = Session::default();
//! let outcome = session.load("data/");
//! assert!(outcome.success);
//! println!("{:?}", session.tip_names().unwrap().tips);
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod formats;
pub mod model;
pub mod pairwise;
pub mod search;
pub mod session;
pub mod species;
pub mod tree;

pub use error::{Error, ErrorKind, Result};
pub use session::Session;
