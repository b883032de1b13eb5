//! Reading and writing result files for the rating engine.
//!
//! - [`read_pgn`] collects game results from PGN tag pairs
//! - [`read_csv_games`] reads the same results from a CSV table
//! - [`read_priors`], [`read_relative_priors`] and [`read_anchors`] load the
//!   optional side tables
//! - [`write_pgn`] writes a minimal PGN file, used for simulated game sets
//!
//! Player names are interned into a [`Names`] table so the engine only ever
//! sees ids.

mod csv;
mod reader;
mod roster;
mod writer;

pub use reader::{read_anchors, read_csv_games, read_pgn, read_priors, read_relative_priors, PgnError};
pub use roster::{Names, Synonyms};
pub use writer::write_pgn;
