//! # mzSparse CLI
//!
//! Command-line tools for indexing mass spectra as sparse vectors and
//! searching them by similarity.
//!
//! ## Usage
//!
//! ```bash
//! # Ingest an MSP spectral library
//! mzsparse ingest-msp library.msp --bin-width 0.1
//!
//! # Ingest a CSV export with JSON peak lists
//! mzsparse ingest-table spectra.csv --limit 1000
//!
//! # Search with a query spectrum
//! mzsparse search query.csv --limit 10
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity());
    cli::dispatch(cli)
}
