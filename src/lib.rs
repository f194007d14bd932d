//! # mzSparse - Sparse-Vector Similarity Search for Mass Spectra
//!
//! `mzsparse` turns raw mass-spectrometry peak lists into fixed-resolution
//! sparse vectors and drives them into an external vector-index engine for
//! similarity search.
//!
//! ## Key Features
//!
//! - **Deterministic Binning**: `floor(mz / bin_width)` bin selection with
//!   sum aggregation, so re-ingesting the same data always reproduces the
//!   same vectors.
//!
//! - **Batched Ingestion**: spectra stream through the pipeline with O(batch)
//!   memory, bounded retries with exponential backoff, and per-record
//!   failure isolation: one bad record never aborts a run.
//!
//! - **Engine-Agnostic Contract**: the vector index is an external
//!   capability behind the [`index::IndexingService`] trait; an HTTP client
//!   for the standard service boundary ships in [`client`].
//!
//! - **Deterministic Ranking**: hits order by descending score with ties
//!   broken by ascending identifier, regardless of engine tie behavior.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use mzsparse::prelude::*;
//!
//! // Configure binning and batching once per run
//! let binning = BinningConfig::new(0.1)?;
//! let config = PipelineConfig::new(binning, 256)?
//!     .with_id_rule(IdRule::Generated { original_id_key: None });
//!
//! // Connect to the indexing service
//! let service = HttpIndexingService::new(
//!     "http://localhost:8000",
//!     "ms_spectra",
//!     Duration::from_secs(120),
//! )?;
//!
//! // Stream an MSP library into the index
//! let reader = MspReader::open("library.msp")?;
//! let report = IngestionPipeline::new(&service, config).run(reader);
//! println!(
//!     "{} succeeded, {} skipped",
//!     report.records_succeeded,
//!     report.records_skipped()
//! );
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`spectrum`]: raw spectrum model shared by all sources
//! - [`binning`]: pure peak-list → sparse-vector transformation
//! - [`sparse`]: canonical sparse-vector representation and validity rules
//! - [`pipeline`]: batching, retry, cancellation, and the run report
//! - [`index`]: the indexing-service contract and ranking rules
//! - [`client`]: blocking HTTP implementation of the contract
//! - [`formats`]: MSP and tabular source readers
//!
//! ## Data Flow
//!
//! ```text
//! raw spectrum ──▶ Binner ──▶ sparse vector (+ metadata)
//!                                   │ batched upsert
//!                                   ▼
//!                           Indexing Service ──▶ ranked hits ──▶ caller
//! ```

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod binning;
pub mod client;
pub mod formats;
pub mod index;
pub mod pipeline;
pub mod sparse;
pub mod spectrum;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::binning::{bin_peaks, BinningConfig, ConfigError};
    pub use crate::client::{HttpIndexingService, DEFAULT_COLLECTION, DEFAULT_TIMEOUT_SECS};
    pub use crate::formats::{read_peak_csv, MspReader, TabularReader};
    pub use crate::index::{
        rank_hits, search_ranked, Hit, IndexedPoint, IndexingService, SearchError, ServiceError,
    };
    pub use crate::pipeline::{
        run_parallel, CancelToken, FailedBatch, IdRule, IngestReport, IngestionPipeline,
        PipelineConfig, RetryPolicy, DEFAULT_BATCH_SIZE,
    };
    pub use crate::sparse::{MalformedVector, SparseVector};
    pub use crate::spectrum::{DomainDataError, Metadata, Peak, RawSpectrum, SourceResult};
}
