//! Spectrum source readers.
//!
//! Each reader turns an external layout into a stream of
//! [`RawSpectrum`](crate::spectrum::RawSpectrum) records for the ingestion
//! pipeline. Readers yield [`SourceResult`](crate::spectrum::SourceResult)
//! items: a record the reader could skip past but not decode comes through
//! as an `Err` and is counted as skipped downstream, so a single bad record
//! never aborts a run.

pub mod msp;
pub mod tabular;

pub use msp::MspReader;
pub use tabular::{read_peak_csv, TabularReader};
