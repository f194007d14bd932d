//! Raw spectrum model shared by all ingestion sources.
//!
//! A [`RawSpectrum`] is the unit of work flowing into the binning pipeline:
//! an optional source-native identifier, an ordered peak list, and a
//! pass-through metadata payload. Source readers produce them, the binner
//! consumes them, and they are discarded afterwards.

use serde_json::Value;

/// Metadata payload attached to spectra, indexed points, and search hits.
///
/// Keys are strings; values are arbitrary JSON scalars or structures, passed
/// through to the indexing service untouched.
pub type Metadata = serde_json::Map<String, Value>;

/// A single measured peak: mass (m/z) and signal intensity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Mass-to-charge ratio. Must be non-negative and finite.
    pub mz: f64,
    /// Signal intensity. Must be finite; zero is a valid measurement.
    pub intensity: f64,
}

impl Peak {
    /// Create a peak from a mass/intensity pair.
    pub fn new(mz: f64, intensity: f64) -> Self {
        Self { mz, intensity }
    }
}

/// Record-level data errors.
///
/// These are recoverable at the single-record level: the ingestion pipeline
/// counts the offending spectrum as skipped and continues with the next one.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DomainDataError {
    /// A peak carried a negative mass.
    #[error("negative mass {mz} in peak list")]
    NegativeMass {
        /// The offending m/z value.
        mz: f64,
    },

    /// A peak carried a non-finite mass or intensity.
    #[error("non-finite peak (mz={mz}, intensity={intensity})")]
    NonFinitePeak {
        /// The m/z value of the offending peak.
        mz: f64,
        /// The intensity of the offending peak.
        intensity: f64,
    },

    /// The computed bin index does not fit the index type.
    #[error("mass {mz} maps to a bin index beyond the supported range")]
    MassOutOfRange {
        /// The offending m/z value.
        mz: f64,
    },

    /// Mass and intensity lists of a tabular record differ in length.
    #[error("mass list length {masses} does not match intensity list length {intensities}")]
    PeakListMismatch {
        /// Number of mass values in the record.
        masses: usize,
        /// Number of intensity values in the record.
        intensities: usize,
    },

    /// The source record could not be decoded into a spectrum at all.
    #[error("malformed record: {0}")]
    MalformedRecord(String),
}

/// A raw spectrum as produced by a source reader.
#[derive(Debug, Clone, Default)]
pub struct RawSpectrum {
    /// Source-native identifier, when the source carries one.
    pub native_id: Option<String>,
    /// Ordered peak list.
    pub peaks: Vec<Peak>,
    /// Pass-through metadata (header fields, column values, ...).
    pub metadata: Metadata,
}

impl RawSpectrum {
    /// Create a spectrum from a peak list, with no identifier or metadata.
    pub fn from_peaks(peaks: Vec<Peak>) -> Self {
        Self {
            native_id: None,
            peaks,
            metadata: Metadata::new(),
        }
    }
}

/// Item type yielded by spectrum sources.
///
/// An `Err` marks a record the source could read past but not decode; the
/// pipeline records it as skipped. Errors that break the whole stream are
/// surfaced by the reader's constructor instead.
pub type SourceResult = Result<RawSpectrum, DomainDataError>;
