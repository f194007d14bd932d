//! Fixed-width mass binning of peak lists into sparse vectors.
//!
//! The binner is the only non-trivial domain transformation in the crate:
//! each peak's mass selects a bin (`floor(mz / bin_width)`), intensities of
//! peaks landing in the same bin are summed, and the surviving bins become a
//! [`SparseVector`]. The function is pure and deterministic, so the same
//! peak list and configuration always reproduce the same vector; this is
//! what makes re-ingestion reproducible and the pipeline unit-testable.
//!
//! Aggregation is sum-only. Bin presence is peak-driven: a zero-intensity
//! peak still materializes its bin even though it contributes nothing to
//! the sum.

use std::collections::BTreeMap;

use crate::sparse::SparseVector;
use crate::spectrum::{DomainDataError, Peak};

/// Errors raised while constructing configuration.
///
/// Configuration errors are fatal and are raised before any record is
/// processed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Bin width must be a finite number greater than zero.
    #[error("bin width must be finite and > 0, got {width}")]
    InvalidBinWidth {
        /// The rejected width.
        width: f64,
    },

    /// Batch size must be greater than zero.
    #[error("batch size must be > 0")]
    InvalidBatchSize,

    /// Worker count must be greater than zero.
    #[error("worker count must be > 0")]
    InvalidConcurrency,
}

/// Immutable binning configuration, constructed once per ingestion run.
#[derive(Debug, Clone, Copy)]
pub struct BinningConfig {
    bin_width: f64,
}

impl BinningConfig {
    /// Default bin width in m/z units.
    pub const DEFAULT_BIN_WIDTH: f64 = 0.1;

    /// Create a configuration with the given bin width.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBinWidth`] if the width is not a
    /// finite number greater than zero.
    pub fn new(bin_width: f64) -> Result<Self, ConfigError> {
        if !bin_width.is_finite() || bin_width <= 0.0 {
            return Err(ConfigError::InvalidBinWidth { width: bin_width });
        }
        Ok(Self { bin_width })
    }

    /// The configured bin width in m/z units.
    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    fn bin_for(&self, mz: f64) -> Result<u32, DomainDataError> {
        let bin = (mz / self.bin_width).floor();
        if bin > f64::from(u32::MAX) {
            return Err(DomainDataError::MassOutOfRange { mz });
        }
        Ok(bin as u32)
    }
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            bin_width: Self::DEFAULT_BIN_WIDTH,
        }
    }
}

/// Bin a peak list into a sparse vector.
///
/// Peaks mapping to the same bin have their intensities summed. Bins are
/// emitted in ascending index order, each exactly once, so the result
/// always satisfies the sparse-vector invariants by construction.
///
/// An empty peak list yields the empty vector, which is valid.
///
/// # Errors
///
/// Returns a [`DomainDataError`] if any peak carries a negative mass or a
/// non-finite mass or intensity. The caller treats this as a record-level
/// failure; no partial vector is produced.
pub fn bin_peaks(peaks: &[Peak], config: &BinningConfig) -> Result<SparseVector, DomainDataError> {
    let mut bins: BTreeMap<u32, f64> = BTreeMap::new();

    for peak in peaks {
        if !peak.mz.is_finite() || !peak.intensity.is_finite() {
            return Err(DomainDataError::NonFinitePeak {
                mz: peak.mz,
                intensity: peak.intensity,
            });
        }
        if peak.mz < 0.0 {
            return Err(DomainDataError::NegativeMass { mz: peak.mz });
        }

        let bin = config.bin_for(peak.mz)?;
        *bins.entry(bin).or_insert(0.0) += peak.intensity;
    }

    let mut indices = Vec::with_capacity(bins.len());
    let mut values = Vec::with_capacity(bins.len());
    for (bin, sum) in bins {
        indices.push(bin);
        values.push(sum);
    }

    Ok(SparseVector { indices, values })
}
