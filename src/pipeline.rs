//! Batch ingestion of raw spectra into the indexing service.
//!
//! The pipeline drives each [`RawSpectrum`] through identifier resolution
//! and the binner, buffers the resulting points, and submits one upsert per
//! full buffer (plus a final partial flush). Memory stays O(batch size)
//! regardless of how many spectra a source yields, and round-trips are
//! bounded by ⌈N/B⌉.
//!
//! # Failure semantics
//!
//! - Record-level failures (bad peak data, missing identifier, malformed
//!   vector) skip the offending record and never abort a run.
//! - Submission failures are retried with exponential backoff; when retries
//!   exhaust, that batch alone is marked failed and the run continues. The
//!   report lists the ids of every failed batch so the caller can re-submit
//!   them idempotently.
//! - Configuration errors are rejected up front, before any record is read.
//!
//! # Cancellation
//!
//! A [`CancelToken`] checked between records stops the scheduling of new
//! batches; a batch already handed to the service runs to completion or
//! failure. The partial buffer held at cancellation time is not flushed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use crate::binning::{bin_peaks, BinningConfig, ConfigError};
use crate::index::{IndexedPoint, IndexingService};
use crate::sparse::MalformedVector;
use crate::spectrum::{DomainDataError, RawSpectrum, SourceResult};

/// Default number of spectra per upsert batch.
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// Metadata key under which a source identifier is preserved when point ids
/// are generated.
pub const ORIGINAL_ID_KEY: &str = "original_id";

/// How the pipeline resolves the identifier of each spectrum.
#[derive(Debug, Clone)]
pub enum IdRule {
    /// Use the record's own identifier; records without one are skipped.
    Native,
    /// Take the identifier from the named metadata key; records without a
    /// usable value under that key are skipped.
    MetadataKey(String),
    /// Generate a fresh UUID per record. When `original_id_key` is set,
    /// the value found under that metadata key is copied into the payload
    /// as `original_id` so the source identifier survives.
    Generated {
        /// Metadata key whose value is preserved in the payload.
        original_id_key: Option<String>,
    },
}

impl IdRule {
    fn resolve(&self, spectrum: &mut RawSpectrum) -> Option<String> {
        match self {
            IdRule::Native => spectrum.native_id.clone(),
            IdRule::MetadataKey(key) => metadata_string(spectrum, key),
            IdRule::Generated { original_id_key } => {
                if let Some(key) = original_id_key {
                    if let Some(original) = metadata_string(spectrum, key) {
                        spectrum
                            .metadata
                            .entry(ORIGINAL_ID_KEY.to_string())
                            .or_insert(Value::String(original));
                    }
                }
                Some(Uuid::new_v4().to_string())
            }
        }
    }
}

fn metadata_string(spectrum: &RawSpectrum, key: &str) -> Option<String> {
    match spectrum.metadata.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Bounded-retry policy for batch submission.
///
/// Attempt `n` (1-based) that fails is followed by a sleep of
/// `base_delay * 2^(n-1)` before the next attempt, up to `max_attempts`
/// total attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per batch, including the first.
    pub max_attempts: u32,
    /// Backoff base; doubled after every failed attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Backoff to apply after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

/// Cooperative cancellation flag shared between a pipeline run and its
/// controller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// True once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Immutable per-run pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    binning: BinningConfig,
    batch_size: usize,
    id_rule: IdRule,
    retry: RetryPolicy,
}

impl PipelineConfig {
    /// Create a configuration with the given binning settings and batch
    /// size, native identifier resolution, and the default retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBatchSize`] if `batch_size` is zero.
    pub fn new(binning: BinningConfig, batch_size: usize) -> Result<Self, ConfigError> {
        if batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        Ok(Self {
            binning,
            batch_size,
            id_rule: IdRule::Native,
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the identifier-resolution rule.
    pub fn with_id_rule(mut self, id_rule: IdRule) -> Self {
        self.id_rule = id_rule;
        self
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The binning configuration used for every spectrum of the run.
    pub fn binning(&self) -> &BinningConfig {
        &self.binning
    }

    /// The target batch size `B`.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

/// A batch that failed after retry exhaustion.
#[derive(Debug, Clone)]
pub struct FailedBatch {
    /// Identifiers of the points the batch carried.
    pub ids: Vec<String>,
    /// The final submission error.
    pub error: String,
}

/// Outcome of an ingestion run.
///
/// Record-level counters track what happened before batching; batch-level
/// counters track submission. `batches_submitted` counts every dispatched
/// batch, successful or not.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Total records read from the source.
    pub records_seen: u64,
    /// Records that were binned and buffered for submission.
    pub records_succeeded: u64,
    /// Records skipped because no identifier could be resolved.
    pub skipped_missing_id: u64,
    /// Records skipped because of invalid peak data.
    pub skipped_domain: u64,
    /// Records skipped because the binned vector failed validation.
    pub skipped_malformed_vector: u64,
    /// Batches dispatched to the indexing service.
    pub batches_submitted: u64,
    /// Batches that failed after retry exhaustion.
    pub batches_failed: u64,
    /// Details of every failed batch, in dispatch order.
    pub failed_batches: Vec<FailedBatch>,
    /// True if the run stopped early because of cancellation.
    pub cancelled: bool,
}

impl IngestReport {
    /// Total records skipped, across all reasons.
    pub fn records_skipped(&self) -> u64 {
        self.skipped_missing_id + self.skipped_domain + self.skipped_malformed_vector
    }

    /// Fold another report into this one (used by parallel workers).
    pub fn merge(&mut self, other: IngestReport) {
        self.records_seen += other.records_seen;
        self.records_succeeded += other.records_succeeded;
        self.skipped_missing_id += other.skipped_missing_id;
        self.skipped_domain += other.skipped_domain;
        self.skipped_malformed_vector += other.skipped_malformed_vector;
        self.batches_submitted += other.batches_submitted;
        self.batches_failed += other.batches_failed;
        self.failed_batches.extend(other.failed_batches);
        self.cancelled |= other.cancelled;
    }
}

enum RecordFailure {
    MissingId,
    Domain(DomainDataError),
    Malformed(MalformedVector),
}

/// Drives raw spectra through the binner and into the indexing service.
pub struct IngestionPipeline<'a> {
    service: &'a dyn IndexingService,
    config: PipelineConfig,
}

impl<'a> IngestionPipeline<'a> {
    /// Create a pipeline submitting to the given service.
    pub fn new(service: &'a dyn IndexingService, config: PipelineConfig) -> Self {
        Self { service, config }
    }

    /// Ingest every spectrum the source yields.
    pub fn run<I>(&self, spectra: I) -> IngestReport
    where
        I: IntoIterator<Item = SourceResult>,
    {
        self.run_cancellable(spectra, &CancelToken::new())
    }

    /// Ingest with cooperative cancellation.
    ///
    /// The token is checked before each record; once it trips, no further
    /// batch is scheduled and the partial buffer is dropped.
    pub fn run_cancellable<I>(&self, spectra: I, cancel: &CancelToken) -> IngestReport
    where
        I: IntoIterator<Item = SourceResult>,
    {
        let mut report = IngestReport::default();
        let mut buffer: Vec<IndexedPoint> = Vec::with_capacity(self.config.batch_size);

        for item in spectra {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            report.records_seen += 1;
            let spectrum = match item {
                Ok(spectrum) => spectrum,
                Err(e) => {
                    log::warn!("skipping record {}: {e}", report.records_seen);
                    report.skipped_domain += 1;
                    continue;
                }
            };

            match self.point_for(spectrum) {
                Ok(point) => {
                    report.records_succeeded += 1;
                    buffer.push(point);
                    if buffer.len() >= self.config.batch_size {
                        let batch = std::mem::replace(
                            &mut buffer,
                            Vec::with_capacity(self.config.batch_size),
                        );
                        self.submit_batch(batch, &mut report);
                    }
                }
                Err(RecordFailure::MissingId) => {
                    log::warn!("skipping record {}: no identifier", report.records_seen);
                    report.skipped_missing_id += 1;
                }
                Err(RecordFailure::Domain(e)) => {
                    log::warn!("skipping record {}: {e}", report.records_seen);
                    report.skipped_domain += 1;
                }
                Err(RecordFailure::Malformed(e)) => {
                    log::warn!("skipping record {}: {e}", report.records_seen);
                    report.skipped_malformed_vector += 1;
                }
            }
        }

        if !buffer.is_empty() && !report.cancelled {
            self.submit_batch(buffer, &mut report);
        }

        log::info!(
            "ingestion finished: {} seen, {} succeeded, {} skipped, {} batches ({} failed)",
            report.records_seen,
            report.records_succeeded,
            report.records_skipped(),
            report.batches_submitted,
            report.batches_failed
        );

        report
    }

    fn point_for(&self, mut spectrum: RawSpectrum) -> Result<IndexedPoint, RecordFailure> {
        let id = self
            .config
            .id_rule
            .resolve(&mut spectrum)
            .ok_or(RecordFailure::MissingId)?;

        let sparse = bin_peaks(&spectrum.peaks, &self.config.binning)
            .map_err(RecordFailure::Domain)?;
        sparse.validate().map_err(RecordFailure::Malformed)?;

        Ok(IndexedPoint {
            id,
            sparse,
            metadata: spectrum.metadata,
        })
    }

    fn submit_batch(&self, points: Vec<IndexedPoint>, report: &mut IngestReport) {
        let retry = self.config.retry;
        report.batches_submitted += 1;

        let mut last_error = String::new();
        for attempt in 1..=retry.max_attempts.max(1) {
            match self.service.upsert(&points) {
                Ok(applied) => {
                    log::debug!("batch of {applied} points applied");
                    return;
                }
                Err(e) => {
                    log::warn!(
                        "upsert attempt {attempt}/{} failed: {e}",
                        retry.max_attempts
                    );
                    last_error = e.to_string();
                    if attempt < retry.max_attempts {
                        thread::sleep(retry.delay_for(attempt));
                    }
                }
            }
        }

        report.batches_failed += 1;
        report.failed_batches.push(FailedBatch {
            ids: points.into_iter().map(|p| p.id).collect(),
            error: last_error,
        });
    }
}

/// Ingest several sources through a bounded worker pool.
///
/// Each worker owns its batch buffer and its own report; batches from
/// different workers are independent upsert calls and may land in any
/// relative order. When the same identifier appears in two concurrently
/// submitted batches, the last write observed by the service wins.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidConcurrency`] if `workers` is zero.
pub fn run_parallel<I>(
    service: &(dyn IndexingService + Sync),
    config: &PipelineConfig,
    sources: Vec<I>,
    workers: usize,
    cancel: &CancelToken,
) -> Result<IngestReport, ConfigError>
where
    I: IntoIterator<Item = SourceResult> + Send,
{
    if workers == 0 {
        return Err(ConfigError::InvalidConcurrency);
    }

    let (tx, rx) = crossbeam_channel::bounded::<I>(sources.len().max(1));
    for source in sources {
        // Receiver outlives this loop; a send cannot fail here.
        let _ = tx.send(source);
    }
    drop(tx);

    let mut merged = IngestReport::default();
    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let rx = rx.clone();
            let builder = thread::Builder::new().name(format!("mzsparse-ingest-{worker}"));
            let handle = builder.spawn_scoped(scope, move || {
                let pipeline = IngestionPipeline::new(service, config.clone());
                let mut report = IngestReport::default();
                for source in rx {
                    report.merge(pipeline.run_cancellable(source, cancel));
                }
                report
            });

            match handle {
                Ok(h) => handles.push(h),
                Err(e) => log::error!("failed to spawn ingestion worker {worker}: {e}"),
            }
        }

        for handle in handles {
            match handle.join() {
                Ok(report) => merged.merge(report),
                Err(_) => log::error!("ingestion worker panicked"),
            }
        }
    });

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::{Metadata, Peak};

    #[test]
    fn test_retry_delay_doubles() {
        let retry = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
        };

        assert_eq!(retry.delay_for(1), Duration::from_millis(100));
        assert_eq!(retry.delay_for(2), Duration::from_millis(200));
        assert_eq!(retry.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let err = PipelineConfig::new(BinningConfig::default(), 0).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBatchSize));
    }

    #[test]
    fn test_cancel_token_trips_once() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    fn spectrum_with_meta(key: &str, value: serde_json::Value) -> RawSpectrum {
        let mut metadata = Metadata::new();
        metadata.insert(key.to_string(), value);
        RawSpectrum {
            native_id: None,
            peaks: vec![Peak::new(100.0, 1.0)],
            metadata,
        }
    }

    #[test]
    fn test_metadata_key_rule_accepts_numbers() {
        let rule = IdRule::MetadataKey("scan".to_string());
        let mut spectrum = spectrum_with_meta("scan", serde_json::json!(42));
        assert_eq!(rule.resolve(&mut spectrum), Some("42".to_string()));
    }

    #[test]
    fn test_metadata_key_rule_misses_absent_key() {
        let rule = IdRule::MetadataKey("scan".to_string());
        let mut spectrum = spectrum_with_meta("name", serde_json::json!("caffeine"));
        assert_eq!(rule.resolve(&mut spectrum), None);
    }

    #[test]
    fn test_generated_rule_preserves_original_id() {
        let rule = IdRule::Generated {
            original_id_key: Some("DB#".to_string()),
        };
        let mut spectrum = spectrum_with_meta("DB#", serde_json::json!("JP001"));

        let id = rule.resolve(&mut spectrum).unwrap();
        assert!(!id.is_empty());
        assert_eq!(
            spectrum.metadata.get(ORIGINAL_ID_KEY),
            Some(&serde_json::json!("JP001"))
        );
    }

    #[test]
    fn test_generated_rule_does_not_overwrite_existing_original_id() {
        let rule = IdRule::Generated {
            original_id_key: Some("DB#".to_string()),
        };
        let mut spectrum = spectrum_with_meta("DB#", serde_json::json!("JP001"));
        spectrum
            .metadata
            .insert(ORIGINAL_ID_KEY.to_string(), serde_json::json!("kept"));

        rule.resolve(&mut spectrum).unwrap();
        assert_eq!(
            spectrum.metadata.get(ORIGINAL_ID_KEY),
            Some(&serde_json::json!("kept"))
        );
    }
}
