//! Integration tests for the ingestion pipeline and the search contract,
//! exercised against an in-memory stand-in for the external vector index.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use mzsparse::prelude::*;

/// In-memory double for the indexing service: a keyed point store with
/// injectable upsert failures and canned search results.
struct FakeIndexingService {
    points: Mutex<HashMap<String, IndexedPoint>>,
    calls: Mutex<Vec<usize>>,
    fail_next_upserts: Mutex<u32>,
    canned_hits: Vec<Hit>,
}

impl FakeIndexingService {
    fn new() -> Self {
        Self {
            points: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_next_upserts: Mutex::new(0),
            canned_hits: Vec::new(),
        }
    }

    fn failing_first(times: u32) -> Self {
        let service = Self::new();
        *service.fail_next_upserts.lock().unwrap() = times;
        service
    }

    fn with_hits(hits: Vec<Hit>) -> Self {
        let mut service = Self::new();
        service.canned_hits = hits;
        service
    }

    fn call_sizes(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }

    fn stored(&self, id: &str) -> Option<IndexedPoint> {
        self.points.lock().unwrap().get(id).cloned()
    }

    fn stored_count(&self) -> usize {
        self.points.lock().unwrap().len()
    }
}

impl IndexingService for FakeIndexingService {
    fn upsert(&self, points: &[IndexedPoint]) -> Result<usize, ServiceError> {
        self.calls.lock().unwrap().push(points.len());

        let mut remaining = self.fail_next_upserts.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(ServiceError::Unreachable("injected failure".to_string()));
        }

        let mut stored = self.points.lock().unwrap();
        for point in points {
            stored.insert(point.id.clone(), point.clone());
        }
        Ok(points.len())
    }

    fn search(
        &self,
        _query: &SparseVector,
        _limit: usize,
        _with_payload: bool,
    ) -> Result<Vec<Hit>, ServiceError> {
        Ok(self.canned_hits.clone())
    }
}

fn spectrum(id: &str, pairs: &[(f64, f64)]) -> SourceResult {
    Ok(RawSpectrum {
        native_id: Some(id.to_string()),
        peaks: pairs.iter().map(|&(mz, i)| Peak::new(mz, i)).collect(),
        metadata: Metadata::new(),
    })
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::ZERO,
    }
}

fn config(batch_size: usize) -> PipelineConfig {
    PipelineConfig::new(BinningConfig::new(0.1).unwrap(), batch_size)
        .unwrap()
        .with_retry(fast_retry(1))
}

#[test]
fn test_batching_boundary() {
    let service = FakeIndexingService::new();
    let pipeline = IngestionPipeline::new(&service, config(3));

    let spectra: Vec<SourceResult> = (0..7)
        .map(|i| spectrum(&format!("s{i}"), &[(100.0 + i as f64, 1.0)]))
        .collect();

    let report = pipeline.run(spectra);

    assert_eq!(service.call_sizes(), vec![3, 3, 1]);
    assert_eq!(report.records_seen, 7);
    assert_eq!(report.records_succeeded, 7);
    assert_eq!(report.records_skipped(), 0);
    assert_eq!(report.batches_submitted, 3);
    assert_eq!(report.batches_failed, 0);
    assert_eq!(service.stored_count(), 7);
}

#[test]
fn test_partial_failure_isolation() {
    let service = FakeIndexingService::new();
    let pipeline = IngestionPipeline::new(&service, config(10));

    let spectra: Vec<SourceResult> = (0..10)
        .map(|i| {
            if i == 4 {
                // record #5 carries a negative mass
                spectrum(&format!("s{i}"), &[(-50.0, 1.0)])
            } else {
                spectrum(&format!("s{i}"), &[(200.0, 2.0)])
            }
        })
        .collect();

    let report = pipeline.run(spectra);

    assert_eq!(report.records_seen, 10);
    assert_eq!(report.records_succeeded, 9);
    assert_eq!(report.skipped_domain, 1);
    assert_eq!(report.records_skipped(), 1);
    // the surviving records still go out as one batch
    assert_eq!(service.call_sizes(), vec![9]);
    assert!(service.stored("s4").is_none());
    assert!(service.stored("s5").is_some());
}

#[test]
fn test_empty_spectrum_counts_as_succeeded() {
    let service = FakeIndexingService::new();
    let pipeline = IngestionPipeline::new(&service, config(8));

    let report = pipeline.run(vec![spectrum("empty", &[])]);

    assert_eq!(report.records_succeeded, 1);
    assert_eq!(report.records_skipped(), 0);

    let point = service.stored("empty").unwrap();
    assert!(point.sparse.is_empty());
}

#[test]
fn test_upsert_is_idempotent_per_identifier() {
    let service = FakeIndexingService::new();
    let pipeline = IngestionPipeline::new(&service, config(4));

    pipeline.run(vec![spectrum("dup", &[(100.0, 1.0)])]);
    pipeline.run(vec![spectrum("dup", &[(500.0, 9.0)])]);

    assert_eq!(service.stored_count(), 1);
    let point = service.stored("dup").unwrap();
    let expected = SparseVector::new(vec![5000], vec![9.0]).unwrap();
    assert_eq!(point.sparse, expected);
}

#[test]
fn test_missing_identifier_is_skipped() {
    let service = FakeIndexingService::new();
    let pipeline = IngestionPipeline::new(&service, config(4));

    let nameless = Ok(RawSpectrum::from_peaks(vec![Peak::new(100.0, 1.0)]));
    let report = pipeline.run(vec![nameless, spectrum("ok", &[(100.0, 1.0)])]);

    assert_eq!(report.skipped_missing_id, 1);
    assert_eq!(report.records_succeeded, 1);
    assert_eq!(service.stored_count(), 1);
}

#[test]
fn test_source_level_record_errors_are_skipped() {
    let service = FakeIndexingService::new();
    let pipeline = IngestionPipeline::new(&service, config(4));

    let bad = Err(DomainDataError::PeakListMismatch {
        masses: 3,
        intensities: 2,
    });
    let report = pipeline.run(vec![bad, spectrum("ok", &[(100.0, 1.0)])]);

    assert_eq!(report.skipped_domain, 1);
    assert_eq!(report.records_succeeded, 1);
}

#[test]
fn test_retry_recovers_from_transient_failure() {
    let service = FakeIndexingService::failing_first(1);
    let pipeline_config = config(2).with_retry(fast_retry(3));
    let pipeline = IngestionPipeline::new(&service, pipeline_config);

    let report = pipeline.run(vec![
        spectrum("a", &[(100.0, 1.0)]),
        spectrum("b", &[(101.0, 1.0)]),
    ]);

    // first attempt fails, second succeeds
    assert_eq!(service.call_sizes(), vec![2, 2]);
    assert_eq!(report.batches_submitted, 1);
    assert_eq!(report.batches_failed, 0);
    assert_eq!(service.stored_count(), 2);
}

#[test]
fn test_failed_batch_does_not_halt_following_batches() {
    // enough injected failures to exhaust retries for the first batch only
    let service = FakeIndexingService::failing_first(2);
    let pipeline_config = config(2).with_retry(fast_retry(2));
    let pipeline = IngestionPipeline::new(&service, pipeline_config);

    let report = pipeline.run(vec![
        spectrum("a", &[(100.0, 1.0)]),
        spectrum("b", &[(101.0, 1.0)]),
        spectrum("c", &[(102.0, 1.0)]),
        spectrum("d", &[(103.0, 1.0)]),
    ]);

    assert_eq!(report.batches_submitted, 2);
    assert_eq!(report.batches_failed, 1);
    assert_eq!(report.failed_batches.len(), 1);
    assert_eq!(
        report.failed_batches[0].ids,
        vec!["a".to_string(), "b".to_string()]
    );

    // the second batch landed normally
    assert!(service.stored("c").is_some());
    assert!(service.stored("d").is_some());
    assert!(service.stored("a").is_none());
}

#[test]
fn test_cancellation_stops_scheduling_new_batches() {
    let service = FakeIndexingService::new();
    let pipeline = IngestionPipeline::new(&service, config(100));
    let token = CancelToken::new();

    let token_ref = token.clone();
    let spectra = (0..10).map(move |i| {
        if i == 4 {
            token_ref.cancel();
        }
        spectrum(&format!("s{i}"), &[(100.0, 1.0)])
    });

    let report = pipeline.run_cancellable(spectra, &token);

    assert!(report.cancelled);
    assert!(report.records_seen <= 5);
    // the partial buffer is not flushed after cancellation
    assert!(service.call_sizes().is_empty());
}

#[test]
fn test_parallel_run_merges_worker_reports() {
    let service = FakeIndexingService::new();
    let pipeline_config = config(2);

    let sources: Vec<Vec<SourceResult>> = (0..3)
        .map(|s| {
            (0..5)
                .map(|i| spectrum(&format!("src{s}-{i}"), &[(100.0 + i as f64, 1.0)]))
                .collect()
        })
        .collect();

    let report = run_parallel(&service, &pipeline_config, sources, 2, &CancelToken::new())
        .unwrap();

    assert_eq!(report.records_seen, 15);
    assert_eq!(report.records_succeeded, 15);
    // 3 sources * ceil(5/2) batches each
    assert_eq!(report.batches_submitted, 9);
    assert_eq!(service.stored_count(), 15);
}

#[test]
fn test_zero_workers_is_a_config_error() {
    let service = FakeIndexingService::new();
    let sources: Vec<Vec<SourceResult>> = vec![];

    let err = run_parallel(&service, &config(2), sources, 0, &CancelToken::new()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidConcurrency));
}

#[test]
fn test_search_hits_are_ranked_by_descending_score() {
    let hits = vec![
        Hit {
            id: "a".to_string(),
            score: 0.3,
            payload: None,
        },
        Hit {
            id: "b".to_string(),
            score: 0.9,
            payload: None,
        },
        Hit {
            id: "c".to_string(),
            score: 0.5,
            payload: None,
        },
    ];
    let service = FakeIndexingService::with_hits(hits);

    let query = SparseVector::new(vec![10], vec![1.0]).unwrap();
    let ranked = search_ranked(&service, &query, 10, true).unwrap();

    let ids: Vec<&str> = ranked.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "c", "a"]);
}

#[test]
fn test_search_tie_break_is_ascending_identifier() {
    let hits = vec![
        Hit {
            id: "z".to_string(),
            score: 0.5,
            payload: None,
        },
        Hit {
            id: "a".to_string(),
            score: 0.5,
            payload: None,
        },
    ];
    let service = FakeIndexingService::with_hits(hits);

    let query = SparseVector::new(vec![10], vec![1.0]).unwrap();
    let ranked = search_ranked(&service, &query, 10, false).unwrap();

    let ids: Vec<&str> = ranked.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "z"]);
}

#[test]
fn test_search_rejects_malformed_query() {
    let service = FakeIndexingService::new();

    let query = SparseVector {
        indices: vec![1, 1],
        values: vec![0.5, 0.5],
    };
    let err = search_ranked(&service, &query, 10, false).unwrap_err();
    assert!(matches!(err, SearchError::Query(_)));
}

#[test]
fn test_search_rejects_zero_limit() {
    let service = FakeIndexingService::new();

    let query = SparseVector::new(vec![1], vec![0.5]).unwrap();
    let err = search_ranked(&service, &query, 0, false).unwrap_err();
    assert!(matches!(err, SearchError::InvalidLimit));
}
