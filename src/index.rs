//! Indexing-service contract: upsert and nearest-neighbor search over
//! sparse vectors.
//!
//! The vector-index engine is an external capability. This module specifies
//! the operations the crate requires from it (idempotent upsert-by-id and
//! ranked similarity search) as the [`IndexingService`] trait, together
//! with the point/hit types exchanged across that boundary and the ranking
//! contract enforced on results. Scoring itself is delegated to the engine
//! (a dot-product-style overlap over the sparse entries); this crate never
//! reimplements it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sparse::{MalformedVector, SparseVector};
use crate::spectrum::Metadata;

/// A point submitted to the indexing service.
///
/// The identifier is the upsert key: re-upserting an identifier already
/// present replaces its vector and metadata. Identifier uniqueness within a
/// collection is enforced by the service, not by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedPoint {
    /// Upsert key, unique within a collection.
    pub id: String,
    /// The binned spectrum.
    pub sparse: SparseVector,
    /// Pass-through payload stored alongside the vector.
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

/// A single search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    /// Identifier of the matched point.
    pub id: String,
    /// Similarity score; higher means more similar.
    pub score: f64,
    /// Stored payload, present when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Metadata>,
}

/// Failures of indexing-service calls.
///
/// All variants are submission failures from the pipeline's point of view
/// and are subject to its retry policy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    /// The service could not be reached at all.
    #[error("indexing service unreachable: {0}")]
    Unreachable(String),

    /// The call did not complete within the configured timeout.
    #[error("indexing service call timed out after {0:?}")]
    TimedOut(Duration),

    /// The service answered with a non-success status.
    #[error("indexing service rejected the request (status {status}): {message}")]
    Rejected {
        /// HTTP-style status code reported by the service.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The service answered with a body this crate could not decode.
    #[error("malformed response from indexing service: {0}")]
    BadResponse(String),
}

/// Operations required from the external vector-index engine.
///
/// Implementations must be safe for concurrent use from multiple pipeline
/// workers; the crate assumes a pooled or otherwise thread-safe client
/// underneath and adds no synchronization of its own.
pub trait IndexingService {
    /// Insert-or-replace the given points, keyed by identifier.
    ///
    /// Idempotent per identifier: a point whose id is already present is
    /// replaced atomically from the caller's point of view. Returns the
    /// number of points applied.
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`] when the call fails; the caller decides
    /// whether to retry.
    fn upsert(&self, points: &[IndexedPoint]) -> Result<usize, ServiceError>;

    /// Nearest-neighbor search over the indexed sparse vectors.
    ///
    /// Returns at most `limit` hits scored by the engine's sparse
    /// similarity metric. Callers that need the documented ordering
    /// guarantee should go through [`search_ranked`].
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`] when the call fails.
    fn search(
        &self,
        query: &SparseVector,
        limit: usize,
        with_payload: bool,
    ) -> Result<Vec<Hit>, ServiceError>;
}

/// Errors of the query path.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The query vector violates the sparse-vector invariants.
    #[error("invalid query vector: {0}")]
    Query(#[from] MalformedVector),

    /// The requested hit limit was zero.
    #[error("search limit must be > 0")]
    InvalidLimit,

    /// The underlying service call failed.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Order hits by descending score, ties broken by ascending identifier.
///
/// The engine's contract leaves tie order unspecified; this is the
/// deterministic rule this crate documents and enforces, so the same index
/// state always yields the same ranking. `total_cmp` keeps the ordering
/// total even for non-finite scores.
pub fn rank_hits(hits: &mut [Hit]) {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
}

/// Validate a query vector and run a ranked search.
///
/// This is the search contract of the crate: the query is checked against
/// the sparse-vector invariants before any network traffic, and the
/// returned hits carry the documented ordering regardless of how the
/// engine ordered them.
///
/// # Errors
///
/// Returns [`SearchError::Query`] for a malformed vector,
/// [`SearchError::InvalidLimit`] for `limit == 0`, and
/// [`SearchError::Service`] when the service call fails.
pub fn search_ranked(
    service: &dyn IndexingService,
    query: &SparseVector,
    limit: usize,
    with_payload: bool,
) -> Result<Vec<Hit>, SearchError> {
    query.validate()?;
    if limit == 0 {
        return Err(SearchError::InvalidLimit);
    }

    let mut hits = service.search(query, limit, with_payload)?;
    rank_hits(&mut hits);
    hits.truncate(limit);
    Ok(hits)
}
