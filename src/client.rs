//! HTTP client for the indexing service boundary.
//!
//! [`HttpIndexingService`] implements the [`IndexingService`] contract
//! against the service fronting the vector-index engine:
//!
//! - `POST /upsert` with `{"points": [...]}`
//! - `POST /search` with `{"query": ..., "limit": ..., "with_payload": ...}`
//! - `GET /health` as a liveness probe
//!
//! The base URL, collection name, and per-call timeout are threaded in
//! explicitly at construction; there is no ambient configuration. The
//! underlying connection pool is safe for concurrent use by multiple
//! pipeline workers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::index::{Hit, IndexedPoint, IndexingService, ServiceError};
use crate::sparse::SparseVector;

/// Default collection name used when none is configured.
pub const DEFAULT_COLLECTION: &str = "ms_spectra";

/// Default per-call timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Serialize)]
struct UpsertRequest<'a> {
    points: &'a [IndexedPoint],
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a SparseVector,
    limit: usize,
    with_payload: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

/// Blocking HTTP implementation of the [`IndexingService`] contract.
pub struct HttpIndexingService {
    http: reqwest::blocking::Client,
    base_url: String,
    collection: String,
    timeout: Duration,
}

impl HttpIndexingService {
    /// Create a client for the service at `base_url`.
    ///
    /// Every call made through the client carries `timeout`; on expiry the
    /// call is reported as [`ServiceError::TimedOut`] and is subject to the
    /// pipeline's retry policy like any other submission failure.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unreachable`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(
        base_url: impl Into<String>,
        collection: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Unreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            timeout,
        })
    }

    /// The collection this client addresses.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Probe the service's liveness endpoint and return its status string.
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`] when the probe fails or the response
    /// cannot be decoded.
    pub fn health(&self) -> Result<String, ServiceError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .http
            .get(url)
            .query(&[("collection", self.collection.as_str())])
            .send()
            .map_err(|e| self.map_transport(e))?;

        let response = Self::check_status(response)?;
        let body: HealthResponse = response
            .json()
            .map_err(|e| ServiceError::BadResponse(e.to_string()))?;
        Ok(body.status)
    }

    fn map_transport(&self, error: reqwest::Error) -> ServiceError {
        if error.is_timeout() {
            ServiceError::TimedOut(self.timeout)
        } else if error.is_decode() {
            ServiceError::BadResponse(error.to_string())
        } else {
            ServiceError::Unreachable(error.to_string())
        }
    }

    fn check_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .text()
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());
        Err(ServiceError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

impl IndexingService for HttpIndexingService {
    fn upsert(&self, points: &[IndexedPoint]) -> Result<usize, ServiceError> {
        let url = format!("{}/upsert", self.base_url);
        log::debug!("upserting {} points to {}", points.len(), url);

        let response = self
            .http
            .post(url)
            .query(&[("collection", self.collection.as_str())])
            .json(&UpsertRequest { points })
            .send()
            .map_err(|e| self.map_transport(e))?;

        Self::check_status(response)?;
        Ok(points.len())
    }

    fn search(
        &self,
        query: &SparseVector,
        limit: usize,
        with_payload: bool,
    ) -> Result<Vec<Hit>, ServiceError> {
        let url = format!("{}/search", self.base_url);
        log::debug!("searching {} (limit {})", url, limit);

        let response = self
            .http
            .post(url)
            .query(&[("collection", self.collection.as_str())])
            .json(&SearchRequest {
                query,
                limit,
                with_payload,
            })
            .send()
            .map_err(|e| self.map_transport(e))?;

        let response = Self::check_status(response)?;
        let body: SearchResponse = response
            .json()
            .map_err(|e| ServiceError::BadResponse(e.to_string()))?;
        Ok(body.hits)
    }
}
