//! Settings, reports, and error types for aggregation runs.

use super::control::Interruption;
use super::names::NameParsingError;
use crate::models::AggregateResult;
use crate::sources::{EmbeddingError, ProjectLookupError, ScrapeError};
use std::time::Duration;
use thiserror::Error;

/// Default number of faculty members enriched concurrently.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Tunables for the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorSettings {
    /// Maximum number of faculty members enriched at the same time.
    pub concurrency: usize,
    /// Overall time budget applied by [`crate::aggregator::Aggregator::aggregate`].
    pub deadline: Option<Duration>,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            deadline: None,
        }
    }
}

/// Why a single faculty member could not be enriched.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// Display name was empty.
    #[error(transparent)]
    NameParsing(#[from] NameParsingError),
    /// Project metadata lookup failed.
    #[error(transparent)]
    ProjectLookup(#[from] ProjectLookupError),
    /// Embedding generation or storage failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    /// Run was cancelled before this record finished.
    #[error("Enrichment cancelled")]
    Cancelled,
    /// Run deadline passed while this record was in flight.
    #[error("Enrichment deadline exceeded")]
    DeadlineExceeded,
}

impl EnrichmentError {
    /// Whether the error came from run control rather than from the record itself.
    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

impl From<Interruption> for EnrichmentError {
    fn from(value: Interruption) -> Self {
        match value {
            Interruption::Cancelled => Self::Cancelled,
            Interruption::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

/// Failure of a whole aggregation run.
#[derive(Debug, Error)]
pub enum AggregationError {
    /// Faculty directory failed; propagated unmodified.
    #[error(transparent)]
    Scrape(#[from] ScrapeError),
    /// A faculty member failed and the run was aborted.
    #[error("Failed to enrich '{faculty_name}' ({department}, row {position}): {source}")]
    Faculty {
        /// Department of the failing row.
        department: String,
        /// Zero-based row position within the department.
        position: usize,
        /// Display name of the failing row.
        faculty_name: String,
        /// Underlying enrichment failure.
        #[source]
        source: EnrichmentError,
    },
    /// Run was cancelled by the caller.
    #[error("Aggregation cancelled")]
    Cancelled,
    /// Run deadline passed.
    #[error("Aggregation deadline exceeded")]
    DeadlineExceeded,
    /// An enrichment task panicked or was aborted.
    #[error("Enrichment task failed: {0}")]
    Task(String),
}

impl From<Interruption> for AggregationError {
    fn from(value: Interruption) -> Self {
        match value {
            Interruption::Cancelled => Self::Cancelled,
            Interruption::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

/// A faculty row that could not be enriched in a best-effort run.
#[derive(Debug)]
pub struct FacultyFailure {
    /// Department of the failing row.
    pub department: String,
    /// Zero-based row position within the department.
    pub position: usize,
    /// Display name of the failing row.
    pub faculty_name: String,
    /// What went wrong.
    pub error: EnrichmentError,
}

/// Outcome of a best-effort run: surviving records plus per-row failures.
#[derive(Debug)]
pub struct AggregateReport {
    /// School that was aggregated.
    pub school: String,
    /// Successfully enriched records; every department key is present.
    pub result: AggregateResult,
    /// Rows that failed, in department then row order.
    pub failures: Vec<FacultyFailure>,
}

impl AggregateReport {
    /// Whether every row was enriched.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
