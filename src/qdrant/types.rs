//! Shared types used by the Qdrant client and helpers.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while interacting with Qdrant.
#[derive(Debug, Error)]
pub enum QdrantError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Qdrant responded with an unexpected status code.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Exact-match constraints applied to faculty similarity searches.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FacultyFilter {
    /// School the faculty member belongs to.
    pub school: Option<String>,
    /// Department the faculty member belongs to.
    pub department: Option<String>,
    /// Grant mechanism code held by at least one project.
    pub activity_code: Option<String>,
    /// Administering agency of at least one project.
    pub agency_ic_admin: Option<String>,
}

impl FacultyFilter {
    /// Whether no constraint is set.
    pub fn is_empty(&self) -> bool {
        [
            &self.school,
            &self.department,
            &self.activity_code,
            &self.agency_ic_admin,
        ]
        .iter()
        .all(|value| value.as_deref().is_none_or(|text| text.trim().is_empty()))
    }
}

/// Scored payload returned by Qdrant queries.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    /// Numeric point identifier; `None` for UUID-keyed points.
    pub id: Option<u64>,
    /// Similarity score computed by Qdrant.
    pub score: f32,
    /// Optional payload associated with the vector.
    pub payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
pub(crate) struct CountResponse {
    pub(crate) result: CountResult,
}

#[derive(Deserialize)]
pub(crate) struct CountResult {
    pub(crate) count: u64,
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    pub(crate) result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
pub(crate) struct QueryPoint {
    pub(crate) id: Value,
    pub(crate) score: f32,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}
