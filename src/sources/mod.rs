//! Collaborator contracts consumed by the aggregator.
//!
//! The aggregator never talks to the outside world directly. It goes through three
//! capabilities, each expressed as an async trait so that concrete backends (roster
//! files, NIH RePORTER, Qdrant-backed embedding storage) and test doubles can be
//! swapped freely:
//!
//! - [`FacultyDirectory`]: department → profile rows for a school.
//! - [`ProjectMetadataSource`]: grant-project rows for a principal investigator.
//! - [`FacultyEmbedder`]: compute and durably store a faculty embedding.
//!
//! Rows crossing these seams are validated once at the boundary into
//! [`ProfileRow`] and [`ProjectRow`].

pub mod roster;

use crate::embedding::EmbeddingClientError;
use crate::models::{EmbeddingId, Faculty, Project};
use crate::qdrant::QdrantError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Date;

pub use roster::RosterFileDirectory;

/// One faculty profile as published by a department directory.
///
/// Field names on the wire follow the directory export columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRow {
    /// Display name, e.g. `Jane Doe`.
    #[serde(rename = "Faculty_Name", default)]
    pub faculty_name: String,
    /// School the profile was listed under.
    #[serde(rename = "School", default)]
    pub school: String,
    /// Department the profile was listed under.
    #[serde(rename = "Department", default)]
    pub department: String,
    /// Free-text "about" section.
    #[serde(rename = "About_Section", default)]
    pub about_section: String,
    /// Contact email address.
    #[serde(rename = "Email_Address", default)]
    pub email_address: String,
    /// Profile page URL.
    #[serde(rename = "Profile_URL", default)]
    pub profile_url: String,
}

/// One grant-project row returned by the metadata source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectRow {
    /// Funding record identifier.
    pub project_number: String,
    /// Abstract text, possibly empty.
    pub abstract_text: String,
    /// Indexing terms.
    pub terms: Vec<String>,
    /// Start date, when published.
    pub start_date: Option<Date>,
    /// End date, absent for open-ended projects.
    pub end_date: Option<Date>,
    /// Administering institute/center.
    pub agency_ic_admin: String,
    /// Grant mechanism code.
    pub activity_code: String,
}

/// Ordered mapping of department name → profile rows for one school.
///
/// Iteration follows insertion order; inserting an existing department replaces its
/// rows in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchoolRoster {
    departments: Vec<(String, Vec<ProfileRow>)>,
}

impl SchoolRoster {
    /// Create an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the rows of a department.
    pub fn insert(&mut self, department: impl Into<String>, rows: Vec<ProfileRow>) {
        let department = department.into();
        if let Some(slot) = self
            .departments
            .iter_mut()
            .find(|(name, _)| *name == department)
        {
            slot.1 = rows;
        } else {
            self.departments.push((department, rows));
        }
    }

    /// Rows listed under `department`.
    pub fn get(&self, department: &str) -> Option<&[ProfileRow]> {
        self.departments
            .iter()
            .find(|(name, _)| name == department)
            .map(|(_, rows)| rows.as_slice())
    }

    /// Iterate departments in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ProfileRow])> {
        self.departments
            .iter()
            .map(|(name, rows)| (name.as_str(), rows.as_slice()))
    }

    /// Number of departments.
    pub fn len(&self) -> usize {
        self.departments.len()
    }

    /// Whether the roster has no departments.
    pub fn is_empty(&self) -> bool {
        self.departments.is_empty()
    }

    /// Total number of profile rows.
    pub fn row_count(&self) -> usize {
        self.departments.iter().map(|(_, rows)| rows.len()).sum()
    }
}

impl IntoIterator for SchoolRoster {
    type Item = (String, Vec<ProfileRow>);
    type IntoIter = std::vec::IntoIter<(String, Vec<ProfileRow>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.departments.into_iter()
    }
}

impl<D: Into<String>> FromIterator<(D, Vec<ProfileRow>)> for SchoolRoster {
    fn from_iter<T: IntoIterator<Item = (D, Vec<ProfileRow>)>>(iter: T) -> Self {
        let mut roster = Self::new();
        for (department, rows) in iter {
            roster.insert(department, rows);
        }
        roster
    }
}

/// Failures raised by a faculty directory.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The directory has no data for the requested school.
    #[error("No faculty directory configured for school '{0}'")]
    UnknownSchool(String),
    /// Roster source could not be read.
    #[error("Failed to read roster '{path}': {source}")]
    Io {
        /// Location of the roster.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Roster source was not valid.
    #[error("Failed to parse roster '{path}': {source}")]
    Parse {
        /// Location of the roster.
        path: String,
        /// Underlying decoding error.
        #[source]
        source: serde_json::Error,
    },
    /// Roster source listed the same department more than once.
    #[error("Roster '{path}' lists department '{department}' more than once")]
    DuplicateDepartment {
        /// Location of the roster.
        path: String,
        /// Repeated department name.
        department: String,
    },
    /// Any other directory-side failure.
    #[error("Directory request failed: {0}")]
    Upstream(String),
}

/// Failures raised while looking up grant projects.
#[derive(Debug, Error)]
pub enum ProjectLookupError {
    /// HTTP layer failed before a usable response arrived.
    #[error("Project metadata request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Metadata service answered with a non-success status.
    #[error("Unexpected project metadata response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the service.
        status: StatusCode,
        /// Response body for diagnostics.
        body: String,
    },
    /// Any other metadata-side failure.
    #[error("Project metadata lookup failed: {0}")]
    Upstream(String),
}

/// Failures raised while computing or storing an embedding.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Embedding provider could not produce a vector.
    #[error("Failed to generate embedding: {0}")]
    Client(#[from] EmbeddingClientError),
    /// Vector store rejected the write.
    #[error("Failed to store embedding: {0}")]
    Store(#[from] QdrantError),
    /// Provider returned a vector of the wrong size.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension configured for the collection.
        expected: usize,
        /// Dimension produced by the provider.
        actual: usize,
    },
    /// Any other embedding-side failure.
    #[error("Embedding request failed: {0}")]
    Upstream(String),
}

/// Source of department rosters for a school.
#[async_trait]
pub trait FacultyDirectory: Send + Sync {
    /// Return every department of `school` with its profile rows.
    async fn get_school_faculty_data(&self, school: &str) -> Result<SchoolRoster, ScrapeError>;
}

/// Source of grant-project metadata for a principal investigator.
#[async_trait]
pub trait ProjectMetadataSource: Send + Sync {
    /// Return every project row matching the investigator, in upstream order.
    async fn compile_project_metadata(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Vec<ProjectRow>, ProjectLookupError>;
}

/// Computes a faculty embedding and stores it in the vector index.
#[async_trait]
pub trait FacultyEmbedder: Send + Sync {
    /// Embed `faculty` and its `projects`, store the vector, and return its handle.
    async fn generate_and_store_embedding(
        &self,
        faculty: &Faculty,
        projects: &[Project],
    ) -> Result<EmbeddingId, EmbeddingError>;
}
