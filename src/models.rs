//! Faculty and project records produced by the aggregation pipeline.
//!
//! Everything here is plain data: the records are built by
//! [`crate::aggregator`] and are ready to be committed to storage as-is once an
//! aggregation run succeeds.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use time::Date;

time::serde::format_description!(calendar_date, Date, "[year]-[month]-[day]");

/// Handle of a faculty vector stored in the external vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmbeddingId(pub u64);

impl EmbeddingId {
    /// Raw numeric value of the handle.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EmbeddingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EmbeddingId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// A funded research project attributed to a faculty member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Funding record identifier.
    pub project_number: String,
    /// Project abstract, possibly empty.
    pub r#abstract: String,
    /// Indexing terms attached to the project.
    pub relevant_terms: Vec<String>,
    /// Project start date.
    #[serde(default, with = "calendar_date::option")]
    pub start_date: Option<Date>,
    /// Project end date; absent for open-ended projects.
    #[serde(default, with = "calendar_date::option")]
    pub end_date: Option<Date>,
    /// Administering agency (institute/center) code.
    pub agency_ic_admin: String,
    /// Grant mechanism code, e.g. `R01`.
    pub activity_code: String,
}

/// A faculty member together with their projects and embedding handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faculty {
    /// Display name as published in the directory.
    pub name: String,
    /// School the faculty member belongs to.
    pub school: String,
    /// Department the faculty member belongs to.
    pub department: String,
    /// Free-text profile summary.
    pub about: String,
    /// Contact email address.
    pub email: String,
    /// Public profile page.
    pub profile_url: String,
    /// Projects in upstream metadata order.
    pub projects: Vec<Project>,
    /// Vector-store handle; `None` until the embedding step has run.
    pub embedding_id: Option<EmbeddingId>,
}

impl Faculty {
    /// Whether the embedding handle has been attached.
    pub fn is_embedded(&self) -> bool {
        self.embedding_id.is_some()
    }

    /// Attach the vector-store handle returned by the embedding step.
    pub fn attach_embedding(&mut self, id: EmbeddingId) {
        self.embedding_id = Some(id);
    }
}

/// Ordered faculty list for a single department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentBucket {
    /// Department name exactly as supplied by the directory.
    pub department: String,
    /// Faculty records in row encounter order.
    pub faculty: Vec<Faculty>,
}

/// Department name → faculty records, in directory iteration order.
///
/// Serializes as a JSON object whose keys keep the directory order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateResult {
    departments: Vec<DepartmentBucket>,
}

impl AggregateResult {
    /// Create an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a department bucket. Buckets keep insertion order.
    pub fn push(&mut self, bucket: DepartmentBucket) {
        self.departments.push(bucket);
    }

    /// Faculty records of `department`, if the directory returned that key.
    pub fn get(&self, department: &str) -> Option<&[Faculty]> {
        self.departments
            .iter()
            .find(|bucket| bucket.department == department)
            .map(|bucket| bucket.faculty.as_slice())
    }

    /// Department names in directory order.
    pub fn department_names(&self) -> impl Iterator<Item = &str> {
        self.departments
            .iter()
            .map(|bucket| bucket.department.as_str())
    }

    /// Iterate over the department buckets.
    pub fn departments(&self) -> impl Iterator<Item = &DepartmentBucket> {
        self.departments.iter()
    }

    /// Consume the result, yielding the buckets.
    pub fn into_departments(self) -> Vec<DepartmentBucket> {
        self.departments
    }

    /// Number of departments.
    pub fn len(&self) -> usize {
        self.departments.len()
    }

    /// Whether the result holds no departments.
    pub fn is_empty(&self) -> bool {
        self.departments.is_empty()
    }

    /// Total faculty records across all departments.
    pub fn faculty_count(&self) -> usize {
        self.departments
            .iter()
            .map(|bucket| bucket.faculty.len())
            .sum()
    }
}

impl std::ops::Index<&str> for AggregateResult {
    type Output = [Faculty];

    fn index(&self, department: &str) -> &Self::Output {
        self.get(department)
            .unwrap_or_else(|| panic!("department '{department}' not present in result"))
    }
}

impl Serialize for AggregateResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.departments.len()))?;
        for bucket in &self.departments {
            map.serialize_entry(&bucket.department, &bucket.faculty)?;
        }
        map.end()
    }
}
