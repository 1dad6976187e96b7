//! Faculty directory backed by a JSON roster export.
//!
//! The export groups departments per school and keeps them in an array so that
//! department order survives the round trip:
//!
//! ```json
//! {
//!   "SEAS": [
//!     { "department": "Biomedical Engineering", "faculty": [ { "Faculty_Name": "Jane Doe" } ] }
//!   ]
//! }
//! ```

use super::{FacultyDirectory, ProfileRow, SchoolRoster, ScrapeError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Deserialize)]
struct DepartmentEntry {
    department: String,
    #[serde(default)]
    faculty: Vec<ProfileRow>,
}

/// Reads department rosters from a JSON file on every request.
pub struct RosterFileDirectory {
    path: PathBuf,
}

impl RosterFileDirectory {
    /// Create a directory reading from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the roster file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self, raw: &str, school: &str) -> Result<SchoolRoster, ScrapeError> {
        let mut schools: HashMap<String, Vec<DepartmentEntry>> =
            serde_json::from_str(raw).map_err(|source| ScrapeError::Parse {
                path: self.path.display().to_string(),
                source,
            })?;

        let entries = schools
            .remove(school)
            .ok_or_else(|| ScrapeError::UnknownSchool(school.to_string()))?;

        let mut roster = SchoolRoster::new();
        for entry in entries {
            if roster.get(&entry.department).is_some() {
                return Err(ScrapeError::DuplicateDepartment {
                    path: self.path.display().to_string(),
                    department: entry.department,
                });
            }
            roster.insert(entry.department, entry.faculty);
        }
        Ok(roster)
    }
}

#[async_trait]
impl FacultyDirectory for RosterFileDirectory {
    async fn get_school_faculty_data(&self, school: &str) -> Result<SchoolRoster, ScrapeError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ScrapeError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        let roster = self.parse(&raw, school)?;
        tracing::debug!(
            school,
            path = %self.path.display(),
            departments = roster.len(),
            rows = roster.row_count(),
            "Loaded school roster"
        );
        Ok(roster)
    }
}
