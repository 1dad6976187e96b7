//! Grant-project lookup for a single investigator.

use super::builder::convert_to_project;
use crate::models::Project;
use crate::sources::{ProjectLookupError, ProjectMetadataSource};

/// Fetch the investigator's projects and map them into [`Project`] records.
///
/// Upstream order and duplicates are preserved.
pub async fn fetch_faculty_projects(
    source: &dyn ProjectMetadataSource,
    first_name: &str,
    last_name: &str,
) -> Result<Vec<Project>, ProjectLookupError> {
    let rows = source.compile_project_metadata(first_name, last_name).await?;
    tracing::debug!(
        first_name,
        last_name,
        projects = rows.len(),
        "Fetched project metadata"
    );
    Ok(rows.into_iter().map(convert_to_project).collect())
}
