//! Pure mapping from collaborator rows to model records.

use crate::models::{Faculty, Project};
use crate::sources::{ProfileRow, ProjectRow};

/// Map a metadata row onto a [`Project`] by renaming fields only.
pub fn convert_to_project(row: ProjectRow) -> Project {
    let ProjectRow {
        project_number,
        abstract_text,
        terms,
        start_date,
        end_date,
        agency_ic_admin,
        activity_code,
    } = row;

    Project {
        project_number,
        r#abstract: abstract_text,
        relevant_terms: terms,
        start_date,
        end_date,
        agency_ic_admin,
        activity_code,
    }
}

/// Build a [`Faculty`] from a profile row and its resolved projects.
///
/// The embedding handle starts unresolved; the aggregator attaches it afterwards.
pub fn convert_to_faculty(profile: &ProfileRow, projects: Vec<Project>) -> Faculty {
    Faculty {
        name: profile.faculty_name.clone(),
        school: profile.school.clone(),
        department: profile.department.clone(),
        about: profile.about_section.clone(),
        email: profile.email_address.clone(),
        profile_url: profile.profile_url.clone(),
        projects,
        embedding_id: None,
    }
}
