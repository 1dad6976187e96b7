//! Filter helpers for faculty similarity searches.

use serde_json::{Value, json};

use super::types::FacultyFilter;

/// Compose the Qdrant filter payload for a faculty search, or `None` when unfiltered.
pub fn build_faculty_filter(filter: &FacultyFilter) -> Option<Value> {
    let constraints = [
        ("school", filter.school.as_deref()),
        ("department", filter.department.as_deref()),
        ("activity_codes", filter.activity_code.as_deref()),
        ("agency_ic_admins", filter.agency_ic_admin.as_deref()),
    ];

    let must: Vec<Value> = constraints
        .into_iter()
        .filter_map(|(key, value)| value.and_then(non_empty).map(|value| (key, value)))
        .map(|(key, value)| {
            json!({
                "key": key,
                "match": { "value": value }
            })
        })
        .collect();

    if must.is_empty() {
        None
    } else {
        Some(json!({ "must": must }))
    }
}

fn non_empty(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
