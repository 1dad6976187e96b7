//! Helpers for constructing and hashing faculty payloads.

use crate::models::{Faculty, Project};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use time::OffsetDateTime;

/// Build the payload stored alongside a faculty vector.
///
/// Activity codes and administering agencies are collected across the faculty
/// member's projects (deduplicated, sorted) so that searches can filter on them.
pub fn build_faculty_payload(
    faculty: &Faculty,
    projects: &[Project],
    document_hash: &str,
) -> Value {
    let activity_codes = distinct(projects.iter().map(|project| project.activity_code.as_str()));
    let agencies = distinct(projects.iter().map(|project| project.agency_ic_admin.as_str()));

    let mut payload = Map::new();
    payload.insert("name".into(), Value::String(faculty.name.clone()));
    payload.insert("school".into(), Value::String(faculty.school.clone()));
    payload.insert(
        "department".into(),
        Value::String(faculty.department.clone()),
    );
    payload.insert("activity_codes".into(), activity_codes);
    payload.insert("agency_ic_admins".into(), agencies);
    payload.insert(
        "project_count".into(),
        Value::from(projects.len() as u64),
    );
    payload.insert(
        "document_hash".into(),
        Value::String(document_hash.to_string()),
    );
    payload.insert("indexed_at".into(), Value::String(current_timestamp_rfc3339()));

    Value::Object(payload)
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Value {
    let set: BTreeSet<&str> = values
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();
    Value::Array(
        set.into_iter()
            .map(|value| Value::String(value.to_string()))
            .collect(),
    )
}

/// Compute a deterministic SHA-256 hash of the embedded document.
pub fn compute_document_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
