//! First/last name derivation from directory display names.

use crate::sources::ProfileRow;
use thiserror::Error;

/// The display name was empty, so no investigator name could be derived.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Faculty display name is empty")]
pub struct NameParsingError;

/// Split a display name into `(first_name, last_name)`.
///
/// The first token is the first name and the last token is the last name; any middle
/// tokens are ignored. A single token is used for both. Suffixes such as `Jr.` are
/// kept verbatim as the last name.
pub fn extract_names(display_name: &str) -> Result<(String, String), NameParsingError> {
    let mut tokens = display_name.split_whitespace();
    let first = tokens.next().ok_or(NameParsingError)?;
    let last = tokens.next_back().unwrap_or(first);
    Ok((first.to_string(), last.to_string()))
}

/// Derive the investigator name pair for a profile row.
pub fn extract_faculty_names(profile: &ProfileRow) -> Result<(String, String), NameParsingError> {
    extract_names(&profile.faculty_name)
}
