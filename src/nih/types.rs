//! Wire types for the RePORTER project search endpoint.

use crate::sources::ProjectRow;
use serde::{Deserialize, Serialize};
use time::Date;
use time::macros::format_description;

/// Search request body.
#[derive(Debug, Serialize)]
pub(crate) struct SearchRequest<'a> {
    pub criteria: SearchCriteria<'a>,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct SearchCriteria<'a> {
    pub use_relevance: bool,
    pub fiscal_years: &'a [i32],
    pub include_active_projects: bool,
    pub pi_names: [PiName<'a>; 1],
    pub org_names: &'a [String],
}

#[derive(Debug, Serialize)]
pub(crate) struct PiName<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
}

/// One page of search results.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub meta: SearchMeta,
    #[serde(default)]
    pub results: Vec<ReporterProject>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchMeta {
    #[serde(default)]
    pub total: usize,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReporterProject {
    #[serde(default)]
    pub project_num: Option<String>,
    #[serde(default)]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub terms: Option<String>,
    #[serde(default)]
    pub project_start_date: Option<String>,
    #[serde(default)]
    pub project_end_date: Option<String>,
    #[serde(default)]
    pub agency_ic_admin: Option<AgencyIcAdmin>,
    #[serde(default)]
    pub activity_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AgencyIcAdmin {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub abbreviation: Option<String>,
}

impl ReporterProject {
    pub(crate) fn into_row(self) -> ProjectRow {
        let project_number = self.project_num.unwrap_or_default();
        let start_date = parse_date(&project_number, self.project_start_date.as_deref());
        let end_date = parse_date(&project_number, self.project_end_date.as_deref());
        let agency_ic_admin = self
            .agency_ic_admin
            .and_then(|agency| {
                agency
                    .abbreviation
                    .filter(|value| !value.trim().is_empty())
                    .or(agency.code)
            })
            .unwrap_or_default();

        ProjectRow {
            abstract_text: self.abstract_text.unwrap_or_default(),
            terms: parse_terms(self.terms.as_deref().unwrap_or_default()),
            start_date,
            end_date,
            agency_ic_admin,
            activity_code: self.activity_code.unwrap_or_default(),
            project_number,
        }
    }
}

/// Split a RePORTER terms string into individual terms.
///
/// Terms arrive either bracketed (`<cartilage><mechanics>`) or `;`-separated.
pub(crate) fn parse_terms(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    let separators: &[char] = if raw.starts_with('<') {
        &['<', '>']
    } else {
        &[';']
    };
    raw.split(separators)
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse the calendar date at the start of a RePORTER timestamp.
fn parse_date(project_number: &str, raw: Option<&str>) -> Option<Date> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    let format = format_description!("[year]-[month]-[day]");
    let date_part = raw.get(..10).unwrap_or(raw);
    match Date::parse(date_part, format) {
        Ok(date) => Some(date),
        Err(err) => {
            tracing::warn!(project = project_number, value = raw, error = %err, "Ignoring unparseable project date");
            None
        }
    }
}
