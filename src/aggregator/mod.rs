//! Faculty aggregation pipeline: name extraction, project lookup, model assembly, and
//! embedding attachment, fanned out over a school's departments.

pub mod builder;
pub mod control;
pub mod names;
pub mod projects;
mod service;
pub mod types;

pub use builder::{convert_to_faculty, convert_to_project};
pub use control::{CancellationToken, Interruption, RunControl};
pub use names::{NameParsingError, extract_faculty_names, extract_names};
pub use projects::fetch_faculty_projects;
pub use service::Aggregator;
pub use types::{
    AggregateReport, AggregationError, AggregatorSettings, DEFAULT_CONCURRENCY, EnrichmentError,
    FacultyFailure,
};
