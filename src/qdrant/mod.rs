//! Qdrant vector store integration for faculty embeddings.

pub mod client;
pub mod filters;
pub mod payload;
pub mod types;

pub use client::QdrantService;
pub use filters::build_faculty_filter;
pub use payload::{build_faculty_payload, compute_document_hash};
pub use types::{FacultyFilter, QdrantError, ScoredPoint};
