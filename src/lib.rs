#![deny(missing_docs)]

//! Core library for the faculty aggregator.
//!
//! A school's faculty directory is enriched row by row with NIH grant projects and a
//! semantic embedding, producing an ordered department → faculty mapping.

/// Faculty aggregation pipeline and its concurrency controls.
pub mod aggregator;
/// Environment-driven configuration management.
pub mod config;
/// Embedding providers and the Qdrant-backed faculty embedding service.
pub mod embedding;
/// Structured logging and tracing setup.
pub mod logging;
/// Aggregation metrics helpers.
pub mod metrics;
/// Domain records produced by aggregation.
pub mod models;
/// NIH RePORTER project metadata client.
pub mod nih;
/// Qdrant vector store integration.
pub mod qdrant;
/// Collaborator contracts and the roster-file directory.
pub mod sources;
