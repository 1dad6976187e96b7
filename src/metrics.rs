use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing aggregation activity.
#[derive(Default)]
pub struct AggregationMetrics {
    faculty_enriched: AtomicU64,
    projects_attached: AtomicU64,
    failures: AtomicU64,
}

impl AggregationMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an enriched faculty member and the number of projects attached to them.
    pub fn record_faculty(&self, project_count: u64) {
        self.faculty_enriched.fetch_add(1, Ordering::Relaxed);
        self.projects_attached
            .fetch_add(project_count, Ordering::Relaxed);
    }

    /// Record a faculty member whose enrichment failed.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            faculty_enriched: self.faculty_enriched.load(Ordering::Relaxed),
            projects_attached: self.projects_attached.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of aggregation counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Faculty members enriched since startup.
    pub faculty_enriched: u64,
    /// Projects attached across all enriched faculty members.
    pub projects_attached: u64,
    /// Faculty members whose enrichment failed.
    pub failures: u64,
}
