//! Aggregator service: per-school fan-out over departments and faculty rows.

use super::builder::convert_to_faculty;
use super::control::RunControl;
use super::names::extract_faculty_names;
use super::projects::fetch_faculty_projects;
use super::types::{
    AggregateReport, AggregationError, AggregatorSettings, EnrichmentError, FacultyFailure,
};
use crate::metrics::{AggregationMetrics, MetricsSnapshot};
use crate::models::{AggregateResult, DepartmentBucket, Faculty};
use crate::sources::{FacultyDirectory, FacultyEmbedder, ProfileRow, ProjectMetadataSource};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

type RowOutcome = Result<Faculty, EnrichmentError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailurePolicy {
    /// First failing row fails the run.
    Abort,
    /// Failing rows are reported alongside the surviving records.
    Isolate,
}

/// Builds enriched faculty records for a school.
///
/// The aggregator owns shared handles to its three collaborators and enriches rows
/// concurrently, bounded by [`AggregatorSettings::concurrency`]. Department and row
/// order in the output always follow the directory, independent of completion order.
pub struct Aggregator {
    directory: Arc<dyn FacultyDirectory>,
    metadata: Arc<dyn ProjectMetadataSource>,
    embedder: Arc<dyn FacultyEmbedder>,
    settings: AggregatorSettings,
    metrics: Arc<AggregationMetrics>,
}

impl Aggregator {
    /// Wire an aggregator from its collaborators.
    pub fn new(
        directory: Arc<dyn FacultyDirectory>,
        metadata: Arc<dyn ProjectMetadataSource>,
        embedder: Arc<dyn FacultyEmbedder>,
        settings: AggregatorSettings,
    ) -> Self {
        Self {
            directory,
            metadata,
            embedder,
            settings,
            metrics: Arc::new(AggregationMetrics::new()),
        }
    }

    /// Settings this aggregator was built with.
    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    /// Aggregate every department of `school`.
    ///
    /// Any failing row fails the whole call and no partial result is returned. The
    /// configured deadline, if any, bounds the run.
    pub async fn aggregate(&self, school: &str) -> Result<AggregateResult, AggregationError> {
        let control = match self.settings.deadline {
            Some(timeout) => RunControl::new().with_timeout(timeout),
            None => RunControl::new(),
        };
        self.aggregate_with(school, &control).await
    }

    /// [`Aggregator::aggregate`] under caller-supplied cancellation and deadline.
    pub async fn aggregate_with(
        &self,
        school: &str,
        control: &RunControl,
    ) -> Result<AggregateResult, AggregationError> {
        let outcome = self.run(school, control, FailurePolicy::Abort).await?;
        outcome.into_result()
    }

    /// Aggregate `school`, isolating per-row failures.
    ///
    /// Directory failure, cancellation, and deadline expiry still fail the call.
    pub async fn aggregate_best_effort(
        &self,
        school: &str,
        control: &RunControl,
    ) -> Result<AggregateReport, AggregationError> {
        let outcome = self.run(school, control, FailurePolicy::Isolate).await?;
        outcome.into_report(school)
    }

    /// Enrich a single profile row: names, projects, model, embedding.
    pub async fn enrich(
        &self,
        row: &ProfileRow,
        control: &RunControl,
    ) -> Result<Faculty, EnrichmentError> {
        enrich_row(self.metadata.as_ref(), self.embedder.as_ref(), row, control).await
    }

    /// Return the current aggregation metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn run(
        &self,
        school: &str,
        control: &RunControl,
        policy: FailurePolicy,
    ) -> Result<RunOutcome, AggregationError> {
        let run_id = Uuid::new_v4();
        let started = std::time::Instant::now();
        let concurrency = self.settings.concurrency.max(1);
        tracing::info!(%run_id, school, concurrency, ?policy, "Starting aggregation");

        let roster = control
            .guard(self.directory.get_school_faculty_data(school))
            .await??;
        tracing::debug!(
            %run_id,
            departments = roster.len(),
            rows = roster.row_count(),
            "Faculty directory loaded"
        );

        let run_control = control.child();
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut departments = Vec::with_capacity(roster.len());
        let mut names: Vec<Vec<String>> = Vec::with_capacity(roster.len());
        let mut slots: Vec<Vec<Option<RowOutcome>>> = Vec::with_capacity(roster.len());
        let mut tasks = JoinSet::new();

        for (dept_index, (department, rows)) in roster.into_iter().enumerate() {
            names.push(rows.iter().map(|row| row.faculty_name.clone()).collect());
            slots.push(rows.iter().map(|_| None).collect());
            departments.push(department);

            for (row_index, row) in rows.into_iter().enumerate() {
                let metadata = Arc::clone(&self.metadata);
                let embedder = Arc::clone(&self.embedder);
                let semaphore = Arc::clone(&semaphore);
                let control = run_control.clone();
                tasks.spawn(async move {
                    let outcome = match semaphore.acquire_owned().await {
                        Ok(_permit) => {
                            enrich_row(metadata.as_ref(), embedder.as_ref(), &row, &control).await
                        }
                        Err(_) => Err(EnrichmentError::Cancelled),
                    };
                    (dept_index, row_index, outcome)
                });
            }
        }

        let mut task_error = None;
        while let Some(joined) = tasks.join_next().await {
            let (dept_index, row_index, outcome) = match joined {
                Ok(tagged) => tagged,
                Err(error) => {
                    tracing::error!(%run_id, error = %error, "Enrichment task failed");
                    run_control.token().cancel();
                    task_error.get_or_insert_with(|| error.to_string());
                    continue;
                }
            };

            match &outcome {
                Ok(faculty) => {
                    self.metrics.record_faculty(faculty.projects.len() as u64);
                    tracing::debug!(
                        %run_id,
                        department = %departments[dept_index],
                        position = row_index,
                        faculty = %faculty.name,
                        projects = faculty.projects.len(),
                        embedding_id = ?faculty.embedding_id,
                        "Faculty enriched"
                    );
                }
                Err(error) if error.is_interruption() => {}
                Err(error) => {
                    self.metrics.record_failure();
                    tracing::warn!(
                        %run_id,
                        department = %departments[dept_index],
                        position = row_index,
                        faculty = %names[dept_index][row_index],
                        error = %error,
                        "Faculty enrichment failed"
                    );
                    if policy == FailurePolicy::Abort {
                        run_control.token().cancel();
                    }
                }
            }
            slots[dept_index][row_index] = Some(outcome);
        }

        if let Some(message) = task_error {
            return Err(AggregationError::Task(message));
        }
        if control.token().is_cancelled() {
            return Err(AggregationError::Cancelled);
        }

        let outcome = RunOutcome {
            departments,
            names,
            rows: slots
                .into_iter()
                .map(|department| {
                    department
                        .into_iter()
                        .map(|slot| slot.unwrap_or(Err(EnrichmentError::Cancelled)))
                        .collect()
                })
                .collect(),
        };

        tracing::info!(
            %run_id,
            school,
            departments = outcome.departments.len(),
            failures = outcome.failure_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Aggregation finished"
        );
        Ok(outcome)
    }
}

/// Run the enrichment pipeline for one profile row.
async fn enrich_row(
    metadata: &dyn ProjectMetadataSource,
    embedder: &dyn FacultyEmbedder,
    row: &ProfileRow,
    control: &RunControl,
) -> Result<Faculty, EnrichmentError> {
    let (first_name, last_name) = extract_faculty_names(row)?;
    let projects = control
        .guard(fetch_faculty_projects(metadata, &first_name, &last_name))
        .await??;
    let mut faculty = convert_to_faculty(row, projects);
    let embedding_id = control
        .guard(embedder.generate_and_store_embedding(&faculty, &faculty.projects))
        .await??;
    faculty.attach_embedding(embedding_id);
    Ok(faculty)
}

/// Per-row outcomes of a run, indexed like the directory roster.
struct RunOutcome {
    departments: Vec<String>,
    names: Vec<Vec<String>>,
    rows: Vec<Vec<RowOutcome>>,
}

impl RunOutcome {
    fn failure_count(&self) -> usize {
        self.rows
            .iter()
            .flatten()
            .filter(|outcome| outcome.is_err())
            .count()
    }

    fn has_expired(&self) -> bool {
        self.rows
            .iter()
            .flatten()
            .any(|outcome| matches!(outcome, Err(EnrichmentError::DeadlineExceeded)))
    }

    /// All-or-nothing view: the earliest failing row (directory order) fails the run.
    ///
    /// Only rows that actually failed are candidates. Rows interrupted by the abort
    /// never report their own outcome, so with several concurrent failures the row
    /// named can depend on which one completed first.
    fn into_result(self) -> Result<AggregateResult, AggregationError> {
        let expired = self.has_expired();
        let mut result = AggregateResult::new();
        let mut interrupted = false;

        for ((department, names), rows) in self.departments.into_iter().zip(self.names).zip(self.rows)
        {
            let mut faculty = Vec::with_capacity(rows.len());
            for (position, (faculty_name, outcome)) in names.into_iter().zip(rows).enumerate() {
                match outcome {
                    Ok(record) => faculty.push(record),
                    Err(error) if error.is_interruption() => interrupted = true,
                    Err(source) => {
                        return Err(AggregationError::Faculty {
                            department,
                            position,
                            faculty_name,
                            source,
                        });
                    }
                }
            }
            result.push(DepartmentBucket {
                department,
                faculty,
            });
        }

        if expired {
            return Err(AggregationError::DeadlineExceeded);
        }
        if interrupted {
            return Err(AggregationError::Cancelled);
        }
        Ok(result)
    }

    /// Best-effort view: surviving records plus one failure per failing row.
    fn into_report(self, school: &str) -> Result<AggregateReport, AggregationError> {
        if self.has_expired() {
            return Err(AggregationError::DeadlineExceeded);
        }

        let mut result = AggregateResult::new();
        let mut failures = Vec::new();

        for ((department, names), rows) in self.departments.into_iter().zip(self.names).zip(self.rows)
        {
            let mut faculty = Vec::with_capacity(rows.len());
            for (position, (faculty_name, outcome)) in names.into_iter().zip(rows).enumerate() {
                match outcome {
                    Ok(record) => faculty.push(record),
                    Err(error) => failures.push(FacultyFailure {
                        department: department.clone(),
                        position,
                        faculty_name,
                        error,
                    }),
                }
            }
            result.push(DepartmentBucket {
                department,
                faculty,
            });
        }

        Ok(AggregateReport {
            school: school.to_string(),
            result,
            failures,
        })
    }
}
