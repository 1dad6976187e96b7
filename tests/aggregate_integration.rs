use async_trait::async_trait;
use faculty_aggregator::{
    aggregator::{
        AggregationError, Aggregator, AggregatorSettings, CancellationToken, EnrichmentError,
        RunControl,
    },
    models::{EmbeddingId, Faculty, Project},
    sources::{
        EmbeddingError, FacultyDirectory, FacultyEmbedder, ProfileRow, ProjectLookupError,
        ProjectMetadataSource, ProjectRow, SchoolRoster, ScrapeError,
    },
};
use std::collections::HashSet;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};
use std::time::Duration;

fn row(name: &str, department: &str) -> ProfileRow {
    ProfileRow {
        faculty_name: name.to_string(),
        school: "SEAS".to_string(),
        department: department.to_string(),
        about_section: format!("About {name}"),
        email_address: String::new(),
        profile_url: String::new(),
    }
}

fn project_row(number: &str) -> ProjectRow {
    ProjectRow {
        project_number: number.to_string(),
        abstract_text: format!("Abstract of {number}"),
        terms: vec!["term".to_string()],
        agency_ic_admin: "NIGMS".to_string(),
        activity_code: "R01".to_string(),
        ..ProjectRow::default()
    }
}

struct StaticDirectory {
    roster: SchoolRoster,
}

#[async_trait]
impl FacultyDirectory for StaticDirectory {
    async fn get_school_faculty_data(&self, school: &str) -> Result<SchoolRoster, ScrapeError> {
        if school == "SEAS" {
            Ok(self.roster.clone())
        } else {
            Err(ScrapeError::UnknownSchool(school.to_string()))
        }
    }
}

/// Metadata source with per-investigator projects, failures, and delays.
#[derive(Default)]
struct FakeMetadata {
    projects: Vec<(String, Vec<ProjectRow>)>,
    failing: HashSet<String>,
    delays: Vec<(String, Duration)>,
    calls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ProjectMetadataSource for FakeMetadata {
    async fn compile_project_metadata(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Vec<ProjectRow>, ProjectLookupError> {
        self.calls
            .lock()
            .expect("calls")
            .push((first_name.to_string(), last_name.to_string()));
        if let Some((_, delay)) = self.delays.iter().find(|(name, _)| name == last_name) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(last_name) {
            return Err(ProjectLookupError::Upstream(format!(
                "lookup failed for {last_name}"
            )));
        }
        Ok(self
            .projects
            .iter()
            .find(|(name, _)| name == last_name)
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }
}

/// Embedder handing out sequential handles from a starting value.
struct CountingEmbedder {
    next: AtomicU64,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl CountingEmbedder {
    fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl FacultyEmbedder for CountingEmbedder {
    async fn generate_and_store_embedding(
        &self,
        faculty: &Faculty,
        projects: &[Project],
    ) -> Result<EmbeddingId, EmbeddingError> {
        assert!(faculty.embedding_id.is_none());
        assert_eq!(faculty.projects.len(), projects.len());
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().expect("seen").push(faculty.name.clone());
        Ok(EmbeddingId(self.next.fetch_add(1, Ordering::SeqCst)))
    }
}

fn aggregator(
    roster: SchoolRoster,
    metadata: FakeMetadata,
    embedder: Arc<CountingEmbedder>,
    concurrency: usize,
) -> Aggregator {
    Aggregator::new(
        Arc::new(StaticDirectory { roster }),
        Arc::new(metadata),
        embedder,
        AggregatorSettings {
            concurrency,
            deadline: None,
        },
    )
}

#[tokio::test]
async fn single_faculty_gets_projects_and_embedding() {
    let roster: SchoolRoster = [(
        "Biomedical Engineering",
        vec![row("Jane Doe", "Biomedical Engineering")],
    )]
    .into_iter()
    .collect();
    let metadata = FakeMetadata {
        projects: vec![("Doe".into(), vec![project_row("P1"), project_row("P2")])],
        ..FakeMetadata::default()
    };
    let embedder = Arc::new(CountingEmbedder::starting_at(42));

    let result = aggregator(roster, metadata, embedder, 4)
        .aggregate("SEAS")
        .await
        .expect("aggregate");

    let faculty = &result["Biomedical Engineering"];
    assert_eq!(faculty.len(), 1);
    assert_eq!(faculty[0].name, "Jane Doe");
    assert_eq!(faculty[0].projects.len(), 2);
    assert_eq!(faculty[0].projects[0].project_number, "P1");
    assert_eq!(faculty[0].embedding_id, Some(EmbeddingId(42)));
}

#[tokio::test]
async fn single_token_name_is_used_for_both_parts() {
    let roster: SchoolRoster = [("Music", vec![row("Madonna", "Music")])]
        .into_iter()
        .collect();
    let metadata = FakeMetadata::default();
    let embedder = Arc::new(CountingEmbedder::starting_at(0));
    let aggregator = Aggregator::new(
        Arc::new(StaticDirectory { roster }),
        Arc::new(metadata),
        embedder,
        AggregatorSettings::default(),
    );

    let result = aggregator.aggregate("SEAS").await.expect("aggregate");
    assert_eq!(result["Music"].len(), 1);
    assert!(result["Music"][0].projects.is_empty());
}

#[tokio::test]
async fn single_token_name_reaches_metadata_source() {
    let roster: SchoolRoster = [("Music", vec![row("Madonna", "Music")])]
        .into_iter()
        .collect();
    let metadata = Arc::new(FakeMetadata::default());
    let aggregator = Aggregator::new(
        Arc::new(StaticDirectory { roster }),
        Arc::clone(&metadata) as Arc<dyn ProjectMetadataSource>,
        Arc::new(CountingEmbedder::starting_at(0)),
        AggregatorSettings::default(),
    );

    aggregator.aggregate("SEAS").await.expect("aggregate");
    let calls = metadata.calls.lock().expect("calls").clone();
    assert_eq!(calls, vec![("Madonna".to_string(), "Madonna".to_string())]);
}

#[tokio::test]
async fn one_failing_row_fails_the_whole_school() {
    let roster: SchoolRoster = [
        ("Chemistry", vec![row("Ada Lovelace", "Chemistry")]),
        (
            "Physics",
            vec![
                row("Alan Turing", "Physics"),
                row("Grace Hopper", "Physics"),
                row("Edsger Dijkstra", "Physics"),
            ],
        ),
    ]
    .into_iter()
    .collect();
    let metadata = FakeMetadata {
        failing: HashSet::from(["Hopper".to_string()]),
        ..FakeMetadata::default()
    };
    let embedder = Arc::new(CountingEmbedder::starting_at(0));

    let error = aggregator(roster, metadata, embedder, 1)
        .aggregate("SEAS")
        .await
        .expect_err("aggregate should fail");

    match error {
        AggregationError::Faculty {
            department,
            position,
            faculty_name,
            source,
        } => {
            assert_eq!(department, "Physics");
            assert_eq!(position, 1);
            assert_eq!(faculty_name, "Grace Hopper");
            assert!(matches!(source, EnrichmentError::ProjectLookup(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn every_department_key_is_present_even_when_empty() {
    let roster: SchoolRoster = [
        ("Systems Engineering", Vec::new()),
        ("Physics", vec![row("Alan Turing", "Physics")]),
        ("Chemistry", Vec::new()),
    ]
    .into_iter()
    .collect();
    let embedder = Arc::new(CountingEmbedder::starting_at(0));

    let result = aggregator(roster, FakeMetadata::default(), embedder, 2)
        .aggregate("SEAS")
        .await
        .expect("aggregate");

    let names: Vec<&str> = result.department_names().collect();
    assert_eq!(names, vec!["Systems Engineering", "Physics", "Chemistry"]);
    assert!(result["Systems Engineering"].is_empty());
    assert!(result["Chemistry"].is_empty());
    assert_eq!(result.faculty_count(), 1);
}

#[tokio::test]
async fn row_order_survives_out_of_order_completion() {
    let physics: Vec<ProfileRow> = ["Slow One", "Quick Two", "Medium Three", "Quick Four"]
        .into_iter()
        .map(|name| row(name, "Physics"))
        .collect();
    let roster: SchoolRoster = [("Physics", physics)].into_iter().collect();
    let metadata = FakeMetadata {
        delays: vec![
            ("One".into(), Duration::from_millis(80)),
            ("Three".into(), Duration::from_millis(40)),
        ],
        ..FakeMetadata::default()
    };
    let embedder = Arc::new(CountingEmbedder::starting_at(0));

    let result = aggregator(roster, metadata, Arc::clone(&embedder), 4)
        .aggregate("SEAS")
        .await
        .expect("aggregate");

    let names: Vec<&str> = result["Physics"]
        .iter()
        .map(|faculty| faculty.name.as_str())
        .collect();
    assert_eq!(
        names,
        vec!["Slow One", "Quick Two", "Medium Three", "Quick Four"]
    );
    let completion = embedder.seen.lock().expect("seen").clone();
    assert_ne!(completion.first().map(String::as_str), Some("Slow One"));
}

#[tokio::test]
async fn embedder_is_called_once_per_row() {
    let roster: SchoolRoster = [
        (
            "Physics",
            vec![row("Alan Turing", "Physics"), row("Grace Hopper", "Physics")],
        ),
        ("Chemistry", vec![row("Ada Lovelace", "Chemistry")]),
    ]
    .into_iter()
    .collect();
    let embedder = Arc::new(CountingEmbedder::starting_at(7));

    let result = aggregator(roster, FakeMetadata::default(), Arc::clone(&embedder), 3)
        .aggregate("SEAS")
        .await
        .expect("aggregate");

    assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    let mut ids: Vec<u64> = result
        .departments()
        .flat_map(|bucket| bucket.faculty.iter())
        .filter_map(|faculty| faculty.embedding_id.map(|id| id.get()))
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![7, 8, 9]);
}

#[tokio::test]
async fn best_effort_keeps_surviving_rows() {
    let roster: SchoolRoster = [
        (
            "Physics",
            vec![
                row("Alan Turing", "Physics"),
                row("Grace Hopper", "Physics"),
                row("Edsger Dijkstra", "Physics"),
            ],
        ),
        ("Chemistry", vec![row("Ada Lovelace", "Chemistry")]),
    ]
    .into_iter()
    .collect();
    let metadata = FakeMetadata {
        failing: HashSet::from(["Hopper".to_string()]),
        ..FakeMetadata::default()
    };
    let embedder = Arc::new(CountingEmbedder::starting_at(0));
    let aggregator = aggregator(roster, metadata, Arc::clone(&embedder), 2);

    let report = aggregator
        .aggregate_best_effort("SEAS", &RunControl::new())
        .await
        .expect("report");

    assert!(!report.is_complete());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].faculty_name, "Grace Hopper");
    assert_eq!(report.failures[0].position, 1);
    let physics: Vec<&str> = report.result["Physics"]
        .iter()
        .map(|faculty| faculty.name.as_str())
        .collect();
    assert_eq!(physics, vec!["Alan Turing", "Edsger Dijkstra"]);
    assert_eq!(report.result["Chemistry"].len(), 1);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);

    let metrics = aggregator.metrics_snapshot();
    assert_eq!(metrics.faculty_enriched, 3);
    assert_eq!(metrics.failures, 1);
}

#[tokio::test]
async fn expired_deadline_fails_the_run() {
    let roster: SchoolRoster = [("Physics", vec![row("Slow One", "Physics")])]
        .into_iter()
        .collect();
    let metadata = FakeMetadata {
        delays: vec![("One".into(), Duration::from_secs(5))],
        ..FakeMetadata::default()
    };
    let embedder = Arc::new(CountingEmbedder::starting_at(0));
    let aggregator = aggregator(roster, metadata, Arc::clone(&embedder), 1);

    let control = RunControl::new().with_timeout(Duration::from_millis(50));
    let error = aggregator
        .aggregate_with("SEAS", &control)
        .await
        .expect_err("deadline");

    assert!(matches!(error, AggregationError::DeadlineExceeded));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancelled_token_stops_the_run() {
    let roster: SchoolRoster = [("Physics", vec![row("Alan Turing", "Physics")])]
        .into_iter()
        .collect();
    let embedder = Arc::new(CountingEmbedder::starting_at(0));
    let aggregator = aggregator(roster, FakeMetadata::default(), Arc::clone(&embedder), 1);

    let token = CancellationToken::new();
    token.cancel();
    let error = aggregator
        .aggregate_with("SEAS", &RunControl::new().with_token(token))
        .await
        .expect_err("cancelled");

    assert!(matches!(error, AggregationError::Cancelled));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn directory_failure_propagates() {
    let embedder = Arc::new(CountingEmbedder::starting_at(0));
    let aggregator = aggregator(SchoolRoster::new(), FakeMetadata::default(), embedder, 1);

    let error = aggregator.aggregate("LAW").await.expect_err("unknown school");
    assert!(matches!(
        error,
        AggregationError::Scrape(ScrapeError::UnknownSchool(ref school)) if school == "LAW"
    ));
}

#[tokio::test]
async fn aggregate_result_serializes_in_directory_order() {
    let roster: SchoolRoster = [
        ("Zoology", vec![row("Jane Doe", "Zoology")]),
        ("Anthropology", Vec::new()),
    ]
    .into_iter()
    .collect();
    let embedder = Arc::new(CountingEmbedder::starting_at(1));

    let result = aggregator(roster, FakeMetadata::default(), embedder, 2)
        .aggregate("SEAS")
        .await
        .expect("aggregate");

    let json = serde_json::to_string(&result).expect("json");
    let zoology = json.find("\"Zoology\"").expect("zoology key");
    let anthropology = json.find("\"Anthropology\"").expect("anthropology key");
    assert!(zoology < anthropology);
    assert!(json.contains("\"embedding_id\":1"));
}

#[tokio::test]
async fn cancelling_mid_call_interrupts_slow_lookup() {
    let roster: SchoolRoster = [("Physics", vec![row("Slow One", "Physics")])]
        .into_iter()
        .collect();
    let metadata = FakeMetadata {
        delays: vec![("One".into(), Duration::from_secs(3))],
        ..FakeMetadata::default()
    };
    let embedder = Arc::new(CountingEmbedder::starting_at(0));
    let aggregator = aggregator(roster, metadata, Arc::clone(&embedder), 1);

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let error = aggregator
        .aggregate_with("SEAS", &RunControl::new().with_token(token))
        .await
        .expect_err("cancelled");

    assert!(matches!(error, AggregationError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_failure_aborts_slow_and_queued_rows() {
    let roster: SchoolRoster = [
        ("Chemistry", vec![row("Ada Slow", "Chemistry")]),
        (
            "Physics",
            vec![
                row("Grace Hopper", "Physics"),
                row("Alan Queued", "Physics"),
                row("Edsger Waiting", "Physics"),
            ],
        ),
        ("Mathematics", vec![row("Emmy Pending", "Mathematics")]),
    ]
    .into_iter()
    .collect();
    let metadata = FakeMetadata {
        failing: HashSet::from(["Hopper".to_string()]),
        delays: vec![
            ("Slow".into(), Duration::from_secs(2)),
            ("Queued".into(), Duration::from_millis(200)),
            ("Waiting".into(), Duration::from_millis(200)),
            ("Pending".into(), Duration::from_millis(200)),
        ],
        ..FakeMetadata::default()
    };
    let embedder = Arc::new(CountingEmbedder::starting_at(0));

    let started = std::time::Instant::now();
    let error = aggregator(roster, metadata, Arc::clone(&embedder), 2)
        .aggregate("SEAS")
        .await
        .expect_err("aggregate should fail");

    match error {
        AggregationError::Faculty {
            department,
            position,
            faculty_name,
            source,
        } => {
            assert_eq!(department, "Physics");
            assert_eq!(position, 0);
            assert_eq!(faculty_name, "Grace Hopper");
            assert!(matches!(source, EnrichmentError::ProjectLookup(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}
