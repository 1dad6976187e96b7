use std::{fs, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use faculty_aggregator::{
    aggregator::{AggregateReport, Aggregator, RunControl},
    config::Config,
    embedding::EmbeddingService,
    logging,
    models::AggregateResult,
    nih::NihReporterClient,
    qdrant::FacultyFilter,
    sources::RosterFileDirectory,
};
use serde::{Serialize, Serializer};

#[derive(Parser)]
#[command(
    name = "faculty-aggregator",
    about = "Aggregate faculty profiles with NIH projects and embeddings"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Aggregate one or more schools and write the department mapping as JSON.
    Aggregate {
        /// School to aggregate; repeatable. Defaults to `SCHOOLS_TO_SCRAPE`.
        #[arg(long = "school")]
        schools: Vec<String>,
        /// Roster file overriding `ROSTER_PATH`.
        #[arg(long)]
        roster: Option<PathBuf>,
        /// Output file; stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Keep surviving records when individual rows fail.
        #[arg(long)]
        best_effort: bool,
        /// Maximum concurrent enrichments.
        #[arg(long)]
        concurrency: Option<usize>,
        /// Deadline for each school, in seconds.
        #[arg(long)]
        deadline_secs: Option<u64>,
    },
    /// Query stored faculty embeddings.
    Search {
        /// Free-text query embedded with the configured provider.
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
        #[arg(long)]
        school: Option<String>,
        #[arg(long)]
        department: Option<String>,
        /// Grant mechanism code, e.g. `R01`.
        #[arg(long)]
        activity_code: Option<String>,
        /// Administering institute abbreviation, e.g. `NIGMS`.
        #[arg(long)]
        agency: Option<String>,
    },
}

/// School → aggregate result, serialized in request order.
struct SchoolResults(Vec<(String, AggregateResult)>);

impl Serialize for SchoolResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(school, result)| (school, result)))
    }
}

#[tokio::main]
async fn main() {
    logging::init_tracing();
    if let Err(err) = run().await {
        tracing::error!(error = %format!("{err:#}"), "Command failed");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load().context("Failed to load configuration")?;

    match cli.command {
        Command::Aggregate {
            schools,
            roster,
            output,
            best_effort,
            concurrency,
            deadline_secs,
        } => {
            if let Some(roster) = roster {
                config.roster_path = roster;
            }
            let mut settings = config.aggregator_settings();
            if let Some(concurrency) = concurrency {
                if concurrency == 0 {
                    bail!("--concurrency must be greater than zero");
                }
                settings.concurrency = concurrency;
            }
            if let Some(secs) = deadline_secs {
                settings.deadline = Some(Duration::from_secs(secs));
            }
            let schools = if schools.is_empty() {
                config.schools_to_scrape.clone()
            } else {
                schools
            };

            let embedder = EmbeddingService::connect(&config)
                .await
                .context("Failed to initialize embedding service")?;
            let aggregator = Aggregator::new(
                Arc::new(RosterFileDirectory::new(config.roster_path.clone())),
                Arc::new(
                    NihReporterClient::new(&config.nih)
                        .context("Failed to initialize NIH RePORTER client")?,
                ),
                Arc::new(embedder),
                settings,
            );

            let mut results = Vec::with_capacity(schools.len());
            let mut failed_rows = 0usize;
            for school in schools {
                let result = if best_effort {
                    let control = match settings.deadline {
                        Some(timeout) => RunControl::new().with_timeout(timeout),
                        None => RunControl::new(),
                    };
                    let report = aggregator
                        .aggregate_best_effort(&school, &control)
                        .await
                        .with_context(|| format!("Failed to aggregate school '{school}'"))?;
                    failed_rows += log_failures(&report);
                    report.result
                } else {
                    aggregator
                        .aggregate(&school)
                        .await
                        .with_context(|| format!("Failed to aggregate school '{school}'"))?
                };
                results.push((school, result));
            }

            let json = serde_json::to_string_pretty(&SchoolResults(results))
                .context("Failed to serialize aggregate output")?;
            match output {
                Some(path) => fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => println!("{json}"),
            }

            let metrics = aggregator.metrics_snapshot();
            tracing::info!(
                faculty = metrics.faculty_enriched,
                projects = metrics.projects_attached,
                failures = metrics.failures,
                "Aggregation finished"
            );
            if failed_rows > 0 {
                bail!("{failed_rows} faculty rows could not be enriched");
            }
        }
        Command::Search {
            query,
            top_k,
            school,
            department,
            activity_code,
            agency,
        } => {
            let service = EmbeddingService::connect(&config)
                .await
                .context("Failed to initialize embedding service")?;
            let filter = FacultyFilter {
                school,
                department,
                activity_code,
                agency_ic_admin: agency,
            };
            let hits = service
                .search_similar(&query, top_k, &filter)
                .await
                .context("Faculty search failed")?;
            println!(
                "{}",
                serde_json::to_string_pretty(&hits).context("Failed to serialize hits")?
            );
        }
    }

    Ok(())
}

fn log_failures(report: &AggregateReport) -> usize {
    for failure in &report.failures {
        tracing::warn!(
            school = %report.school,
            department = %failure.department,
            position = failure.position,
            faculty = %failure.faculty_name,
            error = %failure.error,
            "Faculty row skipped"
        );
    }
    report.failures.len()
}
