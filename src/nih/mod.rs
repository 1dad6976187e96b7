//! NIH RePORTER client providing grant-project metadata for investigators.
//!
//! Searches are restricted to the configured organizations and fiscal years. Results
//! are paged with `offset`/`limit` until the reported total has been collected or a
//! page comes back empty.

mod types;

use crate::config::NihConfig;
use crate::sources::{ProjectLookupError, ProjectMetadataSource, ProjectRow};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use types::{PiName, SearchCriteria, SearchRequest, SearchResponse};

/// RePORTER hard limit on `offset + limit`.
const MAX_RESULT_WINDOW: usize = 15_000;

/// HTTP client for the RePORTER `projects/search` endpoint.
pub struct NihReporterClient {
    client: Client,
    endpoint: String,
    org_names: Vec<String>,
    fiscal_years: Vec<i32>,
    page_size: usize,
}

impl NihReporterClient {
    /// Build a client from the NIH section of the configuration.
    pub fn new(config: &NihConfig) -> Result<Self, ProjectLookupError> {
        let client = Client::builder()
            .user_agent("faculty-aggregator/0.1")
            .timeout(Duration::from_secs(60))
            .build()?;
        tracing::debug!(
            endpoint = %config.reporter_url,
            orgs = config.org_names.len(),
            fiscal_years = ?config.fiscal_years,
            "Initialized NIH RePORTER client"
        );

        Ok(Self {
            client,
            endpoint: config.reporter_url.clone(),
            org_names: config.org_names.clone(),
            fiscal_years: config.fiscal_years.clone(),
            page_size: config.page_size.clamp(1, 500),
        })
    }

    async fn fetch_page(
        &self,
        first_name: &str,
        last_name: &str,
        offset: usize,
    ) -> Result<SearchResponse, ProjectLookupError> {
        let request = SearchRequest {
            criteria: SearchCriteria {
                use_relevance: true,
                fiscal_years: &self.fiscal_years,
                include_active_projects: true,
                pi_names: [PiName {
                    first_name,
                    last_name,
                }],
                org_names: &self.org_names,
            },
            offset,
            limit: self.page_size,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = ProjectLookupError::UnexpectedStatus { status, body };
            tracing::error!(first_name, last_name, offset, error = %error, "RePORTER search failed");
            return Err(error);
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ProjectMetadataSource for NihReporterClient {
    async fn compile_project_metadata(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Vec<ProjectRow>, ProjectLookupError> {
        let mut rows = Vec::new();
        let mut offset = 0usize;

        loop {
            let page = self.fetch_page(first_name, last_name, offset).await?;
            let fetched = page.results.len();
            rows.extend(page.results.into_iter().map(|project| project.into_row()));
            offset += fetched;

            if fetched == 0 || offset >= page.meta.total {
                break;
            }
            if offset + self.page_size > MAX_RESULT_WINDOW {
                tracing::warn!(
                    first_name,
                    last_name,
                    total = page.meta.total,
                    collected = rows.len(),
                    "RePORTER result window exhausted; truncating"
                );
                break;
            }
        }

        tracing::debug!(first_name, last_name, projects = rows.len(), "Compiled project metadata");
        Ok(rows)
    }
}
