//! Embedding service: faculty document → vector → Qdrant point.

use super::{EmbeddingClient, Preprocessor, build_embedding_client};
use crate::config::Config;
use crate::models::{EmbeddingId, Faculty, Project};
use crate::qdrant::{
    FacultyFilter, QdrantService, build_faculty_filter, build_faculty_payload,
    compute_document_hash,
};
use crate::sources::{EmbeddingError, FacultyEmbedder};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Similarity search hit.
#[derive(Debug, Clone, Serialize)]
pub struct FacultyHit {
    /// Handle of the matching faculty vector.
    pub embedding_id: EmbeddingId,
    /// Similarity score reported by Qdrant (lower is closer).
    pub score: f32,
    /// Stored faculty name, if present.
    pub name: Option<String>,
    /// Stored school, if present.
    pub school: Option<String>,
    /// Stored department, if present.
    pub department: Option<String>,
}

/// Computes faculty embeddings and stores them in a Qdrant collection.
///
/// Handles are sequential point ids. The counter starts at the collection's point
/// count so that ids keep growing across runs against the same collection.
pub struct EmbeddingService {
    client: Box<dyn EmbeddingClient + Send + Sync>,
    preprocessor: Preprocessor,
    store: QdrantService,
    collection: String,
    dimension: usize,
    next_id: AtomicU64,
}

impl EmbeddingService {
    /// Build the service from configuration, ensuring the collection exists.
    pub async fn connect(config: &Config) -> Result<Self, EmbeddingError> {
        tracing::info!("Initializing embedding client");
        let client = build_embedding_client(&config.embedding)?;
        let preprocessor = Preprocessor::new(&config.embedding.model, config.embedding.max_tokens);
        let store = QdrantService::new(&config.qdrant)?;
        Self::with_components(
            client,
            preprocessor,
            store,
            &config.qdrant.collection_name,
            config.embedding.dimension,
        )
        .await
    }

    /// Assemble the service from explicit parts.
    pub async fn with_components(
        client: Box<dyn EmbeddingClient + Send + Sync>,
        preprocessor: Preprocessor,
        store: QdrantService,
        collection: &str,
        dimension: usize,
    ) -> Result<Self, EmbeddingError> {
        store
            .create_collection_if_not_exists(collection, dimension as u64)
            .await?;
        store.ensure_payload_indexes(collection).await?;
        let existing = store.count_points(collection).await?;
        tracing::debug!(collection, dimension, existing, "Faculty collection ready");

        Ok(Self {
            client,
            preprocessor,
            store,
            collection: collection.to_string(),
            dimension,
            next_id: AtomicU64::new(existing),
        })
    }

    /// Embed `query` and return the `top_k` closest faculty vectors matching `filter`.
    pub async fn search_similar(
        &self,
        query: &str,
        top_k: usize,
        filter: &FacultyFilter,
    ) -> Result<Vec<FacultyHit>, EmbeddingError> {
        let vector = self.embed(query.to_string()).await?;
        let filter_value = build_faculty_filter(filter);
        tracing::info!(
            top_k,
            filtered = filter_value.is_some(),
            "Searching faculty embeddings"
        );

        let points = self
            .store
            .search_points(&self.collection, vector, filter_value, top_k.max(1))
            .await?;

        Ok(points
            .into_iter()
            .filter_map(|point| {
                let id = point.id?;
                let field = |key: &str| {
                    point
                        .payload
                        .as_ref()
                        .and_then(|payload| payload.get(key))
                        .and_then(|value| value.as_str())
                        .map(str::to_string)
                };
                Some(FacultyHit {
                    embedding_id: EmbeddingId(id),
                    score: point.score,
                    name: field("name"),
                    school: field("school"),
                    department: field("department"),
                })
            })
            .collect())
    }

    async fn embed(&self, text: String) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.client.generate_embeddings(vec![text]).await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| EmbeddingError::Upstream("provider returned no vectors".into()))?;
        if vector.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }
}

#[async_trait]
impl FacultyEmbedder for EmbeddingService {
    async fn generate_and_store_embedding(
        &self,
        faculty: &Faculty,
        projects: &[Project],
    ) -> Result<EmbeddingId, EmbeddingError> {
        let document = self.preprocessor.faculty_document(faculty, projects);
        let document_hash = compute_document_hash(&document);
        let vector = self.embed(document).await?;

        let id = EmbeddingId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let payload = build_faculty_payload(faculty, projects, &document_hash);
        self.store
            .upsert_point(&self.collection, id.get(), vector, payload)
            .await?;

        tracing::debug!(faculty = %faculty.name, embedding_id = %id, "Stored faculty embedding");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QdrantConfig;
    use crate::embedding::HashingClient;
    use httpmock::{Method::GET, Method::POST, Method::PUT, MockServer};
    use serde_json::json;

    async fn mock_existing_collection(server: &MockServer, count: u64) {
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/faculty");
                then.status(200)
                    .json_body(json!({ "status": "ok", "time": 0.0, "result": {} }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/faculty/index");
                then.status(200)
                    .json_body(json!({ "status": "ok", "time": 0.0, "result": {} }));
            })
            .await;
        server
            .mock_async(move |when, then| {
                when.method(POST).path("/collections/faculty/points/count");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": { "count": count }
                }));
            })
            .await;
    }

    async fn service(server: &MockServer, dimension: usize) -> EmbeddingService {
        let store = QdrantService::new(&QdrantConfig {
            url: server.base_url(),
            collection_name: "faculty".into(),
            api_key: None,
        })
        .expect("store");
        EmbeddingService::with_components(
            Box::new(HashingClient::new(dimension)),
            Preprocessor::whitespace(512),
            store,
            "faculty",
            dimension,
        )
        .await
        .expect("service")
    }

    fn faculty() -> Faculty {
        Faculty {
            name: "Jane Doe".into(),
            school: "SEAS".into(),
            department: "Biomedical Engineering".into(),
            about: "Tissue mechanics".into(),
            email: String::new(),
            profile_url: String::new(),
            projects: Vec::new(),
            embedding_id: None,
        }
    }

    #[tokio::test]
    async fn handles_continue_from_existing_point_count() {
        let server = MockServer::start_async().await;
        mock_existing_collection(&server, 41).await;
        let upsert = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/faculty/points")
                    .json_body_partial(
                        r#"{ "points": [ { "id": 41, "payload": { "name": "Jane Doe", "school": "SEAS" } } ] }"#,
                    );
                then.status(200)
                    .json_body(json!({ "status": "ok", "time": 0.0, "result": {} }));
            })
            .await;

        let service = service(&server, 4).await;
        let id = service
            .generate_and_store_embedding(&faculty(), &[])
            .await
            .expect("embedding");

        upsert.assert();
        assert_eq!(id, EmbeddingId(41));
    }

    #[tokio::test]
    async fn store_failure_is_an_embedding_error() {
        let server = MockServer::start_async().await;
        mock_existing_collection(&server, 0).await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/faculty/points");
                then.status(503).body("unavailable");
            })
            .await;

        let service = service(&server, 4).await;
        let error = service
            .generate_and_store_embedding(&faculty(), &[])
            .await
            .expect_err("failure");
        assert!(matches!(error, EmbeddingError::Store(_)));
    }

    #[tokio::test]
    async fn search_maps_payload_fields() {
        let server = MockServer::start_async().await;
        mock_existing_collection(&server, 3).await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/faculty/points/query");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": {
                        "points": [
                            {
                                "id": 2,
                                "score": 0.5,
                                "payload": { "name": "Jane Doe", "department": "Biomedical Engineering" }
                            }
                        ]
                    }
                }));
            })
            .await;

        let service = service(&server, 4).await;
        let hits = service
            .search_similar("cartilage", 5, &FacultyFilter::default())
            .await
            .expect("hits");

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].embedding_id, EmbeddingId(2));
        assert_eq!(hits[0].name.as_deref(), Some("Jane Doe"));
        assert_eq!(hits[0].department.as_deref(), Some("Biomedical Engineering"));
    }
}
