//! Search Service: semantic search, suggestions, similar items, and
//! personalized recommendations over the vector index.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};
use wayfinder_types::config::SearchConfig;
use wayfinder_types::entity::{EntityType, Modality};
use wayfinder_types::error::{SearchError, ValidationError};
use wayfinder_types::index::SearchResult;
use wayfinder_types::search::{
    MAX_QUERY_CHARS, Recommendation, RecommendationReason, SearchType, SemanticSearchRequest,
    SemanticSearchResponse, SemanticSearchResult, SimilarItem, Suggestion,
};

use crate::embedding::generator::EmbeddingGenerator;
use crate::index::persistence::IndexPersistence;
use crate::index::store::VectorStore;
use crate::memory::store::MemoryStore;
use crate::records::store::RecordStore;

/// Memories read when building a preference query.
const RECOMMENDATION_MEMORY_LIMIT: usize = 10;

pub struct SearchService<P: IndexPersistence, R: RecordStore> {
    index: Arc<VectorStore<P>>,
    embeddings: Arc<EmbeddingGenerator>,
    memory: Arc<MemoryStore<R>>,
    config: SearchConfig,
}

impl<P: IndexPersistence, R: RecordStore> SearchService<P, R> {
    pub fn new(
        index: Arc<VectorStore<P>>,
        embeddings: Arc<EmbeddingGenerator>,
        memory: Arc<MemoryStore<R>>,
        config: SearchConfig,
    ) -> Self {
        Self {
            index,
            embeddings,
            memory,
            config,
        }
    }

    /// Rank entities against a text or image query.
    ///
    /// Unavailable embeddings and index failures are reported in the
    /// response; only an invalid request is an `Err`.
    pub async fn semantic_search(
        &self,
        request: &SemanticSearchRequest,
    ) -> Result<SemanticSearchResponse, ValidationError> {
        let filter = request.validate()?;
        let started = Instant::now();

        let image = match (&request.search_type, &request.image_base64) {
            (SearchType::Image, Some(payload)) => Some(decode_image(payload)?),
            _ => None,
        };

        let (modality, query) = match &image {
            Some(bytes) => (Modality::Image, self.embeddings.embed_image(bytes).await),
            None => (Modality::Text, self.embeddings.embed_text(&request.query).await),
        };

        let failure = |error: String| SemanticSearchResponse {
            success: false,
            query: request.query.clone(),
            results: Vec::new(),
            total_count: 0,
            search_time_ms: elapsed_ms(started),
            search_type: request.search_type,
            error: Some(error),
        };

        let Some(query) = query else {
            let error = match modality {
                Modality::Image => "Failed to generate image embedding",
                Modality::Text => "Failed to generate text embedding",
            };
            return Ok(failure(error.to_string()));
        };

        let hits = match self.index.search(
            modality,
            &query,
            request.top_k,
            request.min_score,
            filter.as_deref(),
        ) {
            Ok(hits) => hits,
            Err(e) => {
                warn!(%modality, error = %e, "Semantic search failed");
                return Ok(failure(e.to_string()));
            }
        };

        let results: Vec<SemanticSearchResult> = hits.into_iter().map(to_search_result).collect();
        debug!(%modality, count = results.len(), "Semantic search finished");
        Ok(SemanticSearchResponse {
            success: true,
            query: request.query.clone(),
            total_count: results.len(),
            results,
            search_time_ms: elapsed_ms(started),
            search_type: request.search_type,
            error: None,
        })
    }

    /// Search-as-you-type suggestions for a partial query.
    pub async fn suggestions(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Suggestion>, ValidationError> {
        validate_query(query)?;
        validate_limit("limit", limit, 10)?;

        let Some(vector) = self.embeddings.embed_text(query).await else {
            return Ok(Vec::new());
        };
        let hits = self
            .ranked(&vector, limit, self.config.suggestion_min_score)
            .unwrap_or_default();
        Ok(hits
            .into_iter()
            .map(|hit| Suggestion {
                text: hit.title().unwrap_or_default().to_string(),
                entity_type: hit.entity_type,
                entity_id: hit.entity_id,
                score: hit.score,
            })
            .collect())
    }

    /// Entities whose stored vectors are closest to the given entity's.
    pub fn similar_items(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        limit: usize,
    ) -> Result<Vec<SimilarItem>, SearchError> {
        validate_limit("limit", limit, 20)?;

        let vector = self
            .index
            .vector_for(Modality::Text, entity_type, entity_id)
            .ok_or(SearchError::EntityNotFound {
                entity_type,
                entity_id,
            })?;

        let hits = self.index.search(
            Modality::Text,
            &vector,
            limit + 1,
            self.config.similar_min_score,
            None,
        )?;
        Ok(hits
            .into_iter()
            .filter(|hit| !(hit.entity_type == entity_type && hit.entity_id == entity_id))
            .take(limit)
            .map(|hit| SimilarItem {
                entity_type: hit.entity_type,
                entity_id: hit.entity_id,
                name: display_name(&hit),
                similarity_score: round4(hit.score),
                description: hit.metadata.get_str("description").map(str::to_string),
                image_url: hit.metadata.get_str("image_url").map(str::to_string),
            })
            .collect())
    }

    /// Recommendations from the user's memories, topped up with popular
    /// destinations.
    pub async fn recommendations(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<Recommendation>, ValidationError> {
        validate_limit("limit", limit, 20)?;

        let mut recommendations = Vec::with_capacity(limit);
        let mut seen: HashSet<(EntityType, i64)> = HashSet::new();

        let memories = self
            .memory
            .get_user_memories(user_id, None, RECOMMENDATION_MEMORY_LIMIT)
            .await;
        let preference_query = memories
            .iter()
            .map(|m| m.content.trim())
            .filter(|c| !c.is_empty())
            .take(self.config.preference_memory_count)
            .collect::<Vec<_>>()
            .join(" ");

        if !preference_query.is_empty() {
            if let Some(vector) = self.embeddings.embed_text(&preference_query).await {
                let hits = self
                    .ranked(&vector, limit, self.config.preference_min_score)
                    .unwrap_or_default();
                for hit in hits {
                    if seen.insert((hit.entity_type, hit.entity_id)) {
                        recommendations.push(to_recommendation(hit, RecommendationReason::Preferences));
                    }
                }
            }
        }

        if recommendations.len() < limit {
            let needed = limit - recommendations.len();
            if let Some(vector) = self.embeddings.embed_text(&self.config.fallback_query).await {
                let hits = self
                    .ranked(&vector, needed + seen.len(), self.config.fallback_min_score)
                    .unwrap_or_default();
                for hit in hits {
                    if recommendations.len() >= limit {
                        break;
                    }
                    if seen.insert((hit.entity_type, hit.entity_id)) {
                        recommendations.push(to_recommendation(hit, RecommendationReason::Popular));
                    }
                }
            }
        }

        debug!(user_id, count = recommendations.len(), "Recommendations built");
        Ok(recommendations)
    }

    /// Unfiltered text-index search; failures are logged and yield `None`.
    fn ranked(&self, vector: &[f32], top_k: usize, min_score: f32) -> Option<Vec<SearchResult>> {
        match self
            .index
            .search(Modality::Text, vector, top_k, min_score, None)
        {
            Ok(hits) => Some(hits),
            Err(e) => {
                warn!(error = %e, "Text index search failed");
                None
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Decode a base64 image, accepting an optional data-URL prefix.
fn decode_image(payload: &str) -> Result<Vec<u8>, ValidationError> {
    let encoded = match payload.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    };
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ValidationError::InvalidImage(e.to_string()))?;
    if bytes.is_empty() {
        return Err(ValidationError::InvalidImage("payload is empty".to_string()));
    }
    Ok(bytes)
}

fn validate_query(query: &str) -> Result<(), ValidationError> {
    if query.trim().is_empty() {
        return Err(ValidationError::Empty("query"));
    }
    let chars = query.chars().count();
    if chars > MAX_QUERY_CHARS {
        return Err(ValidationError::out_of_range(
            "query",
            format!("must be at most {MAX_QUERY_CHARS} characters, got {chars}"),
        ));
    }
    Ok(())
}

fn validate_limit(field: &'static str, limit: usize, max: usize) -> Result<(), ValidationError> {
    if !(1..=max).contains(&limit) {
        return Err(ValidationError::out_of_range(
            field,
            format!("must be between 1 and {max}, got {limit}"),
        ));
    }
    Ok(())
}

fn round4(score: f32) -> f32 {
    (score * 10_000.0).round() / 10_000.0
}

fn display_name(hit: &SearchResult) -> String {
    match hit.title() {
        Some(title) if !title.trim().is_empty() => title.to_string(),
        _ => format!("{} #{}", hit.entity_type, hit.entity_id),
    }
}

fn to_search_result(hit: SearchResult) -> SemanticSearchResult {
    let title = match hit.title() {
        Some(title) if !title.trim().is_empty() => title.to_string(),
        _ => format!("Entity {}", hit.entity_id),
    };
    SemanticSearchResult {
        id: hit.entity_id,
        entity_type: hit.entity_type,
        title,
        description: hit.metadata.get_str("description").map(str::to_string),
        score: hit.score,
        image_url: hit.metadata.get_str("image_url").map(str::to_string),
        location: hit.metadata.get_str("address").map(str::to_string),
        metadata: hit.metadata,
    }
}

fn to_recommendation(hit: SearchResult, reason: RecommendationReason) -> Recommendation {
    Recommendation {
        entity_type: hit.entity_type,
        entity_id: hit.entity_id,
        name: display_name(&hit),
        reason,
        score: hit.score,
        description: hit.metadata.get_str("description").map(str::to_string),
        image_url: hit.metadata.get_str("image_url").map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::box_embedder::{BoxImageEmbedder, BoxTextEmbedder};
    use crate::embedding::generator::GeneratorSettings;
    use crate::index::store::IndexDimensions;
    use crate::testing::{
        InMemoryRecordStore, MemoryPersistence, MockImageEmbedder, MockTextEmbedder, hashed_vector,
    };
    use wayfinder_types::config::MemoryConfig;
    use wayfinder_types::index::NewEmbedding;
    use wayfinder_types::memory::{MemoryType, NewUserMemory};
    use wayfinder_types::metadata::Metadata;

    const DIM: usize = 4;
    const IMAGE_DIM: usize = 3;
    const FALLBACK: &str = "popular tourist destination Da Nang Vietnam";

    type Service = SearchService<MemoryPersistence, InMemoryRecordStore>;

    struct Fixture {
        index: Arc<VectorStore<MemoryPersistence>>,
        memory: Arc<MemoryStore<InMemoryRecordStore>>,
    }

    fn fixture() -> Fixture {
        Fixture {
            index: Arc::new(VectorStore::new(
                MemoryPersistence::default(),
                IndexDimensions {
                    text: DIM,
                    image: IMAGE_DIM,
                },
                3,
            )),
            memory: Arc::new(MemoryStore::volatile(&MemoryConfig::default())),
        }
    }

    fn embedder() -> MockTextEmbedder {
        MockTextEmbedder::new(DIM)
            .with_vector("beach", vec![1.0, 0.0, 0.0, 0.0])
            .with_vector("likes the sea", vec![1.0, 0.0, 0.0, 0.0])
            .with_vector(FALLBACK, vec![0.0, 1.0, 0.0, 0.0])
    }

    fn service(fixture: &Fixture, text: Option<MockTextEmbedder>, image: bool) -> Service {
        SearchService::new(
            Arc::clone(&fixture.index),
            Arc::new(EmbeddingGenerator::new(
                text.map(BoxTextEmbedder::new),
                image.then(|| BoxImageEmbedder::new(MockImageEmbedder::new(IMAGE_DIM))),
                GeneratorSettings::default(),
            )),
            Arc::clone(&fixture.memory),
            SearchConfig::default(),
        )
    }

    async fn add(fixture: &Fixture, id: i64, ty: EntityType, title: Option<&str>, vector: Vec<f32>) {
        let mut metadata = Metadata::new();
        if let Some(title) = title {
            metadata.insert("title", title).unwrap();
            metadata.insert("description", format!("About {title}")).unwrap();
        }
        fixture
            .index
            .add(
                Modality::Text,
                NewEmbedding {
                    vector,
                    entity_id: id,
                    entity_type: ty,
                    metadata,
                },
            )
            .await
            .unwrap();
    }

    async fn seed(fixture: &Fixture) {
        add(fixture, 1, EntityType::Location, Some("My Khe Beach"), vec![1.0, 0.05, 0.0, 0.0]).await;
        add(fixture, 2, EntityType::Festival, Some("Beach Fest"), vec![0.95, 0.2, 0.0, 0.0]).await;
        add(fixture, 3, EntityType::Location, None, vec![0.9, 0.3, 0.0, 0.0]).await;
        add(fixture, 4, EntityType::Item, Some("Dragon Bridge"), vec![0.1, 1.0, 0.0, 0.0]).await;
        add(fixture, 5, EntityType::Location, Some("Ba Na Hills"), vec![0.0, 0.9, 0.1, 0.0]).await;
    }

    #[tokio::test]
    async fn test_semantic_search_filters_by_type() {
        let fixture = fixture();
        seed(&fixture).await;
        let service = service(&fixture, Some(embedder()), false);

        let mut request = SemanticSearchRequest::new("beach");
        request.entity_types = vec!["location".to_string()];
        request.top_k = 2;
        let response = service.semantic_search(&request).await.unwrap();

        assert!(response.success);
        let ids: Vec<i64> = response.results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(response.total_count, 2);
        assert_eq!(response.results[0].title, "My Khe Beach");
        assert_eq!(response.results[0].description.as_deref(), Some("About My Khe Beach"));
        assert_eq!(response.results[1].title, "Entity 3");
    }

    #[tokio::test]
    async fn test_semantic_search_without_embedder_degrades() {
        let fixture = fixture();
        seed(&fixture).await;
        let service = service(&fixture, None, false);
        let response = service
            .semantic_search(&SemanticSearchRequest::new("beach"))
            .await
            .unwrap();
        assert!(!response.success);
        assert!(response.results.is_empty());
        assert_eq!(response.error.as_deref(), Some("Failed to generate text embedding"));
    }

    #[tokio::test]
    async fn test_image_search_uses_image_index() {
        let fixture = fixture();
        let image_bytes = b"sunset-photo";
        fixture
            .index
            .add(
                Modality::Image,
                NewEmbedding {
                    vector: hashed_vector(&String::from_utf8_lossy(image_bytes), IMAGE_DIM),
                    entity_id: 10,
                    entity_type: EntityType::Location,
                    metadata: Metadata::new().with("title", "Son Tra").unwrap(),
                },
            )
            .await
            .unwrap();
        let service = service(&fixture, Some(embedder()), true);

        let mut request = SemanticSearchRequest::new("photo");
        request.search_type = SearchType::Image;
        request.image_base64 = Some(format!("data:image/png;base64,{}", STANDARD.encode(image_bytes)));
        let response = service.semantic_search(&request).await.unwrap();
        assert!(response.success);
        assert_eq!(response.results[0].id, 10);
        assert!((response.results[0].score - 1.0).abs() < 1e-5);

        request.image_base64 = Some("%%% not base64".to_string());
        assert!(matches!(
            service.semantic_search(&request).await,
            Err(ValidationError::InvalidImage(_))
        ));
    }

    #[tokio::test]
    async fn test_image_search_without_image_embedder() {
        let fixture = fixture();
        let service = service(&fixture, Some(embedder()), false);
        let mut request = SemanticSearchRequest::new("photo");
        request.search_type = SearchType::Image;
        request.image_base64 = Some(STANDARD.encode(b"img"));
        let response = service.semantic_search(&request).await.unwrap();
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("Failed to generate image embedding"));
    }

    #[tokio::test]
    async fn test_suggestions() {
        let fixture = fixture();
        seed(&fixture).await;
        let service = service(&fixture, Some(embedder()), false);
        let suggestions = service.suggestions("beach", 3).await.unwrap();
        assert_eq!(suggestions.len(), 3);
        assert_eq!(suggestions[0].text, "My Khe Beach");
        assert_eq!(suggestions[2].text, "");
        assert!(service.suggestions("beach", 11).await.is_err());
        assert!(service.suggestions("", 5).await.is_err());
    }

    #[tokio::test]
    async fn test_similar_items_skip_source() {
        let fixture = fixture();
        seed(&fixture).await;
        let service = service(&fixture, Some(embedder()), false);

        let similar = service.similar_items(EntityType::Location, 1, 2).unwrap();
        let ids: Vec<i64> = similar.iter().map(|s| s.entity_id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(similar[1].name, "location #3");
        let score = similar[0].similarity_score;
        assert_eq!(score, (score * 10_000.0).round() / 10_000.0);

        assert!(matches!(
            service.similar_items(EntityType::Festival, 1, 2),
            Err(SearchError::EntityNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_recommendations_prefer_memories_then_fallback() {
        let fixture = fixture();
        seed(&fixture).await;
        fixture
            .memory
            .store_memory(NewUserMemory::new(8, MemoryType::Interest, "likes the sea"))
            .await
            .unwrap();
        let service = service(&fixture, Some(embedder()), false);

        let recommendations = service.recommendations(8, 5).await.unwrap();
        assert_eq!(recommendations.len(), 5);
        let preferred: Vec<i64> = recommendations
            .iter()
            .filter(|r| r.reason == RecommendationReason::Preferences)
            .map(|r| r.entity_id)
            .collect();
        assert_eq!(preferred, vec![1, 2, 3]);
        let popular: Vec<i64> = recommendations
            .iter()
            .filter(|r| r.reason == RecommendationReason::Popular)
            .map(|r| r.entity_id)
            .collect();
        assert_eq!(popular, vec![4, 5]);
    }

    #[tokio::test]
    async fn test_recommendations_without_memories_use_fallback() {
        let fixture = fixture();
        seed(&fixture).await;
        let service = service(&fixture, Some(embedder()), false);
        let recommendations = service.recommendations(99, 2).await.unwrap();
        let ids: Vec<i64> = recommendations.iter().map(|r| r.entity_id).collect();
        assert_eq!(ids, vec![4, 5]);
        assert!(recommendations.iter().all(|r| r.reason == RecommendationReason::Popular));
        assert!(service.recommendations(99, 0).await.is_err());
    }
}
