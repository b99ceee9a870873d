//! Semantic search, suggestion, and recommendation types.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::entity::{EntityType, parse_entity_filter};
use crate::error::ValidationError;
use crate::metadata::Metadata;

/// Maximum length of a search query, in characters.
pub const MAX_QUERY_CHARS: usize = 500;

/// Kind of search to perform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    Text,
    Image,
    Hybrid,
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchType::Text => write!(f, "text"),
            SearchType::Image => write!(f, "image"),
            SearchType::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl FromStr for SearchType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(SearchType::Text),
            "image" => Ok(SearchType::Image),
            "hybrid" => Ok(SearchType::Hybrid),
            other => Err(ValidationError::UnknownSearchType(other.to_string())),
        }
    }
}

/// Request for a semantic search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticSearchRequest {
    pub query: String,
    /// Entity type tags; `"all"` (the default) disables filtering.
    #[serde(default = "default_entity_types")]
    pub entity_types: Vec<String>,
    #[serde(default)]
    pub search_type: SearchType,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Base64-encoded image for image search.
    #[serde(default)]
    pub image_base64: Option<String>,
}

fn default_entity_types() -> Vec<String> {
    vec!["all".to_string()]
}

fn default_top_k() -> usize {
    10
}

fn default_min_score() -> f32 {
    0.5
}

impl SemanticSearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            entity_types: default_entity_types(),
            search_type: SearchType::default(),
            top_k: default_top_k(),
            min_score: default_min_score(),
            user_id: None,
            image_base64: None,
        }
    }

    /// Validate ranges and return the parsed entity type filter.
    pub fn validate(&self) -> Result<Option<Vec<EntityType>>, ValidationError> {
        if self.query.trim().is_empty() {
            return Err(ValidationError::Empty("query"));
        }
        let chars = self.query.chars().count();
        if chars > MAX_QUERY_CHARS {
            return Err(ValidationError::out_of_range(
                "query",
                format!("must be at most {MAX_QUERY_CHARS} characters, got {chars}"),
            ));
        }
        if !(1..=50).contains(&self.top_k) {
            return Err(ValidationError::out_of_range(
                "top_k",
                format!("must be between 1 and 50, got {}", self.top_k),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(ValidationError::out_of_range(
                "min_score",
                format!("must be between 0 and 1, got {}", self.min_score),
            ));
        }
        parse_entity_filter(&self.entity_types)
    }
}

/// A single search hit shaped for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticSearchResult {
    pub id: i64,
    pub entity_type: EntityType,
    pub title: String,
    pub description: Option<String>,
    pub score: f32,
    pub metadata: Metadata,
    pub image_url: Option<String>,
    pub location: Option<String>,
}

/// Outcome of a semantic search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticSearchResponse {
    pub success: bool,
    pub query: String,
    pub results: Vec<SemanticSearchResult>,
    pub total_count: usize,
    pub search_time_ms: f64,
    pub search_type: SearchType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A search-as-you-type suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub score: f32,
}

/// An entity similar to a given source entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarItem {
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub name: String,
    pub similarity_score: f32,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Why an entity was recommended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationReason {
    Preferences,
    Popular,
}

impl fmt::Display for RecommendationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendationReason::Preferences => write!(f, "Based on your preferences"),
            RecommendationReason::Popular => write!(f, "Popular destination"),
        }
    }
}

/// A personalized recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub name: String,
    pub reason: RecommendationReason,
    pub score: f32,
    pub description: Option<String>,
    pub image_url: Option<String>,
}
