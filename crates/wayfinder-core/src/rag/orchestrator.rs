//! RAG chat orchestration.
//!
//! One request walks the stages
//! `Embedding -> Retrieving -> Composing -> Generating -> Persisting -> Done`.
//! An unavailable query embedding skips retrieval and continues with an empty
//! context; a generation failure ends the request with a fixed apology. The
//! caller always receives a [`RagChatResponse`] for a validated request.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;
use wayfinder_types::chat::{
    ChatSource, ConversationRole, RagChatRequest, RagChatResponse, SuggestedAction,
};
use wayfinder_types::config::{GenerationConfig, RagConfig};
use wayfinder_types::entity::Modality;
use wayfinder_types::error::ValidationError;
use wayfinder_types::index::SearchResult;
use wayfinder_types::llm::{CompletionRequest, CompletionResponse, Finish, LlmError, Message};

use super::prompt::{SOURCE_SNIPPET_CHARS, build_context, result_content, result_title, system_prompt};
use crate::embedding::generator::EmbeddingGenerator;
use crate::index::persistence::IndexPersistence;
use crate::index::store::VectorStore;
use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::provider::LlmProvider;
use crate::memory::store::MemoryStore;
use crate::records::store::RecordStore;
use crate::text::truncate_chars;

/// Reply used when no generative model is configured.
pub const UNAVAILABLE_MESSAGE: &str = "AI service not available";

/// Reply used when generation fails.
pub const APOLOGY_MESSAGE: &str = "Sorry, I encountered an error processing your request.";

/// Suggested actions are derived from at most this many sources.
const MAX_SUGGESTED_ACTIONS: usize = 3;

/// Processing stage of a chat request, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RagStage {
    Embedding,
    Retrieving,
    Composing,
    Generating,
    Persisting,
    Done,
    Degraded,
}

impl fmt::Display for RagStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RagStage::Embedding => "embedding",
            RagStage::Retrieving => "retrieving",
            RagStage::Composing => "composing",
            RagStage::Generating => "generating",
            RagStage::Persisting => "persisting",
            RagStage::Done => "done",
            RagStage::Degraded => "degraded",
        };
        f.write_str(name)
    }
}

/// Retrieved context for one request.
struct Retrieval {
    results: Vec<SearchResult>,
    degraded: bool,
}

pub struct RagOrchestrator<P: IndexPersistence, R: RecordStore> {
    index: Arc<VectorStore<P>>,
    embeddings: Arc<EmbeddingGenerator>,
    memory: Arc<MemoryStore<R>>,
    llm: Option<BoxLlmProvider>,
    generation: GenerationConfig,
    rag: RagConfig,
}

impl<P: IndexPersistence, R: RecordStore> RagOrchestrator<P, R> {
    pub fn new(
        index: Arc<VectorStore<P>>,
        embeddings: Arc<EmbeddingGenerator>,
        memory: Arc<MemoryStore<R>>,
        llm: Option<BoxLlmProvider>,
        generation: GenerationConfig,
        rag: RagConfig,
    ) -> Self {
        Self {
            index,
            embeddings,
            memory,
            llm,
            generation,
            rag,
        }
    }

    pub fn llm_available(&self) -> bool {
        self.llm.is_some()
    }

    /// Answer a chat message grounded in the index and the user's memory.
    ///
    /// Returns `Err` only when the request itself is invalid.
    pub async fn chat(&self, request: RagChatRequest) -> Result<RagChatResponse, ValidationError> {
        request.validate()?;
        let started = Instant::now();
        let session_id = request
            .session_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::now_v7().to_string());

        let Some(llm) = &self.llm else {
            warn!(%session_id, "Chat requested but no generative model is configured");
            return Ok(RagChatResponse {
                success: false,
                message: UNAVAILABLE_MESSAGE.to_string(),
                sources: Vec::new(),
                suggested_actions: Vec::new(),
                session_id,
                tokens_used: 0,
                response_time_ms: elapsed_ms(started),
                degraded_context: false,
                error: Some(LlmError::Unconfigured.to_string()),
            });
        };

        let retrieval = self.retrieve(&request, &session_id).await;

        debug!(stage = %RagStage::Composing, %session_id, "Composing prompt");
        let memories = match request.user_id {
            Some(user_id) => {
                self.memory
                    .get_user_memories(user_id, None, self.rag.memory_limit)
                    .await
            }
            None => Vec::new(),
        };
        let context = build_context(&retrieval.results, &memories);
        let history = self
            .memory
            .get_conversation_history(&session_id, self.rag.history_window)
            .await;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(system_prompt(&context)));
        messages.extend(
            history
                .into_iter()
                .map(|m| Message::new(m.role.into(), m.content)),
        );
        messages.push(Message::user(request.message.clone()));

        let completion = CompletionRequest {
            model: self.generation.model.clone(),
            messages,
            max_tokens: self.generation.max_tokens,
            temperature: self.generation.temperature,
        };

        debug!(stage = %RagStage::Generating, %session_id, "Calling generative model");
        let response = match self.generate(llm, &completion).await {
            Ok(response) => response,
            Err(e) => {
                warn!(stage = %RagStage::Degraded, %session_id, error = %e, "Generation failed");
                return Ok(RagChatResponse {
                    success: false,
                    message: APOLOGY_MESSAGE.to_string(),
                    sources: Vec::new(),
                    suggested_actions: Vec::new(),
                    session_id,
                    tokens_used: 0,
                    response_time_ms: elapsed_ms(started),
                    degraded_context: retrieval.degraded,
                    error: Some(e.to_string()),
                });
            }
        };

        if response.finish == Finish::Truncated {
            warn!(%session_id, max_tokens = completion.max_tokens, "Reply cut off at max_tokens");
        }

        debug!(stage = %RagStage::Persisting, %session_id, "Persisting exchange");
        self.memory
            .store_conversation_message(
                &session_id,
                request.user_id,
                ConversationRole::User,
                &request.message,
            )
            .await;
        self.memory
            .store_conversation_message(
                &session_id,
                request.user_id,
                ConversationRole::Assistant,
                &response.content,
            )
            .await;

        let sources = if request.include_sources {
            retrieval.results.iter().map(to_source).collect()
        } else {
            Vec::new()
        };
        let suggested_actions = retrieval
            .results
            .iter()
            .take(MAX_SUGGESTED_ACTIONS)
            .map(to_action)
            .collect();

        let response_time_ms = elapsed_ms(started);
        info!(
            stage = %RagStage::Done,
            %session_id,
            context_items = retrieval.results.len(),
            tokens = response.usage.total(),
            response_time_ms,
            "Chat answered"
        );

        Ok(RagChatResponse {
            success: true,
            message: response.content,
            sources,
            suggested_actions,
            session_id,
            tokens_used: response.usage.total(),
            response_time_ms,
            degraded_context: retrieval.degraded,
            error: None,
        })
    }

    /// Embed the message and rank the text index against it.
    async fn retrieve(&self, request: &RagChatRequest, session_id: &str) -> Retrieval {
        debug!(stage = %RagStage::Embedding, session_id, "Embedding chat message");
        let Some(query) = self.embeddings.embed_text(&request.message).await else {
            warn!(
                stage = %RagStage::Degraded,
                session_id,
                "Message embedding unavailable, continuing without retrieved context"
            );
            return Retrieval {
                results: Vec::new(),
                degraded: true,
            };
        };

        debug!(stage = %RagStage::Retrieving, session_id, "Searching text index");
        match self.index.search(
            Modality::Text,
            &query,
            request.max_context_items,
            self.rag.context_min_score,
            None,
        ) {
            Ok(results) => Retrieval {
                results,
                degraded: false,
            },
            Err(e) => {
                warn!(session_id, error = %e, "Context search failed, continuing without retrieved context");
                Retrieval {
                    results: Vec::new(),
                    degraded: true,
                }
            }
        }
    }

    async fn generate(
        &self,
        llm: &BoxLlmProvider,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        let span = info_span!(
            "gen_ai.complete",
            gen_ai.system = llm.name(),
            gen_ai.request.model = %request.model,
            gen_ai.request.max_tokens = request.max_tokens,
            gen_ai.request.temperature = request.temperature,
        );
        let timeout_secs = self.generation.request_timeout_secs;
        match tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            llm.complete(request).instrument(span),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(timeout_secs)),
        }
    }

    /// Drop the cached history of a session.
    pub fn clear_session(&self, session_id: &str) -> bool {
        self.memory.clear_session(session_id)
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn to_source(result: &SearchResult) -> ChatSource {
    let content = result_content(result);
    ChatSource {
        entity_id: result.entity_id,
        entity_type: result.entity_type,
        title: result_title(result),
        relevance_score: result.score,
        snippet: (!content.is_empty())
            .then(|| truncate_chars(content, SOURCE_SNIPPET_CHARS).to_string()),
    }
}

fn to_action(result: &SearchResult) -> SuggestedAction {
    SuggestedAction {
        action_type: "navigate".to_string(),
        label: format!("View {}", result_title(result)),
        payload: json!({
            "screen": format!("{}Detail", result.entity_type.title_case()),
            "id": result.entity_id,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::box_embedder::BoxTextEmbedder;
    use crate::embedding::generator::GeneratorSettings;
    use crate::index::store::IndexDimensions;
    use crate::testing::{InMemoryRecordStore, MemoryPersistence, MockLlm, MockTextEmbedder};
    use wayfinder_types::entity::EntityType;
    use wayfinder_types::index::NewEmbedding;
    use wayfinder_types::config::MemoryConfig;
    use wayfinder_types::llm::MessageRole;
    use wayfinder_types::memory::{MemoryType, NewUserMemory};
    use wayfinder_types::metadata::Metadata;

    const DIM: usize = 4;
    const QUESTION: &str = "Where can I swim?";

    type Orchestrator = RagOrchestrator<MemoryPersistence, InMemoryRecordStore>;

    struct Fixture {
        index: Arc<VectorStore<MemoryPersistence>>,
        memory: Arc<MemoryStore<InMemoryRecordStore>>,
    }

    fn fixture() -> Fixture {
        Fixture {
            index: Arc::new(VectorStore::new(
                MemoryPersistence::default(),
                IndexDimensions { text: DIM, image: 2 },
                3,
            )),
            memory: Arc::new(MemoryStore::volatile(&MemoryConfig::default())),
        }
    }

    fn embedder() -> MockTextEmbedder {
        MockTextEmbedder::new(DIM).with_vector(QUESTION, vec![1.0, 0.0, 0.0, 0.0])
    }

    fn orchestrator(fixture: &Fixture, embedder: Option<MockTextEmbedder>, llm: Option<MockLlm>) -> Orchestrator {
        RagOrchestrator::new(
            Arc::clone(&fixture.index),
            Arc::new(EmbeddingGenerator::new(
                embedder.map(BoxTextEmbedder::new),
                None,
                GeneratorSettings::default(),
            )),
            Arc::clone(&fixture.memory),
            llm.map(BoxLlmProvider::new),
            GenerationConfig::default(),
            RagConfig::default(),
        )
    }

    async fn seed(fixture: &Fixture) {
        let records = vec![
            (1, EntityType::Location, "My Khe Beach", "Sandy beach", vec![1.0, 0.1, 0.0, 0.0]),
            (2, EntityType::Festival, "Fireworks Festival", "Night show", vec![0.9, 0.3, 0.0, 0.0]),
            (3, EntityType::Item, "Banh Mi", "Sandwich", vec![0.0, 0.0, 1.0, 0.0]),
        ];
        for (id, ty, title, description, vector) in records {
            let metadata = Metadata::new()
                .with("title", title)
                .unwrap()
                .with("description", description)
                .unwrap();
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
    }

    #[tokio::test]
    async fn test_chat_without_model_is_unavailable() {
        let fixture = fixture();
        let rag = orchestrator(&fixture, Some(embedder()), None);
        let response = rag.chat(RagChatRequest::new(QUESTION)).await.unwrap();
        assert!(!response.success);
        assert_eq!(response.message, UNAVAILABLE_MESSAGE);
        assert_eq!(response.error.as_deref(), Some("generative model not configured"));
        assert!(!response.session_id.is_empty());
    }

    #[tokio::test]
    async fn test_chat_grounds_prompt_and_persists_exchange() {
        let fixture = fixture();
        seed(&fixture).await;
        let llm = MockLlm::ok("Try My Khe Beach.");
        let requests = llm.requests();
        let rag = orchestrator(&fixture, Some(embedder()), Some(llm));

        let mut request = RagChatRequest::new(QUESTION);
        request.session_id = Some("session-1".to_string());
        let response = rag.chat(request).await.unwrap();

        assert!(response.success);
        assert_eq!(response.message, "Try My Khe Beach.");
        assert_eq!(response.session_id, "session-1");
        assert_eq!(response.tokens_used, 50);
        assert!(!response.degraded_context);

        // The item is orthogonal to the query and falls below the threshold.
        let ids: Vec<i64> = response.sources.iter().map(|s| s.entity_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(response.sources[0].snippet.as_deref(), Some("Sandy beach"));
        assert_eq!(response.suggested_actions.len(), 2);
        assert_eq!(response.suggested_actions[0].label, "View My Khe Beach");
        assert_eq!(
            response.suggested_actions[0].payload,
            json!({"screen": "LocationDetail", "id": 1})
        );

        let sent = requests.lock().unwrap();
        let messages = &sent[0].messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert!(messages[0].content.contains("[LOCATION] My Khe Beach:\nSandy beach"));
        assert_eq!(messages[1].content, QUESTION);
        assert_eq!(sent[0].max_tokens, 1000);
        assert_eq!(sent[0].temperature, 0.7);
        drop(sent);

        let history = fixture.memory.get_conversation_history("session-1", 10).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, ConversationRole::User);
        assert_eq!(history[1].content, "Try My Khe Beach.");
    }

    #[tokio::test]
    async fn test_chat_includes_history_and_memories() {
        let fixture = fixture();
        fixture
            .memory
            .store_memory(NewUserMemory::new(5, MemoryType::Preference, "loves quiet beaches"))
            .await
            .unwrap();
        for i in 0..6 {
            fixture
                .memory
                .store_conversation_message("s", Some(5), ConversationRole::User, &format!("old {i}"))
                .await;
        }
        let llm = MockLlm::ok("ok");
        let requests = llm.requests();
        let rag = orchestrator(&fixture, Some(embedder()), Some(llm));

        let mut request = RagChatRequest::new(QUESTION);
        request.session_id = Some("s".to_string());
        request.user_id = Some(5);
        rag.chat(request).await.unwrap();

        let sent = requests.lock().unwrap();
        let messages = &sent[0].messages;
        // system + last 5 history messages + new message
        assert_eq!(messages.len(), 7);
        assert!(messages[0].content.contains("[USER PREFERENCES]\n- loves quiet beaches"));
        assert_eq!(messages[1].content, "old 1");
        assert_eq!(messages[5].content, "old 5");
        assert_eq!(messages[6].content, QUESTION);
    }

    #[tokio::test]
    async fn test_embedding_unavailable_continues_with_empty_context() {
        let fixture = fixture();
        seed(&fixture).await;
        let llm = MockLlm::ok("General advice");
        let requests = llm.requests();
        let rag = orchestrator(&fixture, Some(embedder().failing()), Some(llm));

        let response = rag.chat(RagChatRequest::new(QUESTION)).await.unwrap();
        assert!(response.success);
        assert!(response.degraded_context);
        assert!(response.sources.is_empty());
        assert!(requests.lock().unwrap()[0].messages[0].content.contains("CONTEXT:\n\n\n"));
    }

    #[tokio::test]
    async fn test_generation_failure_returns_apology() {
        let fixture = fixture();
        seed(&fixture).await;
        let rag = orchestrator(&fixture, Some(embedder()), Some(MockLlm::failing()));

        let mut request = RagChatRequest::new(QUESTION);
        request.session_id = Some("s9".to_string());
        let response = rag.chat(request).await.unwrap();
        assert!(!response.success);
        assert_eq!(response.message, APOLOGY_MESSAGE);
        assert!(response.sources.is_empty());
        assert!(response.suggested_actions.is_empty());
        assert!(response.error.is_some());
        assert!(fixture.memory.get_conversation_history("s9", 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_sources_can_be_omitted() {
        let fixture = fixture();
        seed(&fixture).await;
        let rag = orchestrator(&fixture, Some(embedder()), Some(MockLlm::ok("ok")));
        let mut request = RagChatRequest::new(QUESTION);
        request.include_sources = false;
        let response = rag.chat(request).await.unwrap();
        assert!(response.sources.is_empty());
        assert!(!response.suggested_actions.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected() {
        let fixture = fixture();
        let rag = orchestrator(&fixture, Some(embedder()), Some(MockLlm::ok("ok")));
        assert!(rag.chat(RagChatRequest::new("   ")).await.is_err());
    }

    #[tokio::test]
    async fn test_clear_session_drops_history() {
        let fixture = fixture();
        let rag = orchestrator(&fixture, Some(embedder()), Some(MockLlm::ok("ok")));
        let mut request = RagChatRequest::new(QUESTION);
        request.session_id = Some("gone".to_string());
        rag.chat(request).await.unwrap();
        assert!(rag.clear_session("gone"));
        assert!(fixture.memory.get_conversation_history("gone", 10).await.is_empty());
    }
}
