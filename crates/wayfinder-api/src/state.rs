//! Application state wiring all services together.
//!
//! Services in `wayfinder-core` are generic over persistence and record
//! store traits; AppState pins them to the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use wayfinder_core::embedding::box_embedder::{BoxImageEmbedder, BoxTextEmbedder};
use wayfinder_core::embedding::generator::{EmbeddingGenerator, GeneratorSettings};
use wayfinder_core::index::store::{IndexDimensions, LoadOutcome, VectorStore};
use wayfinder_core::indexer::startup::{IndexerSettings, StartupIndexer};
use wayfinder_core::llm::box_provider::BoxLlmProvider;
use wayfinder_core::memory::store::{DurableTables, MemoryStore};
use wayfinder_core::rag::orchestrator::RagOrchestrator;
use wayfinder_core::records::box_store::BoxRecordStore;
use wayfinder_core::records::store::RecordStore;
use wayfinder_core::search::service::SearchService;
use wayfinder_infra::config::{index_dir, load_app_config, resolve_data_dir, sqlite_path};
use wayfinder_infra::embedding::clip::{CLIP_DIMENSION, ClipImageEmbedder};
use wayfinder_infra::embedding::openai::OpenAiEmbedder;
use wayfinder_infra::index::FileIndexPersistence;
use wayfinder_infra::llm::openai_compat::OpenAiCompatibleProvider;
use wayfinder_infra::records::open_record_store;
use wayfinder_infra::secret::Secrets;
use wayfinder_types::config::AppConfig;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type Records = Arc<BoxRecordStore>;
pub type ConcreteVectorStore = VectorStore<FileIndexPersistence>;
pub type ConcreteMemoryStore = MemoryStore<Records>;
pub type ConcreteSearchService = SearchService<FileIndexPersistence, Records>;
pub type ConcreteRagOrchestrator = RagOrchestrator<FileIndexPersistence, Records>;
pub type ConcreteIndexer = StartupIndexer<FileIndexPersistence, Records>;

pub struct AppState {
    pub config: AppConfig,
    pub data_dir: PathBuf,
    pub index: Arc<ConcreteVectorStore>,
    pub embeddings: Arc<EmbeddingGenerator>,
    pub memory: Arc<ConcreteMemoryStore>,
    pub search: ConcreteSearchService,
    pub rag: ConcreteRagOrchestrator,
    pub indexer: ConcreteIndexer,
    /// Name of the active record backend, if any.
    pub record_backend: Option<String>,
}

impl AppState {
    /// Initialize the application state: load config, open stores, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_app_config(&data_dir).await;
        let secrets = Secrets::from_env();

        let embeddings = Arc::new(build_embeddings(&config, &data_dir, &secrets)?);

        let image_dimension = if config.embedding.image_enabled {
            CLIP_DIMENSION
        } else {
            config.embedding.image_dimension
        };
        let index = Arc::new(VectorStore::new(
            FileIndexPersistence::new(index_dir(&config, &data_dir)),
            IndexDimensions {
                text: config.embedding.dimension,
                image: image_dimension,
            },
            config.index.overfetch_factor,
        ));
        for (modality, outcome) in index.load().await {
            match outcome {
                LoadOutcome::Loaded(count) => info!(%modality, count, "Index loaded"),
                LoadOutcome::Missing => info!(%modality, "No saved index, starting empty"),
                LoadOutcome::Discarded(reason) => {
                    warn!(%modality, %reason, "Saved index discarded, starting empty");
                }
            }
        }

        let records: Option<Records> = open_record_store(
            &config.records,
            &sqlite_path(&config, &data_dir),
            secrets.nocodb_api_token.as_ref(),
        )
        .await?
        .map(Arc::new);
        let record_backend = records.as_ref().map(|r| r.name().to_string());

        let memory = Arc::new(match &records {
            Some(store) => MemoryStore::durable(
                Arc::clone(store),
                DurableTables {
                    user_memories: config.records.user_memories_table().map(str::to_string),
                    conversations: config.records.conversations_table().map(str::to_string),
                },
                &config.memory,
            ),
            None => MemoryStore::volatile(&config.memory),
        });

        let llm = match &secrets.openai_api_key {
            Some(key) => Some(BoxLlmProvider::new(OpenAiCompatibleProvider::from_config(
                &config.generation,
                key,
            ))),
            None => {
                warn!("OPENAI_API_KEY is not set; chat answers are unavailable");
                None
            }
        };

        let search = SearchService::new(
            Arc::clone(&index),
            Arc::clone(&embeddings),
            Arc::clone(&memory),
            config.search.clone(),
        );
        let rag = RagOrchestrator::new(
            Arc::clone(&index),
            Arc::clone(&embeddings),
            Arc::clone(&memory),
            llm,
            config.generation.clone(),
            config.rag.clone(),
        );
        let indexer = StartupIndexer::new(
            Arc::clone(&index),
            Arc::clone(&embeddings),
            records,
            IndexerSettings::from_config(&config.records),
        );

        Ok(Self {
            config,
            data_dir,
            index,
            embeddings,
            memory,
            search,
            rag,
            indexer,
            record_backend,
        })
    }
}

fn build_embeddings(
    config: &AppConfig,
    data_dir: &std::path::Path,
    secrets: &Secrets,
) -> anyhow::Result<EmbeddingGenerator> {
    let text = match &secrets.openai_api_key {
        Some(key) => Some(BoxTextEmbedder::new(OpenAiEmbedder::new(
            &config.embedding,
            key.clone(),
        )?)),
        None => {
            warn!("OPENAI_API_KEY is not set; text embeddings are unavailable");
            None
        }
    };

    let image = if config.embedding.image_enabled {
        if config.embedding.image_dimension != CLIP_DIMENSION {
            warn!(
                configured = config.embedding.image_dimension,
                actual = CLIP_DIMENSION,
                "Configured image dimension ignored for CLIP"
            );
        }
        let cache_dir = config
            .embedding
            .image_model_cache_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("models"));
        Some(BoxImageEmbedder::new(ClipImageEmbedder::new(cache_dir)))
    } else {
        None
    };

    Ok(EmbeddingGenerator::new(
        text,
        image,
        GeneratorSettings::from_config(&config.embedding),
    ))
}
