//! Sentence embedding backends
//!
//! The [`Embedder`] trait is the seam between request handling and the model
//! runtime; the production implementation runs a fastembed ONNX model on CPU.

use std::path::PathBuf;

use fastembed::{
    EmbeddingModel, InitOptions, InitOptionsUserDefined, Pooling, TextEmbedding, TokenizerFiles,
    UserDefinedEmbeddingModel,
};
use hf_hub::{api::sync::ApiBuilder, Repo, RepoType};

use crate::error::{AppError, AppResult};

/// Turns text into fixed-length vectors
///
/// Implementations are blocking; callers on the async runtime should go
/// through `tokio::task::spawn_blocking`.
#[cfg_attr(test, mockall::automock)]
pub trait Embedder: Send + Sync {
    /// Embed a single query string
    fn embed(&self, text: &str) -> AppResult<Vec<f32>>;

    /// Length of the vectors returned by [`Embedder::embed`]
    fn dimension(&self) -> usize;

    /// Model identifier for logging and the catalog summary
    fn model_name(&self) -> &str;
}

/// Where a named model's weights come from
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// A model fastembed ships a definition for
    Builtin(EmbeddingModel),
    /// A sentence-transformers ONNX export on the Hugging Face hub
    HubOnnx { repo: &'static str, pooling: Pooling },
}

/// ONNX graph path inside sentence-transformers hub repos
const HUB_ONNX_FILE: &str = "onnx/model.onnx";

/// Resolves a sentence-transformers style model name
pub fn resolve_model(name: &str) -> AppResult<ModelSource> {
    let source = match name.to_lowercase().trim_start_matches("sentence-transformers/") {
        "all-mpnet-base-v2" => ModelSource::HubOnnx {
            repo: "sentence-transformers/all-mpnet-base-v2",
            pooling: Pooling::Mean,
        },
        "all-minilm-l6-v2" => ModelSource::Builtin(EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" => ModelSource::Builtin(EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => ModelSource::Builtin(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => ModelSource::Builtin(EmbeddingModel::BGEBaseENV15),
        other => {
            return Err(AppError::Embedding(format!(
                "Unsupported embedding model: {}",
                other
            )))
        }
    };
    Ok(source)
}

/// Downloads an ONNX export and its tokenizer files from the hub
fn load_hub_model(
    repo: &str,
    pooling: Pooling,
    cache_dir: Option<PathBuf>,
) -> AppResult<UserDefinedEmbeddingModel> {
    let mut builder = ApiBuilder::new().with_progress(false);
    if let Some(dir) = cache_dir {
        builder = builder.with_cache_dir(dir);
    }
    let api = builder
        .build()
        .map_err(|e| AppError::Embedding(format!("Failed to reach model hub: {}", e)))?
        .repo(Repo::new(repo.to_string(), RepoType::Model));

    let fetch = |file: &str| -> AppResult<Vec<u8>> {
        let path = api
            .get(file)
            .map_err(|e| AppError::Embedding(format!("Failed to fetch {}/{}: {}", repo, file, e)))?;
        Ok(std::fs::read(path)?)
    };

    let tokenizer_files = TokenizerFiles {
        tokenizer_file: fetch("tokenizer.json")?,
        config_file: fetch("config.json")?,
        special_tokens_map_file: fetch("special_tokens_map.json")?,
        tokenizer_config_file: fetch("tokenizer_config.json")?,
    };

    Ok(UserDefinedEmbeddingModel::new(fetch(HUB_ONNX_FILE)?, tokenizer_files).with_pooling(pooling))
}

/// fastembed-backed [`Embedder`]
pub struct FastEmbedder {
    model: TextEmbedding,
    model_name: String,
    dimension: usize,
}

impl FastEmbedder {
    /// Loads (downloading on first use) the named model
    ///
    /// Runs one probe embedding to learn the output dimension, which also
    /// warms up the ONNX session before the first request.
    pub fn new(
        model_name: &str,
        max_seq_length: usize,
        cache_dir: Option<PathBuf>,
    ) -> AppResult<Self> {
        let model = match resolve_model(model_name)? {
            ModelSource::Builtin(builtin) => {
                let mut options = InitOptions::new(builtin)
                    .with_max_length(max_seq_length)
                    .with_show_download_progress(false);
                if let Some(dir) = cache_dir {
                    options = options.with_cache_dir(dir);
                }
                TextEmbedding::try_new(options)
            }
            ModelSource::HubOnnx { repo, pooling } => {
                let user_defined = load_hub_model(repo, pooling, cache_dir)?;
                TextEmbedding::try_new_from_user_defined(
                    user_defined,
                    InitOptionsUserDefined::new().with_max_length(max_seq_length),
                )
            }
        }
        .map_err(|e| AppError::Embedding(format!("Failed to load {}: {}", model_name, e)))?;

        let dimension = model
            .embed(vec!["warm up"], None)
            .map_err(|e| AppError::Embedding(e.to_string()))?
            .first()
            .map(Vec::len)
            .ok_or_else(|| AppError::Embedding("Model returned no embedding".to_string()))?;

        tracing::info!(model = model_name, dimension, max_seq_length, "Loaded embedding model");

        Ok(Self {
            model,
            model_name: model_name.to_string(),
            dimension,
        })
    }
}

impl Embedder for FastEmbedder {
    fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        self.model
            .embed(vec![text], None)
            .map_err(|e| AppError::Embedding(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Embedding("Model returned no embedding".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
