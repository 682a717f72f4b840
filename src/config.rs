use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Sentence-embedding model used for queries
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Maximum number of tokens fed to the model per query
    #[serde(default = "default_max_seq_length")]
    pub max_seq_length: usize,

    /// Where model weights are downloaded to, fastembed's default when unset
    #[serde(default)]
    pub model_cache_dir: Option<String>,

    /// Movie metadata CSV, either a local path or an http(s) URL
    #[serde(default = "default_catalog_csv")]
    pub catalog_csv: String,

    /// Precomputed catalog embeddings (.safetensors or .pt)
    #[serde(default = "default_embeddings_path")]
    pub embeddings_path: String,

    /// Tensor name inside the embeddings file
    #[serde(default)]
    pub embeddings_key: Option<String>,

    /// Replace everything outside `[a-z#]` with spaces before embedding
    #[serde(default)]
    pub strip_non_alpha: bool,

    /// tracing filter directive used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_model_name() -> String {
    "all-mpnet-base-v2".to_string()
}

fn default_max_seq_length() -> usize {
    384
}

fn default_catalog_csv() -> String {
    "./Overall Movie.csv".to_string()
}

fn default_embeddings_path() -> String {
    "./Overall Movies.safetensors".to_string()
}

fn default_log_level() -> String {
    "moodflix=info,tower_http=info".to_string()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Socket address the server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
