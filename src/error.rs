use hf_hub::api::sync::ApiError;
use thiserror::Error;

/// Main error type for hf-fetch
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to initialize HuggingFace API: {0}")]
    Hub(#[from] ApiError),

    #[error("Failed to download {file}: {source}")]
    Download {
        file: String,
        #[source]
        source: ApiError,
    },

    #[error("Invalid config.json for {model}: {reason}")]
    InvalidConfig { model: String, reason: String },

    #[error("No tokenizer files found in {0}")]
    TokenizerMissing(String),

    #[error("Failed to load tokenizer from {path}: {reason}")]
    Tokenizer { path: String, reason: String },

    #[error("No model weights found in {0} (expected safetensors or pytorch_model.bin)")]
    WeightsMissing(String),

    #[error("Failed to read model weights from {path}: {reason}")]
    Weights { path: String, reason: String },

    #[error("Config error: {0}\n\nTroubleshooting:\n- Fix or remove the config file named above\n- Run with RUST_LOG=debug for more details")]
    Config(String),

    #[error("Failed to scan download directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Wrap a hub client error with the file that was being fetched
    pub fn download(file: impl Into<String>, source: ApiError) -> Self {
        Self::Download {
            file: file.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
