use crate::error::{FetchError, Result};
use candle_core::DType;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Model configuration file every hub model repo carries
pub const CONFIG_FILE: &str = "config.json";

/// Tokenizer artifacts fetched when present in the repo
pub const TOKENIZER_FILES: &[&str] = &[
    "tokenizer.json",
    "tokenizer_config.json",
    "special_tokens_map.json",
    "added_tokens.json",
    "vocab.json",
    "vocab.txt",
    "merges.txt",
    "tokenizer.model",
];

/// Fast tokenizer definition, loadable with the `tokenizers` crate
pub const TOKENIZER_JSON: &str = "tokenizer.json";

const SAFETENSORS_INDEX: &str = "model.safetensors.index.json";
const SAFETENSORS_SINGLE: &str = "model.safetensors";
const PYTORCH_INDEX: &str = "pytorch_model.bin.index.json";
const PYTORCH_SINGLE: &str = "pytorch_model.bin";

/// The fields of `config.json` hf-fetch cares about
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ModelConfig {
    pub model_type: String,
    #[serde(default)]
    pub architectures: Vec<String>,
    pub torch_dtype: Option<String>,
}

impl ModelConfig {
    /// Parse a downloaded `config.json`
    pub fn from_file(path: &Path, model_id: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content, model_id)
    }

    pub fn from_json(content: &str, model_id: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| FetchError::InvalidConfig {
            model: model_id.to_string(),
            reason: e.to_string(),
        })
    }

    /// Architecture the model would load as, e.g. `Qwen2ForCausalLM`
    #[must_use]
    pub fn architecture(&self) -> &str {
        self.architectures
            .first()
            .map_or(self.model_type.as_str(), String::as_str)
    }

    /// Precision declared by the config, if candle knows it
    #[must_use]
    pub fn declared_dtype(&self) -> Option<DType> {
        self.torch_dtype.as_deref().and_then(parse_torch_dtype)
    }
}

/// Map a `torch_dtype` string to a candle dtype
#[must_use]
pub fn parse_torch_dtype(name: &str) -> Option<DType> {
    let name = name.strip_prefix("torch.").unwrap_or(name);
    match name {
        "float32" | "float" => Some(DType::F32),
        "float16" | "half" => Some(DType::F16),
        "bfloat16" => Some(DType::BF16),
        "float64" | "double" => Some(DType::F64),
        "uint8" => Some(DType::U8),
        "int64" => Some(DType::I64),
        _ => None,
    }
}

/// Checkpoint layout detected from the repo listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightLayout {
    /// Shards listed in `model.safetensors.index.json`
    ShardedSafetensors,
    /// Single `model.safetensors`
    Safetensors,
    /// Shards listed in `pytorch_model.bin.index.json`
    ShardedPytorch,
    /// Single `pytorch_model.bin`
    Pytorch,
}

impl WeightLayout {
    /// Pick the preferred layout from the files in the repo
    #[must_use]
    pub fn detect(siblings: &[String]) -> Option<Self> {
        let has = |name: &str| siblings.iter().any(|s| s == name);

        if has(SAFETENSORS_INDEX) {
            Some(Self::ShardedSafetensors)
        } else if has(SAFETENSORS_SINGLE) {
            Some(Self::Safetensors)
        } else if has(PYTORCH_INDEX) {
            Some(Self::ShardedPytorch)
        } else if has(PYTORCH_SINGLE) {
            Some(Self::Pytorch)
        } else {
            None
        }
    }

    /// Index file for sharded layouts, or the weight file itself
    #[must_use]
    pub const fn entry_file(self) -> &'static str {
        match self {
            Self::ShardedSafetensors => SAFETENSORS_INDEX,
            Self::Safetensors => SAFETENSORS_SINGLE,
            Self::ShardedPytorch => PYTORCH_INDEX,
            Self::Pytorch => PYTORCH_SINGLE,
        }
    }

    #[must_use]
    pub const fn is_sharded(self) -> bool {
        matches!(self, Self::ShardedSafetensors | Self::ShardedPytorch)
    }

    #[must_use]
    pub const fn is_safetensors(self) -> bool {
        matches!(self, Self::ShardedSafetensors | Self::Safetensors)
    }
}

/// Tokenizer artifacts that exist in the repo, in fetch order
#[must_use]
pub fn tokenizer_files(siblings: &[String]) -> Vec<&'static str> {
    TOKENIZER_FILES
        .iter()
        .copied()
        .filter(|name| siblings.iter().any(|s| s == name))
        .collect()
}

/// Shard file names from a weight index, deduplicated and sorted
pub fn shard_files(index_json: &str, model_id: &str) -> Result<Vec<String>> {
    let invalid = |reason: String| FetchError::InvalidConfig {
        model: model_id.to_string(),
        reason,
    };

    let index: serde_json::Value =
        serde_json::from_str(index_json).map_err(|e| invalid(format!("weight index: {e}")))?;
    let weight_map = index["weight_map"]
        .as_object()
        .ok_or_else(|| invalid("weight index has no weight_map".to_string()))?;

    let shards: BTreeSet<String> = weight_map
        .values()
        .filter_map(|v| v.as_str())
        .map(String::from)
        .collect();

    if shards.is_empty() {
        return Err(invalid("weight index lists no shards".to_string()));
    }

    Ok(shards.into_iter().collect())
}
