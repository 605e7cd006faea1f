use crate::error::{FetchError, Result};
use crate::models::artifacts::{
    shard_files, tokenizer_files, ModelConfig, WeightLayout, CONFIG_FILE, TOKENIZER_JSON,
};
use crate::models::cache::{directory_size, format_bytes, model_cache_path, DirStats};
use candle_core::DType;
use hf_hub::api::sync::{Api, ApiBuilder, ApiRepo};
use hf_hub::{Repo, RepoType};
use indicatif::{ProgressBar, ProgressStyle};
use safetensors::tensor::Metadata;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Hub client settings resolved from config and command line
#[derive(Debug, Clone)]
pub struct HubSettings {
    pub revision: String,
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub progress: bool,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            revision: "main".to_string(),
            endpoint: None,
            token: None,
            progress: true,
        }
    }
}

/// Device the weights would be placed on by `auto` placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Cuda,
    Metal,
    Cpu,
}

impl Placement {
    /// Best available device: CUDA, then Metal, then CPU
    #[must_use]
    pub fn auto() -> Self {
        if candle_core::utils::cuda_is_available() {
            Self::Cuda
        } else if candle_core::utils::metal_is_available() {
            Self::Metal
        } else {
            Self::Cpu
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cuda => write!(f, "cuda"),
            Self::Metal => write!(f, "metal"),
            Self::Cpu => write!(f, "cpu"),
        }
    }
}

/// Tokenizer artifacts that were fetched
#[derive(Debug, Clone)]
pub struct TokenizerSummary {
    pub files: Vec<PathBuf>,
    pub vocab_size: Option<usize>,
}

/// Tensor statistics read from safetensors headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorStats {
    pub tensors: usize,
    pub parameters: u64,
    pub dtype: Option<DType>,
}

/// Weight files that were fetched, with the resolved precision and placement
#[derive(Debug, Clone)]
pub struct WeightsSummary {
    pub layout: WeightLayout,
    pub files: Vec<PathBuf>,
    pub tensor_stats: Option<TensorStats>,
    pub dtype: DType,
    pub placement: Placement,
}

/// Everything a successful fetch sequence produced
#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub model_id: String,
    pub config: ModelConfig,
    pub tokenizer: TokenizerSummary,
    pub weights: WeightsSummary,
    pub stats: Option<DirStats>,
}

/// Model downloader with progress reporting
pub struct ModelDownloader {
    api: Api,
    cache_dir: PathBuf,
    revision: String,
    progress: bool,
}

impl ModelDownloader {
    /// Create new downloader using `cache_dir` as the hub cache root
    pub fn new(cache_dir: impl Into<PathBuf>, settings: &HubSettings) -> Result<Self> {
        let cache_dir = cache_dir.into();

        let mut builder = ApiBuilder::new()
            .with_cache_dir(cache_dir.clone())
            .with_progress(settings.progress);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.with_endpoint(endpoint.clone());
        }
        // Without an explicit token the client keeps the one stored by `huggingface-cli login`
        if let Some(token) = &settings.token {
            builder = builder.with_token(Some(token.clone()));
        }
        let api = builder.build()?;

        tracing::debug!(
            cache_dir = %cache_dir.display(),
            revision = %settings.revision,
            endpoint = ?settings.endpoint,
            "Hub client ready"
        );

        Ok(Self {
            api,
            cache_dir,
            revision: settings.revision.clone(),
            progress: settings.progress,
        })
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Run the fetch sequence: config, tokenizer, weights, then size statistics
    pub fn download(&self, model_id: &str) -> Result<DownloadReport> {
        println!("🔍 Fetching model info: {model_id}");

        println!("📁 Creating download directory...");
        fs::create_dir_all(&self.cache_dir)?;
        println!("✅ Directory: {}", self.cache_dir.display());

        let repo = self.api.repo(Repo::with_revision(
            model_id.to_string(),
            RepoType::Model,
            self.revision.clone(),
        ));

        println!("📋 Downloading config...");
        let config = Self::fetch_config(&repo, model_id)?;
        println!("✅ Config ready: {}", config.model_type);

        let siblings = Self::list_files(&repo, model_id)?;

        println!("🔤 Downloading tokenizer...");
        let tokenizer = Self::fetch_tokenizer(&repo, model_id, &siblings)?;
        match tokenizer.vocab_size {
            Some(vocab_size) => println!("✅ Tokenizer ready (vocab: {vocab_size})"),
            None => println!("✅ Tokenizer ready"),
        }

        println!("🧠 Downloading model files...");
        println!("⏳ The first download may take a while...");
        let weights = self.fetch_weights(&repo, model_id, &siblings, &config)?;
        println!("✅ Model files ready");

        let stats = self.report_stats(model_id)?;

        println!("🎉 Download complete!");
        tracing::info!(model_id, "Fetch sequence finished");

        Ok(DownloadReport {
            model_id: model_id.to_string(),
            config,
            tokenizer,
            weights,
            stats,
        })
    }

    fn fetch_config(repo: &ApiRepo, model_id: &str) -> Result<ModelConfig> {
        let path = Self::fetch_file(repo, CONFIG_FILE)?;
        ModelConfig::from_file(&path, model_id)
    }

    /// File names in the repo at the configured revision
    fn list_files(repo: &ApiRepo, model_id: &str) -> Result<Vec<String>> {
        let info = repo
            .info()
            .map_err(|e| FetchError::download(format!("<repo info: {model_id}>"), e))?;
        let files: Vec<String> = info.siblings.into_iter().map(|s| s.rfilename).collect();

        tracing::debug!(model_id, files = files.len(), "Listed repository");
        Ok(files)
    }

    fn fetch_tokenizer(
        repo: &ApiRepo,
        model_id: &str,
        siblings: &[String],
    ) -> Result<TokenizerSummary> {
        let names = tokenizer_files(siblings);
        if names.is_empty() {
            return Err(FetchError::TokenizerMissing(model_id.to_string()));
        }

        let mut files = Vec::with_capacity(names.len());
        let mut vocab_size = None;
        for name in names {
            let path = Self::fetch_file(repo, name)?;
            if name == TOKENIZER_JSON {
                vocab_size = Some(load_tokenizer(&path)?);
            }
            files.push(path);
        }

        Ok(TokenizerSummary { files, vocab_size })
    }

    fn fetch_weights(
        &self,
        repo: &ApiRepo,
        model_id: &str,
        siblings: &[String],
        config: &ModelConfig,
    ) -> Result<WeightsSummary> {
        println!("🔍 Detecting model type...");
        let layout = WeightLayout::detect(siblings)
            .ok_or_else(|| FetchError::WeightsMissing(model_id.to_string()))?;
        println!("   - Architecture: {}", config.architecture());
        tracing::info!(?layout, architecture = config.architecture(), "Detected checkpoint");

        let entry = Self::fetch_file(repo, layout.entry_file())?;
        let files = if layout.is_sharded() {
            let index = fs::read_to_string(&entry)?;
            let mut files = Vec::new();
            for shard in shard_files(&index, model_id)? {
                files.push(Self::fetch_file(repo, &shard)?);
            }
            files
        } else {
            vec![entry]
        };

        let tensor_stats = if layout.is_safetensors() {
            Some(self.inspect_with_spinner(&files)?)
        } else {
            None
        };

        let dtype = resolve_dtype(config, tensor_stats.as_ref());
        let placement = Placement::auto();

        if let Some(stats) = &tensor_stats {
            println!(
                "   - Tensors: {} ({} parameters)",
                stats.tensors, stats.parameters
            );
        }
        println!("   - Precision: {}, device: {placement}", dtype.as_str());

        Ok(WeightsSummary {
            layout,
            files,
            tensor_stats,
            dtype,
            placement,
        })
    }

    fn inspect_with_spinner(&self, files: &[PathBuf]) -> Result<TensorStats> {
        let spinner = if self.progress {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::with_template("{spinner:.green} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            ProgressBar::hidden()
        };
        spinner.set_message(format!("Inspecting {} weight file(s)", files.len()));

        let result = inspect_safetensors(files);
        spinner.finish_and_clear();
        result
    }

    /// Print file count and size of the model's cache folder, if it exists
    fn report_stats(&self, model_id: &str) -> Result<Option<DirStats>> {
        let model_path = model_cache_path(&self.cache_dir, model_id);
        if !model_path.exists() {
            tracing::debug!(path = %model_path.display(), "Cache folder not found, skipping statistics");
            return Ok(None);
        }

        let stats = directory_size(&model_path)?;
        println!("📊 Download statistics:");
        println!("   - Files: {}", stats.file_count);
        println!("   - Total size: {:.2} GB", stats.total_gb());

        Ok(Some(stats))
    }

    fn fetch_file(repo: &ApiRepo, name: &str) -> Result<PathBuf> {
        tracing::info!("Fetching {name}");
        let path = repo
            .get(name)
            .map_err(|e| FetchError::download(name, e))?;

        let size = fs::metadata(&path).map_or(0, |m| m.len());
        tracing::info!("Fetched {name} ({})", format_bytes(size));
        Ok(path)
    }
}

/// Load a `tokenizer.json` and return its vocabulary size
pub fn load_tokenizer(path: &Path) -> Result<usize> {
    let tokenizer =
        tokenizers::Tokenizer::from_file(path).map_err(|e| FetchError::Tokenizer {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    Ok(tokenizer.get_vocab_size(true))
}

/// Upper bound on a safetensors JSON header, as enforced by the format itself
const MAX_HEADER_SIZE: u64 = 100_000_000;

/// Read the JSON header at the start of a safetensors file
fn read_safetensors_header(path: &Path) -> Result<Metadata> {
    let invalid = |reason: String| FetchError::Weights {
        path: path.display().to_string(),
        reason,
    };

    let mut file = fs::File::open(path)?;
    let mut len_bytes = [0u8; 8];
    file.read_exact(&mut len_bytes)
        .map_err(|e| invalid(format!("header length: {e}")))?;

    let header_len = u64::from_le_bytes(len_bytes);
    if header_len > MAX_HEADER_SIZE {
        return Err(invalid(format!("header of {header_len} bytes is too large")));
    }

    let mut header = Vec::new();
    file.take(header_len)
        .read_to_end(&mut header)
        .map_err(|e| invalid(format!("header: {e}")))?;
    if header.len() as u64 != header_len {
        return Err(invalid("file ends inside the header".to_string()));
    }

    serde_json::from_slice(&header).map_err(|e| invalid(format!("header: {e}")))
}

/// Count tensors and parameters from safetensors headers without loading data
pub fn inspect_safetensors<P: AsRef<Path>>(files: &[P]) -> Result<TensorStats> {
    let mut tensors = 0usize;
    let mut parameters = 0u64;
    let mut dtype_counts: Vec<(DType, usize)> = Vec::new();

    for file in files {
        let metadata = read_safetensors_header(file.as_ref())?;
        for info in metadata.tensors().values() {
            tensors += 1;
            parameters += info.shape.iter().product::<usize>() as u64;
            let Ok(dtype) = DType::try_from(info.dtype) else {
                continue;
            };
            match dtype_counts.iter_mut().find(|(d, _)| *d == dtype) {
                Some((_, count)) => *count += 1,
                None => dtype_counts.push((dtype, 1)),
            }
        }
    }

    let dtype = dtype_counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(dtype, _)| dtype);

    Ok(TensorStats {
        tensors,
        parameters,
        dtype,
    })
}

/// `auto` precision: the config's `torch_dtype`, else the dominant tensor dtype, else f32
#[must_use]
pub fn resolve_dtype(config: &ModelConfig, tensor_stats: Option<&TensorStats>) -> DType {
    config
        .declared_dtype()
        .or_else(|| tensor_stats.and_then(|s| s.dtype))
        .unwrap_or(DType::F32)
}
