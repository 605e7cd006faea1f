use clap::Parser;
use hf_fetch::config::Config;
use hf_fetch::console;
use hf_fetch::error::{FetchError, Result};
use hf_fetch::models::{DownloadReport, HubSettings, ModelDownloader};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hf-fetch")]
#[command(about = "Download Hugging Face models into a local cache", long_about = None)]
struct Cli {
    /// Model to download (e.g. Qwen/Qwen2.5-VL-3B-Instruct)
    model_name: Option<String>,

    /// Download directory (hub cache root)
    #[arg(long, value_name = "DIR", default_value = console::DEFAULT_DOWNLOAD_DIR)]
    download_dir: PathBuf,

    /// Revision to download (branch, tag or commit)
    #[arg(long)]
    revision: Option<String>,

    /// Hub endpoint, for mirrors
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,

    /// Access token for gated repositories
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Disable per-file progress bars
    #[arg(long)]
    no_progress: bool,
}

fn main() {
    // Logs go to stderr so stdout only carries the download report
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(model_name) = cli.model_name.clone().filter(|name| !name.is_empty()) else {
        println!("❌ Error: please specify a model name");
        println!("{}", console::usage_text());
        std::process::exit(1);
    };

    println!("{}", console::banner_text(&model_name, &cli.download_dir));

    match run(&cli, &model_name) {
        Ok(report) => {
            tracing::info!(
                model = %report.model_id,
                model_type = %report.config.model_type,
                vocab_size = ?report.tokenizer.vocab_size,
                weight_files = report.weights.files.len(),
                "Download finished"
            );
            println!("{}", console::next_steps_text(&model_name));
        }
        Err(e) => {
            tracing::debug!("Download failed: {e:?}");
            println!("❌ Error: {e}");
            // Config errors carry their own troubleshooting text
            if !matches!(e, FetchError::Config(_)) {
                println!("{}", console::troubleshooting_text());
            }
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli, model_name: &str) -> Result<DownloadReport> {
    let config = Config::load()?;

    let settings = HubSettings {
        revision: cli.revision.clone().unwrap_or(config.hub.revision),
        endpoint: cli.endpoint.clone().or(config.hub.endpoint),
        token: cli.token.clone().filter(|t| !t.is_empty()),
        progress: !cli.no_progress && config.output.progress,
    };

    let downloader = ModelDownloader::new(&cli.download_dir, &settings)?;
    downloader.download(model_name)
}
