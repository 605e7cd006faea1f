pub mod artifacts;
pub mod cache;
pub mod download;

pub use artifacts::{ModelConfig, WeightLayout};
pub use cache::{directory_size, DirStats};
pub use download::{DownloadReport, HubSettings, ModelDownloader};
