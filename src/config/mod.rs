//! Configuration module for hf-fetch
//!
//! Loads config from `$XDG_CONFIG_HOME/hf-fetch/config.toml` or the platform config dir.
//! Falls back to embedded defaults if file doesn't exist.
//! Partial configs are merged with defaults using serde's default attributes.
//!
//! The download directory is not part of the config file; it always
//! comes from `--download-dir` or its literal default.
//!
//! # Example
//!
//! ```no_run
//! use hf_fetch::config::Config;
//!
//! let config = Config::load().expect("Failed to load config");
//! println!("Revision: {}", config.hub.revision);
//! println!("Progress bars: {}", config.output.progress);
//! ```

pub mod schema;

pub use schema::Config;
