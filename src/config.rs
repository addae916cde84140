use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use serde::Deserialize;

use crate::pipeline::DEFAULT_TOP_N;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BATCH_SIZE: usize = 256;

/// Connection settings shared by every command. Flags win over environment
/// variables, which win over the optional TOML file.
#[derive(Debug, Default, Args)]
pub struct ConfigArgs {
    /// TOML file with default settings
    #[arg(long, global = true, env = "COURSE_RECOMMENDER_CONFIG")]
    pub config: Option<PathBuf>,
    /// Postgres instance holding imported program profiles
    #[arg(long, global = true, env = "DATABASE_URL")]
    pub database_url: Option<String>,
    /// Directory of model bundles (`<program>/assets/settings`)
    #[arg(long, global = true, env = "PROFILE_DIR")]
    pub profile_dir: Option<PathBuf>,
    /// Base URL of the model server
    #[arg(long, global = true, env = "MODEL_SERVER_URL")]
    pub model_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    database_url: Option<String>,
    profile_dir: Option<PathBuf>,
    model_server_url: Option<String>,
    model_timeout_secs: Option<u64>,
    batch_size: Option<usize>,
    top_n: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub profile_dir: Option<PathBuf>,
    pub model_server_url: Option<String>,
    pub model_timeout: Duration,
    pub batch_size: usize,
    pub top_n: usize,
}

impl AppConfig {
    pub fn resolve(args: &ConfigArgs) -> anyhow::Result<Self> {
        let file = match &args.config {
            Some(path) => load_file(path)?,
            None => FileConfig::default(),
        };
        Ok(Self::merge(file, args))
    }

    fn merge(file: FileConfig, args: &ConfigArgs) -> Self {
        Self {
            database_url: args.database_url.clone().or(file.database_url),
            profile_dir: args.profile_dir.clone().or(file.profile_dir),
            model_server_url: args.model_url.clone().or(file.model_server_url),
            model_timeout: Duration::from_secs(file.model_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            batch_size: file.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1),
            top_n: file.top_n.unwrap_or(DEFAULT_TOP_N),
        }
    }

    pub fn model_server_url(&self) -> anyhow::Result<&str> {
        self.model_server_url
            .as_deref()
            .context("MODEL_SERVER_URL must point at the model server")
    }
}

fn load_file(path: &Path) -> anyhow::Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("invalid config {}", path.display()))
}
