//! Configuration and path resolution for the CLI.
//!
//! Handles finding model files and data directories across different environments:
//! - Custom: command-line flags or environment variables
//! - Development: workspace assets directory
//! - Distribution: relative to executable

use anyhow::{anyhow, Context, Result};
use clap::Args;
use directories::ProjectDirs;
use hrdesk_core::config::DEFAULT_GENERATION_MODEL;
use hrdesk_core::embedding::provider::{MODEL_WEIGHTS_FILE, TOKENIZER_FILE};
use hrdesk_core::AssistantConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Database file name inside the data directory
const DATABASE_FILENAME: &str = "hrdesk.redb";

/// Model directory relative to the workspace root or the executable
const MODEL_SUBDIR: &str = "assets/models/all-MiniLM-L6-v2";

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct AppOptions {
    /// Directory holding the vector store (default: platform data location)
    #[arg(long, global = true, env = "HRDESK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory of HR policy .txt files
    #[arg(long, global = true, env = "HRDESK_CORPUS_DIR", default_value = "data")]
    pub corpus_dir: PathBuf,

    /// Directory with model.safetensors and tokenizer.json
    #[arg(long, global = true, env = "HRDESK_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Gemini model used for answers
    #[arg(long, global = true, env = "HRDESK_GEMINI_MODEL", default_value = DEFAULT_GENERATION_MODEL)]
    pub gemini_model: String,

    /// Gemini API key
    #[arg(long, global = true, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// JSON file with assistant settings; the flags below override it
    #[arg(long, global = true, env = "HRDESK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Keep at most this many remembered answers (oldest evicted)
    #[arg(long, global = true, env = "HRDESK_MEMORY_MAX_ENTRIES")]
    pub memory_max_entries: Option<usize>,

    /// Forget remembered answers older than this many seconds
    #[arg(long, global = true, env = "HRDESK_MEMORY_TTL_SECS")]
    pub memory_ttl_secs: Option<u64>,

    /// Timeout for each embedding or generation call, in seconds
    #[arg(long, global = true, env = "HRDESK_PROVIDER_TIMEOUT_SECS")]
    pub provider_timeout_secs: Option<u64>,

    /// Attempts per provider call, including the first
    #[arg(long, global = true, env = "HRDESK_PROVIDER_ATTEMPTS")]
    pub provider_attempts: Option<u32>,

    /// Reclaim an unfinished ingestion after this many seconds
    #[arg(long, global = true, env = "HRDESK_STALE_INGESTION_SECS")]
    pub stale_ingestion_secs: Option<u64>,
}

impl AppOptions {
    /// Assistant settings from the config file (if any) with flag overrides.
    pub fn assistant_config(&self) -> Result<AssistantConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config: {}", path.display()))?;
                serde_json::from_str::<AssistantConfig>(&raw)
                    .with_context(|| format!("Invalid config: {}", path.display()))?
            }
            None => AssistantConfig::default(),
        };

        if let Some(max_entries) = self.memory_max_entries {
            config.memory.max_entries = Some(max_entries);
        }
        if let Some(ttl) = self.memory_ttl_secs {
            config.memory.ttl = Some(Duration::from_secs(ttl));
        }
        if let Some(timeout) = self.provider_timeout_secs {
            config = config.with_provider_timeout(Duration::from_secs(timeout));
        }
        if let Some(attempts) = self.provider_attempts {
            config = config.with_max_attempts(attempts);
        }
        if let Some(stale) = self.stale_ingestion_secs {
            config = config.with_stale_ingestion(Duration::from_secs(stale));
        }
        Ok(config)
    }
}

fn has_model(dir: &Path) -> bool {
    dir.join(MODEL_WEIGHTS_FILE).exists() && dir.join(TOKENIZER_FILE).exists()
}

/// Finds the directory containing the embedding model and tokenizer.
///
/// Search order:
/// 1. `--model-dir` / `$HRDESK_MODEL_DIR`
/// 2. Workspace `assets/models/all-MiniLM-L6-v2/` (development)
/// 3. Executable-relative `../assets/models/...` or `assets/models/...` (distribution)
pub fn find_model_dir(custom_dir: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = custom_dir {
        if has_model(dir) {
            return Ok(dir.clone());
        }
        return Err(anyhow!(
            "{} or {} missing in {}",
            MODEL_WEIGHTS_FILE,
            TOKENIZER_FILE,
            dir.display()
        ));
    }

    // CARGO_MANIFEST_DIR points to crates/hrdesk-cli
    let workspace_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .map(|p| p.join(MODEL_SUBDIR));

    if let Some(ref path) = workspace_path {
        if has_model(path) {
            return Ok(path.clone());
        }
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            for candidate in [exe_dir.join("..").join(MODEL_SUBDIR), exe_dir.join(MODEL_SUBDIR)] {
                if has_model(&candidate) {
                    return Ok(candidate);
                }
            }
        }
    }

    Err(anyhow!(
        "Embedding model not found. Download all-MiniLM-L6-v2 ({} and {}) and point \
         $HRDESK_MODEL_DIR at it.\n\
         Searched locations:\n\
         - {}\n\
         - Relative to executable",
        MODEL_WEIGHTS_FILE,
        TOKENIZER_FILE,
        workspace_path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| format!("<workspace>/{}", MODEL_SUBDIR))
    ))
}

/// Returns the data directory.
///
/// - macOS: `~/Library/Application Support/dev.hrdesk.HR-Desk/`
/// - Linux: `~/.local/share/hrdesk/`
/// - Windows: `%APPDATA%\hrdesk\HR Desk\data\`
pub fn get_data_dir(custom_dir: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = custom_dir {
        return Ok(dir.clone());
    }

    ProjectDirs::from("dev", "hrdesk", "HR Desk")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| anyhow!("Could not determine data directory"))
}

/// Returns the path to the database file.
pub fn database_path(custom_dir: Option<&PathBuf>) -> Result<PathBuf> {
    let data_dir = get_data_dir(custom_dir)?;
    Ok(data_dir.join(DATABASE_FILENAME))
}
