//! Application configuration stored in `config.json`.
//!
//! The file is created with defaults on first run. Partial files are merged over
//! the defaults section by section, so a config that only sets
//! `api.request_delay` keeps every other default.

use crate::constants::{
    DEFAULT_CLIENT_PACK, DEFAULT_REGISTRY_URL, DEFAULT_REQUEST_DELAY_SECS, DEFAULT_SERVER_PACK,
    DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, MAX_WORKERS, MIN_WORKERS, MRPACK_INDEX_FILE,
    RECOMMENDED_MAX_WORKERS,
};
use crate::error::{CheckError, CheckResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Full application configuration. Constructed once at startup and passed by reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub folders: FolderConfig,
    pub threading: ThreadingConfig,
    pub api: ApiConfig,
    pub ui: UiConfig,
    pub files: FileConfig,
    pub export: ExportConfig,
    pub pack: PackConfig,
}

/// Input and output folders, relative to the working directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderConfig {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Worker limits offered by the thread prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadingConfig {
    pub max_threads: usize,
    pub recommended_max: usize,
}

/// Registry access settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the registry, without the `/v2` prefix.
    pub base_url: String,
    pub user_agent: String,
    /// Minimum delay in seconds between two requests of the same worker.
    pub request_delay: f64,
    pub timeout_secs: u64,
    pub side_hints: HintPolicy,
}

/// Progress bar appearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub progress_bar_width: u16,
    pub use_ascii_bars: bool,
}

/// Well-known file names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub mod_index: String,
    pub server_pack: String,
    pub client_pack: String,
}

/// Report export settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub format: ExportFormat,
}

/// Modpack creator settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    /// Ship mods that are optional on both sides in both packs.
    pub include_optional: bool,
}

/// How side hints declared in the manifest interact with registry lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HintPolicy {
    /// Only the registry is consulted.
    #[default]
    Ignore,
    /// Manifest hints are used when the registry lookup fails.
    Fallback,
    /// Manifest hints, when complete, replace the registry lookup.
    Prefer,
}

/// Report file format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    Markdown,
}

/// How the configuration was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Read from an existing file.
    Loaded,
    /// File was absent and has been created with defaults.
    Created,
    /// File was absent or unreadable; defaults are used. Carries the reason.
    Defaults(String),
}

/// Configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
    pub origin: ConfigOrigin,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Config {
    /// Load the config at `path`, creating it with defaults when absent.
    ///
    /// An unreadable or invalid file never aborts the run: defaults are used and the
    /// reason is reported through [`ConfigOrigin::Defaults`].
    pub fn load_or_init(path: &Path) -> LoadedConfig {
        let path = path.to_path_buf();

        if !path.exists() {
            let config = Config::default();
            let origin = match config.save(&path) {
                Ok(()) => ConfigOrigin::Created,
                Err(e) => ConfigOrigin::Defaults(e.to_string()),
            };
            return LoadedConfig {
                config,
                path,
                origin,
            };
        }

        match Config::load(&path) {
            Ok(config) => LoadedConfig {
                config,
                path,
                origin: ConfigOrigin::Loaded,
            },
            Err(e) => {
                tracing::warn!("falling back to default configuration: {}", e);
                LoadedConfig {
                    config: Config::default(),
                    path,
                    origin: ConfigOrigin::Defaults(e.to_string()),
                }
            }
        }
    }

    /// Read and validate the config at `path`.
    pub fn load(path: &Path) -> CheckResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a config document, filling missing keys with defaults.
    pub fn from_json(content: &str) -> CheckResult<Self> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| CheckError::Config(format!("invalid config.json: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> CheckResult<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| CheckError::Config(format!("failed to save {}: {}", path.display(), e)))
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> CheckResult<()> {
        if Duration::try_from_secs_f64(self.api.request_delay).is_err() {
            return Err(CheckError::Config(format!(
                "api.request_delay must be a non-negative number of seconds, got {}",
                self.api.request_delay
            )));
        }
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&self.threading.max_threads) {
            return Err(CheckError::Config(format!(
                "threading.max_threads must be between {} and {}, got {}",
                MIN_WORKERS, MAX_WORKERS, self.threading.max_threads
            )));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(CheckError::Config("api.base_url must not be empty".into()));
        }
        Ok(())
    }

    /// Delay enforced between two requests of the same worker.
    ///
    /// Values [`Config::validate`] rejects fall back to no delay.
    pub fn request_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.api.request_delay).unwrap_or_default()
    }

    /// Registry request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Path of the server pack inside the output folder.
    pub fn server_pack_path(&self) -> PathBuf {
        self.folders.output.join(&self.files.server_pack)
    }

    /// Path of the client pack inside the output folder.
    pub fn client_pack_path(&self) -> PathBuf {
        self.folders.output.join(&self.files.client_pack)
    }
}

impl ExportFormat {
    /// File extension used by reports in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "md",
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("input"),
            output: PathBuf::from("output"),
        }
    }
}

impl Default for ThreadingConfig {
    fn default() -> Self {
        Self {
            max_threads: MAX_WORKERS,
            recommended_max: RECOMMENDED_MAX_WORKERS,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REGISTRY_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_delay: DEFAULT_REQUEST_DELAY_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            side_hints: HintPolicy::default(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            progress_bar_width: 80,
            use_ascii_bars: true,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            mod_index: MRPACK_INDEX_FILE.to_string(),
            server_pack: DEFAULT_SERVER_PACK.to_string(),
            client_pack: DEFAULT_CLIENT_PACK.to_string(),
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            _ => Err(format!(
                "Unknown export format: '{}'. Use 'csv', 'json' or 'markdown'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl std::fmt::Display for HintPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HintPolicy::Ignore => write!(f, "ignore"),
            HintPolicy::Fallback => write!(f, "fallback"),
            HintPolicy::Prefer => write!(f, "prefer"),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
