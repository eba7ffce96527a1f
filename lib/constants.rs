//! Constants for mod-side-checker.
//!
//! File names, registry defaults, and worker limits.

use std::path::PathBuf;
use std::sync::LazyLock;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Name of the index file inside a `.mrpack` archive.
pub const MRPACK_INDEX_FILE: &str = "modrinth.index.json";

/// File extension for Modrinth modpack archives.
pub const MRPACK_EXT: &str = "mrpack";

/// Default configuration file name (relative to the working directory).
pub const CONFIG_FILE: &str = "config.json";

/// Default Modrinth API base URL.
pub const DEFAULT_REGISTRY_URL: &str = "https://api.modrinth.com";

/// Default user agent sent with registry requests.
pub const DEFAULT_USER_AGENT: &str = "ModEnvironmentChecker/1.0";

/// Default delay between two requests issued by the same worker, in seconds.
pub const DEFAULT_REQUEST_DELAY_SECS: f64 = 0.5;

/// Default request timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Smallest accepted worker count.
pub const MIN_WORKERS: usize = 1;

/// Largest accepted worker count.
pub const MAX_WORKERS: usize = 10;

/// Worker count above which the UI shows a stability note.
pub const RECOMMENDED_MAX_WORKERS: usize = 6;

/// Report containing every analysed mod.
pub const REPORT_ALL_STEM: &str = "Lista_Mods_Com_Ambiente";

/// Report containing client-only mods.
pub const REPORT_CLIENT_STEM: &str = "Lista_Mods_Client";

/// Report containing server-only mods.
pub const REPORT_SERVER_STEM: &str = "Lista_Mods_Server";

/// Report containing mods required on both sides.
pub const REPORT_BOTH_STEM: &str = "Lista_Mods_Both";

/// Report containing mods optional on both sides.
pub const REPORT_OPTIONAL_STEM: &str = "Lista_Mods_Optional";

/// Report containing mods whose side could not be resolved.
pub const REPORT_UNKNOWN_STEM: &str = "Lista_Mods_Unknown";

/// Default server pack file name.
pub const DEFAULT_SERVER_PACK: &str = "server_pack.zip";

/// Default client pack file name.
pub const DEFAULT_CLIENT_PACK: &str = "client_pack.zip";

/// Override folder shipped to both sides.
pub const OVERRIDES_DIR: &str = "overrides/";

/// Override folder shipped to clients only.
pub const CLIENT_OVERRIDES_DIR: &str = "client-overrides/";

/// Override folder shipped to servers only.
pub const SERVER_OVERRIDES_DIR: &str = "server-overrides/";

/// Path of the config file resolved against the working directory.
pub static DEFAULT_CONFIG_PATH: LazyLock<PathBuf> = LazyLock::new(|| {
    std::env::current_dir()
        .map(|cwd| cwd.join(CONFIG_FILE))
        .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE))
});
