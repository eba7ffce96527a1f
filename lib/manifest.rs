//! Modpack manifest loading.
//!
//! Reads a `modrinth.index.json` either directly or from inside a `.mrpack`
//! archive and turns its `files` list into [`ModDescriptor`]s, in manifest order.

use crate::classify::{SideSupport, Support};
use crate::constants::{MRPACK_EXT, MRPACK_INDEX_FILE};
use crate::error::{CheckError, CheckResult};
use regex::Regex;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use zip::ZipArchive;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Zip local file header signature.
const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// Project id in a Modrinth CDN URL: `https://cdn.modrinth.com/data/<id>/versions/...`.
static PROJECT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/data/([A-Za-z0-9_-]+)(?:/|$)").expect("valid regex"));

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// One mod listed in the manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ModDescriptor {
    /// Position in the manifest `files` list.
    pub index: usize,
    /// Registry project id, when a download URL carries one.
    pub project_id: Option<String>,
    /// File name of the jar (last segment of `path`).
    pub filename: String,
    /// Install path declared by the manifest (e.g. `mods/sodium.jar`).
    pub path: String,
    /// Download URLs, in manifest order.
    pub downloads: Vec<String>,
    /// Side support declared in the manifest `env` object.
    pub hints: Option<SideSupport>,
    /// The original manifest entry, copied verbatim into generated packs.
    pub entry: Value,
}

/// Where a manifest was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    /// A bare `modrinth.index.json`.
    Json(PathBuf),
    /// The index embedded in a `.mrpack` archive.
    Archive(PathBuf),
}

/// A parsed manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Every top-level field except `files` (name, versionId, game, dependencies, ...).
    pub metadata: Map<String, Value>,
    /// Mods in manifest order. Duplicates are preserved.
    pub mods: Vec<ModDescriptor>,
    pub source: ManifestSource,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ModDescriptor {
    /// Identifier used in logs and reports: the project id, or the filename.
    pub fn label(&self) -> &str {
        self.project_id.as_deref().unwrap_or(&self.filename)
    }

    /// First download URL, if any.
    pub fn download_url(&self) -> Option<&str> {
        self.downloads.first().map(String::as_str)
    }
}

impl Manifest {
    /// Parse a manifest from a JSON document.
    pub fn from_value(value: Value, source: ManifestSource) -> CheckResult<Self> {
        let Value::Object(mut root) = value else {
            return Err(CheckError::MalformedManifest(
                "top-level value must be a JSON object".into(),
            ));
        };

        let files = match root.remove("files") {
            Some(Value::Array(files)) => files,
            Some(_) => {
                return Err(CheckError::MalformedManifest(
                    "\"files\" must be an array".into(),
                ));
            }
            None => {
                return Err(CheckError::MalformedManifest(
                    "missing required field \"files\"".into(),
                ));
            }
        };

        let mods = files
            .into_iter()
            .enumerate()
            .map(|(index, entry)| parse_entry(index, entry))
            .collect::<CheckResult<Vec<_>>>()?;

        Ok(Self {
            metadata: root,
            mods,
            source,
        })
    }

    /// Parse a manifest from raw JSON bytes.
    pub fn from_slice(bytes: &[u8], source: ManifestSource) -> CheckResult<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| CheckError::MalformedManifest(format!("invalid JSON: {}", e)))?;
        Self::from_value(value, source)
    }

    /// Modpack name, when the manifest declares one.
    pub fn name(&self) -> Option<&str> {
        self.metadata.get("name").and_then(Value::as_str)
    }

    /// Modpack version, when the manifest declares one.
    pub fn version_id(&self) -> Option<&str> {
        self.metadata.get("versionId").and_then(Value::as_str)
    }

    /// Source archive, when the manifest came from a `.mrpack`.
    pub fn archive_path(&self) -> Option<&Path> {
        match &self.source {
            ManifestSource::Archive(path) => Some(path),
            ManifestSource::Json(_) => None,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Load a manifest from a `.json` file or a `.mrpack` archive.
///
/// The type is taken from the extension; other extensions are sniffed for the zip
/// signature. Archives are read in memory, nothing is extracted to disk.
pub fn load_manifest(path: &Path) -> CheckResult<Manifest> {
    if !path.is_file() {
        return Err(CheckError::InputNotFound(path.to_path_buf()));
    }

    let manifest = if is_archive(path)? {
        let file = File::open(path)?;
        let bytes = read_index_from_archive(file)?;
        Manifest::from_slice(&bytes, ManifestSource::Archive(path.to_path_buf()))?
    } else {
        let bytes = std::fs::read(path)?;
        Manifest::from_slice(&bytes, ManifestSource::Json(path.to_path_buf()))?
    };

    tracing::debug!(
        "loaded {} mods from {}",
        manifest.mods.len(),
        path.display()
    );
    Ok(manifest)
}

/// Read the raw `modrinth.index.json` bytes from a modpack archive.
pub fn read_index_from_archive<R: Read + Seek>(reader: R) -> CheckResult<Vec<u8>> {
    let mut archive = ZipArchive::new(reader)
        .map_err(|e| CheckError::MalformedManifest(format!("not a valid archive: {}", e)))?;

    let mut entry = archive.by_name(MRPACK_INDEX_FILE).map_err(|_| {
        CheckError::MalformedManifest(format!("archive does not contain {}", MRPACK_INDEX_FILE))
    })?;

    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Find the input file inside `dir`.
///
/// Prefers `index_name` (normally `modrinth.index.json`), then the first `*.mrpack`
/// in lexical order.
pub fn discover_input(dir: &Path, index_name: &str) -> CheckResult<PathBuf> {
    let index = dir.join(index_name);
    if index.is_file() {
        return Ok(index);
    }

    let pattern = format!(
        "{}/*.{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        MRPACK_EXT
    );
    let mut packs: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| CheckError::Generic(format!("Invalid input pattern: {}", e)))?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    packs.sort();

    packs
        .into_iter()
        .next()
        .ok_or_else(|| CheckError::InputNotFound(dir.to_path_buf()))
}

/// Extract the registry project id from a download URL.
pub fn project_id_from_url(url: &str) -> Option<String> {
    PROJECT_ID_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn is_archive(path: &Path) -> CheckResult<bool> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());

    match ext.as_deref() {
        Some(MRPACK_EXT) | Some("zip") => Ok(true),
        Some("json") => Ok(false),
        _ => {
            let mut magic = [0u8; 4];
            let mut file = File::open(path)?;
            let read = file.read(&mut magic)?;
            Ok(read == magic.len() && &magic == ZIP_MAGIC)
        }
    }
}

fn parse_entry(index: usize, entry: Value) -> CheckResult<ModDescriptor> {
    let Some(obj) = entry.as_object() else {
        return Err(CheckError::MalformedManifest(format!(
            "files[{}] must be an object",
            index
        )));
    };

    let path = obj
        .get("path")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            CheckError::MalformedManifest(format!("files[{}].path must be a string", index))
        })?
        .to_string();

    let downloads = match obj.get("downloads") {
        Some(Value::Array(urls)) => urls
            .iter()
            .map(|u| {
                u.as_str().map(str::to_string).ok_or_else(|| {
                    CheckError::MalformedManifest(format!(
                        "files[{}].downloads must contain only strings",
                        index
                    ))
                })
            })
            .collect::<CheckResult<Vec<_>>>()?,
        _ => {
            return Err(CheckError::MalformedManifest(format!(
                "files[{}].downloads must be an array",
                index
            )));
        }
    };

    let filename = path.rsplit(['/', '\\']).next().unwrap_or(&path).to_string();
    let project_id = downloads.iter().find_map(|u| project_id_from_url(u));
    let hints = obj.get("env").and_then(parse_env);

    Ok(ModDescriptor {
        index,
        project_id,
        filename,
        path,
        downloads,
        hints,
        entry,
    })
}

fn parse_env(env: &Value) -> Option<SideSupport> {
    let env = env.as_object()?;
    let side = |key: &str| {
        env.get(key)
            .and_then(Value::as_str)
            .map(Support::parse)
            .unwrap_or_default()
    };
    Some(SideSupport::new(side("client"), side("server")))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
