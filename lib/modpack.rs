//! Client and server pack creation.
//!
//! Builds `server_pack.zip` and `client_pack.zip` from a manifest and its analysis
//! results. Each archive carries a rewritten `modrinth.index.json` listing only the
//! mods for that side, plus the override folders of the source `.mrpack`.

use crate::classify::Category;
use crate::config::Config;
use crate::constants::{
    CLIENT_OVERRIDES_DIR, MRPACK_INDEX_FILE, OVERRIDES_DIR, SERVER_OVERRIDES_DIR,
};
use crate::dispatch::AnalysisResult;
use crate::error::{CheckError, CheckResult};
use crate::manifest::Manifest;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Which packs to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackTarget {
    Server,
    Client,
    Both,
}

/// The side a single pack is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackSide {
    Server,
    Client,
}

/// Progress event emitted while building a pack.
#[derive(Debug, Clone)]
pub enum PackProgress {
    /// Starting a pack, with the number of entries to write.
    Started { side: PackSide, total_entries: usize },
    /// An entry was written.
    EntryAdded {
        side: PackSide,
        path: String,
        current: usize,
    },
    /// The pack is complete.
    Finished { side: PackSide },
}

/// Callback type for progress events.
pub type ProgressCallback = Arc<dyn Fn(PackProgress) + Send + Sync>;

/// Options for pack creation.
#[derive(Clone)]
pub struct PackOptions {
    /// Output path of the server pack.
    pub server_path: PathBuf,

    /// Output path of the client pack.
    pub client_path: PathBuf,

    /// Add mods that are optional on both sides to both packs.
    pub include_optional: bool,

    /// Progress callback.
    pub on_progress: Option<ProgressCallback>,
}

/// What ended up in a pack.
#[derive(Debug, Clone)]
pub struct PackSummary {
    pub side: PackSide,
    pub path: PathBuf,
    /// Mods listed in the rewritten index.
    pub mods: usize,
    /// Override entries copied from the source archive.
    pub overrides: usize,
    /// Override jars left out because they belong to the other side.
    pub filtered: usize,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PackTarget {
    /// Targets in menu order.
    pub const ALL: [PackTarget; 3] = [PackTarget::Server, PackTarget::Client, PackTarget::Both];

    pub fn sides(&self) -> &'static [PackSide] {
        match self {
            PackTarget::Server => &[PackSide::Server],
            PackTarget::Client => &[PackSide::Client],
            PackTarget::Both => &[PackSide::Server, PackSide::Client],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PackTarget::Server => "server",
            PackTarget::Client => "client",
            PackTarget::Both => "both",
        }
    }
}

impl PackSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackSide::Server => "server",
            PackSide::Client => "client",
        }
    }

    /// Whether a mod of `category` goes into this pack.
    pub fn includes(&self, category: Category, include_optional: bool) -> bool {
        if category == Category::Optional {
            return include_optional;
        }
        match self {
            PackSide::Server => category.runs_on_server(),
            PackSide::Client => category.runs_on_client(),
        }
    }

    /// Whether an archive entry under one of the override folders belongs here.
    fn accepts_override(&self, name: &str) -> bool {
        if name.starts_with(OVERRIDES_DIR) {
            return true;
        }
        match self {
            PackSide::Server => name.starts_with(SERVER_OVERRIDES_DIR),
            PackSide::Client => name.starts_with(CLIENT_OVERRIDES_DIR),
        }
    }
}

impl PackOptions {
    /// Options taken from the configuration. `output_dir` replaces the configured
    /// output folder when given.
    pub fn from_config(config: &Config, output_dir: Option<&Path>) -> Self {
        let (server_path, client_path) = match output_dir {
            Some(dir) => (
                dir.join(&config.files.server_pack),
                dir.join(&config.files.client_pack),
            ),
            None => (config.server_pack_path(), config.client_pack_path()),
        };
        Self {
            server_path,
            client_path,
            include_optional: config.pack.include_optional,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn path_for(&self, side: PackSide) -> &Path {
        match side {
            PackSide::Server => &self.server_path,
            PackSide::Client => &self.client_path,
        }
    }

    fn emit(&self, event: PackProgress) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Build every pack of `target`. A failure on one pack does not stop the other.
pub fn build_packs(
    manifest: &Manifest,
    results: &[AnalysisResult],
    target: PackTarget,
    options: &PackOptions,
) -> Vec<(PackSide, CheckResult<PackSummary>)> {
    target
        .sides()
        .iter()
        .map(|&side| (side, build_pack(manifest, results, side, options)))
        .collect()
}

/// Build the pack for one side.
pub fn build_pack(
    manifest: &Manifest,
    results: &[AnalysisResult],
    side: PackSide,
    options: &PackOptions,
) -> CheckResult<PackSummary> {
    let path = options.path_for(side).to_path_buf();
    let included: Vec<&AnalysisResult> = results
        .iter()
        .filter(|r| side.includes(r.category, options.include_optional))
        .collect();

    let index = rewrite_index(manifest, &included)?;

    // Categories by jar file name, for override jars.
    let categories: HashMap<&str, Category> = results
        .iter()
        .map(|r| (r.descriptor.filename.as_str(), r.category))
        .collect();

    let mut source = match manifest.archive_path() {
        Some(archive) => Some(ZipArchive::new(File::open(archive)?)?),
        None => None,
    };

    let mut overrides = Vec::new();
    let mut filtered = 0;
    if let Some(ref mut archive) = source {
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i)?;
            let name = entry.name().to_string();
            if !side.accepts_override(&name) {
                continue;
            }
            if let Some(category) = override_jar_category(&name, &categories)
                && !side.includes(category, options.include_optional)
            {
                filtered += 1;
                continue;
            }
            overrides.push(i);
        }
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| CheckError::output_write(parent, e))?;
    }

    options.emit(PackProgress::Started {
        side,
        total_entries: overrides.len() + 1,
    });

    let partial = partial_path(&path);
    let written = File::create(&partial)
        .map_err(|e| CheckError::output_write(&partial, e))
        .and_then(|file| write_archive(file, &index, source.as_mut(), &overrides, side, options))
        .and_then(|()| {
            std::fs::rename(&partial, &path).map_err(|e| CheckError::output_write(&path, e))
        });
    if let Err(e) = written {
        // Leave no truncated archive behind.
        let _ = std::fs::remove_file(&partial);
        return Err(e);
    }
    options.emit(PackProgress::Finished { side });

    tracing::info!(
        "{} pack: {} mods, {} override entries ({} filtered) -> {}",
        side,
        included.len(),
        overrides.len(),
        filtered,
        path.display()
    );

    Ok(PackSummary {
        side,
        path,
        mods: included.len(),
        overrides: overrides.len(),
        filtered,
    })
}

/// Write the rewritten index and the selected override entries into `file`.
fn write_archive(
    file: File,
    index: &Value,
    source: Option<&mut ZipArchive<File>>,
    overrides: &[usize],
    side: PackSide,
    options: &PackOptions,
) -> CheckResult<()> {
    let mut zip = ZipWriter::new(file);
    let zip_options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file(MRPACK_INDEX_FILE, zip_options)?;
    zip.write_all(serde_json::to_string_pretty(index)?.as_bytes())?;
    options.emit(PackProgress::EntryAdded {
        side,
        path: MRPACK_INDEX_FILE.to_string(),
        current: 1,
    });

    if let Some(archive) = source {
        for (n, &i) in overrides.iter().enumerate() {
            let entry = archive.by_index_raw(i)?;
            let name = entry.name().to_string();
            zip.raw_copy_file(entry)?;
            options.emit(PackProgress::EntryAdded {
                side,
                path: name,
                current: n + 2,
            });
        }
    }

    zip.finish()?;
    Ok(())
}

/// Sibling path the archive is written to before it is moved into place.
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

/// Manifest with all top-level metadata and only the entries of `included`,
/// copied verbatim in manifest order.
pub fn rewrite_index(manifest: &Manifest, included: &[&AnalysisResult]) -> CheckResult<Value> {
    let mut entries: Vec<&AnalysisResult> = included.to_vec();
    entries.sort_by_key(|r| r.descriptor.index);

    let mut root = manifest.metadata.clone();
    let files = entries
        .into_iter()
        .map(|r| r.descriptor.entry.clone())
        .collect();
    root.insert("files".to_string(), Value::Array(files));
    Ok(Value::Object(root))
}

/// Category of a jar stored under `<overrides>/mods/`, when it is a classified mod.
fn override_jar_category(name: &str, categories: &HashMap<&str, Category>) -> Option<Category> {
    let rest = [OVERRIDES_DIR, CLIENT_OVERRIDES_DIR, SERVER_OVERRIDES_DIR]
        .iter()
        .find_map(|dir| name.strip_prefix(dir))?;
    let file = rest.strip_prefix("mods/")?;
    if file.contains('/') || !file.ends_with(".jar") {
        return None;
    }
    categories.get(file).copied()
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl FromStr for PackTarget {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server" => Ok(PackTarget::Server),
            "client" => Ok(PackTarget::Client),
            "both" => Ok(PackTarget::Both),
            other => Err(CheckError::Generic(format!(
                "Unknown pack target '{}' (expected server, client or both)",
                other
            ))),
        }
    }
}

impl fmt::Display for PackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PackSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for PackOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackOptions")
            .field("server_path", &self.server_path)
            .field("client_path", &self.client_path)
            .field("include_optional", &self.include_optional)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::SideSupport;
    use crate::classify::Support::*;
    use crate::dispatch::SupportSource;
    use crate::manifest::{ManifestSource, load_manifest};
    use serde_json::json;
    use std::io::Read;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn index() -> Value {
        let file = |id: &str| {
            json!({
                "path": format!("mods/{id}.jar"),
                "hashes": { "sha1": format!("{id}-sha1") },
                "downloads": [format!("https://cdn.modrinth.com/data/{id}/versions/1/{id}.jar")],
                "fileSize": 1024
            })
        };
        json!({
            "formatVersion": 1,
            "game": "minecraft",
            "versionId": "1.2.0",
            "name": "Test Pack",
            "files": [file("sodium"), file("fabric-api"), file("iris"), file("ledger")],
            "dependencies": { "minecraft": "1.20.1", "fabric-loader": "0.15.0" }
        })
    }

    fn write_mrpack(dir: &Path) -> PathBuf {
        let path = dir.join("test.mrpack");
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        let opts = SimpleFileOptions::default();
        let entries: [(&str, &[u8]); 6] = [
            (MRPACK_INDEX_FILE, &[]),
            ("overrides/config/shared.toml", b"shared"),
            ("overrides/mods/sodium.jar", b"jar"),
            ("overrides/mods/custom.jar", b"custom"),
            ("client-overrides/options.txt", b"client"),
            ("server-overrides/server.properties", b"server"),
        ];
        for (name, body) in entries {
            zip.start_file(name, opts).unwrap();
            if name == MRPACK_INDEX_FILE {
                zip.write_all(index().to_string().as_bytes()).unwrap();
            } else {
                zip.write_all(body).unwrap();
            }
        }
        zip.finish().unwrap();
        path
    }

    fn analyse(manifest: &Manifest) -> Vec<AnalysisResult> {
        let sides = [
            SideSupport::new(Required, Unsupported),
            SideSupport::new(Required, Required),
            SideSupport::new(Required, Optional),
            SideSupport::new(Optional, Optional),
        ];
        manifest
            .mods
            .iter()
            .zip(sides)
            .map(|(d, s)| AnalysisResult::resolved(d.clone(), s, SupportSource::Registry))
            .collect()
    }

    fn options(dir: &Path) -> PackOptions {
        PackOptions {
            server_path: dir.join("out/server_pack.zip"),
            client_path: dir.join("out/client_pack.zip"),
            include_optional: false,
            on_progress: None,
        }
    }

    fn read_pack(path: &Path) -> (Value, Vec<String>) {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let names: Vec<String> = archive.file_names().map(String::from).collect();
        let mut content = String::new();
        archive
            .by_name(MRPACK_INDEX_FILE)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        (serde_json::from_str(&content).unwrap(), names)
    }

    fn file_paths(index: &Value) -> Vec<&str> {
        index["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["path"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn test_split_two_client_one_both() {
        let dir = TempDir::new().unwrap();
        let source = write_mrpack(dir.path());
        let mut manifest = load_manifest(&source).unwrap();
        let mut results = analyse(&manifest);
        // Keep sodium, fabric-api and iris: two client mods and one for both sides.
        manifest.mods.truncate(3);
        results.truncate(3);

        let opts = options(dir.path());
        let outcomes = build_packs(&manifest, &results, PackTarget::Both, &opts);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|(_, r)| r.is_ok()));

        let (server, _) = read_pack(&opts.server_path);
        assert_eq!(file_paths(&server), vec!["mods/fabric-api.jar"]);

        let (client, _) = read_pack(&opts.client_path);
        assert_eq!(
            file_paths(&client),
            vec!["mods/sodium.jar", "mods/fabric-api.jar", "mods/iris.jar"]
        );
    }

    #[test]
    fn test_index_keeps_metadata_and_entries_verbatim() {
        let dir = TempDir::new().unwrap();
        let source = write_mrpack(dir.path());
        let manifest = load_manifest(&source).unwrap();
        let results = analyse(&manifest);
        let opts = options(dir.path());

        build_pack(&manifest, &results, PackSide::Server, &opts).unwrap();
        let (server, _) = read_pack(&opts.server_path);

        assert_eq!(server["name"], "Test Pack");
        assert_eq!(server["versionId"], "1.2.0");
        assert_eq!(server["formatVersion"], 1);
        assert_eq!(server["dependencies"]["fabric-loader"], "0.15.0");
        assert_eq!(server["files"][0], index()["files"][1]);
    }

    #[test]
    fn test_override_routing() {
        let dir = TempDir::new().unwrap();
        let source = write_mrpack(dir.path());
        let manifest = load_manifest(&source).unwrap();
        let results = analyse(&manifest);
        let opts = options(dir.path());

        let server = build_pack(&manifest, &results, PackSide::Server, &opts).unwrap();
        let client = build_pack(&manifest, &results, PackSide::Client, &opts).unwrap();

        let (_, server_names) = read_pack(&opts.server_path);
        assert!(server_names.contains(&"overrides/config/shared.toml".to_string()));
        assert!(server_names.contains(&"overrides/mods/custom.jar".to_string()));
        assert!(server_names.contains(&"server-overrides/server.properties".to_string()));
        assert!(!server_names.contains(&"overrides/mods/sodium.jar".to_string()));
        assert!(!server_names.contains(&"client-overrides/options.txt".to_string()));
        assert_eq!(server.filtered, 1);

        let (_, client_names) = read_pack(&opts.client_path);
        assert!(client_names.contains(&"overrides/mods/sodium.jar".to_string()));
        assert!(client_names.contains(&"client-overrides/options.txt".to_string()));
        assert!(!client_names.contains(&"server-overrides/server.properties".to_string()));
        assert_eq!(client.overrides, 4);
        assert_eq!(client.filtered, 0);
    }

    #[test]
    fn test_optional_mods_only_when_enabled() {
        let dir = TempDir::new().unwrap();
        let source = write_mrpack(dir.path());
        let manifest = load_manifest(&source).unwrap();
        let results = analyse(&manifest);

        let mut opts = options(dir.path());
        let summary = build_pack(&manifest, &results, PackSide::Server, &opts).unwrap();
        assert_eq!(summary.mods, 1);

        opts.include_optional = true;
        let summary = build_pack(&manifest, &results, PackSide::Server, &opts).unwrap();
        assert_eq!(summary.mods, 2);
        let (server, _) = read_pack(&opts.server_path);
        assert_eq!(
            file_paths(&server),
            vec!["mods/fabric-api.jar", "mods/ledger.jar"]
        );
    }

    #[test]
    fn test_json_source_has_no_overrides() {
        let dir = TempDir::new().unwrap();
        let manifest = Manifest::from_value(
            index(),
            ManifestSource::Json(dir.path().join(MRPACK_INDEX_FILE)),
        )
        .unwrap();
        let results = analyse(&manifest);
        let opts = options(dir.path());

        let summary = build_pack(&manifest, &results, PackSide::Client, &opts).unwrap();
        assert_eq!(summary.overrides, 0);
        assert_eq!(summary.mods, 3);
        let (_, names) = read_pack(&opts.client_path);
        assert_eq!(names, vec![MRPACK_INDEX_FILE.to_string()]);
    }

    #[test]
    fn test_progress_events() {
        let dir = TempDir::new().unwrap();
        let source = write_mrpack(dir.path());
        let manifest = load_manifest(&source).unwrap();
        let results = analyse(&manifest);

        let events: Arc<Mutex<Vec<PackProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let opts = options(dir.path())
            .with_progress(Arc::new(move |e: PackProgress| sink.lock().unwrap().push(e)));
        build_pack(&manifest, &results, PackSide::Client, &opts).unwrap();

        let events = events.lock().unwrap();
        assert!(matches!(
            events.first(),
            Some(PackProgress::Started { total_entries: 5, .. })
        ));
        assert!(matches!(events.last(), Some(PackProgress::Finished { .. })));
    }

    #[test]
    fn test_failed_pack_leaves_no_partial_file() {
        let dir = TempDir::new().unwrap();
        let source = write_mrpack(dir.path());
        let manifest = load_manifest(&source).unwrap();
        let results = analyse(&manifest);
        let opts = options(dir.path());

        // A non-empty directory in place of the client pack cannot be replaced.
        std::fs::create_dir_all(opts.client_path.join("keep")).unwrap();

        let err = build_pack(&manifest, &results, PackSide::Client, &opts).unwrap_err();
        assert!(matches!(err, CheckError::OutputWrite { .. }));
        assert!(!partial_path(&opts.client_path).exists());
        assert!(opts.client_path.is_dir());

        build_pack(&manifest, &results, PackSide::Server, &opts).unwrap();
        assert!(opts.server_path.is_file());
        assert!(!partial_path(&opts.server_path).exists());
    }

    #[test]
    fn test_target_parse() {
        assert_eq!("Server".parse::<PackTarget>().unwrap(), PackTarget::Server);
        assert_eq!(PackTarget::Both.sides().len(), 2);
        assert!("desktop".parse::<PackTarget>().is_err());
    }
}
