//! Shared test fixtures: descriptors, an in-memory lookup, and a fake registry server.

use crate::classify::{SideSupport, Support};
use crate::error::{CheckError, CheckResult};
use crate::manifest::ModDescriptor;
use crate::registry::SideLookup;
use async_trait::async_trait;
use axum::Router;
use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// In-memory [`SideLookup`] keyed by project id. Unlisted ids fail like a 404.
#[derive(Default)]
pub struct FakeLookup {
    sides: HashMap<String, SideSupport>,
    delay: Duration,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl FakeLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, client: Support, server: Support) -> Self {
        self.sides
            .insert(id.to_string(), SideSupport::new(client, server));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SideLookup for FakeLookup {
    async fn lookup(&self, descriptor: &ModDescriptor) -> CheckResult<SideSupport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let id = descriptor.label().to_string();
        self.seen.lock().unwrap().push(id.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.sides
            .get(&id)
            .copied()
            .ok_or(CheckError::RegistryLookup {
                id,
                reason: "HTTP 404".into(),
            })
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Descriptor for a Modrinth-hosted mod whose project id is `id`.
pub fn descriptor(index: usize, id: &str) -> ModDescriptor {
    let path = format!("mods/{}.jar", id);
    let url = format!("https://cdn.modrinth.com/data/{}/versions/1/{}.jar", id, id);
    ModDescriptor {
        index,
        project_id: Some(id.to_string()),
        filename: format!("{}.jar", id),
        path: path.clone(),
        downloads: vec![url.clone()],
        hints: None,
        entry: json!({ "path": path, "downloads": [url] }),
    }
}

/// Descriptors for `ids`, indexed in order.
pub fn descriptors(ids: &[&str]) -> Vec<ModDescriptor> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| descriptor(i, id))
        .collect()
}

/// Write a bare `modrinth.index.json` listing one mod per id into `dir`.
pub fn write_index(dir: &std::path::Path, ids: &[&str]) -> std::path::PathBuf {
    let files: Vec<_> = descriptors(ids).into_iter().map(|d| d.entry).collect();
    let index = json!({
        "formatVersion": 1,
        "game": "minecraft",
        "versionId": "1.0.0",
        "name": "Fixture Pack",
        "files": files,
        "dependencies": { "minecraft": "1.20.1" }
    });
    let path = dir.join("modrinth.index.json");
    std::fs::write(&path, index.to_string()).unwrap();
    path
}

/// Start a fake registry on an ephemeral port and return its base URL.
///
/// Responses by project id: `missing` is a 404, `garbled` is not JSON, `slow`
/// answers after three seconds, `bare` has no side fields, `agent-check` answers
/// required/required only for the `test-agent/1.0` user agent. Ids starting with
/// `server-`, `both-` or `optional-` get the matching sides; anything else is a
/// client-only mod.
pub async fn spawn_registry() -> String {
    let app = Router::new().route("/v2/project/{id}", get(project));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn project(Path(id): Path<String>, headers: HeaderMap) -> Response {
    let sides = |client: &str, server: &str| {
        axum::Json(json!({ "id": id, "client_side": client, "server_side": server }))
            .into_response()
    };

    match id.as_str() {
        "missing" => StatusCode::NOT_FOUND.into_response(),
        "garbled" => (StatusCode::OK, "<html>not json</html>").into_response(),
        "bare" => axum::Json(json!({ "id": "bare" })).into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            sides("required", "required")
        }
        "agent-check" => {
            let agent = headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if agent == "test-agent/1.0" {
                sides("required", "required")
            } else {
                sides("unsupported", "unsupported")
            }
        }
        other if other.starts_with("server-") => sides("unsupported", "required"),
        other if other.starts_with("both-") => sides("required", "required"),
        other if other.starts_with("optional-") => sides("optional", "optional"),
        _ => sides("required", "unsupported"),
    }
}
