//! Registry client for Modrinth project metadata.

use crate::classify::{SideSupport, Support};
use crate::config::Config;
use crate::constants::{DEFAULT_REGISTRY_URL, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::error::{CheckError, CheckResult};
use crate::manifest::ModDescriptor;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// API version prefix.
const API_PREFIX: &str = "/v2";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Resolves the side support of a mod.
///
/// Implemented by [`RegistryClient`]; the dispatcher only depends on this trait.
#[async_trait]
pub trait SideLookup: Send + Sync {
    /// Look up one mod. Errors are per-mod and never abort a run.
    async fn lookup(&self, descriptor: &ModDescriptor) -> CheckResult<SideSupport>;
}

/// Client for the Modrinth registry.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    /// Registry base URL.
    url: String,

    /// User agent sent with every request.
    user_agent: String,

    /// HTTP client.
    http: Client,
}

/// Side fields of a project, as returned by `GET /v2/project/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSides {
    /// Client support (`required`, `optional`, `unsupported`, `unknown`).
    #[serde(default)]
    pub client_side: Option<String>,
    /// Server support.
    #[serde(default)]
    pub server_side: Option<String>,
}

/// Enforces a minimum delay between consecutive requests of one worker.
///
/// Each worker owns its own throttle; there is no global rate limit.
#[derive(Debug)]
pub struct Throttle {
    delay: Duration,
    last: Option<Instant>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl RegistryClient {
    /// Create a client from the `api` section of the configuration.
    pub fn new(config: &Config) -> CheckResult<Self> {
        Self::build(
            &config.api.base_url,
            &config.api.user_agent,
            config.request_timeout(),
        )
    }

    /// Create a client with an explicit base URL, user agent, and timeout.
    pub fn build(url: &str, user_agent: &str, timeout: Duration) -> CheckResult<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
            http,
        })
    }

    /// Get the registry URL.
    pub fn registry_url(&self) -> &str {
        &self.url
    }

    /// Get the user agent.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Fetch the side fields of a project.
    pub async fn get_project(&self, project_id: &str) -> CheckResult<ProjectSides> {
        let url = format!(
            "{}{}/project/{}",
            self.url,
            API_PREFIX,
            urlencoding::encode(project_id)
        );

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| lookup_error(project_id, describe_request_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(lookup_error(project_id, format!("HTTP {}", status.as_u16())));
        }

        response
            .json::<ProjectSides>()
            .await
            .map_err(|e| lookup_error(project_id, format!("malformed response: {}", e)))
    }
}

impl ProjectSides {
    /// Convert the raw strings into a [`SideSupport`].
    pub fn support(&self) -> SideSupport {
        let parse = |v: &Option<String>| v.as_deref().map(Support::parse).unwrap_or_default();
        SideSupport::new(parse(&self.client_side), parse(&self.server_side))
    }
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Self { delay, last: None }
    }

    /// Wait until `delay` has passed since the previous call. The first call returns at once.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last {
            let ready = last + self.delay;
            if ready > Instant::now() {
                tokio::time::sleep_until(ready).await;
            }
        }
        self.last = Some(Instant::now());
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn lookup_error(id: &str, reason: impl Into<String>) -> CheckError {
    CheckError::RegistryLookup {
        id: id.to_string(),
        reason: reason.into(),
    }
}

fn describe_request_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for RegistryClient {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            http: Client::builder()
                .user_agent(DEFAULT_USER_AGENT)
                .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl SideLookup for RegistryClient {
    async fn lookup(&self, descriptor: &ModDescriptor) -> CheckResult<SideSupport> {
        let Some(project_id) = descriptor.project_id.as_deref() else {
            return Err(lookup_error(
                &descriptor.filename,
                "no project id in download URLs",
            ));
        };

        let sides = self.get_project(project_id).await?;
        tracing::debug!(
            "{} -> client={:?} server={:?}",
            project_id,
            sides.client_side,
            sides.server_side
        );
        Ok(sides.support())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{descriptor, spawn_registry};

    fn client(url: &str) -> RegistryClient {
        RegistryClient::build(url, "test-agent/1.0", Duration::from_secs(1)).unwrap()
    }

    #[tokio::test]
    async fn test_lookup_parses_sides() {
        let url = spawn_registry().await;
        let support = client(&url)
            .lookup(&descriptor(0, "sodium"))
            .await
            .unwrap();
        assert_eq!(
            support,
            SideSupport::new(Support::Required, Support::Unsupported)
        );
    }

    #[tokio::test]
    async fn test_lookup_sends_user_agent() {
        let url = spawn_registry().await;
        let support = client(&url)
            .lookup(&descriptor(0, "agent-check"))
            .await
            .unwrap();
        // The fake registry answers required/required only for the configured agent.
        assert_eq!(support, SideSupport::new(Support::Required, Support::Required));
    }

    #[tokio::test]
    async fn test_not_found_is_lookup_failure() {
        let url = spawn_registry().await;
        let err = client(&url)
            .lookup(&descriptor(0, "missing"))
            .await
            .unwrap_err();
        match err {
            CheckError::RegistryLookup { id, reason } => {
                assert_eq!(id, "missing");
                assert_eq!(reason, "HTTP 404");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_lookup_failure() {
        let url = spawn_registry().await;
        let err = client(&url)
            .lookup(&descriptor(0, "garbled"))
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_timeout_is_lookup_failure() {
        let url = spawn_registry().await;
        let err = client(&url)
            .lookup(&descriptor(0, "slow"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
    }

    #[tokio::test]
    async fn test_missing_fields_are_unknown() {
        let url = spawn_registry().await;
        let support = client(&url)
            .lookup(&descriptor(0, "bare"))
            .await
            .unwrap();
        assert_eq!(support, SideSupport::unknown());
    }

    #[tokio::test]
    async fn test_descriptor_without_id_fails_without_request() {
        let mut d = descriptor(0, "x");
        d.project_id = None;
        let err = client("http://127.0.0.1:9").lookup(&d).await.unwrap_err();
        assert!(err.to_string().contains("no project id"));
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let c = client("https://api.modrinth.com/");
        assert_eq!(c.registry_url(), "https://api.modrinth.com");
        assert_eq!(c.user_agent(), "test-agent/1.0");
    }

    #[tokio::test]
    async fn test_throttle_spaces_requests() {
        let mut throttle = Throttle::new(Duration::from_millis(60));
        let start = Instant::now();
        throttle.wait().await;
        assert!(start.elapsed() < Duration::from_millis(60));
        throttle.wait().await;
        throttle.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(120));
    }
}
