//! Client abstraction for talking to an inference engine.
//!
//! [`EngineClient`] is the four-operation boundary a diagnostic session
//! depends on. [`EngineBridge`] implements it either over an in-process
//! [`KnowledgeBase`] or over HTTP to a running `artdocd` server. The CLI
//! resolves which variant to use at startup, consulting [`discover_server`].

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kb::KnowledgeBase;
use crate::model::{self, ConclusionId, DiagnosisResult, SymptomId, VerificationResult};
use crate::paths::ArtdocPaths;

// ---------------------------------------------------------------------------
// Server discovery
// ---------------------------------------------------------------------------

/// What a running artdocd records in its PID file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub pid: u32,
    pub port: u16,
    pub bind: String,
}

impl ServerInfo {
    /// Record for this process serving on `bind:port`.
    pub fn current(bind: &str, port: u16) -> Self {
        Self {
            pid: std::process::id(),
            port,
            bind: bind.to_string(),
        }
    }

    /// Where clients should connect. A wildcard bind is reached over loopback.
    pub fn base_url(&self) -> String {
        let host = match self.bind.as_str() {
            "0.0.0.0" | "::" => "127.0.0.1",
            other => other,
        };
        format!("http://{host}:{}", self.port)
    }

    pub fn publish(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// `None` when the file is absent or not a server record.
    pub fn read(path: &Path) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    #[cfg(unix)]
    fn process_alive(&self) -> bool {
        let Ok(pid) = libc::pid_t::try_from(self.pid) else {
            return false;
        };
        // SAFETY: signal 0 performs the existence check without delivering anything.
        unsafe { libc::kill(pid, 0) == 0 }
    }

    #[cfg(not(unix))]
    fn process_alive(&self) -> bool {
        true
    }
}

/// Find a live artdocd through the PID file in `paths`.
///
/// A record whose process has exited is deleted. A live process must also
/// answer `GET /health` with status `ok`.
pub fn discover_server(paths: &ArtdocPaths) -> Option<ServerInfo> {
    let pid_file = paths.pid_file();
    let info = ServerInfo::read(&pid_file)?;

    if !info.process_alive() {
        tracing::debug!(pid = info.pid, "artdocd exited; removing its PID file");
        let _ = std::fs::remove_file(&pid_file);
        return None;
    }

    let health: HealthResponse = ureq::get(&format!("{}/health", info.base_url()))
        .timeout(Duration::from_secs(2))
        .call()
        .ok()?
        .into_json()
        .ok()?;
    (health.status == "ok").then_some(info)
}

pub fn remove_pid_file(paths: &ArtdocPaths) {
    let _ = std::fs::remove_file(paths.pid_file());
}

// ---------------------------------------------------------------------------
// Client error
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ClientError {
    #[error("engine unreachable: {message}")]
    #[diagnostic(code(artdoc::client::unavailable), help("Is artdocd running?"))]
    Unavailable { message: String },

    #[error("unexpected response from engine: {message}")]
    #[diagnostic(code(artdoc::client::malformed), help("Engine version mismatch?"))]
    Malformed { message: String },
}

impl From<model::ShapeError> for ClientError {
    fn from(e: model::ShapeError) -> Self {
        ClientError::Malformed { message: e.0 }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

// ---------------------------------------------------------------------------
// Wire types (shared between client & server)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisRequest {
    pub symptoms: Vec<SymptomId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub target: ConclusionId,
    pub symptoms: Vec<SymptomId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub rules: usize,
}

// ---------------------------------------------------------------------------
// EngineClient
// ---------------------------------------------------------------------------

/// The operations a diagnostic session needs from an inference engine.
///
/// Implementations must keep the engine's ordering of symptoms, conclusions,
/// fired rules and trace lines, and must report a response they cannot make
/// sense of as [`ClientError::Malformed`] rather than an empty result.
pub trait EngineClient: Send + Sync {
    fn list_symptoms(&self) -> impl Future<Output = ClientResult<Vec<SymptomId>>> + Send;

    fn list_conclusions(&self) -> impl Future<Output = ClientResult<Vec<ConclusionId>>> + Send;

    /// Forward chaining over `symptoms`. Order of `symptoms` carries no meaning.
    fn run_diagnosis(
        &self,
        symptoms: &[SymptomId],
    ) -> impl Future<Output = ClientResult<DiagnosisResult>> + Send;

    /// Backward chaining: is `target` supported by `symptoms`?
    fn run_verification(
        &self,
        target: &ConclusionId,
        symptoms: &[SymptomId],
    ) -> impl Future<Output = ClientResult<VerificationResult>> + Send;
}

impl<E: EngineClient> EngineClient for Arc<E> {
    fn list_symptoms(&self) -> impl Future<Output = ClientResult<Vec<SymptomId>>> + Send {
        (**self).list_symptoms()
    }

    fn list_conclusions(&self) -> impl Future<Output = ClientResult<Vec<ConclusionId>>> + Send {
        (**self).list_conclusions()
    }

    fn run_diagnosis(
        &self,
        symptoms: &[SymptomId],
    ) -> impl Future<Output = ClientResult<DiagnosisResult>> + Send {
        (**self).run_diagnosis(symptoms)
    }

    fn run_verification(
        &self,
        target: &ConclusionId,
        symptoms: &[SymptomId],
    ) -> impl Future<Output = ClientResult<VerificationResult>> + Send {
        (**self).run_verification(target, symptoms)
    }
}

// ---------------------------------------------------------------------------
// EngineBridge
// ---------------------------------------------------------------------------

/// Either an in-process knowledge base or a remote HTTP connection to artdocd.
pub enum EngineBridge {
    /// Direct access to a loaded rule base.
    Local(Arc<KnowledgeBase>),
    /// HTTP client to a running artdocd server.
    Remote { base_url: String, http: ureq::Agent },
}

impl EngineBridge {
    /// Connect to a server at `base_url` (e.g. `http://127.0.0.1:8300`).
    pub fn remote(base_url: &str, timeout: Duration) -> Self {
        EngineBridge::Remote {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    /// Wrap a local knowledge base.
    pub fn local(kb: Arc<KnowledgeBase>) -> Self {
        EngineBridge::Local(kb)
    }

    /// Short human-readable description of where the engine lives.
    pub fn describe(&self) -> String {
        match self {
            EngineBridge::Local(kb) => format!("local knowledge base ({} rules)", kb.rules().len()),
            EngineBridge::Remote { base_url, .. } => format!("artdocd at {base_url}"),
        }
    }
}

async fn get_json(base_url: &str, http: &ureq::Agent, path: &str) -> ClientResult<serde_json::Value> {
    let url = format!("{base_url}{path}");
    let http = http.clone();
    tracing::debug!(%url, "GET");
    blocking(move || read_json(http.get(&url).call())).await
}

async fn post_json<B: Serialize>(
    base_url: &str,
    http: &ureq::Agent,
    path: &str,
    body: &B,
) -> ClientResult<serde_json::Value> {
    let url = format!("{base_url}{path}");
    let http = http.clone();
    let body = serde_json::to_value(body).map_err(|e| ClientError::Malformed {
        message: format!("failed to encode request: {e}"),
    })?;
    tracing::debug!(%url, "POST");
    blocking(move || read_json(http.post(&url).send_json(body))).await
}

/// Run a blocking ureq call off the async executor.
async fn blocking<F>(call: F) -> ClientResult<serde_json::Value>
where
    F: FnOnce() -> ClientResult<serde_json::Value> + Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| ClientError::Unavailable {
            message: format!("bridge task failed: {e}"),
        })?
}

fn read_json(resp: Result<ureq::Response, ureq::Error>) -> ClientResult<serde_json::Value> {
    let resp = match resp {
        Ok(resp) => resp,
        Err(ureq::Error::Status(code, resp)) => {
            let body = resp.into_string().unwrap_or_default();
            return Err(ClientError::Malformed {
                message: format!("engine answered HTTP {code}: {body}"),
            });
        }
        Err(ureq::Error::Transport(t)) => {
            return Err(ClientError::Unavailable {
                message: t.to_string(),
            });
        }
    };
    let text = resp.into_string().map_err(|e| ClientError::Unavailable {
        message: format!("failed to read response body: {e}"),
    })?;
    serde_json::from_str(&text).map_err(|e| ClientError::Malformed {
        message: format!("failed to parse JSON: {e}"),
    })
}

impl EngineClient for EngineBridge {
    async fn list_symptoms(&self) -> ClientResult<Vec<SymptomId>> {
        match self {
            EngineBridge::Local(kb) => Ok(kb.observable_symptoms()),
            EngineBridge::Remote { base_url, http } => {
                let value = get_json(base_url, http, "/symptoms").await?;
                Ok(model::ids_from_wire(&value, "symptoms")?)
            }
        }
    }

    async fn list_conclusions(&self) -> ClientResult<Vec<ConclusionId>> {
        match self {
            EngineBridge::Local(kb) => Ok(kb.conclusions()),
            EngineBridge::Remote { base_url, http } => {
                let value = get_json(base_url, http, "/conclusions").await?;
                Ok(model::ids_from_wire(&value, "conclusions")?)
            }
        }
    }

    async fn run_diagnosis(&self, symptoms: &[SymptomId]) -> ClientResult<DiagnosisResult> {
        match self {
            EngineBridge::Local(kb) => Ok(DiagnosisResult {
                fired_rules: kb.forward_chain(symptoms).fired_rules,
            }),
            EngineBridge::Remote { base_url, http } => {
                let req = DiagnosisRequest {
                    symptoms: symptoms.to_vec(),
                };
                let value = post_json(base_url, http, "/diagnosis", &req).await?;
                Ok(DiagnosisResult::from_wire(&value)?)
            }
        }
    }

    async fn run_verification(
        &self,
        target: &ConclusionId,
        symptoms: &[SymptomId],
    ) -> ClientResult<VerificationResult> {
        match self {
            EngineBridge::Local(kb) => Ok(kb.backward_verify(target, symptoms)),
            EngineBridge::Remote { base_url, http } => {
                let req = VerificationRequest {
                    target: target.clone(),
                    symptoms: symptoms.to_vec(),
                };
                let value = post_json(base_url, http, "/verification", &req).await?;
                Ok(VerificationResult::from_wire(&value)?)
            }
        }
    }
}
