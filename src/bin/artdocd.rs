//! artdocd: HTTP bridge to an artdoc rule base.
//!
//! Serves one knowledge base to any number of `artdoc` clients:
//!
//! - `GET  /health`: server status
//! - `GET  /symptoms`: observable symptoms, sorted
//! - `GET  /conclusions`: verifiable conclusions, sorted
//! - `POST /diagnosis`: forward chaining: `{symptoms}` → `{fired_rules, known_facts}`
//! - `POST /verification`: backward chaining: `{target, symptoms}` → `{success, trace}`
//!
//! Build and run: `cargo run --features server --bin artdocd`

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use miette::{IntoDiagnostic, Result};
use tower_http::cors::CorsLayer;

use artdoc::client::{DiagnosisRequest, HealthResponse, ServerInfo, VerificationRequest};
use artdoc::config::ArtdocConfig;
use artdoc::error::ArtdocResult;
use artdoc::kb::{ForwardChain, KnowledgeBase};
use artdoc::model::{ConclusionId, SymptomId, VerificationResult};
use artdoc::paths::ArtdocPaths;

type ServerState = Arc<KnowledgeBase>;

// ── Handlers ──────────────────────────────────────────────────────────────

async fn health(State(kb): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        rules: kb.rules().len(),
    })
}

async fn list_symptoms(State(kb): State<ServerState>) -> Json<Vec<SymptomId>> {
    Json(kb.observable_symptoms())
}

async fn list_conclusions(State(kb): State<ServerState>) -> Json<Vec<ConclusionId>> {
    Json(kb.conclusions())
}

async fn diagnosis(
    State(kb): State<ServerState>,
    Json(req): Json<DiagnosisRequest>,
) -> Json<ForwardChain> {
    tracing::debug!(symptoms = req.symptoms.len(), "diagnosis request");
    Json(kb.forward_chain(&req.symptoms))
}

async fn verification(
    State(kb): State<ServerState>,
    Json(req): Json<VerificationRequest>,
) -> Json<VerificationResult> {
    tracing::debug!(target = %req.target, symptoms = req.symptoms.len(), "verification request");
    Json(kb.backward_verify(&req.target, &req.symptoms))
}

// ── Main ──────────────────────────────────────────────────────────────────

fn knowledge_base_path(paths: &ArtdocPaths, config: &ArtdocConfig) -> PathBuf {
    if let Some(path) = std::env::var_os("ARTDOC_KNOWLEDGE_BASE") {
        return PathBuf::from(path);
    }
    if let Some(path) = &config.knowledge_base {
        return path.clone();
    }
    let installed = paths.default_knowledge_base();
    if installed.exists() {
        installed
    } else {
        PathBuf::from("datasets/knowledge_base.csv")
    }
}

/// Create the XDG directories and read the config.
fn prepare() -> ArtdocResult<(ArtdocPaths, ArtdocConfig)> {
    let paths = ArtdocPaths::resolve()?;
    paths.ensure_dirs()?;
    let config = ArtdocConfig::load_or_default(&paths.config_file())?;
    Ok((paths, config))
}

#[tokio::main]
async fn main() -> Result<()> {
    let (paths, config) = prepare()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .init();

    let bind = std::env::var("ARTDOC_SERVER_BIND").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = match std::env::var("ARTDOC_SERVER_PORT") {
        Ok(p) => p
            .parse()
            .map_err(|_| miette::miette!("ARTDOC_SERVER_PORT must be a valid port, got {p:?}"))?,
        Err(_) => 8300,
    };
    let addr = format!("{bind}:{port}");

    let kb = Arc::new(KnowledgeBase::load(&knowledge_base_path(&paths, &config))?);

    let app = Router::new()
        .route("/health", get(health))
        .route("/symptoms", get(list_symptoms))
        .route("/conclusions", get(list_conclusions))
        .route("/diagnosis", post(diagnosis))
        .route("/verification", post(verification))
        .layer(CorsLayer::permissive())
        .with_state(kb);

    let listener = tokio::net::TcpListener::bind(&addr).await.into_diagnostic()?;
    tracing::info!("artdocd listening on {addr}");

    // Write PID file so `artdoc` can discover this server.
    if let Err(e) = ServerInfo::current(&bind, port).publish(&paths.pid_file()) {
        tracing::warn!("failed to write PID file: {e}");
    }

    let paths_for_shutdown = paths.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let ctrl_c = tokio::signal::ctrl_c();
            #[cfg(unix)]
            {
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        tokio::select! {
                            _ = ctrl_c => {},
                            _ = sigterm.recv() => {},
                        }
                    }
                    Err(_) => {
                        ctrl_c.await.ok();
                    }
                }
            }
            #[cfg(not(unix))]
            {
                ctrl_c.await.ok();
            }
            tracing::info!("artdocd shutting down");
            artdoc::client::remove_pid_file(&paths_for_shutdown);
        })
        .await;

    artdoc::client::remove_pid_file(&paths);
    served.into_diagnostic()
}
