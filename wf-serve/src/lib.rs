//! REST server for the workflow engine (axum).
//!
//! Thin HTTP surface over the same `wf_core::Dispatcher` / `FileSessionStore`
//! the CLI uses: `POST /runs` starts a spec, `POST /runs/:id/resume`
//! continues a paused session, `GET /sessions[/:id]` lists or inspects
//! session metadata. No session state lives in this crate; it only
//! translates HTTP requests into dispatcher calls.
//!
//! **Public API**: [`run_serve`], [`run_serve_on_listener`].

mod app;
mod response;
mod run;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use wf_core::agent_runner::AgentRunner;
use wf_core::dispatcher::Dispatcher;
use wf_core::session::FileSessionStore;
use wf_providers::RuntimeClientFactory;

use app::{router, AppState};

const DEFAULT_ADDR: &str = "127.0.0.1:8081";

/// Runs the REST server on an existing listener (used by tests: bind to
/// `127.0.0.1:0`, then pass the listener so the bound port can be read back).
pub async fn run_serve_on_listener(
    listener: TcpListener,
    session_root: std::path::PathBuf,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!("workflow REST server listening on http://{}", addr);

    let runner = AgentRunner::new(Arc::new(RuntimeClientFactory::new()));
    let state = Arc::new(AppState {
        dispatcher: Dispatcher::new(runner),
        store: FileSessionStore::new(session_root),
    });

    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Runs the REST server, listening on `addr` (default `127.0.0.1:8081`) and
/// persisting sessions under `session_root`.
pub async fn run_serve(
    addr: Option<&str>,
    session_root: std::path::PathBuf,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_ADDR);
    let listener = TcpListener::bind(addr).await?;
    run_serve_on_listener(listener, session_root).await
}
