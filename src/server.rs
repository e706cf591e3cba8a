use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use notify::{Event, RecursiveMode, Watcher};
use serde::Deserialize;
use tokio::sync::{RwLock, mpsc};
use tracing::{info, warn};

use bubble_layout::ArtifactLookup;
use bubble_layout::hit::{HitIndex, HitKind, HitPolicy};

/// One loaded artifact: the raw JSON plus a hit index per mode
struct Loaded {
    raw: String,
    indexes: BTreeMap<String, HitIndex>,
}

type SharedState = Arc<RwLock<Loaded>>;

fn load(path: &Path, policy: HitPolicy) -> anyhow::Result<Loaded> {
    let raw = fs::read_to_string(path)?;
    let artifact = ArtifactLookup::from_json(&raw)?;
    let indexes = artifact
        .mode_keys()
        .filter_map(|key| {
            let lookup = artifact.mode(key)?;
            Some((key.to_string(), HitIndex::new(lookup.records().to_vec(), policy)))
        })
        .collect();
    Ok(Loaded { raw, indexes })
}

#[derive(Debug, Deserialize)]
struct HitParams {
    x: f64,
    y: f64,
    #[serde(default = "default_kind")]
    kind: HitKind,
}

fn default_kind() -> HitKind {
    HitKind::Hover
}

async fn positions(State(state): State<SharedState>) -> Response {
    let loaded = state.read().await;
    ([(header::CONTENT_TYPE, "application/json")], loaded.raw.clone()).into_response()
}

async fn hit(
    State(state): State<SharedState>,
    UrlPath(mode): UrlPath<String>,
    Query(params): Query<HitParams>,
) -> Response {
    let loaded = state.read().await;
    match loaded.indexes.get(&mode) {
        Some(index) => Json(index.query(params.x, params.y, params.kind).copied()).into_response(),
        None => (StatusCode::NOT_FOUND, format!("unknown layout mode: {mode}")).into_response(),
    }
}

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/positions", get(positions))
        .route("/hit/{mode}", get(hit))
        .with_state(state)
}

/// Serve the artifact at `path`, reloading it whenever the file changes
pub async fn serve(path: &Path, port: u16, policy: HitPolicy) -> anyhow::Result<()> {
    let state: SharedState = Arc::new(RwLock::new(load(path, policy)?));

    // Create channel for file change notifications
    let (tx, mut rx) = mpsc::channel::<()>(1);

    let file_name = path.file_name().map(|name| name.to_os_string());
    let mut watcher = notify::recommended_watcher(move |res: Result<Event, _>| {
        if let Ok(event) = res {
            let ours = event
                .paths
                .iter()
                .any(|p| p.file_name() == file_name.as_deref());
            if ours && (event.kind.is_modify() || event.kind.is_create()) {
                let _ = tx.blocking_send(());
            }
        }
    })?;

    // Watch the artifact's parent directory so atomic replaces are seen too
    let watch_path = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    watcher.watch(&watch_path, RecursiveMode::NonRecursive)?;

    let reload_state = Arc::clone(&state);
    let reload_path = path.to_path_buf();
    tokio::spawn(async move {
        while rx.recv().await.is_some() {
            // Debounce: wait a bit for rapid changes to settle
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            while rx.try_recv().is_ok() {}

            match load(&reload_path, policy) {
                Ok(loaded) => {
                    *reload_state.write().await = loaded;
                    info!(path = %reload_path.display(), "Reloaded positions");
                }
                Err(e) => warn!(error = %e, "Keeping previous positions, reload failed"),
            }
        }
    });

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Serving positions at http://localhost:{port}/positions");
    info!("Watching {} for changes", path.display());

    // Keep watcher alive
    let _watcher = watcher;

    axum::serve(listener, router(state)).await?;

    Ok(())
}
