use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    response::Json,
    routing::{get, post},
    Router,
};
use deck_proto::library::{sanitize_filename, SongList};
use deck_proto::state::PlaybackSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::bridge::CommandBridge;
use crate::supervisor::Supervisor;

/// Uploaded tracks can be far larger than axum's default body limit.
const UPLOAD_LIMIT_BYTES: usize = 200 * 1024 * 1024;

#[derive(Clone)]
pub struct HttpState {
    pub supervisor: Arc<Supervisor>,
    pub bridge: CommandBridge,
    pub songs: Arc<SongList>,
    pub music_dir: PathBuf,
}

#[derive(Deserialize)]
struct SendRequest {
    #[serde(default)]
    command: Value,
}

#[derive(Serialize)]
struct OutputResponse {
    lines: Vec<String>,
    current_song: String,
    backend_alive: bool,
}

#[derive(Serialize)]
struct StatusResponse {
    alive: bool,
    pid: Option<u32>,
    songs: Vec<String>,
    #[serde(flatten)]
    playback: PlaybackSnapshot,
}

#[derive(Deserialize)]
struct DeleteRequest {
    #[serde(default)]
    filename: String,
    #[serde(default)]
    id: Value,
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/send", post(send_command))
        .route("/output", get(get_output))
        .route("/status", get(get_status))
        .route("/upload", post(upload_file))
        .route("/delete", post(delete_song))
        .route("/restart", post(restart_backend))
        .nest_service("/static/music", ServeDir::new(&state.music_dir))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn start_server(
    bind_address: String,
    port: u16,
    state: HttpState,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(state);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP control surface listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn send_command(
    State(state): State<HttpState>,
    Json(req): Json<SendRequest>,
) -> Json<Value> {
    // The UI sends either a bare opcode number or a string.
    let text = match req.command {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    };

    match state.bridge.send_text(&text).await {
        Ok(cmd) => {
            info!("HTTP API: sent {:?}", cmd);
            Json(json!({ "status": "sent", "cmd": cmd }))
        }
        Err(e) => Json(json!({ "status": "error", "msg": e.user_message() })),
    }
}

async fn get_output(State(state): State<HttpState>) -> Json<OutputResponse> {
    let batch = state.supervisor.drain_output().await;
    Json(OutputResponse {
        lines: batch.lines,
        current_song: batch.current_track,
        backend_alive: state.supervisor.is_alive().await,
    })
}

async fn get_status(State(state): State<HttpState>) -> Json<StatusResponse> {
    let alive = state.supervisor.is_alive().await;
    let songs = state.songs.read_songs().await.unwrap_or_else(|e| {
        error!("Failed to read song list: {}", e);
        Vec::new()
    });
    Json(StatusResponse {
        alive,
        pid: state.supervisor.pid().await,
        songs,
        playback: state.supervisor.state().snapshot().await,
    })
}

async fn restart_backend(State(state): State<HttpState>) -> Json<Value> {
    info!("HTTP API: restart backend");
    match state.supervisor.restart().await {
        Ok(()) => Json(json!({ "status": "restarted" })),
        Err(e) => Json(json!({ "status": "error", "msg": e.to_string() })),
    }
}

async fn upload_file(State(state): State<HttpState>, mut multipart: Multipart) -> Json<Value> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Json(json!({ "error": "No file part" })),
            Err(e) => {
                warn!("Upload: malformed multipart body: {}", e);
                return Json(json!({ "error": e.body_text() }));
            }
        };
        if field.name() != Some("file") {
            continue;
        }

        let Some(filename) = field.file_name().and_then(sanitize_filename) else {
            return Json(json!({ "error": "No selected file" }));
        };
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => {
                warn!("Upload of {:?} interrupted: {}", filename, e);
                return Json(json!({ "error": e.body_text() }));
            }
        };

        if let Err(e) = store_upload(&state, &filename, &data).await {
            error!("Failed to store upload {:?}: {}", filename, e);
            return Json(json!({ "error": format!("Failed to store file: {}", e) }));
        }
        info!("Stored upload {:?} ({} bytes)", filename, data.len());

        // The file is in the library either way; a dead backend picks it up
        // when it next starts.
        if let Err(e) = state.bridge.reload().await {
            warn!("Upload {:?}: backend reload not sent: {}", filename, e);
        }

        return Json(json!({ "success": true, "filename": filename }));
    }
}

async fn store_upload(state: &HttpState, filename: &str, data: &[u8]) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&state.music_dir).await?;
    tokio::fs::write(state.music_dir.join(filename), data).await?;
    state.songs.append_song(filename).await?;
    Ok(())
}

async fn delete_song(
    State(state): State<HttpState>,
    Json(req): Json<DeleteRequest>,
) -> Json<Value> {
    info!("HTTP API: delete {:?} (id {})", req.filename, req.id);

    match sanitize_filename(&req.filename) {
        Some(filename) => {
            let path = state.music_dir.join(&filename);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => info!("Deleted {:?}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => error!("Delete error for {:?}: {}", path, e),
            }
            if let Err(e) = state.songs.remove_song(&filename).await {
                error!("Error updating song list: {}", e);
            }
        }
        None => warn!("Delete: unusable filename {:?}", req.filename),
    }

    match parse_track_id(&req.id) {
        Some(id) => {
            if let Err(e) = state.bridge.delete(id).await {
                warn!("Delete: track {} not removed from backend: {}", id, e);
            }
        }
        None => warn!("Delete: no usable track id in {}", req.id),
    }

    Json(json!({ "success": true }))
}

fn parse_track_id(id: &Value) -> Option<u32> {
    match id {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
