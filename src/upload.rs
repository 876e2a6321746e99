//! Recording upload: `POST /api/upload-recording`.
//!
//! Streams the request body to `<recordings>/<cameraId>/<filename>` and writes
//! a JSON metadata sidecar next to it. Independent of the signaling registry.

use axum::{
    body::Body,
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::error::UploadError;
use crate::server::AppState;

const UNKNOWN_CAMERA: &str = "unknown";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadQuery {
    pub camera_id: Option<String>,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub duration_seconds: Option<String>,
    pub filename: Option<String>,
}

/// Sidecar written as `<name>.json` beside the recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingMeta {
    pub camera_id: String,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub duration_seconds: Option<f64>,
    pub file: String,
    pub uploaded_at: String,
}

pub async fn upload_recording(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    body: Body,
) -> Result<Json<Value>, UploadError> {
    let camera_id = sanitize_camera_id(query.camera_id.as_deref());
    let filename = sanitize_filename(query.filename.as_deref(), Utc::now());

    let camera_dir = state.recordings_dir.join(&camera_id);
    if let Err(e) = fs::create_dir_all(&camera_dir).await {
        error!(dir = %camera_dir.display(), error = %e, "Recording mkdir failed");
        return Err(UploadError::Mkdir(e));
    }

    let video_path = camera_dir.join(&filename);
    if let Err(e) = write_body(&video_path, body).await {
        error!(path = %video_path.display(), error = %e, "Recording write failed");
        return Err(e);
    }

    let meta = RecordingMeta {
        camera_id: camera_id.clone(),
        started_at: non_empty(query.started_at),
        ended_at: non_empty(query.ended_at),
        duration_seconds: query
            .duration_seconds
            .as_deref()
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite()),
        file: filename.clone(),
        uploaded_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };
    let meta_path = sidecar_path(&video_path);
    if let Err(e) = write_sidecar(&meta_path, &meta).await {
        error!(path = %meta_path.display(), error = %e, "Failed to write recording metadata");
    }

    info!(camera = %camera_id, path = %video_path.display(), "Saved recording");
    Ok(Json(json!({ "ok": true, "file": filename })))
}

/// Keep `[A-Za-z0-9_-]`; anything that ends up empty becomes `unknown`.
pub fn sanitize_camera_id(raw: Option<&str>) -> String {
    let cleaned: String = raw
        .unwrap_or(UNKNOWN_CAMERA)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        UNKNOWN_CAMERA.to_string()
    } else {
        cleaned
    }
}

/// Keep `[A-Za-z0-9_.-]`. Empty or dot-only names fall back to
/// `rec-<unix millis>.webm`.
pub fn sanitize_filename(raw: Option<&str>, now: DateTime<Utc>) -> String {
    let cleaned: String = raw
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        format!("rec-{}.webm", now.timestamp_millis())
    } else {
        cleaned
    }
}

/// `clip.webm` -> `clip.json` (suffix matched case-insensitively);
/// other names get `.json` appended.
pub fn sidecar_path(video: &Path) -> PathBuf {
    let name = video
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = if name.to_ascii_lowercase().ends_with(".webm") {
        &name[..name.len() - ".webm".len()]
    } else {
        name.as_str()
    };
    video.with_file_name(format!("{stem}.json"))
}

/// Stream `body` into `path`. A truncated file is removed on failure.
async fn write_body(path: &Path, body: Body) -> Result<(), UploadError> {
    let mut file = fs::File::create(path).await.map_err(UploadError::Write)?;
    if let Err(e) = copy_body(&mut file, body).await {
        drop(file);
        if let Err(rm) = fs::remove_file(path).await {
            warn!(path = %path.display(), error = %rm, "Failed to remove partial recording");
        }
        return Err(e);
    }
    Ok(())
}

async fn copy_body(file: &mut fs::File, body: Body) -> Result<(), UploadError> {
    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(UploadError::Body)?;
        file.write_all(&chunk).await.map_err(UploadError::Write)?;
    }
    file.flush().await.map_err(UploadError::Write)
}

async fn write_sidecar(path: &Path, meta: &RecordingMeta) -> std::io::Result<()> {
    let text = serde_json::to_string_pretty(meta)?;
    fs::write(path, text).await
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
