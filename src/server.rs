//! HTTP routes and the server entry point.

use std::io;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::{Manifest, MediaStore, MemoryCatalog};
use crate::{MediaError, MediaResult, ServerConfig, VideoServer};

/// Body of `GET /videos/{id}/views`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewCount {
    pub id: String,
    pub views: u64,
}

/// Builds the media routes:
///
/// - `GET /videos/stream/{id}` streams a video and counts a view
/// - `GET /files/{id}` streams any stored file
/// - `GET /videos/{id}/views` reports a video's view count
pub fn router<S: MediaStore>(videos: VideoServer<S>) -> Router {
    Router::new()
        .route("/videos/stream/{id}", get(stream_video::<S>))
        .route("/videos/{id}/views", get(video_views::<S>))
        .route("/files/{id}", get(stream_file::<S>))
        .with_state(Arc::new(videos))
}

async fn stream_video<S: MediaStore>(
    State(videos): State<Arc<VideoServer<S>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let range = range_header(&headers);
    let response = videos.handle(&id, range.clone()).await.into_response();
    debug!(%id, ?range, status = %response.status(), "video request");
    response
}

async fn stream_file<S: MediaStore>(
    State(videos): State<Arc<VideoServer<S>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let range = range_header(&headers);
    let response = videos.handle_file(&id, range.clone()).await.into_response();
    debug!(%id, ?range, status = %response.status(), "file request");
    response
}

async fn video_views<S: MediaStore>(
    State(videos): State<Arc<VideoServer<S>>>,
    Path(id): Path<String>,
) -> MediaResult<Json<ViewCount>> {
    let views = videos.views(&id).await?;
    Ok(Json(ViewCount { id, views }))
}

// A value that is not visible ASCII cannot be a byte range; passing it on
// lossily makes it fail range parsing and answer 416.
fn range_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::RANGE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

/// Prepares the media root, loads the catalog and serves until the listener fails.
pub async fn run(config: ServerConfig) -> MediaResult<()> {
    let media_root = prepare_media_root(&config.media_root).await?;

    let manifest_path = config.manifest_path();
    let manifest = match Manifest::load(&manifest_path).await {
        Ok(manifest) => manifest,
        Err(MediaError::Io { source }) if source.kind() == io::ErrorKind::NotFound => {
            warn!(path = %manifest_path.display(), "no manifest found, serving an empty catalog");
            Manifest::default()
        }
        Err(err) => return Err(err),
    };

    let catalog = MemoryCatalog::from_manifest(manifest, &media_root).await?;
    info!(
        entries = catalog.len(),
        root = %media_root.display(),
        "media catalog loaded"
    );

    let app = router(VideoServer::new(Arc::new(catalog)));
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Creates the media root if needed and returns its absolute form, so
/// catalogued paths never depend on the working directory.
pub async fn prepare_media_root(root: &FsPath) -> MediaResult<PathBuf> {
    tokio::fs::create_dir_all(root).await?;
    Ok(tokio::fs::canonicalize(root).await?)
}
