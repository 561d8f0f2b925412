//! The range-request video server: resolves media, opens it, and answers
//! with a full or partial response.

use std::io;
use std::sync::Arc;

use tokio::fs::File;
use tracing::{debug, warn};

use crate::catalog::{MediaKind, MediaStore, StoredMedia};
use crate::{KnownSize, MediaError, MediaResult, RangeBody, Ranged, RangedResponse};

/// Response type produced for media stored on the local filesystem.
pub type FileResponse = RangedResponse<KnownSize<File>>;

/// Serves stored media with partial-content support.
///
/// Each call opens its own file handle, so concurrent requests for the
/// same file never share a read cursor.
#[derive(Debug)]
pub struct VideoServer<S> {
    store: Arc<S>,
}

impl<S> Clone for VideoServer<S> {
    fn clone(&self) -> Self {
        VideoServer { store: Arc::clone(&self.store) }
    }
}

impl<S: MediaStore> VideoServer<S> {
    pub fn new(store: Arc<S>) -> Self {
        VideoServer { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Streams the video `id`, honouring an optional `Range` header value.
    ///
    /// Ids that are unknown, not videos, or missing on disk are
    /// [`MediaError::NotFound`]; unsatisfiable ranges are
    /// [`MediaError::InvalidRange`]. Every successful response records one
    /// view in the background.
    pub async fn handle(&self, id: &str, range: Option<String>) -> MediaResult<FileResponse> {
        let (media, body) = self.open(id, Some(MediaKind::Video)).await?;
        let response = respond(&media, range, body)?;
        self.record_view(id);
        Ok(response)
    }

    /// Streams any stored file without touching its view counter.
    pub async fn handle_file(&self, id: &str, range: Option<String>) -> MediaResult<FileResponse> {
        let (media, body) = self.open(id, None).await?;
        respond(&media, range, body)
    }

    /// Current view count of a video.
    pub async fn views(&self, id: &str) -> MediaResult<u64> {
        match self.store.resolve(id).await? {
            Some(media) if media.kind == MediaKind::Video => {}
            _ => return Err(MediaError::not_found(id)),
        }
        self.store.views(id).await?.ok_or_else(|| MediaError::not_found(id))
    }

    async fn open(&self, id: &str, kind: Option<MediaKind>) -> MediaResult<(StoredMedia, KnownSize<File>)> {
        let media = match self.store.resolve(id).await? {
            Some(media) if kind.is_none_or(|kind| kind == media.kind) => media,
            _ => return Err(MediaError::not_found(id)),
        };

        let file = match File::open(&media.path).await {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(%id, path = %media.path.display(), "media file missing on disk");
                return Err(MediaError::not_found(id));
            }
            Err(err) => return Err(err.into()),
        };

        // directories open fine on some platforms but cannot be streamed
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            warn!(%id, path = %media.path.display(), "media path is not a regular file");
            return Err(MediaError::not_found(id));
        }

        let body = KnownSize::sized(file, metadata.len());
        if body.byte_size() != media.length {
            warn!(
                %id,
                declared = media.length,
                actual = body.byte_size(),
                "declared media length differs from file on disk"
            );
        }

        Ok((media, body))
    }

    // The increment runs detached: it neither delays the response nor
    // reports back to it.
    fn record_view(&self, id: &str) {
        let store = Arc::clone(&self.store);
        let id = id.to_owned();
        tokio::spawn(async move {
            match store.increment_views(&id).await {
                Ok(views) => debug!(%id, views, "recorded view"),
                Err(err) => warn!(%id, error = %err, "failed to record view"),
            }
        });
    }
}

fn respond(media: &StoredMedia, range: Option<String>, body: KnownSize<File>) -> MediaResult<FileResponse> {
    let content_type = Some(media.content_type.clone());
    let response = Ranged::new(range, body, content_type).try_respond()?;
    Ok(response)
}
