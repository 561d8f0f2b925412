//! Resolution of media ids to files on disk, and their view counters.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{MediaError, MediaResult};

/// Fallback when neither the manifest nor the file extension names a type.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// What a stored file is used for. Only videos accumulate views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Document,
}

/// A stored media file as known to the storage layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub id: String,
    pub path: PathBuf,
    /// Declared length. The length observed on disk at open time wins.
    pub length: u64,
    pub content_type: String,
    pub kind: MediaKind,
}

/// Storage collaborator consulted for every media request.
#[async_trait]
pub trait MediaStore: Send + Sync + 'static {
    /// Look up a media id, `Ok(None)` if it is unknown.
    async fn resolve(&self, id: &str) -> MediaResult<Option<StoredMedia>>;

    /// Atomically add one view to `id`, returning the new count.
    ///
    /// Concurrent increments must never be lost.
    async fn increment_views(&self, id: &str) -> MediaResult<u64>;

    /// Current view count of `id`, `Ok(None)` if it is unknown.
    async fn views(&self, id: &str) -> MediaResult<Option<u64>>;
}

/// One entry of a catalog manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    /// Absolute, or relative to the media root.
    pub path: PathBuf,
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
}

/// The JSON document listing every servable file.
///
/// ```json
/// { "media": [ { "id": "intro", "path": "videos/intro.mp4", "kind": "video" } ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub media: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn from_json(json: &str) -> MediaResult<Manifest> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a manifest file.
    pub async fn load(path: &Path) -> MediaResult<Manifest> {
        let json = tokio::fs::read_to_string(path).await?;
        Manifest::from_json(&json)
    }
}

#[derive(Debug)]
struct CatalogEntry {
    media: StoredMedia,
    views: AtomicU64,
}

/// In-process [`MediaStore`]. The set of entries is fixed once built;
/// only the per-entry view counters change afterwards.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, rejecting ids that are already present.
    pub fn insert(&mut self, media: StoredMedia) -> MediaResult<()> {
        if self.entries.contains_key(&media.id) {
            return Err(MediaError::config(format!("duplicate media id {:?}", media.id)));
        }
        let entry = CatalogEntry { media, views: AtomicU64::new(0) };
        self.entries.insert(entry.media.id.clone(), entry);
        Ok(())
    }

    /// Builds a catalog from a manifest, resolving relative paths against `root`.
    ///
    /// Missing content types are guessed from the file extension and
    /// missing lengths are read from disk when the file exists.
    pub async fn from_manifest(manifest: Manifest, root: &Path) -> MediaResult<MemoryCatalog> {
        let mut catalog = MemoryCatalog::new();
        for entry in manifest.media {
            let path = root.join(&entry.path);

            let content_type = entry.content_type.unwrap_or_else(|| {
                mime_guess::from_path(&path)
                    .first_raw()
                    .unwrap_or(DEFAULT_CONTENT_TYPE)
                    .to_owned()
            });

            let length = match entry.length {
                Some(length) => length,
                None => match tokio::fs::metadata(&path).await {
                    Ok(metadata) => metadata.len(),
                    Err(err) => {
                        warn!(id = %entry.id, path = %path.display(), error = %err, "media file is not readable");
                        0
                    }
                },
            };

            debug!(id = %entry.id, path = %path.display(), length, %content_type, "catalogued media");
            catalog.insert(StoredMedia {
                id: entry.id,
                path,
                length,
                content_type,
                kind: entry.kind,
            })?;
        }
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl MediaStore for MemoryCatalog {
    async fn resolve(&self, id: &str) -> MediaResult<Option<StoredMedia>> {
        Ok(self.entries.get(id).map(|entry| entry.media.clone()))
    }

    async fn increment_views(&self, id: &str) -> MediaResult<u64> {
        let entry = self.entries.get(id).ok_or_else(|| MediaError::not_found(id))?;
        Ok(entry.views.fetch_add(1, Ordering::Relaxed) + 1)
    }

    async fn views(&self, id: &str) -> MediaResult<Option<u64>> {
        Ok(self.entries.get(id).map(|entry| entry.views.load(Ordering::Relaxed)))
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use assert_matches::assert_matches;

    use crate::MediaError;
    use super::*;

    fn video(id: &str) -> StoredMedia {
        StoredMedia {
            id: id.to_owned(),
            path: PathBuf::from("/srv/media").join(format!("{id}.mp4")),
            length: 10,
            content_type: "video/mp4".to_owned(),
            kind: MediaKind::Video,
        }
    }

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::from_json(r#"{
            "media": [
                { "id": "intro", "path": "videos/intro.mp4", "kind": "video" },
                { "id": "syllabus", "path": "/docs/syllabus.pdf", "kind": "document",
                  "content_type": "application/pdf", "length": 2048 }
            ]
        }"#).unwrap();

        assert_eq!(2, manifest.media.len());
        assert_eq!(MediaKind::Video, manifest.media[0].kind);
        assert_eq!(None, manifest.media[0].content_type);
        assert_eq!(Some(2048), manifest.media[1].length);
    }

    #[test]
    fn test_bad_manifest() {
        assert_matches!(
            Manifest::from_json(r#"{ "media": [ { "id": "x", "path": "x", "kind": "podcast" } ] }"#),
            Err(MediaError::Manifest { .. })
        );
    }

    #[tokio::test]
    async fn test_from_manifest_fills_in_details() {
        let fixture_root = Path::new("test");
        let manifest = Manifest::from_json(r#"{
            "media": [
                { "id": "fixture", "path": "fixture.txt", "kind": "document" },
                { "id": "lecture", "path": "missing/lecture.mp4", "kind": "video" },
                { "id": "notes", "path": "/abs/notes.bin", "kind": "document",
                  "content_type": "text/markdown", "length": 77 }
            ]
        }"#).unwrap();

        let catalog = MemoryCatalog::from_manifest(manifest, fixture_root).await.unwrap();
        assert_eq!(3, catalog.len());

        let fixture = catalog.resolve("fixture").await.unwrap().unwrap();
        assert_eq!(Path::new("test/fixture.txt"), fixture.path);
        assert_eq!(54, fixture.length);
        assert_eq!("text/plain", fixture.content_type);

        let lecture = catalog.resolve("lecture").await.unwrap().unwrap();
        assert_eq!(0, lecture.length);
        assert_eq!("video/mp4", lecture.content_type);

        let notes = catalog.resolve("notes").await.unwrap().unwrap();
        assert_eq!(Path::new("/abs/notes.bin"), notes.path);
        assert_eq!("text/markdown", notes.content_type);
        assert_eq!(77, notes.length);

        assert_eq!(None, catalog.resolve("nope").await.unwrap());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut catalog = MemoryCatalog::new();
        catalog.insert(video("a")).unwrap();
        assert_matches!(catalog.insert(video("a")), Err(MediaError::Config { .. }));
    }

    #[tokio::test]
    async fn test_views_unknown_id() {
        let catalog = MemoryCatalog::new();
        assert_eq!(None, catalog.views("ghost").await.unwrap());
        assert_matches!(
            catalog.increment_views("ghost").await,
            Err(MediaError::NotFound { id }) if id == "ghost"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let mut catalog = MemoryCatalog::new();
        catalog.insert(video("a")).unwrap();
        let catalog = Arc::new(catalog);

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let catalog = Arc::clone(&catalog);
                tokio::spawn(async move {
                    for _ in 0..20 {
                        catalog.increment_views("a").await.unwrap();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(Some(1000), catalog.views("a").await.unwrap());
    }
}
