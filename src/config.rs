//! Server configuration, read from command line flags or the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Name of the manifest looked up in the media root when none is given.
pub const DEFAULT_MANIFEST_NAME: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "media-range")]
#[command(about = "Serve course videos and attachments with HTTP range support")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "MEDIA_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Directory holding the media files; created at startup if missing
    #[arg(long, env = "MEDIA_ROOT", default_value = "media")]
    pub media_root: PathBuf,

    /// Catalog manifest, defaults to `manifest.json` inside the media root
    #[arg(long, env = "MEDIA_MANIFEST")]
    pub manifest: Option<PathBuf>,
}

impl ServerConfig {
    pub fn manifest_path(&self) -> PathBuf {
        self.manifest
            .clone()
            .unwrap_or_else(|| self.media_root.join(DEFAULT_MANIFEST_NAME))
    }
}
