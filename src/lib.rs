//! # media-range
//!
//! Course video and attachment streaming with HTTP range responses for [`axum`][1].
//!
//! The core responder is generic and supports any body implementing the
//! [`RangeBody`] trait. Any type implementing both [`AsyncRead`] and
//! [`AsyncSeekStart`] can be used with the [`KnownSize`] adapter struct.
//! There is also special cased support for [`tokio::fs::File`], see the
//! [`KnownSize::file`] method.
//!
//! Only single ranges of the form `bytes=<start>-<end>` are honoured. An
//! omitted or over-long end is served through the last byte; anything else
//! that cannot be satisfied gets `416 Range Not Satisfiable`.
//!
//! [`VideoServer`] ties the responder to a [`MediaStore`], and
//! [`server::router`] exposes it over HTTP.
//!
//! ```
//! use axum::Router;
//! use axum::http::{HeaderMap, StatusCode, header};
//! use axum::routing::get;
//!
//! use media_range::Ranged;
//! use media_range::KnownSize;
//!
//! async fn file(headers: HeaderMap) -> Result<Ranged<KnownSize<tokio::fs::File>>, StatusCode> {
//!     let file = tokio::fs::File::open("document.txt").await.map_err(|_| StatusCode::NOT_FOUND)?;
//!     let body = KnownSize::file(file).await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
//!     let range = headers
//!         .get(header::RANGE)
//!         .and_then(|value| value.to_str().ok())
//!         .map(str::to_owned);
//!     Ok(Ranged::new(range, body, Some("text/plain".to_owned())))
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     // build our application with a single route
//!     let _app = Router::<()>::new().route("/", get(file));
//!
//!     // run it with hyper on localhost:3000
//!     #[cfg(feature = "run_server_in_example")]
//!     {
//!         let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!         axum::serve(listener, _app).await.unwrap();
//!     }
//! }
//! ```
//!
//! [1]: https://docs.rs/axum

pub mod catalog;
pub mod config;
mod error;
mod file;
mod range;
pub mod server;
mod stream;
mod video;

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::TypedHeader;
use axum_extra::headers::{AcceptRanges, ContentLength, ContentRange};
use tokio::io::{AsyncRead, AsyncSeek};
use tracing::debug;

pub use catalog::{DEFAULT_CONTENT_TYPE, MediaKind, MediaStore, MemoryCatalog, StoredMedia};
pub use config::ServerConfig;
pub use error::{MediaError, MediaResult};
pub use file::KnownSize;
pub use range::{ByteRange, InvalidRange};
pub use stream::RangedStream;
pub use video::{FileResponse, VideoServer};

/// [`AsyncSeek`] narrowed to only allow seeking from start.
pub trait AsyncSeekStart {
    /// Same semantics as [`AsyncSeek::start_seek`], always passing position as the `SeekFrom::Start` variant.
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()>;

    /// Same semantics as [`AsyncSeek::poll_complete`], returning `()` instead of the new stream position.
    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>>;
}

impl<T: AsyncSeek> AsyncSeekStart for T {
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()> {
        AsyncSeek::start_seek(self, io::SeekFrom::Start(position))
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncSeek::poll_complete(self, cx).map_ok(|_| ())
    }
}

/// An [`AsyncRead`] and [`AsyncSeekStart`] with a fixed known byte size.
pub trait RangeBody: AsyncRead + AsyncSeekStart {
    /// The total size of the underlying file.
    ///
    /// This should not change for the lifetime of the object once queried.
    /// Behaviour is not guaranteed if it does change.
    fn byte_size(&self) -> u64;
}

#[derive(Debug, Clone, PartialEq)]
/// The main responder type. Implements [`IntoResponse`].
pub struct Ranged<B: RangeBody + Send + 'static> {
    range: Option<String>,
    body: B,
    content_type: Option<String>,
}

impl<B: RangeBody + Send + 'static> Ranged<B> {
    /// Construct a ranged response over any type implementing [`RangeBody`]
    /// and an optional raw `Range` header value.
    pub fn new(range: Option<String>, body: B, content_type: Option<String>) -> Self {
        Ranged { range, body, content_type }
    }

    /// Responds to the request, returning headers and body as
    /// [`RangedResponse`]. Returns [`RangeNotSatisfiable`] error if requested
    /// range in header was not satisfiable.
    pub fn try_respond(self) -> Result<RangedResponse<B>, RangeNotSatisfiable> {
        let total_bytes = self.body.byte_size();
        let content_type = self.content_type
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_owned());

        let Some(header) = self.range else {
            // no range header, return the whole file
            let content_length = ContentLength(total_bytes);
            let stream = RangedStream::new(self.body, 0, total_bytes);
            return Ok(RangedResponse::Full { content_length, stream, content_type });
        };

        let range = ByteRange::parse(&header, total_bytes).map_err(|err| {
            debug!(%header, total_bytes, error = %err, "range not satisfiable");
            RangeNotSatisfiable(ContentRange::unsatisfied_bytes(total_bytes))
        })?;

        let content_range = ContentRange::bytes(range.start..=range.end, total_bytes)
            .map_err(|_| RangeNotSatisfiable(ContentRange::unsatisfied_bytes(total_bytes)))?;
        let content_length = ContentLength(range.len());
        let stream = RangedStream::new(self.body, range.start, range.len());

        debug!(start = range.start, end = range.end, total_bytes, "serving partial content");
        Ok(RangedResponse::Partial {
            content_range,
            content_length,
            stream,
            content_type,
        })
    }
}

impl<B: RangeBody + Send + 'static> IntoResponse for Ranged<B> {
    fn into_response(self) -> Response {
        self.try_respond().into_response()
    }
}

/// Error type indicating that the requested range was not satisfiable. Implements [`IntoResponse`].
#[derive(Debug, Clone)]
pub struct RangeNotSatisfiable(pub ContentRange);

impl IntoResponse for RangeNotSatisfiable {
    fn into_response(self) -> Response {
        let status = StatusCode::RANGE_NOT_SATISFIABLE;
        let header = TypedHeader(self.0);
        (status, header, ()).into_response()
    }
}

#[derive(Debug)]
/// Data type containing computed headers and body for a range response. Implements [`IntoResponse`].
pub enum RangedResponse<B> {
    /// Full content response, no range requested.
    Full {
        content_length: ContentLength,
        stream: RangedStream<B>,
        content_type: String,
    },
    /// A single satisfiable range.
    Partial {
        content_range: ContentRange,
        content_length: ContentLength,
        stream: RangedStream<B>,
        content_type: String,
    },
}

impl<B: RangeBody + Send + 'static> IntoResponse for RangedResponse<B> {
    fn into_response(self) -> Response {
        use RangedResponse::*;
        match self {
            Full { content_length, stream, content_type } => {
                let headers = [(header::CONTENT_TYPE, content_type_value(&content_type))];
                (
                    StatusCode::OK,
                    TypedHeader(AcceptRanges::bytes()),
                    TypedHeader(content_length),
                    headers,
                    stream,
                ).into_response()
            }
            Partial { content_range, content_length, stream, content_type } => {
                let headers = [(header::CONTENT_TYPE, content_type_value(&content_type))];
                (
                    StatusCode::PARTIAL_CONTENT,
                    TypedHeader(content_range),
                    TypedHeader(AcceptRanges::bytes()),
                    TypedHeader(content_length),
                    headers,
                    stream,
                ).into_response()
            }
        }
    }
}

fn content_type_value(content_type: &str) -> HeaderValue {
    HeaderValue::from_str(content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE))
}
