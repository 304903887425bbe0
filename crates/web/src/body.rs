use bytes::Bytes;
use futures::StreamExt;
use futures::stream::LocalBoxStream;
use http_body::Body as HttpBody;
use http_body::{Frame, SizeHint};
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

const FILE_CHUNK_SIZE: usize = 8 * 1024;

/// Body of a response written by the server.
///
/// - `empty` / `once`: sent with `Content-Length`
/// - `file`: streamed from disk with the `Content-Length` taken from its metadata
/// - `stream`: sent chunked, one chunk per produced item
pub struct ResponseBody {
    inner: Kind,
}

enum Kind {
    Once(Option<Bytes>),
    File { reader: ReaderStream<File>, remaining: u64 },
    Stream(LocalBoxStream<'static, io::Result<Bytes>>),
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self { inner: Kind::Once(None) }
    }

    pub fn once(bytes: Bytes) -> Self {
        Self { inner: Kind::Once(Some(bytes)) }
    }

    /// Opens `path` for streaming.
    pub async fn file(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path).await?;
        let metadata = file.metadata().await?;
        if metadata.is_dir() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "path is a directory"));
        }
        let reader = ReaderStream::with_capacity(file, FILE_CHUNK_SIZE);
        Ok(Self { inner: Kind::File { reader, remaining: metadata.len() } })
    }

    pub fn stream(stream: LocalBoxStream<'static, io::Result<Bytes>>) -> Self {
        Self { inner: Kind::Stream(stream) }
    }
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Kind::Once(bytes) => f.debug_tuple("Once").field(bytes).finish(),
            Kind::File { remaining, .. } => f.debug_struct("File").field("remaining", remaining).finish_non_exhaustive(),
            Kind::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<String> for ResponseBody {
    fn from(value: String) -> Self {
        Self::once(Bytes::from(value))
    }
}

impl From<&'static str> for ResponseBody {
    fn from(value: &'static str) -> Self {
        if value.is_empty() { Self::empty() } else { Self::once(Bytes::from_static(value.as_bytes())) }
    }
}

impl HttpBody for ResponseBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match &mut self.get_mut().inner {
            Kind::Once(option_bytes) => Poll::Ready(option_bytes.take().map(|bytes| Ok(Frame::data(bytes)))),
            Kind::File { remaining: 0, .. } => Poll::Ready(None),
            Kind::File { reader, remaining } => match ready!(reader.poll_next_unpin(cx)) {
                Some(Ok(mut bytes)) => {
                    // the file may have grown since its length was announced
                    if bytes.len() as u64 > *remaining {
                        bytes.truncate(*remaining as usize);
                    }
                    *remaining -= bytes.len() as u64;
                    Poll::Ready(Some(Ok(Frame::data(bytes))))
                }
                Some(Err(e)) => Poll::Ready(Some(Err(e))),
                None => Poll::Ready(Some(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("file ended {remaining} bytes early"),
                )))),
            },
            Kind::Stream(stream) => stream.poll_next_unpin(cx).map(|item| item.map(|result| result.map(Frame::data))),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            Kind::Once(option_bytes) => option_bytes.is_none(),
            Kind::File { remaining, .. } => *remaining == 0,
            Kind::Stream(_) => false,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Kind::Once(None) => SizeHint::with_exact(0),
            Kind::Once(Some(bytes)) => SizeHint::with_exact(bytes.len() as u64),
            Kind::File { remaining, .. } => SizeHint::with_exact(*remaining),
            Kind::Stream(_) => SizeHint::default(),
        }
    }
}
