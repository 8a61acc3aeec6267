//! Object bodies.
//!
//! Uploads accept three input shapes ([`UploadBody`]) and downloads hand back
//! exactly one output shape ([`ObjectBody`]), whatever the backend produced.
//! [`BodySource`] names the producer shapes a backend may surface.

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::io::{AsyncRead, AsyncReadExt};
use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Read size used when turning an async reader into chunks.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Data handed to `upload`.
pub enum UploadBody {
    /// In-memory buffer.
    Bytes(Bytes),
    /// Readable stream of chunks.
    Stream(BoxStream<'static, io::Result<Bytes>>),
    /// Handle to a binary large object on local disk, read lazily.
    Blob(PathBuf),
}

impl UploadBody {
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        UploadBody::Stream(Box::pin(stream))
    }

    pub fn blob(path: impl Into<PathBuf>) -> Self {
        UploadBody::Blob(path.into())
    }

    /// Length if known without reading the body.
    pub fn known_len(&self) -> Option<u64> {
        match self {
            UploadBody::Bytes(b) => Some(b.len() as u64),
            _ => None,
        }
    }

    /// Drain the body into one contiguous buffer.
    ///
    /// No size cap is applied: a stream is held fully in memory before it
    /// is sent.
    pub async fn into_bytes(self) -> io::Result<Bytes> {
        match self {
            UploadBody::Bytes(b) => Ok(b),
            UploadBody::Stream(stream) => {
                let buf = stream
                    .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                        acc.extend_from_slice(&chunk);
                        Ok(acc)
                    })
                    .await?;
                Ok(buf.freeze())
            }
            UploadBody::Blob(path) => Ok(Bytes::from(async_fs::read(&path).await?)),
        }
    }

    /// Turn the body into a chunk stream without buffering it.
    pub async fn into_chunks(self) -> io::Result<BoxStream<'static, io::Result<Bytes>>> {
        match self {
            UploadBody::Bytes(b) => Ok(stream::once(async move { Ok(b) }).boxed()),
            UploadBody::Stream(stream) => Ok(stream),
            UploadBody::Blob(path) => {
                let file = async_fs::File::open(&path).await?;
                Ok(reader_chunks(file))
            }
        }
    }
}

impl fmt::Debug for UploadBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadBody::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            UploadBody::Stream(_) => f.write_str("Stream(..)"),
            UploadBody::Blob(path) => f.debug_tuple("Blob").field(path).finish(),
        }
    }
}

impl From<Bytes> for UploadBody {
    fn from(b: Bytes) -> Self {
        UploadBody::Bytes(b)
    }
}

impl From<Vec<u8>> for UploadBody {
    fn from(v: Vec<u8>) -> Self {
        UploadBody::Bytes(Bytes::from(v))
    }
}

impl From<String> for UploadBody {
    fn from(s: String) -> Self {
        UploadBody::Bytes(Bytes::from(s))
    }
}

impl From<&'static str> for UploadBody {
    fn from(s: &'static str) -> Self {
        UploadBody::Bytes(Bytes::from_static(s.as_bytes()))
    }
}

impl From<&'static [u8]> for UploadBody {
    fn from(s: &'static [u8]) -> Self {
        UploadBody::Bytes(Bytes::from_static(s))
    }
}

/// Shapes in which a backend may surface a response body.
pub enum BodySource {
    /// Already a chunk stream.
    Stream(BoxStream<'static, io::Result<Bytes>>),
    /// An OpenDAL reader; converted through its own byte-stream method.
    Reader(opendal::Reader),
    /// Any async reader; drained chunk by chunk.
    Read(Box<dyn AsyncRead + Send + Unpin>),
    /// A body the backend already holds in memory.
    Buffer(opendal::Buffer),
}

/// Streaming body returned by `download`. The caller drains it.
pub struct ObjectBody {
    inner: BoxStream<'static, io::Result<Bytes>>,
}

impl ObjectBody {
    /// Normalize any producer shape into the single streaming type.
    pub fn from_source(source: BodySource) -> Self {
        let inner = match source {
            BodySource::Stream(stream) => stream,
            BodySource::Reader(reader) => stream::once(async move {
                reader.into_bytes_stream(..).await.map_err(io::Error::from)
            })
            .try_flatten()
            .boxed(),
            BodySource::Read(reader) => reader_chunks(reader),
            BodySource::Buffer(buffer) => stream::iter(Iterator::map(buffer, Ok)).boxed(),
        };
        Self { inner }
    }

    pub fn empty() -> Self {
        Self {
            inner: stream::empty().boxed(),
        }
    }

    /// Drain the whole body into memory.
    pub async fn collect_bytes(self) -> io::Result<Bytes> {
        UploadBody::Stream(self.inner).into_bytes().await
    }
}

impl Stream for ObjectBody {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ObjectBody(..)")
    }
}

/// A found object: streaming body plus transport metadata.
#[derive(Debug)]
pub struct ObjectResponse {
    pub body: ObjectBody,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectResponse {
    pub async fn into_bytes(self) -> io::Result<Bytes> {
        self.body.collect_bytes().await
    }
}

/// Read an async reader in fixed-size chunks. Each chunk buffer is local to
/// the returned stream.
fn reader_chunks<R>(reader: R) -> BoxStream<'static, io::Result<Bytes>>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    stream::try_unfold(reader, |mut reader| async move {
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some((Bytes::from(buf), reader)))
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn payload() -> Vec<u8> {
        // Larger than one read chunk so the reader path loops.
        (0..(READ_CHUNK_SIZE * 2 + 17)).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_upload_shapes_drain_identically() {
        let data = payload();

        let from_bytes = UploadBody::from(data.clone()).into_bytes().await.unwrap();

        let chunks: Vec<io::Result<Bytes>> = data
            .chunks(1000)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        let from_stream = UploadBody::stream(stream::iter(chunks))
            .into_bytes()
            .await
            .unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();
        let from_blob = UploadBody::blob(file.path()).into_bytes().await.unwrap();

        assert_eq!(from_bytes.as_ref(), data.as_slice());
        assert_eq!(from_stream, from_bytes);
        assert_eq!(from_blob, from_bytes);
    }

    #[tokio::test]
    async fn test_blob_chunks_stream_whole_file() {
        let data = payload();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();

        let chunks: Vec<Bytes> = UploadBody::blob(file.path())
            .into_chunks()
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert!(chunks.len() >= 3);
        assert_eq!(chunks.concat(), data);
    }

    #[tokio::test]
    async fn test_missing_blob_is_io_error() {
        let err = UploadBody::blob("/definitely/not/here.bin")
            .into_bytes()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_body_sources_produce_identical_bytes() {
        let data = payload();

        let stream_body = ObjectBody::from_source(BodySource::Stream(
            stream::iter(vec![Ok(Bytes::copy_from_slice(&data))]).boxed(),
        ));
        let read_body = ObjectBody::from_source(BodySource::Read(Box::new(
            futures::io::Cursor::new(data.clone()),
        )));
        let buffer_body = ObjectBody::from_source(BodySource::Buffer(opendal::Buffer::from(
            data.clone(),
        )));

        let op = opendal::Operator::new(opendal::services::Memory::default())
            .unwrap()
            .finish();
        op.write("blob.bin", data.clone()).await.unwrap();
        let reader_body =
            ObjectBody::from_source(BodySource::Reader(op.reader("blob.bin").await.unwrap()));

        for body in [stream_body, read_body, buffer_body, reader_body] {
            assert_eq!(body.collect_bytes().await.unwrap().as_ref(), data.as_slice());
        }
    }

    #[tokio::test]
    async fn test_stream_errors_propagate() {
        let body = ObjectBody::from_source(BodySource::Stream(
            stream::iter(vec![
                Ok(Bytes::from_static(b"partial")),
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            ])
            .boxed(),
        ));
        let err = body.collect_bytes().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn test_empty_body() {
        assert!(ObjectBody::empty().collect_bytes().await.unwrap().is_empty());
    }
}
