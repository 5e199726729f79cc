use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

/// One entry in the ordered list of sources that make up the body
pub(crate) enum Source<S> {
    /// In-memory bytes, emitted as is
    Literal(Bytes),
    /// A part header, rendered with the final boundary once reading starts
    Header(PartHeader),
    /// A caller supplied stream with an optional declared length
    External { stream: S, length: Option<u64> },
}

impl<S> Source<S> {
    /// The number of bytes this source will produce, `None` if it can't be known up front
    pub(crate) fn len(&self, boundary: &str) -> Option<u64> {
        match self {
            Source::Literal(bytes) => Some(bytes.len() as u64),
            Source::Header(header) => Some(header.write(boundary).len() as u64),
            Source::External { length, .. } => *length,
        }
    }
}

/// The header block that opens a part
pub(crate) struct PartHeader {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    // The CRLF terminating the previous part belongs to this delimiter
    leading_crlf: bool,
}

impl PartHeader {
    pub(crate) fn new(
        name: String,
        filename: Option<String>,
        content_type: Option<String>,
        leading_crlf: bool,
    ) -> Self {
        PartHeader {
            name,
            filename,
            content_type,
            leading_crlf,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn write(&self, boundary: &str) -> Bytes {
        let mut buf = BytesMut::new();

        if self.leading_crlf {
            buf.extend_from_slice(b"\r\n");
        }

        buf.extend_from_slice(b"--");
        buf.extend_from_slice(boundary.as_bytes());
        buf.extend_from_slice(b"\r\n");

        buf.extend_from_slice(b"Content-Disposition: form-data; name=\"");
        buf.extend_from_slice(self.name.as_bytes());
        buf.extend_from_slice(b"\"");

        if let Some(ref filename) = self.filename {
            buf.extend_from_slice(b"; filename=\"");
            buf.extend_from_slice(filename.as_bytes());
            buf.extend_from_slice(b"\"");
        }

        buf.extend_from_slice(b"\r\n");

        if let Some(ref content_type) = self.content_type {
            buf.extend_from_slice(b"Content-Type: ");
            buf.extend_from_slice(content_type.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }

        buf.extend_from_slice(b"\r\n");

        buf.freeze()
    }
}

/// The closing delimiter of the body
pub(crate) fn write_ending(boundary: &str) -> Bytes {
    let mut buf = BytesMut::new();

    buf.extend_from_slice(b"\r\n--");
    buf.extend_from_slice(boundary.as_bytes());
    buf.extend_from_slice(b"--\r\n");

    buf.freeze()
}

/// A Simple In-Memory Stream that can be used as an external source
///
/// The whole content is yielded as a single chunk
#[derive(Clone, Debug)]
pub struct ByteStream {
    bytes: Option<Bytes>,
}

impl ByteStream {
    /// Create a new ByteStream based upon the byte slice (note: this will copy from the slice)
    pub fn new(bytes: &[u8]) -> Self {
        ByteStream {
            bytes: Some(Bytes::copy_from_slice(bytes)),
        }
    }

    /// The number of bytes left in the stream
    pub fn len(&self) -> u64 {
        self.bytes.as_ref().map_or(0, |bytes| bytes.len() as u64)
    }

    /// Whether the stream has nothing left to yield
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Bytes> for ByteStream {
    fn from(bytes: Bytes) -> Self {
        ByteStream { bytes: Some(bytes) }
    }
}

impl Stream for ByteStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.as_mut().bytes.take().map(Ok))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::from(self.bytes.is_some());
        (remaining, Some(remaining))
    }
}
