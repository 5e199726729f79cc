use crate::boundary;
use crate::error::{AnyStdError, MultipartError, Result};
use crate::progress::Progress;
use crate::source::{write_ending, PartHeader, Source};
use bytes::Bytes;
use futures_core::{ready, Stream};
use futures_util::future::poll_fn;
use futures_util::TryStreamExt;
use http::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use http::Request;
use log::debug;
use std::collections::VecDeque;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

/// The main `MultipartReader` struct, assembling a `multipart/form-data` body out of fields, streams and files
///
/// Sources are appended in order and the closing boundary is always emitted last.  Nothing is read from the
/// appended streams until the reader itself is polled, so memory use stays at about one chunk of the current source.
///
/// Once reading has started (or the reader has been attached to a request) the list of sources is frozen and any
/// further append returns [`MultipartError::AlreadyConsuming`].
pub struct MultipartReader<S> {
    boundary: String,
    content_type: String,
    sources: Vec<Source<S>>,
    parts: usize,
    cursor: Option<Cursor<S>>,
    pending: Bytes,
    progress: Progress,
}

//The unified view over all sources, built once on first read
struct Cursor<S> {
    sources: VecDeque<Source<S>>,
    length: Option<u64>,
}

impl<S> Cursor<S> {
    fn new(sources: Vec<Source<S>>, boundary: &str, length: Option<u64>) -> Self {
        debug!("Building cursor over {} sources", sources.len() + 1);

        let mut sources: VecDeque<Source<S>> = sources
            .into_iter()
            .map(|source| match source {
                Source::Header(header) => Source::Literal(header.write(boundary)),
                other => other,
            })
            .collect();

        sources.push_back(Source::Literal(write_ending(boundary)));

        Cursor { sources, length }
    }
}

impl<E, S> MultipartReader<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    /// Construct a new MultipartReader with a random boundary
    pub fn new() -> Self {
        Self::from_boundary(boundary::generate())
    }

    /// Construct a new MultipartReader with a given Boundary
    ///
    /// The boundary must follow RFC 2046: between 1 and 70 characters of letters, digits, space or `'()+_,-./:=?`, not ending in a space.
    pub fn with_boundary<I: Into<String>>(boundary: I) -> Result<Self> {
        let boundary = boundary.into();
        boundary::validate(&boundary)?;

        Ok(Self::from_boundary(boundary))
    }

    fn from_boundary(boundary: String) -> Self {
        MultipartReader {
            content_type: boundary::content_type(&boundary),
            boundary,
            sources: Vec::new(),
            parts: 0,
            cursor: None,
            pending: Bytes::new(),
            progress: Progress::default(),
        }
    }

    /// Gets the boundary for the MultipartReader
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// The value for the `Content-Type` header, i.e `multipart/form-data; boundary=...`
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Replace the boundary before reading starts
    ///
    /// Part headers and the closing boundary are rendered with the boundary in place when reading starts, so parts appended before this call follow the new boundary too.
    /// On error the previous boundary is kept.
    pub fn set_boundary<I: Into<String>>(&mut self, boundary: I) -> Result<()> {
        self.ensure_appendable()?;

        let boundary = boundary.into();
        boundary::validate(&boundary)?;

        self.content_type = boundary::content_type(&boundary);
        self.boundary = boundary;

        Ok(())
    }

    /// The total size of the body, if every appended stream declared its length
    pub fn content_length(&self) -> Option<u64> {
        if let Some(ref cursor) = self.cursor {
            return cursor.length;
        }

        let mut total = write_ending(&self.boundary).len() as u64;

        for source in &self.sources {
            total = total.checked_add(source.len(&self.boundary)?)?;
        }

        Some(total)
    }

    /// The number of bytes read from this MultipartReader so far
    pub fn bytes_read(&self) -> u64 {
        self.progress.count()
    }

    /// A handle onto the byte count which can be polled from other tasks or threads
    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    /// Whether reading has started, after which no more sources can be added
    pub fn is_consuming(&self) -> bool {
        self.cursor.is_some()
    }

    fn ensure_appendable(&self) -> Result<()> {
        if self.is_consuming() {
            return Err(MultipartError::AlreadyConsuming);
        }

        Ok(())
    }

    fn push_header(&mut self, header: PartHeader) {
        debug!("Adding part: {}", header.name());
        self.parts += 1;
        self.sources.push(Source::Header(header));
    }

    fn next_header<I: Into<String>>(
        &self,
        name: I,
        filename: Option<String>,
        content_type: Option<String>,
    ) -> PartHeader {
        PartHeader::new(name.into(), filename, content_type, self.parts > 0)
    }

    /// Add raw bytes to the body, just before the closing boundary
    ///
    /// No framing is added, so this is only useful for a preamble or hand-written parts.
    pub fn append_bytes<B: Into<Bytes>>(&mut self, bytes: B) -> Result<()> {
        self.ensure_appendable()?;

        self.sources.push(Source::Literal(bytes.into()));

        Ok(())
    }

    /// Add a raw Stream to the body, just before the closing boundary
    ///
    /// `length` is the number of bytes the stream will produce.  If it is `None` the total content length becomes unknown.
    pub fn append_source(&mut self, stream: S, length: Option<u64>) -> Result<()> {
        self.ensure_appendable()?;

        self.sources.push(Source::External { stream, length });

        Ok(())
    }

    /// Add a Stream as a form part with a `Content-Disposition` header
    ///
    /// An empty `filename` adds a plain field without a `filename` parameter.
    /// Neither `name` nor `filename` are escaped: they must not contain quotes or line breaks.
    pub fn append_form_part<I: Into<String>>(
        &mut self,
        name: I,
        filename: I,
        stream: S,
        length: Option<u64>,
    ) -> Result<()> {
        self.ensure_appendable()?;

        let filename: String = filename.into();
        let filename = (!filename.is_empty()).then_some(filename);

        let header = self.next_header(name, filename, None);
        self.push_header(header);
        self.sources.push(Source::External { stream, length });

        Ok(())
    }

    /// Add a Stream as a form part, including a `Content-Type` header for the part
    ///
    /// As with `append_form_part`, an empty `filename` leaves out the `filename` parameter.
    pub fn append_typed_part<I: Into<String>>(
        &mut self,
        name: I,
        filename: I,
        content_type: I,
        stream: S,
        length: Option<u64>,
    ) -> Result<()> {
        self.ensure_appendable()?;

        let filename: String = filename.into();
        let filename = (!filename.is_empty()).then_some(filename);

        let header = self.next_header(name, filename, Some(content_type.into()));
        self.push_header(header);
        self.sources.push(Source::External { stream, length });

        Ok(())
    }

    /// Add a text Field to the body
    pub fn write_field<I: Into<String>>(&mut self, name: I, value: I) -> Result<()> {
        self.ensure_appendable()?;

        let value: String = value.into();

        let header = self.next_header(name, None, None);
        self.push_header(header);
        self.sources.push(Source::Literal(Bytes::from(value)));

        Ok(())
    }

    /// Add a text Field for every `(name, value)` pair, in iteration order
    pub fn write_fields<F, K, V>(&mut self, fields: F) -> Result<()>
    where
        F: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.ensure_appendable()?;

        for (name, value) in fields {
            self.write_field(name.into(), value.into())?;
        }

        Ok(())
    }

    /// Freeze the list of sources and build the cursor, if not done already
    fn cursor(&mut self) -> &mut Cursor<S> {
        let length = self.content_length();
        let boundary = &self.boundary;
        let sources = &mut self.sources;

        self.cursor
            .get_or_insert_with(|| Cursor::new(mem::take(sources), boundary, length))
    }

    // Pulls the next non-empty chunk, moving on to the next source when the current one is exhausted
    fn poll_source(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<Bytes, E>>> {
        let cursor = self.cursor();

        loop {
            match cursor.sources.front_mut() {
                None => return Poll::Ready(None),
                Some(Source::External { stream, .. }) => match Pin::new(stream).poll_next(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Some(Ok(bytes))) => {
                        if !bytes.is_empty() {
                            return Poll::Ready(Some(Ok(bytes)));
                        }
                    }
                    Poll::Ready(Some(Err(err))) => {
                        debug!(
                            "Source failed, abandoning the remaining {} sources",
                            cursor.sources.len()
                        );
                        cursor.sources.clear();
                        return Poll::Ready(Some(Err(err)));
                    }
                    Poll::Ready(None) => {
                        debug!("Source finished");
                        cursor.sources.pop_front();
                    }
                },
                Some(_) => {
                    if let Some(Source::Literal(bytes)) = cursor.sources.pop_front() {
                        if !bytes.is_empty() {
                            return Poll::Ready(Some(Ok(bytes)));
                        }
                    }
                }
            }
        }
    }

    fn poll_read_slice(&mut self, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<Result<usize, E>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        if self.pending.is_empty() {
            match ready!(self.poll_source(cx)) {
                Some(Ok(bytes)) => self.pending = bytes,
                Some(Err(err)) => return Poll::Ready(Err(err)),
                None => {
                    debug!("Finished reading, total bytes:{}", self.bytes_read());
                    return Poll::Ready(Ok(0));
                }
            }
        }

        let len = buf.len().min(self.pending.len());
        buf[..len].copy_from_slice(&self.pending.split_to(len));
        self.progress.add(len);

        Poll::Ready(Ok(len))
    }

    /// Read the next bytes of the body into `buf`, returning how many were written
    ///
    /// `Ok(0)` means the closing boundary has been read and the body is complete.
    /// Errors from the underlying sources are returned unchanged, after which the body yields no more bytes.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, E> {
        poll_fn(|cx| self.poll_read_slice(cx, buf)).await
    }

    /// Attach this body to a request
    ///
    /// Sets the `Content-Type` header, and `Content-Length` if the total size is known (removing any existing one otherwise so the transport falls back to chunked encoding).
    /// The existing body of the request is dropped.
    pub fn attach_to_request<T>(mut self, request: Request<T>) -> Result<Request<Self>> {
        let content_type =
            HeaderValue::from_str(&self.content_type).map_err(|_| MultipartError::InvalidHeader)?;

        self.cursor();

        let (mut parts, _) = request.into_parts();

        parts.headers.insert(CONTENT_TYPE, content_type);

        match self.content_length() {
            Some(length) => {
                parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
            }
            None => {
                parts.headers.remove(CONTENT_LENGTH);
            }
        }

        Ok(Request::from_parts(parts, self))
    }
}

impl<E, S> MultipartReader<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<AnyStdError>,
{
    /// Convert into a stream where source errors are wrapped in [`MultipartError::SourceRead`]
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, MultipartError>> {
        self.map_err(MultipartError::source_read)
    }
}

impl<E, S> Default for MultipartReader<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E, S> Stream for MultipartReader<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<Bytes, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let self_ref = self.get_mut();

        let bytes = if self_ref.pending.is_empty() {
            match ready!(self_ref.poll_source(cx)) {
                Some(Ok(bytes)) => bytes,
                an_error @ Some(Err(_)) => return Poll::Ready(an_error),
                None => {
                    debug!(
                        "No bytes to write, finished stream, total bytes:{}",
                        self_ref.bytes_read()
                    );
                    return Poll::Ready(None);
                }
            }
        } else {
            mem::take(&mut self_ref.pending)
        };

        debug!("Bytes: {}", bytes.len());
        self_ref.progress.add(bytes.len());

        Poll::Ready(Some(Ok(bytes)))
    }
}

#[cfg(feature = "tokio")]
impl<E, S> tokio::io::AsyncRead for MultipartReader<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<std::io::Error>,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let self_ref = self.get_mut();

        let len = ready!(self_ref.poll_read_slice(cx, buf.initialize_unfilled()))
            .map_err(Into::into)?;
        buf.advance(len);

        Poll::Ready(Ok(()))
    }
}
