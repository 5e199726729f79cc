use crate::error::{MultipartError, Result};
use crate::reader::MultipartReader;
use bytes::Bytes;
use futures_core::Stream;
use log::debug;
use pin_project_lite::pin_project;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::AsyncSeekExt;
use tokio_util::codec::{BytesCodec, FramedRead};

pin_project! {
    /// Convenience wrapper around streaming out an opened file.  Requires tokio
    ///
    /// The file is closed when the stream is dropped, which a `MultipartReader` does as soon as the file has been read to the end.
    pub struct FileStream {
        #[pin]
        inner: FramedRead<File, BytesCodec>,
    }
}

impl FileStream {
    /// Stream out an already opened file from its current position
    pub fn new(file: File) -> Self {
        FileStream {
            inner: FramedRead::new(file, BytesCodec::new()),
        }
    }
}

impl Stream for FileStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project()
            .inner
            .poll_next(cx)
            .map(|item| item.map(|result| result.map(|bytes| bytes.freeze())))
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn open(path: &Path) -> Result<File> {
    File::open(path)
        .await
        .map_err(|source| MultipartError::FileOpen {
            path: path.to_path_buf(),
            source,
        })
}

async fn stat(file: &File, path: Option<&Path>) -> Result<u64> {
    let metadata = file
        .metadata()
        .await
        .map_err(|source| MultipartError::FileStat {
            path: path.map(Path::to_path_buf),
            source,
        })?;

    if metadata.is_dir() {
        let source = io::Error::new(io::ErrorKind::InvalidInput, "path is a directory");

        return Err(match path {
            Some(path) => MultipartError::FileOpen {
                path: path.to_path_buf(),
                source,
            },
            None => MultipartError::FileStat { path: None, source },
        });
    }

    Ok(metadata.len())
}

impl MultipartReader<FileStream> {
    /// Add a file given its path, as a part named `file`
    ///
    /// The filename of the part is the last component of the path and the length is the size of the file when it was opened.
    /// The file stays open until it has been streamed out or the reader is dropped.
    pub async fn attach_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();

        if self.is_consuming() {
            return Err(MultipartError::AlreadyConsuming);
        }

        let file = open(path).await?;
        let length = stat(&file, Some(path)).await?;

        debug!("Attaching file {:?} ({} bytes)", path, length);

        self.append_form_part("file".into(), base_name(path), FileStream::new(file), Some(length))
    }

    /// Add an already opened file as a part named `file`
    ///
    /// The file is streamed from its current position, so the declared length is the size of the file minus that position.
    pub async fn attach_file_handle<I: Into<String>>(&mut self, mut file: File, filename: I) -> Result<()> {
        let filename = filename.into();

        if self.is_consuming() {
            return Err(MultipartError::AlreadyConsuming);
        }

        let size = stat(&file, None).await?;
        let position = file
            .stream_position()
            .await
            .map_err(|source| MultipartError::FileStat { path: None, source })?;

        let length = size.saturating_sub(position);

        self.append_form_part("file".into(), filename, FileStream::new(file), Some(length))
    }

    /// Add a file given its path, using `name` as the field name
    ///
    /// This will guess the Content Type based upon the path (i.e, .jpg will be `image/jpeg`)
    pub async fn attach_file_as<I: Into<String>, P: AsRef<Path>>(&mut self, name: I, path: P) -> Result<()> {
        let path = path.as_ref();

        if self.is_consuming() {
            return Err(MultipartError::AlreadyConsuming);
        }

        let file = open(path).await?;
        let length = stat(&file, Some(path)).await?;

        let content_type = mime_guess::MimeGuess::from_path(path)
            .first_or_octet_stream()
            .to_string();

        self.append_typed_part(
            name.into(),
            base_name(path),
            content_type,
            FileStream::new(file),
            Some(length),
        )
    }
}
