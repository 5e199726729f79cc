#![warn(missing_docs)]
//! # Multipart Reader
//!
//! Streams a `multipart/form-data` request body made of text fields, byte streams and files, without holding the payload in memory.
//!
//! Sources are read one after the other, a chunk at a time, and only once the body itself is read.
//! The body can be consumed as a [`Stream`](futures_core::Stream) of `Bytes`, through `read` into a buffer, or as a `tokio::io::AsyncRead`.
//!
//! ```no_run
//! # use multipart_reader::{FileStream, MultipartReader};
//! # async fn upload() -> Result<(), Box<dyn std::error::Error>> {
//! let mut body: MultipartReader<FileStream> = MultipartReader::default();
//!
//! body.write_fields([("user", "cetra3"), ("album", "holidays")])?;
//! body.attach_file("photos/beach.jpg").await?;
//!
//! let progress = body.progress();
//!
//! let request = body.attach_to_request(
//!     http::Request::post("http://localhost:3000/upload").body(())?,
//! )?;
//!
//! // hand `request` to a client, and poll `progress.count()` elsewhere
//! # drop((request, progress));
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! `filestream` (enabled by default) adds [`FileStream`] and the `attach_file*` methods, and implements `tokio::io::AsyncRead` for the reader.

mod boundary;
mod error;
#[cfg(feature = "filestream")]
mod filestream;
mod progress;
mod reader;
mod source;

pub use error::{MultipartError, Result};
#[cfg(feature = "filestream")]
pub use filestream::FileStream;
pub use progress::Progress;
pub use reader::MultipartReader;
pub use source::ByteStream;
