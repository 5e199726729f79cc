use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A handle onto the number of bytes a `MultipartReader` has delivered so far
///
/// Handles are cheap to clone and can be moved to another task or thread to report upload progress while the reader is being consumed elsewhere.
#[derive(Clone, Debug, Default)]
pub struct Progress {
    count: Arc<AtomicU64>,
}

impl Progress {
    /// The number of bytes read from the stream so far
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    pub(crate) fn add(&self, bytes: usize) {
        self.count.fetch_add(bytes as u64, Ordering::Release);
    }
}
