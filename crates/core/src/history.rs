//! Bounded screenshot history.
//!
//! Every capture taken with the "screenshot only" hotkey lands here and is
//! sent along with the next prompt, so a question can refer to several
//! screens at once. The store is owned by the main thread; dispatch threads
//! only ever see the [`CapturedImage`] handles returned by [`HistoryStore::all`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// An encoded screenshot (PNG or JPEG bytes).
///
/// Cloning shares the underlying buffer; the bytes are never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct CapturedImage {
    bytes: Arc<[u8]>,
}

impl CapturedImage {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Sniffs the MIME type from the magic number, defaulting to PNG.
    pub fn mime_type(&self) -> &'static str {
        if self.bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            "image/jpeg"
        } else {
            "image/png"
        }
    }
}

impl From<Vec<u8>> for CapturedImage {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedImage")
            .field("len", &self.len())
            .field("mime", &self.mime_type())
            .finish()
    }
}

/// What a [`HistoryStore::clear`] released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearReport {
    pub count: usize,
    pub bytes: usize,
}

impl ClearReport {
    pub fn megabytes(&self) -> f64 {
        self.bytes as f64 / BYTES_PER_MB
    }
}

/// FIFO-evicting collection of the most recent captures.
#[derive(Debug)]
pub struct HistoryStore {
    images: VecDeque<CapturedImage>,
    max: usize,
}

impl HistoryStore {
    /// Creates an empty store holding at most `max` images (at least one).
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            images: VecDeque::with_capacity(max),
            max,
        }
    }

    /// Appends `image`, evicting the oldest entry once the bound is exceeded.
    pub fn append(&mut self, image: CapturedImage) {
        self.images.push_back(image);
        while self.images.len() > self.max {
            if let Some(evicted) = self.images.pop_front() {
                debug!(bytes = evicted.len(), max = self.max, "history full, evicted oldest screenshot");
            }
        }

        info!(
            count = self.images.len(),
            "screenshot saved to history (~{:.1} MB)",
            self.total_bytes() as f64 / BYTES_PER_MB
        );
    }

    /// Ordered snapshot of the retained images, oldest first.
    pub fn all(&self) -> Vec<CapturedImage> {
        self.images.iter().cloned().collect()
    }

    /// Drops every retained image. Clearing an empty store returns `None`.
    pub fn clear(&mut self) -> Option<ClearReport> {
        if self.images.is_empty() {
            return None;
        }

        let report = ClearReport {
            count: self.images.len(),
            bytes: self.total_bytes(),
        };
        self.images.clear();
        self.images.shrink_to_fit();
        Some(report)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Sum of the encoded sizes of all retained images.
    pub fn total_bytes(&self) -> usize {
        self.images.iter().map(CapturedImage::len).sum()
    }
}
