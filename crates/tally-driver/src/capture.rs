//! Shared, capped output buffer fed by the stdout and stderr drainers.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Default)]
struct Inner {
    bytes: Vec<u8>,
    truncated: bool,
}

/// Merged capture of everything the child writes. Chunks from both streams
/// are appended in arrival order; bytes past the cap are counted as
/// truncation and dropped.
#[derive(Debug, Clone)]
pub struct Capture {
    inner: Arc<Mutex<Inner>>,
    cap: usize,
}

impl Capture {
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            cap,
        }
    }

    pub fn push(&self, chunk: &[u8]) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let room = self.cap.saturating_sub(inner.bytes.len());
        if chunk.len() > room {
            inner.truncated = true;
        }
        let take = chunk.len().min(room);
        inner.bytes.extend_from_slice(&chunk[..take]);
    }

    /// Captured text (lossy UTF-8) and whether anything was dropped.
    #[must_use]
    pub fn snapshot(&self) -> (String, bool) {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        (String::from_utf8_lossy(&inner.bytes).into_owned(), inner.truncated)
    }

    /// Read `reader` to EOF into the capture. Read errors end the drain.
    pub async fn drain<R>(self, mut reader: R, stream: &'static str)
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => self.push(&buf[..n]),
                Err(e) => {
                    tracing::debug!(stream, error = %e, "output drain stopped");
                    break;
                }
            }
        }
    }
}
