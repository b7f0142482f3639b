//! Size-bounded body reading.

use encoding_rs::{Encoding, UTF_8};
use futures::StreamExt;
use tracing::warn;

use crate::error::TransportFault;
use crate::transport::RawResponse;

/// Default body ceiling: 2 MiB.
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 2 * 1024 * 1024;

/// Why reading a body stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyError {
    /// The advertised or accumulated size passed the ceiling.
    TooLarge {
        /// Ceiling in bytes.
        limit: u64,
        /// Size observed when reading stopped.
        observed: u64,
    },
    /// The connection failed mid-body.
    Transport(TransportFault),
}

/// Reads response bodies under a hard byte ceiling.
#[derive(Debug, Clone, Copy)]
pub struct BoundedBodyReader {
    max_bytes: u64,
}

impl BoundedBodyReader {
    /// Creates a reader; the ceiling is clamped to at least one byte.
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes: max_bytes.max(1),
        }
    }

    /// Returns the ceiling.
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Reads and decodes the body.
    ///
    /// A numeric `Content-Length` above the ceiling fails before any chunk is
    /// pulled. A non-numeric one is ignored. Decoding follows the declared
    /// charset (UTF-8 when absent or unknown) and replaces invalid sequences.
    pub async fn read(&self, response: RawResponse) -> Result<String, BodyError> {
        if let Some(advertised) = response
            .content_length
            .as_deref()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            if advertised > self.max_bytes {
                warn!(advertised, limit = self.max_bytes, "Content-Length over limit");
                return Err(BodyError::TooLarge {
                    limit: self.max_bytes,
                    observed: advertised,
                });
            }
        }

        let mut collected: Vec<u8> = Vec::new();
        let mut body = response.body;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(BodyError::Transport)?;
            if chunk.is_empty() {
                continue;
            }
            collected.extend_from_slice(&chunk);
            let read = collected.len() as u64;
            if read > self.max_bytes {
                warn!(read, limit = self.max_bytes, "Body over limit, aborting read");
                return Err(BodyError::TooLarge {
                    limit: self.max_bytes,
                    observed: read,
                });
            }
        }

        let encoding = response
            .charset
            .as_deref()
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(UTF_8);
        let (text, _, _) = encoding.decode(&collected);
        Ok(text.into_owned())
    }
}

impl Default for BoundedBodyReader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RESPONSE_BYTES)
    }
}

// ============================================================================
// Tests
// ============================================================================
