//! Upload configuration and per-request context.

use serde::{Deserialize, Serialize};

use crate::limit::SizeLimit;
use crate::reader::DEFAULT_BUFFER_SIZE;

/// Default maximum size of one part's header block (10KB).
pub const DEFAULT_PART_HEADER_SIZE_MAX: usize = 10 * 1024;

/// Configuration for multipart decoding.
///
/// Deserializes from the signed-integer form used by most configuration
/// files, where `-1` means unlimited:
///
/// ```
/// # use fileupload_core::{SizeLimit, UploadConfig};
/// let config: UploadConfig =
///     serde_json::from_str(r#"{ "size_max": 1048576, "file_size_max": -1 }"#).unwrap();
/// assert_eq!(config.get_size_max(), SizeLimit::Limited(1_048_576));
/// assert_eq!(config.get_file_size_max(), SizeLimit::Unlimited);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Ceiling on the whole request, framing included.
    size_max: SizeLimit,
    /// Ceiling on each file part's body.
    file_size_max: SizeLimit,
    /// Ceiling on the number of parts.
    file_count_max: SizeLimit,
    /// Maximum size of one part's header block.
    part_header_size_max: usize,
    /// Bytes requested from the transport per refill.
    buffer_size: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            size_max: SizeLimit::Unlimited,
            file_size_max: SizeLimit::Unlimited,
            file_count_max: SizeLimit::Unlimited,
            part_header_size_max: DEFAULT_PART_HEADER_SIZE_MAX,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl UploadConfig {
    /// Create a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the aggregate request ceiling.
    #[must_use]
    pub fn size_max(mut self, limit: impl Into<SizeLimit>) -> Self {
        self.size_max = limit.into();
        self
    }

    /// Set the per-file ceiling.
    #[must_use]
    pub fn file_size_max(mut self, limit: impl Into<SizeLimit>) -> Self {
        self.file_size_max = limit.into();
        self
    }

    /// Set the maximum number of parts.
    #[must_use]
    pub fn file_count_max(mut self, limit: impl Into<SizeLimit>) -> Self {
        self.file_count_max = limit.into();
        self
    }

    /// Set the maximum size of one part's header block.
    #[must_use]
    pub fn part_header_size_max(mut self, size: usize) -> Self {
        self.part_header_size_max = size;
        self
    }

    /// Set the number of bytes requested from the transport per refill.
    #[must_use]
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Get the aggregate request ceiling.
    #[must_use]
    pub fn get_size_max(&self) -> SizeLimit {
        self.size_max
    }

    /// Get the per-file ceiling.
    #[must_use]
    pub fn get_file_size_max(&self) -> SizeLimit {
        self.file_size_max
    }

    /// Get the maximum number of parts.
    #[must_use]
    pub fn get_file_count_max(&self) -> SizeLimit {
        self.file_count_max
    }

    /// Get the maximum size of one part's header block.
    #[must_use]
    pub fn get_part_header_size_max(&self) -> usize {
        self.part_header_size_max
    }

    /// Get the refill size.
    #[must_use]
    pub fn get_buffer_size(&self) -> usize {
        self.buffer_size
    }
}

/// What the transport knows about one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadContext {
    boundary: Vec<u8>,
    content_length: Option<u64>,
}

impl UploadContext {
    /// Create a context for `boundary` with an optional declared length.
    #[must_use]
    pub fn new(boundary: impl Into<Vec<u8>>, content_length: Option<u64>) -> Self {
        Self {
            boundary: boundary.into(),
            content_length,
        }
    }

    /// Create a context from a signed declared length (`-1` = unknown).
    #[must_use]
    pub fn with_signed_content_length(boundary: impl Into<Vec<u8>>, content_length: i64) -> Self {
        Self::new(boundary, u64::try_from(content_length).ok())
    }

    /// The boundary token, without the leading dashes.
    #[must_use]
    pub fn boundary(&self) -> &[u8] {
        &self.boundary
    }

    /// The declared total content length, if known.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }
}
