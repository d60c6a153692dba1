//! Materialized parts.
//!
//! The decoder itself never decides where part bodies end up. An
//! [`ItemStore`] receives each part's header and body reader in turn;
//! [`MemoryStore`] keeps everything in memory as [`FileItem`]s.

use std::borrow::Cow;
use std::io::Read;

use crate::error::UploadError;
use crate::header::{PartHeader, PartHeaders};

/// Receives parts as the request is decoded.
pub trait ItemStore {
    /// What a stored part becomes.
    type Item;

    /// Consume one part's body.
    ///
    /// Errors raised by `body` carry the decoder's fault; convert them with
    /// `UploadError::from` (or `?`) to keep the original kind.
    fn store(&mut self, header: PartHeader, body: &mut dyn Read) -> Result<Self::Item, UploadError>;
}

/// A part held fully in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileItem {
    header: PartHeader,
    data: Vec<u8>,
}

impl FileItem {
    /// Create an item from a header and its body.
    #[must_use]
    pub fn new(header: PartHeader, data: Vec<u8>) -> Self {
        Self { header, data }
    }

    #[must_use]
    pub fn header(&self) -> &PartHeader {
        &self.header
    }

    #[must_use]
    pub fn field_name(&self) -> &str {
        self.header.field_name()
    }

    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.header.file_name()
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header.content_type()
    }

    #[must_use]
    pub fn headers(&self) -> &PartHeaders {
        self.header.headers()
    }

    #[must_use]
    pub fn is_form_field(&self) -> bool {
        self.header.is_form_field()
    }

    /// The body bytes.
    #[must_use]
    pub fn get(&self) -> &[u8] {
        &self.data
    }

    /// The body decoded as UTF-8, with invalid sequences replaced.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    /// Body size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Take the body bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Keeps every part in memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStore;

impl ItemStore for MemoryStore {
    type Item = FileItem;

    fn store(&mut self, header: PartHeader, body: &mut dyn Read) -> Result<FileItem, UploadError> {
        let mut data = Vec::new();
        body.read_to_end(&mut data)?;
        Ok(FileItem::new(header, data))
    }
}
