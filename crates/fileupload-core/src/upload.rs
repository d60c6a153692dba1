//! The size-limit supervisor.
//!
//! [`FileUpload`] runs one parse per request. It rejects requests whose
//! declared length already exceeds the aggregate ceiling, then routes every
//! byte through a [`BoundedReader`] so the ceiling holds no matter what the
//! client declared.

use std::collections::BTreeMap;
use std::io::Read;

use crate::bounded::BoundedReader;
use crate::config::{UploadConfig, UploadContext};
use crate::error::{LimitScope, UploadError};
use crate::item::{FileItem, ItemStore, MemoryStore};
use crate::iter::PartIterator;
use crate::limit::SizeLimit;

/// Decodes multipart/form-data requests under configured ceilings.
#[derive(Debug, Clone, Default)]
pub struct FileUpload {
    config: UploadConfig,
}

impl FileUpload {
    #[must_use]
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Start lazy iteration over the parts of a request.
    ///
    /// Fails before touching `source` when the declared content length
    /// exceeds the aggregate ceiling.
    pub fn item_iter<R: Read>(
        &self,
        ctx: &UploadContext,
        source: R,
    ) -> Result<PartIterator<R>, UploadError> {
        let size_max = self.config.get_size_max();
        if let (SizeLimit::Limited(max), Some(declared)) = (size_max, ctx.content_length()) {
            if declared > max {
                tracing::warn!(
                    declared,
                    limit = max,
                    "request rejected before reading: declared length exceeds limit"
                );
                return Err(UploadError::TotalTooLarge {
                    size: declared,
                    max,
                });
            }
        }

        let bounded = BoundedReader::new(source, size_max, LimitScope::Request);
        PartIterator::new(bounded, ctx.boundary(), &self.config)
    }

    /// Decode a whole request into memory.
    pub fn parse_request<R: Read>(
        &self,
        ctx: &UploadContext,
        source: R,
    ) -> Result<Vec<FileItem>, UploadError> {
        self.parse_request_with(ctx, source, &mut MemoryStore)
    }

    /// Decode a whole request, handing each part to `store`.
    ///
    /// Parts are stored in wire order. The first fault ends the parse; items
    /// already stored are dropped with the returned vector.
    pub fn parse_request_with<R: Read, S: ItemStore>(
        &self,
        ctx: &UploadContext,
        source: R,
        store: &mut S,
    ) -> Result<Vec<S::Item>, UploadError> {
        let mut parts = self.item_iter(ctx, source)?;
        let mut items = Vec::new();
        while parts.has_next()? {
            let mut body = parts.next_part()?.open()?;
            let header = body.header().clone();
            items.push(store.store(header, &mut body)?);
        }
        Ok(items)
    }

    /// Decode a whole request into memory, grouped by field name.
    pub fn parse_parameter_map<R: Read>(
        &self,
        ctx: &UploadContext,
        source: R,
    ) -> Result<BTreeMap<String, Vec<FileItem>>, UploadError> {
        let mut map: BTreeMap<String, Vec<FileItem>> = BTreeMap::new();
        for item in self.parse_request(ctx, source)? {
            map.entry(item.field_name().to_string())
                .or_default()
                .push(item);
        }
        Ok(map)
    }
}
