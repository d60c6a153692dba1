//! Byte-counting reader that faults once a ceiling is exceeded.
//!
//! The count is driven exclusively by bytes actually delivered by the wrapped
//! source. Declared lengths never influence it.

use std::io::{self, Read};

use crate::error::{LimitScope, UploadError};
use crate::limit::SizeLimit;

/// Wraps a reader, counts delivered bytes and faults past `limit`.
///
/// When the source offers more bytes than the ceiling allows, the triggering
/// read returns an error instead of the extra bytes. The transition is
/// permanent: every later read returns the same fault.
#[derive(Debug)]
pub struct BoundedReader<R> {
    inner: R,
    limit: SizeLimit,
    scope: LimitScope,
    consumed: u64,
    exceeded_at: Option<u64>,
}

impl<R> BoundedReader<R> {
    /// Create a reader bounded by `limit`.
    #[must_use]
    pub fn new(inner: R, limit: SizeLimit, scope: LimitScope) -> Self {
        Self {
            inner,
            limit,
            scope,
            consumed: 0,
            exceeded_at: None,
        }
    }

    /// Bytes delivered to the caller so far.
    #[must_use]
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// The configured ceiling.
    #[must_use]
    pub fn limit(&self) -> SizeLimit {
        self.limit
    }

    /// Returns true once the ceiling has tripped.
    #[must_use]
    pub fn is_exceeded(&self) -> bool {
        self.exceeded_at.is_some()
    }

    /// The fault this reader raised, if it has tripped.
    #[must_use]
    pub fn fault(&self) -> Option<UploadError> {
        let size = self.exceeded_at?;
        let max = self.limit.max()?;
        Some(self.scope.exceeded(size, max))
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for BoundedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = self.fault() {
            return Err(err.into());
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let Some(remaining) = self.limit.remaining(self.consumed) else {
            let n = self.inner.read(buf)?;
            self.consumed = self.consumed.saturating_add(as_u64(n));
            return Ok(n);
        };

        if remaining > 0 {
            let window = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
            let n = self.inner.read(&mut buf[..window])?;
            self.consumed = self.consumed.saturating_add(as_u64(n));
            return Ok(n);
        }

        // At the ceiling: one more byte decides between end of stream and
        // an oversized body. That byte is never handed to the caller.
        let n = self.inner.read(&mut buf[..1])?;
        if n == 0 {
            return Ok(0);
        }
        let size = self.consumed.saturating_add(as_u64(n));
        self.exceeded_at = Some(size);
        let err = self.scope.exceeded(size, self.limit.max().unwrap_or(0));
        tracing::warn!(limit = %self.limit, observed = size, "byte ceiling exceeded");
        Err(err.into())
    }
}

fn as_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}
