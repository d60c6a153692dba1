//! Test sources and request builders.
//!
//! These stand in for a network transport in unit and integration tests:
//! [`ChunkedSource`] hands out data in small reads the way a socket does, and
//! [`CountingSource`] records how much the decoder pulled from it.

use std::cell::Cell;
use std::io::{self, Read};
use std::rc::Rc;

use crate::error::UploadError;

/// A source that returns at most `chunk` bytes per read.
#[derive(Debug, Clone)]
pub struct ChunkedSource {
    data: Vec<u8>,
    position: usize,
    chunk: usize,
}

impl ChunkedSource {
    /// Create a source over `data` delivering at most `chunk` bytes per read.
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>, chunk: usize) -> Self {
        Self {
            data: data.into(),
            position: 0,
            chunk: chunk.max(1),
        }
    }

    /// Bytes handed out so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }
}

impl Read for ChunkedSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.position..];
        let n = remaining.len().min(buf.len()).min(self.chunk);
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(n)
    }
}

/// A source that delivers `data` and then fails on every later read.
#[derive(Debug, Clone)]
pub struct FailingSource {
    data: Vec<u8>,
    position: usize,
    fault: Fault,
}

#[derive(Debug, Clone)]
enum Fault {
    Upload(UploadError),
    Transport(io::ErrorKind),
}

impl FailingSource {
    /// Fail with `fault` once `data` is exhausted.
    #[must_use]
    pub fn new(data: &[u8], fault: UploadError) -> Self {
        Self {
            data: data.to_vec(),
            position: 0,
            fault: Fault::Upload(fault),
        }
    }

    /// Fail with a plain transport error of `kind` once `data` is exhausted.
    #[must_use]
    pub fn transport(data: &[u8], kind: io::ErrorKind) -> Self {
        Self {
            data: data.to_vec(),
            position: 0,
            fault: Fault::Transport(kind),
        }
    }
}

impl Read for FailingSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.position..];
        if remaining.is_empty() {
            return Err(match &self.fault {
                Fault::Upload(err) => err.clone().into(),
                Fault::Transport(kind) => io::Error::new(*kind, "transport failure"),
            });
        }
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(n)
    }
}

/// Shared view of how much a [`CountingSource`] has delivered.
#[derive(Debug, Clone, Default)]
pub struct ReadStats {
    bytes: Rc<Cell<u64>>,
    calls: Rc<Cell<u64>>,
}

impl ReadStats {
    /// Total bytes delivered.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes.get()
    }

    /// Number of `read` calls made.
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.get()
    }
}

/// Wraps a reader and records every read made against it.
#[derive(Debug)]
pub struct CountingSource<R> {
    inner: R,
    stats: ReadStats,
}

impl<R> CountingSource<R> {
    /// Wrap `inner`, returning the source and a handle to its statistics.
    pub fn new(inner: R) -> (Self, ReadStats) {
        let stats = ReadStats::default();
        (
            Self {
                inner,
                stats: stats.clone(),
            },
            stats,
        )
    }
}

impl<R: Read> Read for CountingSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stats.calls.set(self.stats.calls.get() + 1);
        let n = self.inner.read(buf)?;
        let delivered = u64::try_from(n).unwrap_or(u64::MAX);
        self.stats.bytes.set(self.stats.bytes.get() + delivered);
        Ok(n)
    }
}

/// Builds a multipart/form-data request body.
#[derive(Debug, Clone)]
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBody {
    /// Start a body delimited by `boundary`.
    #[must_use]
    pub fn new(boundary: &str) -> Self {
        Self {
            boundary: boundary.to_string(),
            body: Vec::new(),
        }
    }

    /// Append a simple form field.
    #[must_use]
    pub fn field(self, name: &str, value: &str) -> Self {
        let disposition = format!("form-data; name=\"{name}\"");
        self.part(&[("Content-Disposition", disposition.as_str())], value.as_bytes())
    }

    /// Append a file part.
    #[must_use]
    pub fn file(self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        let disposition = format!("form-data; name=\"{name}\"; filename=\"{filename}\"");
        self.part(
            &[
                ("Content-Disposition", disposition.as_str()),
                ("Content-Type", content_type),
            ],
            data,
        )
    }

    /// Append a part with arbitrary headers.
    #[must_use]
    pub fn part(mut self, headers: &[(&str, &str)], data: &[u8]) -> Self {
        self.body.extend_from_slice(b"--");
        self.body.extend_from_slice(self.boundary.as_bytes());
        self.body.extend_from_slice(b"\r\n");
        for (name, value) in headers {
            self.body.extend_from_slice(name.as_bytes());
            self.body.extend_from_slice(b": ");
            self.body.extend_from_slice(value.as_bytes());
            self.body.extend_from_slice(b"\r\n");
        }
        self.body.extend_from_slice(b"\r\n");
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Append the closing delimiter and return the body.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        self.body.extend_from_slice(b"--");
        self.body.extend_from_slice(self.boundary.as_bytes());
        self.body.extend_from_slice(b"--\r\n");
        self.body
    }
}
