//! Boundary tokenizer.
//!
//! [`MultipartReader`] pulls bytes from a source on demand and splits them
//! into the pieces of the multipart framing: preamble, boundary lines, part
//! header blocks and part bodies. It refills only when the buffered bytes
//! cannot decide the next token, so a body of any size streams through a
//! small fixed buffer.
//!
//! ```text
//! preamble CRLF --boundary CRLF
//! headers CRLF CRLF body CRLF --boundary CRLF
//! headers CRLF CRLF body CRLF --boundary -- epilogue
//! ```

use std::io::{self, Read};

use memchr::memmem::{self, Finder};

use crate::error::UploadError;

/// Default size of a single refill of the internal buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// RFC 2046 limits boundaries to 70 characters.
pub const MAX_BOUNDARY_LEN: usize = 70;

const CRLF: &[u8] = b"\r\n";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Streaming tokenizer over a multipart body.
#[derive(Debug)]
pub struct MultipartReader<R> {
    source: R,
    buf: Vec<u8>,
    head: usize,
    refill: usize,
    delimiter: Vec<u8>,
    finder: Finder<'static>,
    eof: bool,
    in_body: bool,
    finished: bool,
}

impl<R> MultipartReader<R> {
    /// Create a tokenizer for `boundary` with the default buffer size.
    pub fn new(source: R, boundary: &[u8]) -> Result<Self, UploadError> {
        Self::with_buffer_size(source, boundary, DEFAULT_BUFFER_SIZE)
    }

    /// Create a tokenizer reading at most `buffer_size` bytes per refill.
    ///
    /// The refill size is raised to twice the delimiter length if smaller.
    pub fn with_buffer_size(
        source: R,
        boundary: &[u8],
        buffer_size: usize,
    ) -> Result<Self, UploadError> {
        if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LEN {
            return Err(UploadError::InvalidBoundary);
        }

        let mut delimiter = Vec::with_capacity(boundary.len() + 4);
        delimiter.extend_from_slice(b"\r\n--");
        delimiter.extend_from_slice(boundary);
        let finder = Finder::new(&delimiter).into_owned();
        let refill = buffer_size.max(delimiter.len() * 2);

        // The opening delimiter may start the body without a line break in
        // front of it; seeding one lets a single delimiter pattern match all.
        let mut buf = Vec::with_capacity(refill + delimiter.len());
        buf.extend_from_slice(CRLF);

        Ok(Self {
            source,
            buf,
            head: 0,
            refill,
            delimiter,
            finder,
            eof: false,
            in_body: false,
            finished: false,
        })
    }

    /// Returns true while positioned inside a part body.
    #[must_use]
    pub fn is_in_body(&self) -> bool {
        self.in_body
    }

    /// Returns true once the closing delimiter has been read.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn get_ref(&self) -> &R {
        &self.source
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.source
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    fn available(&self) -> &[u8] {
        &self.buf[self.head..]
    }

    fn consume(&mut self, n: usize) {
        self.head += n;
        if self.head >= self.buf.len() {
            self.buf.clear();
            self.head = 0;
        }
    }

    /// Bytes at the end of the buffer that could be the start of a split delimiter.
    fn held_back(&self) -> usize {
        self.delimiter.len() - 1
    }
}

impl<R: Read> MultipartReader<R> {
    /// Perform one read from the source into the buffer.
    fn fill(&mut self) -> io::Result<usize> {
        if self.eof {
            return Ok(0);
        }
        if self.head > 0 {
            self.buf.drain(..self.head);
            self.head = 0;
        }

        let start = self.buf.len();
        self.buf.resize(start + self.refill, 0);
        let result = loop {
            match self.source.read(&mut self.buf[start..]) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                other => break other,
            }
        };

        match result {
            Ok(n) => {
                self.buf.truncate(start + n);
                if n == 0 {
                    self.eof = true;
                }
                tracing::trace!(bytes = n, buffered = self.buf.len(), "multipart buffer refilled");
                Ok(n)
            }
            Err(err) => {
                self.buf.truncate(start);
                Err(err)
            }
        }
    }

    /// Fill until at least `n` bytes are buffered or the source is exhausted.
    fn ensure(&mut self, n: usize) -> io::Result<()> {
        while self.available().len() < n && !self.eof {
            self.fill()?;
        }
        Ok(())
    }

    /// Discard everything up to and including the first delimiter.
    pub fn skip_preamble(&mut self) -> Result<(), UploadError> {
        loop {
            if let Some(i) = self.finder.find(self.available()) {
                self.consume(i + self.delimiter.len());
                return Ok(());
            }
            let discard = self.available().len().saturating_sub(self.held_back());
            self.consume(discard);
            if self.eof {
                return Err(UploadError::InvalidFormat {
                    detail: "stream ended before the first boundary",
                });
            }
            self.fill()?;
        }
    }

    /// Read what follows a delimiter.
    ///
    /// Returns `true` when another part follows and `false` on the closing
    /// delimiter.
    pub fn read_boundary_suffix(&mut self) -> Result<bool, UploadError> {
        self.ensure(2)?;
        let avail = self.available();
        if avail.len() < 2 {
            return Err(UploadError::UnexpectedEof);
        }
        match &avail[..2] {
            b"--" => {
                self.consume(2);
                self.finished = true;
                Ok(false)
            }
            b"\r\n" => {
                self.consume(2);
                Ok(true)
            }
            _ => Err(UploadError::InvalidFormat {
                detail: "unexpected characters after boundary",
            }),
        }
    }

    /// Read a part's header block, up to and excluding the empty line.
    ///
    /// The returned block keeps the line break of its last header line.
    pub fn read_headers(&mut self, max: usize) -> Result<Vec<u8>, UploadError> {
        let too_large = || UploadError::HeadersTooLarge {
            max: u64::try_from(max).unwrap_or(u64::MAX),
        };

        loop {
            let avail = self.available();
            if avail.starts_with(CRLF) {
                self.consume(CRLF.len());
                self.in_body = true;
                return Ok(Vec::new());
            }
            if let Some(i) = memmem::find(avail, HEADER_TERMINATOR) {
                if i + HEADER_TERMINATOR.len() > max {
                    return Err(too_large());
                }
                let block = avail[..i + CRLF.len()].to_vec();
                self.consume(i + HEADER_TERMINATOR.len());
                self.in_body = true;
                return Ok(block);
            }
            if avail.len() > max {
                return Err(too_large());
            }
            if self.eof {
                return Err(UploadError::UnexpectedEof);
            }
            self.fill()?;
        }
    }

    /// Read body bytes of the current part.
    ///
    /// Returns `Ok(0)` once the delimiter ending the part has been consumed.
    pub fn read_body(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if !self.in_body || out.is_empty() {
            return Ok(0);
        }

        loop {
            let held_back = self.held_back();
            let avail = &self.buf[self.head..];
            let safe = match self.finder.find(avail) {
                Some(0) => {
                    self.consume(self.delimiter.len());
                    self.in_body = false;
                    return Ok(0);
                }
                Some(i) => i,
                None => avail.len().saturating_sub(held_back),
            };

            if safe > 0 {
                let n = safe.min(out.len());
                out[..n].copy_from_slice(&avail[..n]);
                self.consume(n);
                return Ok(n);
            }
            if self.eof {
                return Err(UploadError::UnexpectedEof.into());
            }
            self.fill()?;
        }
    }

    /// Skip the rest of the current part body, including its closing delimiter.
    ///
    /// Returns the number of body bytes discarded.
    pub fn drain_body(&mut self) -> Result<u64, UploadError> {
        let mut drained = 0u64;
        while self.in_body {
            let held_back = self.held_back();
            let avail = self.available();
            let skipped = match self.finder.find(avail) {
                Some(i) => {
                    self.consume(i + self.delimiter.len());
                    self.in_body = false;
                    i
                }
                None => {
                    let safe = avail.len().saturating_sub(held_back);
                    self.consume(safe);
                    if self.eof {
                        return Err(UploadError::UnexpectedEof);
                    }
                    self.fill()?;
                    safe
                }
            };
            drained = drained.saturating_add(u64::try_from(skipped).unwrap_or(u64::MAX));
        }
        Ok(drained)
    }
}
