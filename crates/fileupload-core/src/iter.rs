//! Lazy, forward-only iteration over the parts of a request.
//!
//! [`PartIterator`] is a cursor over the wire. `has_next` positions it at the
//! next part (discarding whatever the caller left unread of the previous
//! one) and `next_part` parses that part's headers and hands out a
//! [`PartStream`]. The stream mutably borrows the iterator, so it cannot
//! outlive the position it describes.
//!
//! ```
//! use fileupload_core::{FileUpload, UploadConfig, UploadContext};
//!
//! let body = b"--xyz\r\n\
//!     Content-Disposition: form-data; name=\"note\"\r\n\r\n\
//!     hello\r\n\
//!     --xyz--\r\n";
//! let upload = FileUpload::new(UploadConfig::new().size_max(1024_i64));
//! let ctx = UploadContext::new("xyz", Some(body.len() as u64));
//!
//! let mut parts = upload.item_iter(&ctx, &body[..]).unwrap();
//! while parts.has_next().unwrap() {
//!     let part = parts.next_part().unwrap();
//!     assert_eq!(part.field_name(), "note");
//!     assert_eq!(part.read_to_vec().unwrap(), b"hello");
//! }
//! ```

use std::io::{self, Read};

use crate::bounded::BoundedReader;
use crate::config::UploadConfig;
use crate::error::{LimitScope, UploadError};
use crate::header::{PartHeader, PartHeaders};
use crate::limit::SizeLimit;
use crate::reader::MultipartReader;

/// Position of a [`PartIterator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterState {
    /// Nothing has been read yet.
    NotStarted,
    /// A part follows; its headers have not been read.
    PositionedAtPart,
    /// A part has been handed out; its body may be partially unread.
    AtPartBody,
    /// The closing delimiter has been read.
    Exhausted,
    /// A fault occurred; every further call re-raises it.
    Failed,
}

/// The shared cursor a part body reads through.
#[derive(Debug)]
struct Cursor<R> {
    reader: MultipartReader<BoundedReader<R>>,
    state: IterState,
    fault: Option<UploadError>,
}

impl<R> Cursor<R> {
    fn fail(&mut self, err: UploadError) -> UploadError {
        if self.fault.is_none() {
            tracing::debug!(error = %err, "multipart iteration failed");
            self.fault = Some(err.clone());
        }
        self.state = IterState::Failed;
        err
    }

    fn terminal(&self) -> UploadError {
        self.fault.clone().unwrap_or(UploadError::Usage {
            detail: "iterator has failed",
        })
    }
}

/// Forward-only iterator over the parts of one request.
#[derive(Debug)]
pub struct PartIterator<R> {
    cursor: Cursor<R>,
    file_size_max: SizeLimit,
    file_count_max: SizeLimit,
    part_header_size_max: usize,
    parts_read: u64,
}

impl<R> PartIterator<R> {
    /// Current position.
    #[must_use]
    pub fn state(&self) -> IterState {
        self.cursor.state
    }

    /// Returns true once a fault has ended iteration.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.cursor.state == IterState::Failed
    }

    /// Number of parts handed out so far.
    #[must_use]
    pub fn parts_read(&self) -> u64 {
        self.parts_read
    }

    /// Bytes pulled from the transport so far, framing included.
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.cursor.reader.get_ref().consumed()
    }
}

impl<R: Read> PartIterator<R> {
    pub(crate) fn new(
        source: BoundedReader<R>,
        boundary: &[u8],
        config: &UploadConfig,
    ) -> Result<Self, UploadError> {
        let reader = MultipartReader::with_buffer_size(source, boundary, config.get_buffer_size())?;
        Ok(Self {
            cursor: Cursor {
                reader,
                state: IterState::NotStarted,
                fault: None,
            },
            file_size_max: config.get_file_size_max(),
            file_count_max: config.get_file_count_max(),
            part_header_size_max: config.get_part_header_size_max(),
            parts_read: 0,
        })
    }

    /// Position at the next part and report whether one exists.
    ///
    /// Unread body bytes of the previous part are drained first; they still
    /// count toward the request ceiling.
    pub fn has_next(&mut self) -> Result<bool, UploadError> {
        match self.cursor.state {
            IterState::Failed => Err(self.cursor.terminal()),
            IterState::Exhausted => Ok(false),
            IterState::PositionedAtPart => Ok(true),
            IterState::NotStarted | IterState::AtPartBody => match self.advance() {
                Ok(true) => {
                    self.cursor.state = IterState::PositionedAtPart;
                    Ok(true)
                }
                Ok(false) => {
                    self.cursor.state = IterState::Exhausted;
                    tracing::debug!(
                        parts = self.parts_read,
                        bytes = self.bytes_read(),
                        "multipart request complete"
                    );
                    Ok(false)
                }
                Err(err) => Err(self.cursor.fail(err)),
            },
        }
    }

    fn advance(&mut self) -> Result<bool, UploadError> {
        let reader = &mut self.cursor.reader;
        if self.cursor.state == IterState::NotStarted {
            reader.skip_preamble()?;
        } else if reader.is_in_body() {
            let skipped = reader.drain_body()?;
            tracing::trace!(bytes = skipped, "discarded unread part body");
        }
        reader.read_boundary_suffix()
    }

    /// Read the next part's headers and hand out the part.
    ///
    /// Must follow a `has_next` that returned `true`.
    pub fn next_part(&mut self) -> Result<PartStream<'_, R>, UploadError> {
        match self.cursor.state {
            IterState::PositionedAtPart => {}
            IterState::Failed => return Err(self.cursor.terminal()),
            IterState::NotStarted => {
                return Err(UploadError::Usage {
                    detail: "next_part called before has_next",
                });
            }
            IterState::AtPartBody => {
                return Err(UploadError::Usage {
                    detail: "next_part called twice without has_next",
                });
            }
            IterState::Exhausted => {
                return Err(UploadError::Usage {
                    detail: "next_part called after the last part",
                });
            }
        }

        let header = match self.read_header() {
            Ok(header) => header,
            Err(err) => return Err(self.cursor.fail(err)),
        };
        self.parts_read += 1;
        self.cursor.state = IterState::AtPartBody;

        let limit = if header.is_file() {
            self.file_size_max
        } else {
            SizeLimit::Unlimited
        };
        tracing::debug!(
            field = header.field_name(),
            file = ?header.file_name(),
            "multipart part started"
        );

        Ok(PartStream {
            header,
            limit,
            cursor: &mut self.cursor,
        })
    }

    fn read_header(&mut self) -> Result<PartHeader, UploadError> {
        if let SizeLimit::Limited(max) = self.file_count_max {
            if self.parts_read >= max {
                return Err(UploadError::TooManyFields {
                    count: self.parts_read + 1,
                    max,
                });
            }
        }

        let block = self.cursor.reader.read_headers(self.part_header_size_max)?;
        let header = PartHeader::parse(&block)?;

        // A declared length can reject a part early, never admit one.
        if let (Some(declared), SizeLimit::Limited(max)) =
            (header.content_length(), self.file_size_max)
        {
            if header.is_file() && declared > max {
                return Err(UploadError::FileTooLarge {
                    field: header.field_name().to_string(),
                    filename: header.file_name().map(str::to_string),
                    size: declared,
                    max,
                });
            }
        }
        Ok(header)
    }
}

/// One part, positioned at the start of its body.
#[derive(Debug)]
pub struct PartStream<'a, R> {
    header: PartHeader,
    limit: SizeLimit,
    cursor: &'a mut Cursor<R>,
}

impl<'a, R: Read> PartStream<'a, R> {
    /// The part's parsed headers.
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

    /// The ceiling applied to this part's body.
    #[must_use]
    pub fn limit(&self) -> SizeLimit {
        self.limit
    }

    /// Open the body for reading.
    ///
    /// File parts are bounded by the per-file ceiling from here on; form
    /// fields only by the request ceiling.
    pub fn open(self) -> Result<PartReader<'a, R>, UploadError> {
        if self.cursor.state == IterState::Failed {
            return Err(self.cursor.terminal());
        }
        let scope = LimitScope::Part {
            field: self.header.field_name().to_string(),
            filename: self.header.file_name().map(str::to_string),
        };
        let body = PartBody {
            cursor: self.cursor,
        };
        Ok(PartReader {
            header: self.header,
            inner: BoundedReader::new(body, self.limit, scope),
        })
    }

    /// Read the whole body into memory.
    pub fn read_to_vec(self) -> Result<Vec<u8>, UploadError> {
        self.open()?.read_all()
    }
}

#[derive(Debug)]
struct PartBody<'a, R> {
    cursor: &'a mut Cursor<R>,
}

impl<R: Read> Read for PartBody<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.reader.read_body(buf)
    }
}

/// Reader over one part's body.
///
/// Any fault it raises ends the whole iteration.
#[derive(Debug)]
pub struct PartReader<'a, R> {
    header: PartHeader,
    inner: BoundedReader<PartBody<'a, R>>,
}

impl<R: Read> PartReader<'_, R> {
    #[must_use]
    pub fn header(&self) -> &PartHeader {
        &self.header
    }

    /// Body bytes delivered so far.
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.inner.consumed()
    }

    /// Read the rest of the body into memory.
    pub fn read_all(&mut self) -> Result<Vec<u8>, UploadError> {
        let mut out = Vec::new();
        self.read_to_end(&mut out)?;
        Ok(out)
    }
}

impl<R: Read> Read for PartReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let cursor = &self.inner.get_ref().cursor;
        if cursor.state == IterState::Failed {
            return Err(cursor.terminal().into());
        }
        match self.inner.read(buf) {
            Ok(n) => Ok(n),
            Err(err) => {
                let fault = self.inner.get_mut().cursor.fail(UploadError::from(err));
                Err(fault.into())
            }
        }
    }
}
