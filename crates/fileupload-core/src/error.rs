//! Upload errors.
//!
//! Every fault the decoder raises is an [`UploadError`]. Faults raised while
//! the caller is reading a part body travel through [`std::io::Read`] as the
//! payload of an [`std::io::Error`] and are recovered with
//! `UploadError::from(io_error)`.

use std::io;

/// Errors that can occur while decoding a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// The request exceeds the aggregate ceiling.
    ///
    /// `size` is the declared content length for a pre-flight rejection, or
    /// the number of bytes observed when the ceiling tripped mid-stream.
    TotalTooLarge { size: u64, max: u64 },
    /// A single file part exceeds the per-file ceiling.
    FileTooLarge {
        field: String,
        filename: Option<String>,
        size: u64,
        max: u64,
    },
    /// The request contains more parts than permitted.
    TooManyFields { count: u64, max: u64 },
    /// A part's header block exceeds the permitted size.
    HeadersTooLarge { max: u64 },
    /// Empty or overlong boundary token.
    InvalidBoundary,
    /// Missing boundary in the Content-Type header.
    MissingBoundary,
    /// The request is not a multipart request.
    NotMultipart { content_type: Option<String> },
    /// Missing Content-Disposition header in a part.
    MissingContentDisposition,
    /// Invalid Content-Disposition header.
    InvalidContentDisposition { detail: String },
    /// Invalid part headers.
    InvalidPartHeaders { detail: String },
    /// Structural violation of the multipart framing.
    InvalidFormat { detail: &'static str },
    /// The stream ended before the framing was complete.
    UnexpectedEof,
    /// The part iterator was driven out of order.
    Usage { detail: &'static str },
    /// I/O error from the underlying transport.
    Io { detail: String },
}

impl UploadError {
    /// The ceiling carried by a size fault.
    #[must_use]
    pub fn permitted(&self) -> Option<u64> {
        match self {
            Self::TotalTooLarge { max, .. }
            | Self::FileTooLarge { max, .. }
            | Self::TooManyFields { max, .. }
            | Self::HeadersTooLarge { max } => Some(*max),
            _ => None,
        }
    }

    /// Returns true for faults caused by a configured ceiling.
    #[must_use]
    pub fn is_size_limit(&self) -> bool {
        self.permitted().is_some()
    }

    /// Returns true for faults caused by broken framing or headers.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::InvalidBoundary
                | Self::MissingBoundary
                | Self::NotMultipart { .. }
                | Self::MissingContentDisposition
                | Self::InvalidContentDisposition { .. }
                | Self::InvalidPartHeaders { .. }
                | Self::InvalidFormat { .. }
                | Self::UnexpectedEof
        )
    }
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TotalTooLarge { size, max } => {
                write!(f, "request too large: {size} bytes exceeds limit of {max}")
            }
            Self::FileTooLarge {
                field,
                filename,
                size,
                max,
            } => {
                write!(f, "file too large: field {field:?}")?;
                if let Some(name) = filename {
                    write!(f, " ({name:?})")?;
                }
                write!(f, " has {size} bytes, exceeding limit of {max}")
            }
            Self::TooManyFields { count, max } => {
                write!(f, "too many fields: {count} exceeds limit of {max}")
            }
            Self::HeadersTooLarge { max } => write!(
                f,
                "part header section exceeds {max} bytes (maybe it is not properly terminated)"
            ),
            Self::InvalidBoundary => write!(f, "invalid multipart boundary"),
            Self::MissingBoundary => write!(f, "missing boundary in multipart Content-Type"),
            Self::NotMultipart {
                content_type: Some(ct),
            } => write!(f, "request is not multipart: Content-Type {ct:?}"),
            Self::NotMultipart { content_type: None } => {
                write!(f, "request is not multipart: no Content-Type")
            }
            Self::MissingContentDisposition => {
                write!(f, "missing Content-Disposition header in part")
            }
            Self::InvalidContentDisposition { detail } => {
                write!(f, "invalid Content-Disposition: {detail}")
            }
            Self::InvalidPartHeaders { detail } => write!(f, "invalid part headers: {detail}"),
            Self::InvalidFormat { detail } => write!(f, "invalid multipart format: {detail}"),
            Self::UnexpectedEof => write!(f, "unexpected end of multipart data"),
            Self::Usage { detail } => write!(f, "part iterator misuse: {detail}"),
            Self::Io { detail } => write!(f, "multipart I/O error: {detail}"),
        }
    }
}

impl std::error::Error for UploadError {}

impl From<io::Error> for UploadError {
    fn from(err: io::Error) -> Self {
        if let Some(inner) = err.get_ref().and_then(|e| e.downcast_ref::<UploadError>()) {
            return inner.clone();
        }
        Self::Io {
            detail: err.to_string(),
        }
    }
}

impl From<UploadError> for io::Error {
    fn from(err: UploadError) -> Self {
        let kind = if err.is_malformed() {
            io::ErrorKind::InvalidData
        } else {
            io::ErrorKind::Other
        };
        io::Error::new(kind, err)
    }
}

/// What a [`BoundedReader`](crate::BoundedReader) is guarding.
///
/// Decides which fault is raised when the ceiling trips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitScope {
    /// The whole request body.
    Request,
    /// The body of one file part.
    Part {
        field: String,
        filename: Option<String>,
    },
}

impl LimitScope {
    pub(crate) fn exceeded(&self, size: u64, max: u64) -> UploadError {
        match self {
            Self::Request => UploadError::TotalTooLarge { size, max },
            Self::Part { field, filename } => UploadError::FileTooLarge {
                field: field.clone(),
                filename: filename.clone(),
                size,
                max,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permitted_reports_ceiling() {
        let err = UploadError::TotalTooLarge { size: 319, max: 200 };
        assert_eq!(err.permitted(), Some(200));
        assert!(err.is_size_limit());
        assert!(!err.is_malformed());

        assert_eq!(UploadError::UnexpectedEof.permitted(), None);
        assert!(UploadError::UnexpectedEof.is_malformed());
    }

    #[test]
    fn io_round_trip_preserves_fault() {
        let original = UploadError::FileTooLarge {
            field: "file".to_string(),
            filename: Some("foo.tab".to_string()),
            size: 31,
            max: 30,
        };
        let io_err: io::Error = original.clone().into();
        assert_eq!(UploadError::from(io_err), original);
    }

    #[test]
    fn plain_io_error_becomes_io_variant() {
        let err = UploadError::from(io::Error::other("connection reset"));
        assert!(matches!(err, UploadError::Io { ref detail } if detail.contains("reset")));

        // A transport that hangs up early is an I/O failure; only the
        // tokenizer's own end-of-stream fault is malformed input.
        let eof = UploadError::from(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(matches!(eof, UploadError::Io { .. }), "{eof:?}");
        assert!(!eof.is_malformed());

        let framed: io::Error = UploadError::UnexpectedEof.into();
        assert_eq!(UploadError::from(framed), UploadError::UnexpectedEof);
    }

    #[test]
    fn display_mentions_limit() {
        let err = UploadError::FileTooLarge {
            field: "file".to_string(),
            filename: None,
            size: 16,
            max: 15,
        };
        let msg = err.to_string();
        assert!(msg.contains("15"), "message: {msg}");
        assert!(msg.contains("\"file\""), "message: {msg}");
    }

    #[test]
    fn scope_selects_fault_kind() {
        assert_eq!(
            LimitScope::Request.exceeded(301, 300),
            UploadError::TotalTooLarge { size: 301, max: 300 }
        );
        let scope = LimitScope::Part {
            field: "f".to_string(),
            filename: None,
        };
        assert!(matches!(
            scope.exceeded(6, 5),
            UploadError::FileTooLarge { max: 5, .. }
        ));
    }
}
