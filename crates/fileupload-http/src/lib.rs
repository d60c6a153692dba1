//! HTTP adaptation for `fileupload-core`.
//!
//! The decoding engine only needs a boundary, a declared length and a byte
//! stream. This crate extracts the first two from request headers, maps
//! faults to response statuses and provides a disk-backed item store.
//!
//! # Example
//!
//! ```
//! use fileupload_core::{FileUpload, UploadConfig};
//! use fileupload_http::{MultipartRequest, status_code};
//!
//! let body = b"--b\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1234567890\r\n--b--\r\n";
//! let request = MultipartRequest::from_headers(
//!     [("Content-Type", "multipart/form-data; boundary=b"), ("Content-Length", "68")],
//!     &body[..],
//! );
//!
//! let upload = FileUpload::new(UploadConfig::new().size_max(32_i64));
//! let err = request.parse(&upload).unwrap_err();
//! assert_eq!(status_code(&err), 413);
//! ```

#![forbid(unsafe_code)]

pub mod content_type;
mod request;
mod spool;
mod status;

pub use content_type::{
    MULTIPART, MULTIPART_FORM_DATA, MULTIPART_MIXED, is_multipart_content, parse_boundary,
    parse_content_length,
};
pub use request::MultipartRequest;
pub use spool::{DEFAULT_SPOOL_THRESHOLD, SpoolStore, SpooledItem};
pub use status::{reason_phrase, status_code};
