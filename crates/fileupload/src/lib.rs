//! Streaming multipart/form-data uploads with enforced size ceilings.
//!
//! fileupload decodes `multipart/form-data` request bodies as they arrive:
//!
//! - **Byte-counted ceilings**: an aggregate request ceiling and a per-file
//!   ceiling, decided by bytes actually read rather than declared lengths
//! - **Early rejection**: a declared request length over the ceiling fails
//!   before the body is touched
//! - **Lazy iteration**: parts are parsed only as the caller asks for them
//! - **Pluggable storage**: in memory, or spooled to temporary files
//!
//! # Quick Start
//!
//! ```
//! use fileupload::prelude::*;
//!
//! let body = b"--AaB03x\r\n\
//!     Content-Disposition: form-data; name=\"submit-name\"\r\n\r\n\
//!     Larry\r\n\
//!     --AaB03x\r\n\
//!     Content-Disposition: form-data; name=\"files\"; filename=\"file1.txt\"\r\n\
//!     Content-Type: text/plain\r\n\r\n\
//!     ... contents of file1.txt ...\r\n\
//!     --AaB03x--\r\n";
//!
//! let request = MultipartRequest::from_headers(
//!     [("Content-Type", "multipart/form-data; boundary=AaB03x")],
//!     &body[..],
//! );
//! let upload = FileUpload::new(UploadConfig::new().size_max(1024 * 1024_i64).file_size_max(64_i64));
//!
//! let mut parts = request.item_iter(&upload).unwrap();
//! while parts.has_next().unwrap() {
//!     let part = parts.next_part().unwrap();
//!     if part.is_form_field() {
//!         assert_eq!(part.read_to_vec().unwrap(), b"Larry");
//!     } else {
//!         assert_eq!(part.file_name(), Some("file1.txt"));
//!     }
//! }
//! ```
//!
//! # Crate Structure
//!
//! - [`fileupload_core`]: Decoding engine, ceilings and part iteration
//! - [`fileupload_http`]: Request headers, status mapping and disk spooling

#![forbid(unsafe_code)]

// Re-export crates
pub use fileupload_core as core;
pub use fileupload_http as http;

// Re-export commonly used types
pub use fileupload_core::{
    BoundedReader, FileItem, FileUpload, ItemStore, IterState, LimitScope, MemoryStore,
    MultipartReader, PartHeader, PartHeaders, PartIterator, PartReader, PartStream, SizeLimit,
    UploadConfig, UploadContext, UploadError,
};
pub use fileupload_http::{
    MultipartRequest, SpoolStore, SpooledItem, is_multipart_content, parse_boundary,
    status_code,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        FileItem, FileUpload, ItemStore, MemoryStore, MultipartRequest, PartIterator, SizeLimit,
        SpoolStore, UploadConfig, UploadContext, UploadError, status_code,
    };
}

/// Test sources for exercising upload handling.
pub mod testing {
    pub use fileupload_core::testing::{
        ChunkedSource, CountingSource, FailingSource, MultipartBody, ReadStats,
    };
}
