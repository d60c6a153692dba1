//! Streaming multipart/form-data decoding under byte-count ceilings.
//!
//! This crate provides the decoding engine:
//! - [`BoundedReader`], a byte-counting reader that faults past a ceiling
//! - [`MultipartReader`], the boundary tokenizer
//! - [`PartHeader`] parsing for each part's header block
//! - [`FileUpload`], which enforces the aggregate and per-file ceilings
//! - [`PartIterator`], lazy forward-only access to the parts of a request
//!
//! # Design Principles
//!
//! - Ceilings are decided by bytes actually read, never by declared lengths
//! - Bodies stream through a small fixed buffer
//! - No I/O beyond what the caller asks for
//!
//! # Example
//!
//! ```
//! use fileupload_core::{FileUpload, UploadConfig, UploadContext, UploadError};
//!
//! let body = b"--AaB03x\r\n\
//!     Content-Disposition: form-data; name=\"files\"; filename=\"file1.txt\"\r\n\
//!     Content-Type: text/plain\r\n\r\n\
//!     ... contents of file1.txt ...\r\n\
//!     --AaB03x--\r\n";
//!
//! let upload = FileUpload::new(UploadConfig::new().file_size_max(8_i64));
//! let ctx = UploadContext::new("AaB03x", None);
//!
//! let err = upload.parse_request(&ctx, &body[..]).unwrap_err();
//! assert!(matches!(err, UploadError::FileTooLarge { .. }));
//! assert_eq!(err.permitted(), Some(8));
//! ```

#![forbid(unsafe_code)]

mod bounded;
pub mod config;
pub mod error;
pub mod header;
mod item;
mod iter;
mod limit;
pub mod reader;
pub mod testing;
mod upload;

pub use bounded::BoundedReader;
pub use config::{DEFAULT_PART_HEADER_SIZE_MAX, UploadConfig, UploadContext};
pub use error::{LimitScope, UploadError};
pub use header::{PartHeader, PartHeaders, parse_content_disposition};
pub use item::{FileItem, ItemStore, MemoryStore};
pub use iter::{IterState, PartIterator, PartReader, PartStream};
pub use limit::SizeLimit;
pub use reader::{DEFAULT_BUFFER_SIZE, MAX_BOUNDARY_LEN, MultipartReader};
pub use upload::FileUpload;
