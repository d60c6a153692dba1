//! `Content-Type` and `Content-Length` header handling.

use fileupload_core::{MAX_BOUNDARY_LEN, UploadError};

/// Media type prefix shared by every multipart request.
pub const MULTIPART: &str = "multipart/";
/// `multipart/form-data`, the HTML form encoding.
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
/// `multipart/mixed`, accepted as a top-level request type.
pub const MULTIPART_MIXED: &str = "multipart/mixed";

/// Returns true if `content_type` names a multipart media type.
#[must_use]
pub fn is_multipart_content(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| {
        let ct = ct.trim_start();
        ct.get(..MULTIPART.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(MULTIPART))
    })
}

/// Parse the boundary from a multipart `Content-Type` header.
///
/// Content-Type format: `multipart/form-data; boundary=----WebKitFormBoundary...`
pub fn parse_boundary(content_type: &str) -> Result<String, UploadError> {
    if !is_multipart_content(Some(content_type)) {
        return Err(UploadError::NotMultipart {
            content_type: Some(content_type.to_string()),
        });
    }

    for param in content_type.split(';').skip(1) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("boundary") {
            let boundary = value.trim().trim_matches('"').trim_matches('\'');
            if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LEN {
                return Err(UploadError::InvalidBoundary);
            }
            return Ok(boundary.to_string());
        }
    }

    Err(UploadError::MissingBoundary)
}

/// Parse a `Content-Length` header value.
///
/// Missing, negative or malformed values mean the length is unknown.
#[must_use]
pub fn parse_content_length(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}
