//! Mapping decoder faults to HTTP responses.

use fileupload_core::UploadError;

/// The response status for a fault.
///
/// Ceiling violations are 413, anything the client sent wrong is 400 and
/// transport failures are 500.
#[must_use]
pub fn status_code(err: &UploadError) -> u16 {
    if err.is_size_limit() {
        413
    } else if matches!(err, UploadError::Io { .. }) {
        500
    } else {
        400
    }
}

/// The standard reason phrase for a status returned by [`status_code`].
#[must_use]
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
