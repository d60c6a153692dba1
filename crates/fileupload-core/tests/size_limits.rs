//! Request and per-file ceilings, driven end to end through `FileUpload`.

use std::io::Read;

use fileupload_core::testing::{ChunkedSource, CountingSource, FailingSource};
use fileupload_core::{
    FileUpload, IterState, SizeLimit, UploadConfig, UploadContext, UploadError,
};

const BOUNDARY: &str = "---1234";
const CONTENT: &[u8] = b"This is the content of the file\n";

const SINGLE_FILE: &str = concat!(
    "-----1234\r\n",
    "Content-Disposition: form-data; name=\"file\"; filename=\"foo.tab\"\r\n",
    "Content-Type: text/whatever\r\n",
    "\r\n",
    "This is the content of the file\n",
    "\r\n",
    "-----1234--\r\n",
);

const FAKED_LENGTH: &str = concat!(
    "-----1234\r\n",
    "Content-Disposition: form-data; name=\"file\"; filename=\"foo.tab\"\r\n",
    "Content-Type: text/whatever\r\n",
    "Content-Length: 10\r\n",
    "\r\n",
    "This is the content of the file\n",
    "\r\n",
    "-----1234--\r\n",
);

const TWO_FILES: &str = concat!(
    "-----1234\r\n",
    "Content-Disposition: form-data; name=\"file1\"; filename=\"foo1.tab\"\r\n",
    "Content-Type: text/whatever\r\n",
    "Content-Length: 10\r\n",
    "\r\n",
    "This is the content of the file\n",
    "\r\n",
    "-----1234\r\n",
    "Content-Disposition: form-data; name=\"file2\"; filename=\"foo2.tab\"\r\n",
    "Content-Type: text/whatever\r\n",
    "\r\n",
    "This is the content of the file\n",
    "\r\n",
    "-----1234--\r\n",
);

fn declared(request: &str) -> UploadContext {
    UploadContext::new(BOUNDARY, Some(request.len() as u64))
}

fn unknown_length() -> UploadContext {
    UploadContext::new(BOUNDARY, None)
}

fn with_file_limit(limit: i64) -> FileUpload {
    FileUpload::new(UploadConfig::new().file_size_max(limit))
}

#[test]
fn file_size_limit() {
    for limit in [-1, 40] {
        let items = with_file_limit(limit)
            .parse_request(&declared(SINGLE_FILE), SINGLE_FILE.as_bytes())
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].get(), CONTENT);
        assert_eq!(items[0].field_name(), "file");
        assert_eq!(items[0].file_name(), Some("foo.tab"));
    }

    let err = with_file_limit(30)
        .parse_request(&declared(SINGLE_FILE), SINGLE_FILE.as_bytes())
        .unwrap_err();
    assert!(matches!(err, UploadError::FileTooLarge { .. }), "{err:?}");
    assert_eq!(err.permitted(), Some(30));
}

#[test]
fn file_size_limit_with_faked_content_length() {
    for limit in [-1, 40] {
        let items = with_file_limit(limit)
            .parse_request(&declared(FAKED_LENGTH), FAKED_LENGTH.as_bytes())
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].get(), CONTENT);
        assert_eq!(items[0].header().content_length(), Some(10));
    }

    // Declared length over the ceiling: rejected when the part is opened.
    let upload = with_file_limit(5);
    let mut parts = upload
        .item_iter(&declared(FAKED_LENGTH), FAKED_LENGTH.as_bytes())
        .unwrap();
    assert!(parts.has_next().unwrap());
    let err = parts.next_part().unwrap_err();
    assert_eq!(err.permitted(), Some(5));
    assert!(parts.is_failed());

    // Declared length under the ceiling but the body is larger.
    let err = with_file_limit(15)
        .parse_request(&declared(FAKED_LENGTH), FAKED_LENGTH.as_bytes())
        .unwrap_err();
    assert!(matches!(err, UploadError::FileTooLarge { .. }), "{err:?}");
    assert_eq!(err.permitted(), Some(15));
}

#[test]
fn max_size_limit() {
    let upload = FileUpload::new(UploadConfig::new().size_max(200_i64).file_size_max(-1_i64));

    let err = upload
        .parse_request(&declared(TWO_FILES), TWO_FILES.as_bytes())
        .unwrap_err();
    assert!(matches!(err, UploadError::TotalTooLarge { size: 319, .. }), "{err:?}");
    assert_eq!(err.permitted(), Some(200));

    // Without a declared length the ceiling trips while streaming.
    let err = upload
        .parse_request(&unknown_length(), ChunkedSource::new(TWO_FILES, 10))
        .unwrap_err();
    assert!(matches!(err, UploadError::TotalTooLarge { .. }), "{err:?}");
    assert_eq!(err.permitted(), Some(200));
}

/// Reads the first part of `TWO_FILES` in full, then expects the second
/// part's body to push the request past a 300 byte ceiling.
fn assert_second_body_trips_ceiling<R: Read>(source: R, label: &str) {
    let upload = FileUpload::new(UploadConfig::new().size_max(300_i64).file_size_max(-1_i64));
    let mut parts = upload.item_iter(&unknown_length(), source).unwrap();

    assert!(parts.has_next().unwrap(), "{label}");
    let first = parts.next_part().unwrap();
    assert!(!first.is_form_field());
    assert_eq!(first.field_name(), "file1");
    assert_eq!(first.file_name(), Some("foo1.tab"));
    assert_eq!(first.read_to_vec().unwrap(), CONTENT, "{label}");

    // The second header still fits under the ceiling.
    assert!(parts.has_next().unwrap(), "{label}");
    let second = parts.next_part().unwrap();
    assert_eq!(second.field_name(), "file2");

    let err = second.read_to_vec().unwrap_err();
    assert!(matches!(err, UploadError::TotalTooLarge { .. }), "{label}: {err:?}");
    assert_eq!(err.permitted(), Some(300));
    assert_eq!(parts.state(), IterState::Failed);
    assert_eq!(parts.has_next().unwrap_err(), err);
}

#[test]
fn max_size_limit_unknown_content_length() {
    for chunk in [1, 10, 64, 200, 512, 4096, TWO_FILES.len()] {
        let label = format!("chunk {chunk}");
        assert_second_body_trips_ceiling(ChunkedSource::new(TWO_FILES, chunk), &label);
    }
    assert_second_body_trips_ceiling(TWO_FILES.as_bytes(), "whole slice");
}

#[test]
fn request_ceiling_surfaces_from_body_read() {
    let upload = FileUpload::new(UploadConfig::new().size_max(300_i64));
    let mut parts = upload
        .item_iter(&unknown_length(), TWO_FILES.as_bytes())
        .unwrap();

    assert!(parts.has_next().unwrap());
    parts.next_part().unwrap().read_to_vec().unwrap();
    assert!(matches!(parts.has_next(), Ok(true)));

    let mut body = parts.next_part().unwrap().open().unwrap();
    let mut delivered = Vec::new();
    let err = UploadError::from(body.read_to_end(&mut delivered).unwrap_err());
    assert_eq!(err, UploadError::TotalTooLarge { size: 301, max: 300 });
    // Every body byte within the ceiling reached the caller first.
    assert_eq!(delivered, &CONTENT[..delivered.len()]);
    assert!(!delivered.is_empty());
}

#[test]
fn unlimited_accepts_large_bodies() {
    let big = vec![b'x'; 256 * 1024];
    let body = fileupload_core::testing::MultipartBody::new("big")
        .file("f", "big.bin", "application/octet-stream", &big)
        .finish();
    let items = FileUpload::default()
        .parse_request(&UploadContext::new("big", None), ChunkedSource::new(body, 1500))
        .unwrap();
    assert_eq!(items[0].size(), big.len());
    assert_eq!(items[0].get(), &big[..]);
}

#[test]
fn preflight_touches_no_bytes() {
    let (source, stats) = CountingSource::new(TWO_FILES.as_bytes());
    let upload = FileUpload::new(UploadConfig::new().size_max(100_i64));
    let err = upload.item_iter(&declared(TWO_FILES), source).unwrap_err();
    assert_eq!(err, UploadError::TotalTooLarge { size: 319, max: 100 });
    assert_eq!(stats.bytes(), 0);
    assert_eq!(stats.calls(), 0);
}

#[test]
fn declared_length_within_limit_is_still_counted() {
    // The client claims a small request but sends more.
    let ctx = UploadContext::new(BOUNDARY, Some(50));
    let upload = FileUpload::new(UploadConfig::new().size_max(200_i64));
    let err = upload.parse_request(&ctx, TWO_FILES.as_bytes()).unwrap_err();
    assert_eq!(err.permitted(), Some(200));
}

#[test]
fn iteration_reads_lazily() {
    let (source, stats) = CountingSource::new(ChunkedSource::new(TWO_FILES, 10));
    let upload = FileUpload::new(UploadConfig::new().buffer_size(32));
    let mut parts = upload.item_iter(&unknown_length(), source).unwrap();
    assert_eq!(stats.bytes(), 0);

    assert!(parts.has_next().unwrap());
    let first = parts.next_part().unwrap();
    assert_eq!(first.field_name(), "file1");
    assert!(
        stats.bytes() < TWO_FILES.len() as u64,
        "read {} bytes before the first body was consumed",
        stats.bytes()
    );
    assert_eq!(parts.bytes_read(), stats.bytes());
}

#[test]
fn skipped_body_counts_toward_request_limit() {
    let upload = FileUpload::new(UploadConfig::new().size_max(300_i64));
    let mut parts = upload
        .item_iter(&unknown_length(), ChunkedSource::new(TWO_FILES, 10))
        .unwrap();

    assert!(parts.has_next().unwrap());
    parts.next_part().unwrap();
    assert!(parts.has_next().unwrap());
    assert_eq!(parts.next_part().unwrap().field_name(), "file2");

    // Leaving the second body unread still drains it through the limiter.
    let err = parts.has_next().unwrap_err();
    assert_eq!(err.permitted(), Some(300));
}

#[test]
fn part_reader_reports_progress() {
    let upload = FileUpload::new(UploadConfig::new().file_size_max(SizeLimit::Limited(32)));
    let mut parts = upload
        .item_iter(&unknown_length(), SINGLE_FILE.as_bytes())
        .unwrap();
    assert!(parts.has_next().unwrap());
    let mut body = parts.next_part().unwrap().open().unwrap();
    let mut head = [0u8; 4];
    body.read_exact(&mut head).unwrap();
    assert_eq!(&head, b"This");
    assert_eq!(body.bytes_read(), 4);
    let rest = body.read_all().unwrap();
    assert_eq!(rest.len(), CONTENT.len() - 4);
}

#[test]
fn transport_errors_fail_iteration() {
    let truncated = &TWO_FILES.as_bytes()[..200];
    let source = FailingSource::transport(truncated, std::io::ErrorKind::ConnectionReset);
    let err = FileUpload::default()
        .parse_request(&unknown_length(), source)
        .unwrap_err();
    assert!(matches!(err, UploadError::Io { .. }), "{err:?}");
    assert!(!err.is_size_limit());
}

#[test]
fn truncated_request_is_malformed() {
    let truncated = &TWO_FILES.as_bytes()[..200];
    let err = FileUpload::default()
        .parse_request(&unknown_length(), truncated)
        .unwrap_err();
    assert_eq!(err, UploadError::UnexpectedEof);
    assert!(err.is_malformed());
}
