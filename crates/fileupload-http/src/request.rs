//! A multipart request as seen by the decoder.

use std::collections::BTreeMap;
use std::io::Read;

use fileupload_core::{
    FileItem, FileUpload, ItemStore, PartIterator, UploadContext, UploadError,
};

use crate::content_type::{is_multipart_content, parse_boundary, parse_content_length};

/// The headers the decoder needs plus the request body.
#[derive(Debug)]
pub struct MultipartRequest<R> {
    content_type: Option<String>,
    content_length: Option<u64>,
    body: R,
}

impl<R> MultipartRequest<R> {
    /// Create a request from its `Content-Type`, declared length and body.
    #[must_use]
    pub fn new(content_type: Option<String>, content_length: Option<u64>, body: R) -> Self {
        Self {
            content_type,
            content_length,
            body,
        }
    }

    /// Create a request from raw header pairs.
    ///
    /// Header names match case-insensitively; the first occurrence wins.
    pub fn from_headers<'h, I>(headers: I, body: R) -> Self
    where
        I: IntoIterator<Item = (&'h str, &'h str)>,
    {
        let mut content_type = None;
        let mut content_length = None;
        for (name, value) in headers {
            if content_type.is_none() && name.eq_ignore_ascii_case("content-type") {
                content_type = Some(value.trim().to_string());
            } else if content_length.is_none() && name.eq_ignore_ascii_case("content-length") {
                content_length = Some(parse_content_length(value));
            }
        }
        Self::new(content_type, content_length.flatten(), body)
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// The declared body length, if known.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    #[must_use]
    pub fn is_multipart(&self) -> bool {
        is_multipart_content(self.content_type())
    }

    pub fn body_mut(&mut self) -> &mut R {
        &mut self.body
    }

    pub fn into_body(self) -> R {
        self.body
    }

    /// The decoder context: boundary and declared length.
    pub fn context(&self) -> Result<UploadContext, UploadError> {
        let content_type = self
            .content_type
            .as_deref()
            .ok_or(UploadError::NotMultipart { content_type: None })?;
        let boundary = parse_boundary(content_type)?;
        Ok(UploadContext::new(boundary, self.content_length))
    }
}

impl<R: Read> MultipartRequest<R> {
    /// Start lazy iteration over the request's parts.
    pub fn item_iter(self, upload: &FileUpload) -> Result<PartIterator<R>, UploadError> {
        let ctx = self.context()?;
        upload.item_iter(&ctx, self.body)
    }

    /// Decode the request into memory.
    pub fn parse(self, upload: &FileUpload) -> Result<Vec<FileItem>, UploadError> {
        let ctx = self.context()?;
        upload.parse_request(&ctx, self.body)
    }

    /// Decode the request, handing each part to `store`.
    pub fn parse_with<S: ItemStore>(
        self,
        upload: &FileUpload,
        store: &mut S,
    ) -> Result<Vec<S::Item>, UploadError> {
        let ctx = self.context()?;
        upload.parse_request_with(&ctx, self.body, store)
    }

    /// Decode the request into memory, grouped by field name.
    pub fn parse_parameter_map(
        self,
        upload: &FileUpload,
    ) -> Result<BTreeMap<String, Vec<FileItem>>, UploadError> {
        let ctx = self.context()?;
        upload.parse_parameter_map(&ctx, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fileupload_core::UploadConfig;
    use fileupload_core::testing::MultipartBody;

    fn form_request(body: &[u8]) -> MultipartRequest<&[u8]> {
        let length = body.len().to_string();
        MultipartRequest::from_headers(
            [
                ("Host", "example.com"),
                ("content-type", "multipart/form-data; boundary=AaB03x"),
                ("Content-Length", length.as_str()),
            ],
            body,
        )
    }

    #[test]
    fn reads_headers_case_insensitively() {
        let request = form_request(b"");
        assert_eq!(
            request.content_type(),
            Some("multipart/form-data; boundary=AaB03x")
        );
        assert_eq!(request.content_length(), Some(0));
        assert!(request.is_multipart());

        let ctx = request.context().unwrap();
        assert_eq!(ctx.boundary(), b"AaB03x");
        assert_eq!(ctx.content_length(), Some(0));
    }

    #[test]
    fn parses_body_through_context() {
        let body = MultipartBody::new("AaB03x")
            .field("submit-name", "Larry")
            .finish();
        let items = form_request(&body).parse(&FileUpload::default()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text(), "Larry");
    }

    #[test]
    fn declared_length_drives_preflight() {
        let body = MultipartBody::new("AaB03x").field("a", "1").finish();
        let upload = FileUpload::new(UploadConfig::new().size_max(16_i64));
        let err = form_request(&body).item_iter(&upload).unwrap_err();
        assert_eq!(err.permitted(), Some(16));
    }

    #[test]
    fn missing_or_foreign_content_type() {
        let request = MultipartRequest::new(None, None, &b""[..]);
        assert_eq!(
            request.context().unwrap_err(),
            UploadError::NotMultipart { content_type: None }
        );

        let request = MultipartRequest::from_headers([("Content-Type", "text/plain")], &b""[..]);
        assert!(!request.is_multipart());
        assert!(matches!(
            request.parse(&FileUpload::default()),
            Err(UploadError::NotMultipart { .. })
        ));
    }

    #[test]
    fn bad_content_length_is_unknown() {
        let request = MultipartRequest::from_headers(
            [
                ("Content-Type", "multipart/form-data; boundary=b"),
                ("Content-Length", "lots"),
            ],
            &b""[..],
        );
        assert_eq!(request.content_length(), None);
    }
}
