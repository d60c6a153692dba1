//! Part header parsing.
//!
//! Each part starts with a small header block. Only `Content-Disposition`
//! (field name, file name), `Content-Type` and the advisory `Content-Length`
//! are interpreted; everything else is kept verbatim.

use std::borrow::Cow;

use crate::error::UploadError;

/// Headers of a single part, in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartHeaders {
    entries: Vec<(String, String)>,
}

impl PartHeaders {
    /// Create empty headers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw header block.
    ///
    /// Lines starting with a space or tab continue the previous header.
    /// Lines without a colon are ignored. A block that is not valid UTF-8 is
    /// read as ISO-8859-1, which is what browsers send in `filename=`.
    pub fn parse(block: &[u8]) -> Result<Self, UploadError> {
        let text = decode_header_block(block);

        let mut headers = Self::new();
        for line in text.split("\r\n") {
            if line.is_empty() {
                continue;
            }
            if line.starts_with(|c: char| c == ' ' || c == '\t') {
                if let Some((_, value)) = headers.entries.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim();
                if name.is_empty() {
                    return Err(UploadError::InvalidPartHeaders {
                        detail: format!("header line without a name: {line:?}"),
                    });
                }
                headers.insert(name, value.trim());
            }
        }
        Ok(headers)
    }

    /// Append a header.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Get the first value for a header (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get every value for a header (case-insensitive).
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over all headers as (name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Returns the number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn decode_header_block(block: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(block) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(block.iter().copied().map(char::from).collect()),
    }
}

/// The identity of one part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartHeader {
    field_name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    content_length: Option<u64>,
    headers: PartHeaders,
}

impl PartHeader {
    /// Build a part header from parsed headers.
    pub fn from_headers(headers: PartHeaders) -> Result<Self, UploadError> {
        let disposition = headers
            .get("content-disposition")
            .ok_or(UploadError::MissingContentDisposition)?;
        let (field_name, file_name) = parse_content_disposition(disposition)?;
        let content_type = headers.get("content-type").map(str::to_string);
        let content_length = headers
            .get("content-length")
            .and_then(|v| v.trim().parse::<u64>().ok());

        Ok(Self {
            field_name,
            file_name,
            content_type,
            content_length,
            headers,
        })
    }

    /// Parse a raw header block.
    pub fn parse(block: &[u8]) -> Result<Self, UploadError> {
        Self::from_headers(PartHeaders::parse(block)?)
    }

    /// The form field name.
    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// The client-side file name, for file parts.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// The declared content type.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// The declared `Content-Length` of the part.
    ///
    /// Advisory only: the client may lie, so it never grants bytes.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// All headers of the part.
    #[must_use]
    pub fn headers(&self) -> &PartHeaders {
        &self.headers
    }

    /// Returns true if this part is a simple form field.
    #[must_use]
    pub fn is_form_field(&self) -> bool {
        self.file_name.is_none()
    }

    /// Returns true if this part is a file upload.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.file_name.is_some()
    }
}

/// Parse a Content-Disposition header value.
///
/// Format: `form-data; name="field"; filename="file.txt"`
pub fn parse_content_disposition(value: &str) -> Result<(String, Option<String>), UploadError> {
    let mut params = split_params(value);
    let disposition = params.next().unwrap_or_default();
    if !disposition.eq_ignore_ascii_case("form-data")
        && !disposition.eq_ignore_ascii_case("attachment")
    {
        return Err(UploadError::InvalidContentDisposition {
            detail: format!("unsupported disposition type {disposition:?}"),
        });
    }

    let mut name = None;
    let mut filename = None;

    for param in params {
        let (key, raw_value) = match param.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (param, ""),
        };
        if key.eq_ignore_ascii_case("name") && name.is_none() {
            name = Some(unquote(raw_value));
        } else if key.eq_ignore_ascii_case("filename") && filename.is_none() {
            let unquoted = unquote(raw_value);
            if unquoted.contains('\0') {
                return Err(UploadError::InvalidContentDisposition {
                    detail: "filename contains a NUL character".to_string(),
                });
            }
            filename = Some(unquoted.trim().to_string());
        }
    }

    let name = name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| UploadError::InvalidContentDisposition {
            detail: "missing name parameter".to_string(),
        })?;

    Ok((name, filename))
}

/// Split on `;` outside of double quotes, trimming each piece.
fn split_params(value: &str) -> impl Iterator<Item = &str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                pieces.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&value[start..]);
    pieces.into_iter().map(str::trim).filter(|p| !p.is_empty())
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        let inner = &s[1..s.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else {
                out.push(c);
            }
        }
        out
    } else if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_file_part_header() {
        let block = b"Content-Disposition: form-data; name=\"file\"; filename=\"foo.tab\"\r\n\
                      Content-Type: text/whatever\r\n";
        let header = PartHeader::parse(block).unwrap();
        assert_eq!(header.field_name(), "file");
        assert_eq!(header.file_name(), Some("foo.tab"));
        assert_eq!(header.content_type(), Some("text/whatever"));
        assert_eq!(header.content_length(), None);
        assert!(header.is_file());
    }

    #[test]
    fn missing_filename_is_form_field() {
        let header = PartHeader::parse(b"Content-Disposition: form-data; name=\"note\"\r\n").unwrap();
        assert!(header.is_form_field());
        assert_eq!(header.file_name(), None);
    }

    #[test]
    fn empty_filename_is_still_a_file() {
        let header =
            PartHeader::parse(b"Content-Disposition: form-data; name=\"f\"; filename=\"\"\r\n")
                .unwrap();
        assert_eq!(header.file_name(), Some(""));
        assert!(header.is_file());
    }

    #[test]
    fn declared_content_length_is_kept_as_metadata() {
        let block = b"Content-Disposition: form-data; name=\"f\"; filename=\"a\"\r\n\
                      Content-Length: 10\r\n";
        assert_eq!(PartHeader::parse(block).unwrap().content_length(), Some(10));

        let bogus = b"Content-Disposition: form-data; name=\"f\"\r\nContent-Length: ten\r\n";
        assert_eq!(PartHeader::parse(bogus).unwrap().content_length(), None);
    }

    #[test]
    fn first_occurrence_wins() {
        let block = b"Content-Type: text/plain\r\n\
                      content-disposition: form-data; name=\"first\"; name=\"second\"\r\n\
                      Content-Type: image/png\r\n";
        let header = PartHeader::parse(block).unwrap();
        assert_eq!(header.field_name(), "first");
        assert_eq!(header.content_type(), Some("text/plain"));
        assert_eq!(header.headers().get_all("content-type").count(), 2);
    }

    #[test]
    fn folded_lines_are_joined() {
        let block = b"Content-Disposition: form-data;\r\n\tname=\"folded\"\r\n";
        let header = PartHeader::parse(block).unwrap();
        assert_eq!(header.field_name(), "folded");
    }

    #[test]
    fn quoted_semicolon_stays_in_filename() {
        let (name, filename) =
            parse_content_disposition(r#"form-data; name="f"; filename="a;b \"c\".txt""#).unwrap();
        assert_eq!(name, "f");
        assert_eq!(filename.as_deref(), Some("a;b \"c\".txt"));
    }

    #[test]
    fn case_insensitive_params() {
        let (name, filename) =
            parse_content_disposition("Form-Data; Name=\"field\"; FileName=\"upload.txt\"").unwrap();
        assert_eq!(name, "field");
        assert_eq!(filename.as_deref(), Some("upload.txt"));
    }

    #[test]
    fn missing_disposition_is_rejected() {
        assert_eq!(
            PartHeader::parse(b"Content-Type: text/plain\r\n").unwrap_err(),
            UploadError::MissingContentDisposition
        );
    }

    #[test]
    fn missing_or_empty_name_is_rejected() {
        assert!(matches!(
            parse_content_disposition("form-data; filename=\"a.txt\""),
            Err(UploadError::InvalidContentDisposition { .. })
        ));
        assert!(matches!(
            parse_content_disposition("form-data; name=\"\""),
            Err(UploadError::InvalidContentDisposition { .. })
        ));
    }

    #[test]
    fn inline_disposition_is_rejected() {
        assert!(matches!(
            parse_content_disposition("inline; name=\"x\""),
            Err(UploadError::InvalidContentDisposition { .. })
        ));
    }

    #[test]
    fn nul_in_filename_is_rejected() {
        assert!(matches!(
            parse_content_disposition("form-data; name=\"f\"; filename=\"a\0b\""),
            Err(UploadError::InvalidContentDisposition { .. })
        ));
    }

    #[test]
    fn latin1_filename_is_decoded() {
        let block = b"Content-Disposition: form-data; name=\"doc\"; filename=\"caf\xe9.txt\"\r\n";
        let header = PartHeader::parse(block).unwrap();
        assert_eq!(header.field_name(), "doc");
        assert_eq!(header.file_name(), Some("caf\u{e9}.txt"));
    }

    #[test]
    fn utf8_filename_is_kept() {
        let block = "Content-Disposition: form-data; name=\"doc\"; filename=\"\u{65e5}\u{672c}.txt\"\r\n";
        let header = PartHeader::parse(block.as_bytes()).unwrap();
        assert_eq!(header.file_name(), Some("\u{65e5}\u{672c}.txt"));
    }

    #[test]
    fn nameless_header_is_rejected() {
        assert!(matches!(
            PartHeaders::parse(b"Content-Type: text/plain\r\n: orphan\r\n"),
            Err(UploadError::InvalidPartHeaders { .. })
        ));
    }
}
