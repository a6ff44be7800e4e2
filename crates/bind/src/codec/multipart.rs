//! `multipart/form-data` reading and writing.
//!
//! [`MultipartForm`] parses a fully buffered body into text values and files,
//! [`MultipartWriter`] produces one. File contents are sliced out of the
//! request [`Bytes`] without copying.

use crate::error::MultipartError;
use crate::value::FilePart;
use bytes::buf::Writer;
use bytes::{BufMut, Bytes, BytesMut};
use rand::Rng;
use std::io::{self, Write};

/// Default upper bound of a buffered multipart body, 32 MiB.
pub const DEFAULT_MAX_MEMORY: usize = 32 << 20;

const MAX_BOUNDARY_LEN: usize = 70;

/// Returns `true` if `content_type` is a `multipart/*` type.
pub fn is_multipart(content_type: &str) -> bool {
    content_type
        .parse::<mime::Mime>()
        .map(|m| m.type_() == mime::MULTIPART)
        .unwrap_or(false)
}

/// Extracts the `boundary` parameter of a multipart content type.
pub fn parse_boundary(content_type: &str) -> Result<String, MultipartError> {
    let mime = content_type.parse::<mime::Mime>().map_err(MultipartError::invalid_boundary)?;
    let boundary = mime.get_param(mime::BOUNDARY).ok_or(MultipartError::MissingBoundary)?;
    check_boundary(boundary.as_str())?;
    Ok(boundary.as_str().to_owned())
}

/// The parts of a parsed `multipart/form-data` body.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    values: Vec<(String, String)>,
    files: Vec<(String, FilePart)>,
}

impl MultipartForm {
    /// Parses a whole multipart body.
    ///
    /// Bodies larger than `max_memory` are rejected before parsing starts.
    pub fn parse(body: &Bytes, boundary: &str, max_memory: usize) -> Result<Self, MultipartError> {
        if body.len() > max_memory {
            return Err(MultipartError::too_large(body.len(), max_memory));
        }

        let delimiter = format!("--{boundary}");
        let part_end = format!("\r\n--{boundary}");
        let mut form = MultipartForm::default();

        // anything before the first delimiter is preamble
        let mut pos = find(body, delimiter.as_bytes(), 0)
            .ok_or_else(|| MultipartError::malformed("missing first boundary"))?
            + delimiter.len();

        loop {
            let rest = &body[pos..];
            if rest.starts_with(b"--") {
                return Ok(form);
            }
            if !rest.starts_with(b"\r\n") {
                return Err(MultipartError::malformed("boundary must be followed by CRLF"));
            }
            pos += 2;

            let (headers, content_start) = if body[pos..].starts_with(b"\r\n") {
                (PartHeaders::default(), pos + 2)
            } else {
                let header_end = find(body, b"\r\n\r\n", pos)
                    .ok_or_else(|| MultipartError::malformed("unterminated part headers"))?;
                let raw = std::str::from_utf8(&body[pos..header_end])
                    .map_err(|_e| MultipartError::malformed("part headers are not utf8"))?;
                (PartHeaders::parse(raw)?, header_end + 4)
            };

            let content_end = find(body, part_end.as_bytes(), content_start)
                .ok_or_else(|| MultipartError::malformed("missing closing boundary"))?;

            form.push(headers, body.slice(content_start..content_end))?;
            pos = content_end + part_end.len();
        }
    }

    fn push(&mut self, headers: PartHeaders, content: Bytes) -> Result<(), MultipartError> {
        let Some(name) = headers.name else {
            // parts without a form name can't be addressed by any field
            return Ok(());
        };

        // an empty filename is what browsers send for an unused file input
        match headers.filename.filter(|filename| !filename.is_empty()) {
            Some(filename) => {
                let mut file = FilePart::new(filename, content);
                if let Some(content_type) = headers.content_type {
                    file = file.with_content_type(content_type);
                }
                self.files.push((name, file));
            }
            None => {
                let value = String::from_utf8(content.to_vec())
                    .map_err(|_e| MultipartError::malformed(format!("value of `{name}` is not utf8")))?;
                self.values.push((name, value));
            }
        }
        Ok(())
    }

    /// All text values sent under `name`, in body order.
    pub fn values(&self, name: &str) -> Vec<&str> {
        self.values.iter().filter(|(n, _)| n == name).map(|(_, v)| v.as_str()).collect()
    }

    /// All files sent under `name`, in body order.
    pub fn files(&self, name: &str) -> Vec<FilePart> {
        self.files.iter().filter(|(n, _)| n == name).map(|(_, f)| f.clone()).collect()
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

#[derive(Debug, Default)]
struct PartHeaders {
    name: Option<String>,
    filename: Option<String>,
    content_type: Option<String>,
}

impl PartHeaders {
    fn parse(raw: &str) -> Result<Self, MultipartError> {
        let mut headers = PartHeaders::default();
        for line in raw.split("\r\n") {
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| MultipartError::malformed(format!("invalid part header line `{line}`")))?;
            let value = value.trim();

            if key.trim().eq_ignore_ascii_case("content-disposition") {
                for (param, param_value) in disposition_params(value) {
                    match param.as_str() {
                        "name" => headers.name = Some(param_value),
                        "filename" => headers.filename = Some(param_value),
                        _ => {}
                    }
                }
            } else if key.trim().eq_ignore_ascii_case("content-type") {
                headers.content_type = Some(value.to_owned());
            }
        }
        Ok(headers)
    }
}

/// Parses `form-data; name="a"; filename="b.txt"` into lower-cased params,
/// unescaping quoted values.
fn disposition_params(value: &str) -> Vec<(String, String)> {
    let mut params = vec![];
    let mut chars = value.chars().peekable();

    // skip the disposition type
    for c in chars.by_ref() {
        if c == ';' {
            break;
        }
    }

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ';').is_some() {}
        let key: String = chars.by_ref().take_while(|c| *c != '=').collect();
        if key.is_empty() {
            return params;
        }

        let mut param_value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '\\' => param_value.extend(chars.next()),
                    '"' => break,
                    c => param_value.push(c),
                }
            }
            // drop anything up to the next separator
            for c in chars.by_ref() {
                if c == ';' {
                    break;
                }
            }
        } else {
            for c in chars.by_ref() {
                if c == ';' {
                    break;
                }
                param_value.push(c);
            }
        }

        params.push((key.trim().to_ascii_lowercase(), param_value.trim_end().to_owned()));
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack.get(from..)?.windows(needle.len()).position(|window| window == needle).map(|p| p + from)
}

fn check_boundary(boundary: &str) -> Result<(), MultipartError> {
    if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LEN {
        return Err(MultipartError::invalid_boundary(format!("length must be 1..={MAX_BOUNDARY_LEN}")));
    }
    if boundary.ends_with(' ') {
        return Err(MultipartError::invalid_boundary("must not end with a space"));
    }
    let valid = boundary.bytes().all(|b| b.is_ascii_alphanumeric() || b"'()+_,-./:=? ".contains(&b));
    if !valid {
        return Err(MultipartError::invalid_boundary(format!("invalid character in `{boundary}`")));
    }
    Ok(())
}

fn random_boundary() -> String {
    let mut buf = [0_u8; 30];
    rand::thread_rng().fill(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Writes a `multipart/form-data` body part by part.
///
/// The body is only well formed once [`close`](MultipartWriter::close) has run,
/// which writes the terminating boundary and hands back the underlying writer.
#[derive(Debug)]
pub struct MultipartWriter<W> {
    out: W,
    boundary: String,
    parts: usize,
}

impl MultipartWriter<Writer<BytesMut>> {
    /// A writer into an in-memory buffer with a random boundary.
    pub fn in_memory() -> Self {
        Self::new(BytesMut::new().writer())
    }
}

impl<W: Write> MultipartWriter<W> {
    /// A writer with a random boundary.
    pub fn new(out: W) -> Self {
        Self { out, boundary: random_boundary(), parts: 0 }
    }

    /// A writer with a fixed boundary, rejected when it isn't a valid one.
    pub fn with_boundary(out: W, boundary: impl Into<String>) -> Result<Self, MultipartError> {
        let boundary = boundary.into();
        check_boundary(&boundary)?;
        Ok(Self { out, boundary, parts: 0 })
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// The `Content-Type` to send along with this body.
    pub fn content_type(&self) -> String {
        if self.boundary.contains(|c| "()<>@,;:\\\"/[]?= ".contains(c)) {
            format!("multipart/form-data; boundary=\"{}\"", self.boundary)
        } else {
            format!("multipart/form-data; boundary={}", self.boundary)
        }
    }

    /// Writes a text part.
    pub fn write_field(&mut self, name: &str, value: &str) -> io::Result<()> {
        let disposition = format!("form-data; name=\"{}\"", escape_quotes(name));
        self.begin_part(&disposition, None)?;
        self.out.write_all(value.as_bytes())
    }

    /// Writes a file part, `application/octet-stream` unless the file says otherwise.
    pub fn write_file(&mut self, name: &str, file: &FilePart) -> io::Result<()> {
        let disposition =
            format!("form-data; name=\"{}\"; filename=\"{}\"", escape_quotes(name), escape_quotes(file.filename()));
        self.begin_part(&disposition, Some(file.content_type().unwrap_or("application/octet-stream")))?;
        self.out.write_all(file.data())
    }

    fn begin_part(&mut self, disposition: &str, content_type: Option<&str>) -> io::Result<()> {
        if self.parts > 0 {
            write!(self.out, "\r\n--{}\r\n", self.boundary)?;
        } else {
            write!(self.out, "--{}\r\n", self.boundary)?;
        }
        write!(self.out, "Content-Disposition: {disposition}\r\n")?;
        if let Some(content_type) = content_type {
            write!(self.out, "Content-Type: {content_type}\r\n")?;
        }
        self.out.write_all(b"\r\n")?;
        self.parts += 1;
        Ok(())
    }

    /// Writes the closing boundary.
    pub fn close(mut self) -> io::Result<W> {
        write!(self.out, "\r\n--{}--\r\n", self.boundary)?;
        self.out.flush()?;
        Ok(self.out)
    }
}
