//! Client direction: turning a populated record into an outgoing request.
//!
//! The [`Encoder`] walks the same descriptors as the decoder and accumulates a
//! path, query pairs, headers, cookies and a body. Fields holding their zero
//! value are left out, except path fields which always fill their placeholder.

mod body;

use crate::codec::{Codec, ContentTypeTable};
use crate::descriptor::{FieldDescriptor, SourceKind};
use crate::error::{CodecError, EncodeError};
use crate::metadata::TypeMetadata;
use crate::record::{FieldRef, Record};
use crate::value::FieldValue;
use body::BodyBuilder;
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, COOKIE};
use http::{HeaderMap, HeaderValue, Method, Request, Uri};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::sync::Arc;
use tracing::warn;

/// Bytes escaped in a path segment: all but unreserved, sub-delims, `:` and `@`.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b':')
    .remove(b'@');

#[derive(Debug, Clone, Default)]
pub struct Encoder {
    table: Arc<ContentTypeTable>,
}

impl Encoder {
    pub fn new(table: Arc<ContentTypeTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Arc<ContentTypeTable> {
        &self.table
    }

    /// Encodes `record` into a request for `url_template`.
    ///
    /// The template may carry `:name` or `{name}` placeholders for path fields
    /// and a literal query string, which is kept ahead of the query fields.
    pub fn encode<R: Record>(
        &self,
        metadata: &TypeMetadata<R>,
        method: Method,
        url_template: &str,
        record: &R,
    ) -> Result<Request<Bytes>, EncodeError> {
        let (path_template, template_query) = url_template.split_once('?').unwrap_or((url_template, ""));

        let mut parts = RequestParts {
            path: path_template.to_owned(),
            query: serde_urlencoded::from_str(template_query).map_err(|e| EncodeError::invalid_uri(url_template, e))?,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: BodyBuilder::default(),
            urlencoded: false,
        };

        let visited = record.visit_fields(|index, field| match metadata.descriptor_at(index) {
            Some(descriptor) => self.encode_field(descriptor, field, &mut parts),
            None => Ok(()),
        });

        let RequestParts { path, mut query, mut headers, cookies, body, urlencoded } = parts;

        // the multipart writer is closed whatever happened while visiting
        let finished = body.finish();
        visited?;
        let mut finished = finished?;

        // url-encoded fields next to another body stay in the query string
        if urlencoded && finished.content_type.is_none() {
            finished.bytes = Bytes::from(encode_pairs(&query)?);
            finished.content_type = Some(Codec::Form.content_type().to_owned());
            query.clear();
        }

        if !cookies.is_empty() {
            headers.insert(COOKIE, cookie_header(cookies)?);
        }

        if let Some(content_type) = finished.content_type {
            // an explicit header already chose the codec of a structured body
            let keep_explicit = headers.contains_key(CONTENT_TYPE) && !content_type.starts_with("multipart/");
            if !keep_explicit {
                let value = HeaderValue::from_str(&content_type)
                    .map_err(|e| EncodeError::invalid_header(CONTENT_TYPE, e))?;
                headers.insert(CONTENT_TYPE, value);
            }
        }
        if !finished.bytes.is_empty() {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(finished.bytes.len()));
        }

        let uri = if query.is_empty() { path } else { format!("{path}?{}", encode_pairs(&query)?) };
        let uri = uri.parse::<Uri>().map_err(|e| EncodeError::invalid_uri(&uri, e))?;

        let mut request = Request::builder().method(method).uri(uri).body(finished.bytes)?;
        *request.headers_mut() = headers;
        Ok(request)
    }

    fn encode_field(
        &self,
        descriptor: &FieldDescriptor,
        field: FieldRef<'_>,
        parts: &mut RequestParts,
    ) -> Result<(), EncodeError> {
        let wire_name = descriptor.wire_name();
        match (descriptor.source(), field) {
            (SourceKind::None, _) => {}
            (SourceKind::Path, FieldRef::Value(value)) => {
                let text = text_values(value).join(",");
                parts.path = replace_placeholder(&parts.path, wire_name, &escape_path_segment(&text));
            }
            (_, field) if field.is_zero() => {}
            (SourceKind::Query, FieldRef::Value(value)) => {
                parts.query.extend(text_values(value).into_iter().map(|text| (wire_name.to_owned(), text)));
            }
            (SourceKind::UrlEncoded, FieldRef::Value(value)) => {
                parts.query.extend(text_values(value).into_iter().map(|text| (wire_name.to_owned(), text)));
                parts.urlencoded = true;
            }
            (SourceKind::Header, FieldRef::Value(value)) => {
                let Some(name) = descriptor.header_name() else {
                    return Err(EncodeError::invalid_header(wire_name, "not a valid header name"));
                };
                for text in text_values(value) {
                    let header = HeaderValue::from_str(&text).map_err(|e| EncodeError::invalid_header(name, e))?;
                    parts.headers.append(name.clone(), header);
                }
            }
            (SourceKind::Cookie, FieldRef::Value(value)) => {
                parts.cookies.push((wire_name.to_owned(), text_values(value).join(",")));
            }
            (SourceKind::Form | SourceKind::Multipart, FieldRef::Value(value)) => {
                let writer = parts.body.multipart()?;
                let files = value.files();
                if files.is_empty() {
                    for text in text_values(value) {
                        writer.write_field(wire_name, &text)?;
                    }
                } else {
                    for file in files {
                        writer.write_file(wire_name, file)?;
                    }
                }
            }
            (SourceKind::Body, FieldRef::Body(value)) => {
                let content_type = parts.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
                let codec = self.table.dispatch(SourceKind::Body, content_type);
                parts.body.set_encoded(value.encode_with(codec)?, codec)?;
            }
            (source, _) => {
                warn!(field = descriptor.field_name(), source = %source, "field can't be encoded into its source");
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct RequestParts {
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    cookies: Vec<(String, String)>,
    body: BodyBuilder,
    urlencoded: bool,
}

fn text_values(value: &dyn FieldValue) -> Vec<String> {
    let mut out = Vec::new();
    value.write_text(&mut out);
    out
}

fn encode_pairs(pairs: &[(String, String)]) -> Result<String, EncodeError> {
    serde_urlencoded::to_string(pairs).map_err(|e| EncodeError::from(CodecError::form(e)))
}

/// Replaces `{name}` and `:name` placeholders, the latter only when not
/// followed by more identifier characters.
fn replace_placeholder(path: &str, name: &str, value: &str) -> String {
    let path = path.replace(&format!("{{{name}}}"), value);

    let pattern = format!(":{name}");
    let mut out = String::with_capacity(path.len());
    let mut rest = path.as_str();
    while let Some(position) = rest.find(&pattern) {
        let after = &rest[position + pattern.len()..];
        let at_boundary = !after.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_');
        out.push_str(&rest[..position]);
        out.push_str(if at_boundary { value } else { pattern.as_str() });
        rest = after;
    }
    out.push_str(rest);
    out
}

fn escape_path_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// A single `Cookie` header with cookies sorted by name.
fn cookie_header(mut cookies: Vec<(String, String)>) -> Result<HeaderValue, EncodeError> {
    cookies.sort_by(|(a, _), (b, _)| a.cmp(b));

    let header = cookies
        .iter()
        .filter(|(name, _)| {
            let valid = !name.is_empty() && name.bytes().all(is_token_byte);
            if !valid {
                warn!(cookie = %name, "skip cookie with an invalid name");
            }
            valid
        })
        .map(|(name, value)| format!("{name}={}", sanitize_cookie_value(value)))
        .collect::<Vec<_>>()
        .join("; ");

    HeaderValue::from_str(&header).map_err(|e| EncodeError::invalid_header(COOKIE, e))
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

fn sanitize_cookie_value(value: &str) -> String {
    let value: String = value.chars().filter(|c| matches!(c, ' '..='~') && !matches!(c, '"' | ';' | '\\')).collect();
    if value.contains([' ', ',']) {
        format!("\"{value}\"")
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Get, Post};
    use crate::value::FilePart;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Title {
        title: String,
    }

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct UpdateUser {
            id: String => path,
            name: String => query,
            tags: Vec<String> => query(name = "tag"),
            trace: String => header(name = "x-trace"),
            body: Title => body,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct WithCookies {
            _get: Get => embed,
            zeta: String => cookie,
            alpha: String => cookie,
            mid: Vec<u8> => cookies,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct CookiesReordered {
            _get: Get => embed,
            mid: Vec<u8> => cookies,
            alpha: String => cookie,
            zeta: String => cookie,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct Login {
            _post: Post => embed,
            user: String => urlencoded,
            password: String => urlencoded,
            verbose: bool => query,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct Upload {
            _post: Post => embed,
            title: String => form,
            avatar: FilePart => multipart,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct Conflicting {
            _post: Post => embed,
            title: String => form,
            body: Title => body,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct XmlBody {
            content_type: String => header(name = "content-type"),
            body: Title => body,
        }
    }

    fn encode<R: Record>(method: Method, url: &str, record: &R) -> Result<Request<Bytes>, EncodeError> {
        Encoder::default().encode(&TypeMetadata::<R>::build(), method, url, record)
    }

    #[test]
    fn path_query_header_and_json_body() {
        let record = UpdateUser {
            id: "42".into(),
            name: "joe".into(),
            tags: vec!["a".into(), "b c".into()],
            trace: "t-1".into(),
            body: Title { title: "x".into() },
        };
        let request = encode(Method::PUT, "/users/:id?v=1", &record).unwrap();

        assert_eq!(request.method(), Method::PUT);
        assert_eq!(request.uri(), "/users/42?v=1&name=joe&tag=a&tag=b+c");
        assert_eq!(request.headers()["x-trace"], "t-1");
        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(request.headers()[CONTENT_LENGTH], "13");
        assert_eq!(request.body().as_ref(), br#"{"title":"x"}"#);
    }

    #[test]
    fn zero_values_are_omitted() {
        let record = UpdateUser { id: "7".into(), ..UpdateUser::default() };
        let request = encode(Method::GET, "/users/{id}", &record).unwrap();
        assert_eq!(request.uri(), "/users/7");
        assert!(!request.headers().contains_key("x-trace"));
        assert!(!request.headers().contains_key(CONTENT_TYPE));
        assert!(request.body().is_empty());
    }

    #[test]
    fn placeholders_respect_identifier_boundaries() {
        assert_eq!(replace_placeholder("/u/:id/:identity/:id", "id", "9"), "/u/9/:identity/9");
        assert_eq!(replace_placeholder("/u/{id}/:id_x", "id", "9"), "/u/9/:id_x");
        assert_eq!(escape_path_segment("a b/c"), "a%20b%2Fc");
        assert_eq!(escape_path_segment("k=v;x@y"), "k=v;x@y");
        assert_eq!(escape_path_segment("grüße"), "gr%C3%BC%C3%9Fe");
    }

    #[test]
    fn cookies_are_sorted_by_name() {
        let first =
            WithCookies { zeta: "z".into(), alpha: "hello world".into(), mid: vec![1, 2], ..Default::default() };
        let second =
            CookiesReordered { zeta: "z".into(), alpha: "hello world".into(), mid: vec![1, 2], ..Default::default() };

        let first = encode(Method::GET, "/", &first).unwrap();
        let second = encode(Method::GET, "/", &second).unwrap();
        assert_eq!(first.headers()[COOKIE], "alpha=\"hello world\"; mid=\"1,2\"; zeta=z");
        assert_eq!(first.headers().get_all(COOKIE).iter().count(), 1);
        assert_eq!(first.headers()[COOKIE], second.headers()[COOKIE]);
    }

    #[test]
    fn cookie_values_are_sanitized() {
        assert_eq!(sanitize_cookie_value("a\"b;c\\d"), "abcd");
        assert_eq!(sanitize_cookie_value(" padded"), "\" padded\"");
        assert_eq!(sanitize_cookie_value("plain"), "plain");
    }

    #[test]
    fn urlencoded_moves_query_into_body() {
        let record = Login { user: "joe".into(), password: "p@ss word".into(), verbose: true, ..Default::default() };
        let request = encode(Method::POST, "/login", &record).unwrap();

        assert_eq!(request.uri(), "/login");
        assert_eq!(request.headers()[CONTENT_TYPE], "application/x-www-form-urlencoded");
        assert_eq!(request.body().as_ref(), b"user=joe&password=p%40ss+word&verbose=true");
    }

    #[test]
    fn multipart_body() {
        let record = Upload { title: "hi".into(), avatar: FilePart::new("a.txt", "hello"), ..Default::default() };
        let request = encode(Method::POST, "/upload", &record).unwrap();

        let content_type = request.headers()[CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let boundary = crate::codec::multipart::parse_boundary(content_type).unwrap();
        let body = request.body();
        assert!(body.ends_with(format!("\r\n--{boundary}--\r\n").as_bytes()));
        assert_eq!(request.headers()[CONTENT_LENGTH], body.len().to_string().as_str());
    }

    #[test]
    fn body_and_form_fields_conflict() {
        let record = Conflicting { title: "t".into(), body: Title { title: "x".into() }, ..Default::default() };
        assert!(matches!(encode(Method::POST, "/", &record), Err(EncodeError::ConflictingBody)));
    }

    #[test]
    fn header_content_type_selects_body_codec() {
        let record = XmlBody { content_type: "application/xml".into(), body: Title { title: "x".into() } };
        let request = encode(Method::POST, "/", &record).unwrap();
        assert_eq!(request.headers()[CONTENT_TYPE], "application/xml");
        assert_eq!(request.body().as_ref(), b"<Title><title>x</title></Title>");
    }

    #[test]
    fn invalid_header_values() {
        let record = UpdateUser { trace: "line\nbreak".into(), ..Default::default() };
        assert!(matches!(encode(Method::GET, "/", &record), Err(EncodeError::InvalidHeader { .. })));
    }
}
