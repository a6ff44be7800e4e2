//! Raw wire values of one request, parsed once and shared by every field.

use crate::codec::multipart::{self, MultipartForm};
use crate::descriptor::{FieldDescriptor, SourceKind};
use crate::error::BindError;
use crate::request::RequestContext;
use crate::value::FilePart;
use bytes::Bytes;
use http::Method;
use http::header::COOKIE;
use tracing::debug;

/// Which parts of the request the fields of a record read.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WireNeeds {
    query: bool,
    cookies: bool,
    form_body: bool,
    multipart: bool,
}

impl WireNeeds {
    pub(crate) fn of(descriptors: &[FieldDescriptor]) -> Self {
        let mut needs = WireNeeds::default();
        for descriptor in descriptors {
            match descriptor.source() {
                SourceKind::Query => needs.query = true,
                SourceKind::Cookie => needs.cookies = true,
                SourceKind::Form | SourceKind::UrlEncoded => {
                    needs.query = true;
                    needs.form_body = true;
                    needs.multipart = true;
                }
                SourceKind::Multipart => needs.multipart = true,
                SourceKind::Path | SourceKind::Header | SourceKind::Body | SourceKind::None => {}
            }
        }
        needs
    }
}

#[derive(Debug)]
pub(crate) struct WireState<'req> {
    ctx: RequestContext<'req>,
    query: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    form_body: Vec<(String, String)>,
    multipart: Option<MultipartForm>,
}

impl<'req> WireState<'req> {
    pub(crate) fn prepare(
        ctx: RequestContext<'req>,
        body: &Bytes,
        needs: WireNeeds,
        max_multipart_memory: usize,
    ) -> Result<Self, BindError> {
        let query = if needs.query { parse_pairs(ctx.query()) } else { Vec::new() };
        let cookies = if needs.cookies { parse_cookies(&ctx) } else { Vec::new() };

        let content_type = ctx.content_type().unwrap_or_default();
        let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();

        let form_body = if needs.form_body
            && essence == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str()
            && parses_form_body(ctx.method())
        {
            serde_urlencoded::from_bytes::<Vec<(String, String)>>(body).map_err(BindError::form)?
        } else {
            Vec::new()
        };

        let multipart = if needs.multipart && multipart::is_multipart(content_type) {
            let boundary = multipart::parse_boundary(content_type)?;
            Some(MultipartForm::parse(body, &boundary, max_multipart_memory)?)
        } else {
            None
        };

        Ok(Self { ctx, query, cookies, form_body, multipart })
    }

    pub(crate) fn ctx(&self) -> &RequestContext<'req> {
        &self.ctx
    }

    /// All textual values a text source offers for `descriptor`, in wire order.
    pub(crate) fn text_values(&self, descriptor: &FieldDescriptor) -> Vec<&str> {
        let name = descriptor.wire_name();
        match descriptor.source() {
            SourceKind::Path => match self.ctx.path_params().get(name) {
                Some(value) if !value.is_empty() => vec![value],
                _ => Vec::new(),
            },
            SourceKind::Query => lookup(&self.query, name).collect(),
            SourceKind::Header => match descriptor.header_name() {
                Some(header) => {
                    self.ctx.headers().get_all(header).iter().filter_map(|value| value.to_str().ok()).collect()
                }
                None => Vec::new(),
            },
            // only the first cookie of a name counts
            SourceKind::Cookie => lookup(&self.cookies, name).take(1).collect(),
            SourceKind::Form | SourceKind::UrlEncoded => {
                let mut values = self.multipart.as_ref().map(|form| form.values(name)).unwrap_or_default();
                values.extend(lookup(&self.form_body, name));
                values.extend(lookup(&self.query, name));
                values
            }
            SourceKind::Multipart => self.multipart.as_ref().map(|form| form.values(name)).unwrap_or_default(),
            SourceKind::Body | SourceKind::None => Vec::new(),
        }
    }

    /// Files sent under the wire name of a multipart field.
    pub(crate) fn files(&self, descriptor: &FieldDescriptor) -> Vec<FilePart> {
        self.multipart.as_ref().map(|form| form.files(descriptor.wire_name())).unwrap_or_default()
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], name: &str) -> impl Iterator<Item = &'a str> {
    pairs.iter().filter(move |(key, _)| key == name).map(|(_, value)| value.as_str())
}

fn parse_pairs(query: &str) -> Vec<(String, String)> {
    if query.is_empty() {
        return Vec::new();
    }
    match serde_urlencoded::from_str(query) {
        Ok(pairs) => pairs,
        Err(e) => {
            debug!(cause = %e, "ignore undecodable query string");
            Vec::new()
        }
    }
}

/// Form bodies are only read for methods carrying one, DELETE is handled like
/// POST for this purpose.
fn parses_form_body(method: &Method) -> bool {
    let method = if *method == Method::DELETE { &Method::POST } else { method };
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Parses every `Cookie` header, `a=1; b="two"`.
fn parse_cookies(ctx: &RequestContext<'_>) -> Vec<(String, String)> {
    ctx.headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(value);
            Some((name.to_owned(), value.to_owned()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::PathParams;
    use http::Request;

    #[test]
    fn cookies() {
        let (parts, ()) = Request::get("/")
            .header(COOKIE, "a=1; b=\"two words\"")
            .header(COOKIE, "c=3;broken; =x; a=shadowed")
            .body(())
            .unwrap()
            .into_parts();
        let params = PathParams::empty();
        let cookies = parse_cookies(&RequestContext::new(&parts, &params));
        assert_eq!(
            cookies,
            vec![
                ("a".to_owned(), "1".to_owned()),
                ("b".to_owned(), "two words".to_owned()),
                ("c".to_owned(), "3".to_owned()),
                ("a".to_owned(), "shadowed".to_owned()),
            ]
        );
    }

    #[test]
    fn form_body_methods() {
        assert!(parses_form_body(&Method::POST));
        assert!(parses_form_body(&Method::PUT));
        assert!(parses_form_body(&Method::PATCH));
        assert!(parses_form_body(&Method::DELETE));
        assert!(!parses_form_body(&Method::GET));
        assert!(!parses_form_body(&Method::HEAD));
    }

    #[test]
    fn query_pairs() {
        assert_eq!(
            parse_pairs("tag=a&tag=b%20c&x"),
            vec![
                ("tag".to_owned(), "a".to_owned()),
                ("tag".to_owned(), "b c".to_owned()),
                ("x".to_owned(), String::new()),
            ]
        );
        assert!(parse_pairs("").is_empty());
    }
}
