//! The borrowed view of an incoming request used by the decoder.
//!
//! - `RequestContext`: the request head plus the path parameters captured by
//!   the router
//! - `PathParams`: owned name/value pairs of those captures

use http::request::Parts;
use http::{HeaderMap, Method, Uri, Version};
use matchit::Params;
use percent_encoding::percent_decode_str;

/// A request head and its path parameters, everything the decoder needs
/// besides the body.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'req> {
    parts: &'req Parts,
    path_params: &'req PathParams,
}

impl<'req> RequestContext<'req> {
    pub fn new(parts: &'req Parts, path_params: &'req PathParams) -> Self {
        Self { parts, path_params }
    }

    pub fn parts(&self) -> &'req Parts {
        self.parts
    }

    pub fn method(&self) -> &'req Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &'req Uri {
        &self.parts.uri
    }

    pub fn version(&self) -> Version {
        self.parts.version
    }

    pub fn headers(&self) -> &'req HeaderMap {
        &self.parts.headers
    }

    /// The raw query string, empty if the uri has none.
    pub fn query(&self) -> &'req str {
        self.parts.uri.query().unwrap_or_default()
    }

    /// The `Content-Type` header, if present and valid text.
    pub fn content_type(&self) -> Option<&'req str> {
        self.parts.headers.get(http::header::CONTENT_TYPE).and_then(|value| value.to_str().ok())
    }

    pub fn path_params(&self) -> &'req PathParams {
        self.path_params
    }
}

/// Named path segments captured by the router, `/users/{id}` captures `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(String, String)>,
}

impl PathParams {
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Gets the value of a path parameter by its name.
    #[inline]
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.push((key.into(), value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Captures are taken from the raw request path, so values are percent-decoded.
impl From<Params<'_, '_>> for PathParams {
    fn from(params: Params<'_, '_>) -> Self {
        let params = params
            .iter()
            .map(|(k, v)| (k.to_owned(), percent_decode_str(v).decode_utf8_lossy().into_owned()))
            .collect();
        Self { params }
    }
}

/// Values are kept as given.
impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self { params: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}
