use crate::codec::Codec;
use crate::descriptor::SourceKind;
use crate::error::CodecError;
use http::Response;
use http::header::CONTENT_TYPE;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

static DEFAULT_TABLE: Lazy<ContentTypeTable> = Lazy::new(ContentTypeTable::default);

/// Resolves a codec with the default table.
pub fn dispatch(source: SourceKind, content_type: Option<&str>) -> Codec {
    DEFAULT_TABLE.dispatch(source, content_type)
}

/// Lookup table from MIME type to [`Codec`].
///
/// Matching uses the lower-cased MIME essence, so `application/json; charset=utf-8`
/// resolves like `application/json`. Anything unknown, missing or unparsable
/// falls back to [`Codec::DEFAULT`].
#[derive(Debug, Clone)]
pub struct ContentTypeTable {
    entries: HashMap<String, Codec>,
}

impl Default for ContentTypeTable {
    fn default() -> Self {
        let mut entries = HashMap::with_capacity(8);
        entries.insert(mime::APPLICATION_JSON.essence_str().to_owned(), Codec::Json);
        entries.insert("application/xml".to_owned(), Codec::Xml);
        entries.insert(mime::TEXT_XML.essence_str().to_owned(), Codec::Xml);
        entries.insert("application/x-yaml".to_owned(), Codec::Yaml);
        entries.insert("application/toml".to_owned(), Codec::Toml);
        entries.insert(mime::APPLICATION_WWW_FORM_URLENCODED.essence_str().to_owned(), Codec::Form);
        entries.insert(mime::MULTIPART_FORM_DATA.essence_str().to_owned(), Codec::Multipart);
        Self { entries }
    }
}

impl ContentTypeTable {
    /// Adds or replaces the codec of a MIME type.
    pub fn register(&mut self, content_type: &str, codec: Codec) -> &mut Self {
        self.entries.insert(content_type.trim().to_ascii_lowercase(), codec);
        self
    }

    /// Explicit source kinds always map to their fixed codec, everything else
    /// is resolved from `content_type`.
    pub fn dispatch(&self, source: SourceKind, content_type: Option<&str>) -> Codec {
        match source {
            SourceKind::Query => Codec::Query,
            SourceKind::Path => Codec::Path,
            SourceKind::UrlEncoded => Codec::Form,
            SourceKind::Form | SourceKind::Multipart => Codec::Multipart,
            SourceKind::Header => Codec::Header,
            SourceKind::Body | SourceKind::Cookie | SourceKind::None => self.by_content_type(content_type),
        }
    }

    /// The codec registered for the MIME essence of `content_type`, JSON when unknown.
    pub fn by_content_type(&self, content_type: Option<&str>) -> Codec {
        content_type.and_then(|ct| self.lookup(ct)).unwrap_or(Codec::DEFAULT)
    }

    fn lookup(&self, content_type: &str) -> Option<Codec> {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        if essence.is_empty() {
            return None;
        }
        self.entries.get(&essence.to_ascii_lowercase()).copied()
    }

    /// Decodes a response body with the codec its `Content-Type` selects.
    pub fn decode_response<T, B>(&self, response: &Response<B>) -> Result<T, CodecError>
    where
        T: DeserializeOwned,
        B: AsRef<[u8]>,
    {
        let content_type = response.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        self.dispatch(SourceKind::Body, content_type).decode(response.body().as_ref())
    }
}
