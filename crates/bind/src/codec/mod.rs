//! Body codecs and the content type dispatch table.
//!
//! A [`Codec`] is selected by [`ContentTypeTable::dispatch`] from a field's
//! source kind and, for body fields, the declared `Content-Type`. Decoder and
//! encoder share one table, so whatever a client encodes as, a server built
//! from the same table decodes.

mod dispatch;
pub mod multipart;

pub use dispatch::ContentTypeTable;
pub use dispatch::dispatch;

use crate::error::CodecError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The encode/decode pair used for a field or a body.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Json,
    Xml,
    Yaml,
    Toml,
    /// `application/x-www-form-urlencoded`
    Form,
    /// URL query strings, nested keys allowed
    Query,
    Path,
    Header,
    Multipart,
}

impl Codec {
    /// The default structured codec.
    pub const DEFAULT: Codec = Codec::Json;

    /// The `Content-Type` announced for bodies written with this codec.
    pub fn content_type(&self) -> &'static str {
        match self {
            Codec::Json => "application/json",
            Codec::Xml => "application/xml",
            Codec::Yaml => "application/x-yaml",
            Codec::Toml => "application/toml",
            Codec::Form => "application/x-www-form-urlencoded",
            Codec::Multipart => "multipart/form-data",
            Codec::Query | Codec::Path | Codec::Header => "text/plain; charset=utf-8",
        }
    }

    /// Whether this codec can carry a whole structured value as a body.
    pub fn is_structured(&self) -> bool {
        matches!(self, Codec::Json | Codec::Xml | Codec::Yaml | Codec::Toml | Codec::Form | Codec::Query)
    }

    /// Deserializes `bytes`. Path, header and multipart have no whole-body form.
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, CodecError> {
        match self {
            Codec::Json => Ok(serde_json::from_slice(bytes)?),
            Codec::Xml => quick_xml::de::from_str(utf8(bytes)?).map_err(CodecError::xml),
            Codec::Yaml => Ok(serde_yaml::from_slice(bytes)?),
            Codec::Toml => toml::from_str(utf8(bytes)?).map_err(CodecError::toml),
            Codec::Form => serde_urlencoded::from_bytes(bytes).map_err(CodecError::form),
            Codec::Query => serde_qs::from_bytes(bytes).map_err(CodecError::query),
            Codec::Path | Codec::Header | Codec::Multipart => Err(CodecError::unsupported(self)),
        }
    }

    /// Serializes `value` into a body.
    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>, CodecError> {
        match self {
            Codec::Json => Ok(serde_json::to_vec(value)?),
            Codec::Xml => quick_xml::se::to_string(value).map(String::into_bytes).map_err(CodecError::xml),
            Codec::Yaml => Ok(serde_yaml::to_string(value)?.into_bytes()),
            Codec::Toml => toml::to_string(value).map(String::into_bytes).map_err(CodecError::toml),
            Codec::Form => serde_urlencoded::to_string(value).map(String::into_bytes).map_err(CodecError::form),
            Codec::Query => serde_qs::to_string(value).map(String::into_bytes).map_err(CodecError::query),
            Codec::Path | Codec::Header | Codec::Multipart => Err(CodecError::unsupported(self)),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn utf8(bytes: &[u8]) -> Result<&str, CodecError> {
    std::str::from_utf8(bytes).map_err(|_e| CodecError::Utf8)
}
