//! Error types produced while binding requests and encoding outgoing calls.
//!
//! Only hard failures are represented here. An absent optional value is never an
//! error, and a coercion failure only becomes one when [`CoercionPolicy::Strict`]
//! is configured.
//!
//! [`CoercionPolicy::Strict`]: crate::config::CoercionPolicy::Strict

use crate::codec::Codec;
use crate::descriptor::SourceKind;
use crate::validate::ValidationError;
use http::StatusCode;
use std::io;
use thiserror::Error;

/// Errors surfaced by the server direction: decoding a request into a record.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("invalid {source_kind} value for `{field}`: {source}")]
    Coerce {
        field: String,
        source_kind: SourceKind,
        #[source]
        source: CoerceError,
    },

    #[error("failed to decode request body: {source}")]
    Body {
        #[from]
        source: CodecError,
    },

    #[error("failed to parse form: {reason}")]
    Form { reason: String },

    #[error("failed to parse multipart form: {source}")]
    Multipart {
        #[from]
        source: MultipartError,
    },

    #[error("failed to read request body: {reason}")]
    ReadBody { reason: String },

    #[error("validation failed: {source}")]
    Validation {
        #[from]
        source: ValidationError,
    },
}

impl BindError {
    pub fn coerce<S: ToString>(field: S, source_kind: SourceKind, source: CoerceError) -> Self {
        Self::Coerce { field: field.to_string(), source_kind, source }
    }

    pub fn form<S: ToString>(str: S) -> Self {
        Self::Form { reason: str.to_string() }
    }

    pub fn read_body<S: ToString>(str: S) -> Self {
        Self::ReadBody { reason: str.to_string() }
    }

    /// The transport status a router would usually answer with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            BindError::Coerce { .. } | BindError::Form { .. } | BindError::ReadBody { .. } => StatusCode::BAD_REQUEST,
            BindError::Body { source: CodecError::Unsupported { .. } } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            BindError::Body { .. } => StatusCode::BAD_REQUEST,
            BindError::Multipart { source: MultipartError::TooLarge { .. } } => StatusCode::PAYLOAD_TOO_LARGE,
            BindError::Multipart { .. } => StatusCode::BAD_REQUEST,
            BindError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

/// A present wire value could not be converted into the field's type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("can't convert `{value}` into {expected}")]
pub struct CoerceError {
    expected: &'static str,
    value: String,
}

impl CoerceError {
    pub fn new<S: ToString>(expected: &'static str, value: S) -> Self {
        Self { expected, value: value.to_string() }
    }

    pub fn expected(&self) -> &'static str {
        self.expected
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Failures of a structured body codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("xml error: {reason}")]
    Xml { reason: String },

    #[error("yaml error: {source}")]
    Yaml {
        #[from]
        source: serde_yaml::Error,
    },

    #[error("toml error: {reason}")]
    Toml { reason: String },

    #[error("form error: {reason}")]
    Form { reason: String },

    #[error("query error: {reason}")]
    Query { reason: String },

    #[error("body is not valid utf8")]
    Utf8,

    #[error("codec {codec:?} can't carry a structured body")]
    Unsupported { codec: Codec },
}

impl CodecError {
    pub fn xml<S: ToString>(str: S) -> Self {
        Self::Xml { reason: str.to_string() }
    }

    pub fn toml<S: ToString>(str: S) -> Self {
        Self::Toml { reason: str.to_string() }
    }

    pub fn form<S: ToString>(str: S) -> Self {
        Self::Form { reason: str.to_string() }
    }

    pub fn query<S: ToString>(str: S) -> Self {
        Self::Query { reason: str.to_string() }
    }

    pub fn unsupported(codec: Codec) -> Self {
        Self::Unsupported { codec }
    }
}

/// Failures while parsing or writing `multipart/form-data` bodies.
#[derive(Debug, Error)]
pub enum MultipartError {
    #[error("content type has no multipart boundary")]
    MissingBoundary,

    #[error("invalid multipart boundary: {reason}")]
    InvalidBoundary { reason: String },

    #[error("multipart body size {size} exceed the limit {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("malformed multipart body: {reason}")]
    Malformed { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl MultipartError {
    pub fn invalid_boundary<S: ToString>(str: S) -> Self {
        Self::InvalidBoundary { reason: str.to_string() }
    }

    pub fn too_large(size: usize, limit: usize) -> Self {
        Self::TooLarge { size, limit }
    }

    pub fn malformed<S: ToString>(str: S) -> Self {
        Self::Malformed { reason: str.to_string() }
    }
}

/// Errors surfaced by the client direction: encoding a record into a request.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to encode body: {source}")]
    Codec {
        #[from]
        source: CodecError,
    },

    #[error("invalid header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("invalid request uri `{uri}`: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("a `body` field can't be combined with form or multipart fields")]
    ConflictingBody,

    #[error("failed to write multipart body: {source}")]
    Multipart {
        #[from]
        source: MultipartError,
    },

    #[error("failed to build request: {source}")]
    Http {
        #[from]
        source: http::Error,
    },
}

impl EncodeError {
    pub fn invalid_header<N: ToString, S: ToString>(name: N, str: S) -> Self {
        Self::InvalidHeader { name: name.to_string(), reason: str.to_string() }
    }

    pub fn invalid_uri<U: ToString, S: ToString>(uri: U, str: S) -> Self {
        Self::InvalidUri { uri: uri.to_string(), reason: str.to_string() }
    }
}

impl From<io::Error> for EncodeError {
    fn from(e: io::Error) -> Self {
        Self::Multipart { source: MultipartError::from(e) }
    }
}

/// Failures while loading a [`BindConfig`](crate::config::BindConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },
}
