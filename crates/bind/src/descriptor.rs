//! Field descriptors: the per type binding plan built from a record's specs.

use crate::record::{FieldSpec, Record};
use crate::value::ValueKind;
use http::HeaderName;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Where on the wire a field lives.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Path,
    Query,
    Header,
    Form,
    Multipart,
    UrlEncoded,
    Body,
    Cookie,
    /// Untagged, never read nor written by the engine.
    None,
}

impl SourceKind {
    /// Lower-case name of the source.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Path => "path",
            SourceKind::Query => "query",
            SourceKind::Header => "header",
            SourceKind::Form => "form",
            SourceKind::Multipart => "multipart",
            SourceKind::UrlEncoded => "urlencoded",
            SourceKind::Body => "body",
            SourceKind::Cookie => "cookie",
            SourceKind::None => "none",
        }
    }

    /// The snapshot category, form and url-encoded values share `form`.
    pub fn category(&self) -> &'static str {
        match self {
            SourceKind::Form | SourceKind::UrlEncoded => "form",
            other => other.as_str(),
        }
    }

    /// Whether binding this source needs the request body.
    pub fn reads_body(&self) -> bool {
        matches!(self, SourceKind::Form | SourceKind::UrlEncoded | SourceKind::Multipart | SourceKind::Body)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown field source `{0}`")]
pub struct UnknownSource(String);

impl FromStr for SourceKind {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "path" => Ok(SourceKind::Path),
            "query" => Ok(SourceKind::Query),
            "header" => Ok(SourceKind::Header),
            "form" => Ok(SourceKind::Form),
            "multipart" => Ok(SourceKind::Multipart),
            "urlencoded" => Ok(SourceKind::UrlEncoded),
            "body" => Ok(SourceKind::Body),
            "cookie" | "cookies" => Ok(SourceKind::Cookie),
            "" | "none" => Ok(SourceKind::None),
            other => Err(UnknownSource(other.to_owned())),
        }
    }
}

/// How one field of a record maps to one part of an HTTP message.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    index: usize,
    source: SourceKind,
    wire_name: Cow<'static, str>,
    field_name: &'static str,
    type_name: &'static str,
    kind: ValueKind,
    repeated: bool,
    log_path: String,
    validate: Option<&'static str>,
    header_name: Option<HeaderName>,
}

impl FieldDescriptor {
    fn from_spec(index: usize, spec: &FieldSpec) -> Self {
        let source = match spec.source().map(str::parse::<SourceKind>) {
            Some(Ok(source)) => source,
            Some(Err(e)) => {
                warn!(field = spec.name(), cause = %e, "field is ignored by binding");
                SourceKind::None
            }
            None => SourceKind::None,
        };

        let wire_name = resolve_wire_name(spec);

        let header_name = if source == SourceKind::Header {
            match HeaderName::from_bytes(wire_name.as_bytes()) {
                Ok(name) => Some(name),
                Err(e) => {
                    warn!(field = spec.name(), wire_name = %wire_name, cause = %e, "invalid header name");
                    None
                }
            }
        } else {
            None
        };

        Self {
            index,
            source,
            log_path: format!("{}.{}", source.category(), wire_name),
            wire_name,
            field_name: spec.name(),
            type_name: spec.type_name(),
            kind: spec.kind(),
            repeated: spec.repeated(),
            validate: spec.tag("validate").filter(|rule| !rule.is_empty()),
            header_name,
        }
    }

    /// Position of the field in the record.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Where on the wire the value lives.
    pub fn source(&self) -> SourceKind {
        self.source
    }

    /// The name on the wire: the tag's `name`, or the field name when absent.
    pub fn wire_name(&self) -> &str {
        &self.wire_name
    }

    /// The Rust field name as declared.
    pub fn field_name(&self) -> &'static str {
        self.field_name
    }

    /// The Rust type of the field as written in the record.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The element type the field coerces wire values into.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Whether the field holds a list and takes every wire value.
    pub fn repeated(&self) -> bool {
        self.repeated
    }

    /// `<category>.<wire name>`, the key used by log redaction.
    pub fn log_path(&self) -> &str {
        &self.log_path
    }

    /// The raw `validate` rules, e.g. `required,max=100`.
    pub fn validate(&self) -> Option<&'static str> {
        self.validate
    }

    /// The header a `header` field reads and writes, `None` for other sources
    /// or when the wire name isn't a valid header name.
    pub fn header_name(&self) -> Option<&HeaderName> {
        self.header_name.as_ref()
    }

    /// Title-cased header spelling, `x-request-id` gives `X-Request-Id`.
    pub fn canonical_header(&self) -> String {
        canonical_header_name(&self.wire_name)
    }
}

/// Builds the descriptors of `R` in declaration order.
///
/// Embedded fields are skipped, untagged fields get a [`SourceKind::None`]
/// descriptor so that every other field keeps its position.
pub fn extract<R: Record>() -> Vec<FieldDescriptor> {
    R::specs()
        .iter()
        .enumerate()
        .filter(|(_, spec)| !spec.is_embedded())
        .map(|(index, spec)| FieldDescriptor::from_spec(index, spec))
        .collect()
}

/// Wire name resolution: `name` tag, then the `json` tag, then the field name
/// with its first letter lower-cased.
fn resolve_wire_name(spec: &FieldSpec) -> Cow<'static, str> {
    if let Some(name) = spec.tag("name").filter(|name| !name.is_empty()) {
        return Cow::Borrowed(name);
    }

    if let Some(json) = spec.tag("json") {
        let name = json.split(',').next().unwrap_or_default();
        if !name.is_empty() && name != "-" {
            return Cow::Borrowed(name);
        }
    }

    let field = spec.name().strip_prefix("r#").unwrap_or(spec.name());
    let mut chars = field.chars();
    match chars.next() {
        Some(first) if first.is_uppercase() => Cow::Owned(first.to_lowercase().chain(chars).collect()),
        _ => Cow::Borrowed(field),
    }
}

/// Title-cases each `-` separated word, `content-type` gives `Content-Type`.
pub fn canonical_header_name(name: &str) -> String {
    let mut canonical = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            canonical.extend(c.to_uppercase());
        } else {
            canonical.extend(c.to_lowercase());
        }
        upper = c == '-';
    }
    canonical
}
