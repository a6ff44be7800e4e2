use bytes::Bytes;
use serde_json::json;

use crate::error::CoerceError;
use crate::value::{Element, ValueKind};

/// A file carried by a `multipart/form-data` part.
///
/// On the server side it is filled from a parsed part, on the client side every
/// `FilePart` found in a `form` or `multipart` field becomes one outgoing part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePart {
    filename: String,
    content_type: Option<String>,
    data: Bytes,
}

impl FilePart {
    /// A file without a content type.
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self { filename: filename.into(), content_type: None, data: data.into() }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_data(self) -> Bytes {
        self.data
    }
}

impl Element for FilePart {
    const KIND: ValueKind = ValueKind::File;

    fn parse_text(text: &str) -> Result<Self, CoerceError> {
        Err(CoerceError::new("file", text))
    }

    fn render_text(&self) -> Option<String> {
        None
    }

    fn from_file(part: FilePart) -> Option<Self> {
        Some(part)
    }

    fn as_file(&self) -> Option<&FilePart> {
        Some(self)
    }

    fn is_zero(&self) -> bool {
        self.filename.is_empty() && self.data.is_empty() && self.content_type.is_none()
    }

    fn to_json(&self) -> serde_json::Value {
        json!({ "filename": self.filename, "size": self.data.len() })
    }
}
