//! Binding configuration.
//!
//! Every field has a default, so a config file only lists what it changes:
//!
//! ```toml
//! coercion = "strict"
//! capture_snapshot = true
//! redact = ["form.password"]
//!
//! [content_types]
//! "application/vnd.api+json" = "json"
//! ```

use crate::codec::multipart::DEFAULT_MAX_MEMORY;
use crate::codec::{Codec, ContentTypeTable};
use crate::error::ConfigError;
use crate::log_filter::LogFilter;
use crate::pool::DEFAULT_POOL_CAPACITY;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What happens when a present wire value can't be converted.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoercionPolicy {
    /// Leave the field at its zero value and keep binding.
    #[default]
    Lenient,
    /// Fail the whole bind with [`BindError::Coerce`](crate::error::BindError::Coerce).
    Strict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindConfig {
    /// Largest multipart body accepted, in bytes.
    pub max_multipart_memory: usize,
    pub coercion: CoercionPolicy,
    /// Capture a [`ParsedParameterSnapshot`](crate::snapshot::ParsedParameterSnapshot) per request.
    pub capture_snapshot: bool,
    /// Run the validator after binding.
    pub validate: bool,
    /// Idle instances kept per record type.
    pub pool_capacity: usize,
    /// Extra MIME type to codec entries, on top of the defaults.
    pub content_types: BTreeMap<String, Codec>,
    /// Snapshot log paths whose values are masked.
    pub redact: Vec<String>,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            max_multipart_memory: DEFAULT_MAX_MEMORY,
            coercion: CoercionPolicy::default(),
            capture_snapshot: false,
            validate: true,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            content_types: BTreeMap::new(),
            redact: Vec::new(),
        }
    }
}

impl BindConfig {
    /// Parses a config, missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// The default dispatch table extended with `content_types`.
    pub fn content_type_table(&self) -> ContentTypeTable {
        let mut table = ContentTypeTable::default();
        for (content_type, codec) in &self.content_types {
            table.register(content_type, *codec);
        }
        table
    }

    /// The filter built from `redact`.
    pub fn log_filter(&self) -> LogFilter {
        LogFilter::new(&self.redact)
    }
}
