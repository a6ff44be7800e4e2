//! What a request bound to, kept for logging.
//!
//! The decoder fills a [`ParsedParameterSnapshot`] as it binds fields when
//! snapshots are enabled. [`LogFilter`](crate::log_filter::LogFilter) masks
//! sensitive entries before the snapshot reaches a `debug!` event.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// The non-zero values bound for one request, grouped by source category.
///
/// Captured only when enabled in [`BindConfig`](crate::config::BindConfig) and
/// meant for logging. Multipart fields are never captured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParsedParameterSnapshot {
    categories: BTreeMap<String, BTreeMap<String, Value>>,
}

impl ParsedParameterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `<category>.<wire_name>`, replacing an earlier one.
    pub fn insert(&mut self, category: &str, wire_name: &str, value: Value) {
        self.categories.entry(category.to_owned()).or_default().insert(wire_name.to_owned(), value);
    }

    /// The value bound for `wire_name` in `category`, e.g. `("query", "page")`.
    pub fn get(&self, category: &str, wire_name: &str) -> Option<&Value> {
        self.categories.get(category)?.get(wire_name)
    }

    pub(crate) fn get_mut(&mut self, category: &str, wire_name: &str) -> Option<&mut Value> {
        self.categories.get_mut(category)?.get_mut(wire_name)
    }

    pub fn category(&self, category: &str) -> Option<&BTreeMap<String, Value>> {
        self.categories.get(category)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, Value>)> {
        self.categories.iter().map(|(category, values)| (category.as_str(), values))
    }
}

impl fmt::Display for ParsedParameterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.categories) {
            Ok(json) => f.write_str(&json),
            Err(_e) => Err(fmt::Error),
        }
    }
}
