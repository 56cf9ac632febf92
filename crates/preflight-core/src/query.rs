//! Captured statements and their bound parameters

use crate::{Value, WireType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Maximum number of characters kept in a parameter preview
pub const PREVIEW_MAX_CHARS: usize = 128;

/// A single parameter value bound to a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundParam {
    /// 1-based parameter position
    pub position: usize,
    /// Explicit wire type supplied at bind time, if any
    pub wire_type: Option<WireType>,
    /// The bound value
    pub value: Value,
    /// Display-safe rendering of the value, capped at `PREVIEW_MAX_CHARS`
    pub preview: Option<String>,
}

impl BoundParam {
    /// Creates an untyped parameter binding
    pub fn new(position: usize, value: Value) -> Self {
        let preview = preview_of(&value);
        Self {
            position,
            wire_type: None,
            value,
            preview,
        }
    }

    /// Creates a parameter binding with an explicit wire type
    pub fn typed(position: usize, value: Value, wire_type: WireType) -> Self {
        Self::new(position, value).with_wire_type(Some(wire_type))
    }

    /// Sets the explicit wire type
    pub fn with_wire_type(mut self, wire_type: Option<WireType>) -> Self {
        self.wire_type = wire_type;
        self
    }
}

fn preview_of(value: &Value) -> Option<String> {
    if value.is_null() {
        return None;
    }
    Some(value.to_string().chars().take(PREVIEW_MAX_CHARS).collect())
}

/// An executed statement together with the values bound to it
///
/// Parameters are kept sorted by position and each position appears at most
/// once. The record is read-only after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundQuery {
    sql: String,
    params: Vec<BoundParam>,
    data_source_id: Option<String>,
    captured_at: DateTime<Utc>,
    tags: HashMap<String, String>,
}

impl BoundQuery {
    /// Creates a query captured now
    ///
    /// When several parameters share a position, the one appearing last wins.
    pub fn new(sql: impl Into<String>, params: impl IntoIterator<Item = BoundParam>) -> Self {
        let by_position: BTreeMap<usize, BoundParam> =
            params.into_iter().map(|p| (p.position, p)).collect();
        Self {
            sql: sql.into(),
            params: by_position.into_values().collect(),
            data_source_id: None,
            captured_at: Utc::now(),
            tags: HashMap::new(),
        }
    }

    /// Sets the data source identifier
    pub fn with_data_source(mut self, id: impl Into<String>) -> Self {
        self.data_source_id = Some(id.into());
        self
    }

    /// Sets the capture timestamp
    pub fn with_captured_at(mut self, at: DateTime<Utc>) -> Self {
        self.captured_at = at;
        self
    }

    /// Adds a caller-supplied tag
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Replaces all tags
    pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Parameters in ascending position order
    pub fn params(&self) -> &[BoundParam] {
        &self.params
    }

    /// Looks up the parameter bound at `position`
    pub fn param(&self, position: usize) -> Option<&BoundParam> {
        self.params
            .binary_search_by_key(&position, |p| p.position)
            .ok()
            .map(|idx| &self.params[idx])
    }

    pub fn data_source_id(&self) -> Option<&str> {
        self.data_source_id.as_deref()
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn tags(&self) -> &HashMap<String, String> {
        &self.tags
    }
}

#[cfg(test)]
mod tests;
