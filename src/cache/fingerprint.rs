//! Fingerprint Module
//!
//! Deterministic cache keys built from an entity namespace plus normalized filters.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use url::form_urlencoded;

use crate::error::{Result, SyncError};

// == Entity ==
/// Server-side entity families, each with its own key namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Features,
    Notifications,
    Panels,
    Sessions,
}

impl Entity {
    /// Namespace used as the first fingerprint segment and the API path segment.
    pub fn namespace(&self) -> &'static str {
        match self {
            Entity::Features => "features",
            Entity::Notifications => "notifications",
            Entity::Panels => "panels",
            Entity::Sessions => "sessions",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}

// == Filters ==
/// Normalized filter set.
///
/// Absent, null and empty values are never stored, and keys are kept sorted,
/// so two logically identical filter sets compare and encode identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Filters {
    fields: BTreeMap<String, String>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter field. Empty values normalize to absent.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, Some(value));
        self
    }

    /// Adds a filter field when `value` is present.
    pub fn with_opt<V: ToString>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets or clears a filter field.
    pub fn insert<V: ToString>(&mut self, key: impl Into<String>, value: Option<V>) {
        let key = key.into();
        match value.map(|v| v.to_string()) {
            Some(v) if !v.is_empty() => {
                self.fields.insert(key, v);
            }
            _ => {
                self.fields.remove(&key);
            }
        }
    }

    /// Builds filters from a JSON object, dropping null fields.
    ///
    /// Scalars are stringified; arrays of scalars are joined with commas.
    /// Nested objects are rejected.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = match value {
            Value::Null => return Ok(Self::new()),
            Value::Object(object) => object,
            other => {
                return Err(SyncError::InvalidRequest(format!(
                    "Filters must be a JSON object, got {other}"
                )))
            }
        };

        let mut filters = Self::new();
        for (key, field) in object {
            let encoded = match field {
                Value::Array(items) => {
                    let parts = items
                        .iter()
                        .map(|item| scalar_to_string(key, item))
                        .collect::<Result<Vec<_>>>()?;
                    Some(parts.into_iter().flatten().collect::<Vec<_>>().join(","))
                }
                other => scalar_to_string(key, other)?,
            };
            filters.insert(key.clone(), encoded);
        }
        Ok(filters)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// URL-encoded query string with keys in sorted order.
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.fields {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

fn scalar_to_string(key: &str, value: &Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        _ => Err(SyncError::InvalidRequest(format!(
            "Filter `{key}` must be a scalar or a list of scalars"
        ))),
    }
}

// == Fingerprint ==
/// Deterministic identifier of one cached query.
///
/// Layout: `<namespace>/list[?<query>]`, `<namespace>/detail/<id>` or
/// `<namespace>/<aggregate>`. Prefix matching respects segment boundaries so
/// `notifications/detail/4` never matches `notifications/detail/42`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Key of a filtered list query.
    pub fn list(entity: Entity, filters: &Filters) -> Self {
        if filters.is_empty() {
            Self(format!("{}/list", entity.namespace()))
        } else {
            Self(format!(
                "{}/list?{}",
                entity.namespace(),
                filters.to_query_string()
            ))
        }
    }

    /// Key of a single-record query.
    pub fn detail(entity: Entity, id: &str) -> Self {
        let id: String = form_urlencoded::byte_serialize(id.as_bytes()).collect();
        Self(format!("{}/detail/{}", entity.namespace(), id))
    }

    /// Key of a named aggregate (counts, summaries) under an entity.
    pub fn aggregate(entity: Entity, name: &str) -> Self {
        Self(format!("{}/{}", entity.namespace(), name))
    }

    /// Wraps an already-formed key.
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the key starts with `prefix` on a segment boundary.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        if prefix.is_empty() {
            return true;
        }
        let Some(rest) = self.0.strip_prefix(prefix) else {
            return false;
        };
        rest.is_empty()
            || prefix.ends_with('/')
            || prefix.ends_with('?')
            || rest.starts_with('/')
            || rest.starts_with('?')
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
