//! The generic `fields` key/value map (spec §9, model (b): "a generic
//! key/value side-table with per-type schema validation at the boundary").
//!
//! Mirrors the teacher's `metadata: Option<Box<RawValue>>` column: stored as
//! a single opaque JSON object column rather than exploded into a side
//! table, but exposed here as a typed `serde_json::Map` so engine code never
//! has to parse it by hand.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The `fields` map attached to an issue: domain-specific data tied to the
/// issue's type's field schema (spec §3, §4.3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(pub Map<String, Value>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses a field map from its stored JSON text form. An empty or
    /// missing column is treated as an empty map, not an error.
    pub fn from_stored(s: Option<&str>) -> Result<Self, serde_json::Error> {
        match s {
            None => Ok(Self::default()),
            Some(s) if s.trim().is_empty() => Ok(Self::default()),
            Some(s) => Ok(Self(serde_json::from_str(s)?)),
        }
    }

    /// Serializes to the compact JSON text this column stores.
    pub fn to_stored(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_column_is_empty_map() {
        let f = FieldMap::from_stored(None).unwrap();
        assert!(f.is_empty());
        let f2 = FieldMap::from_stored(Some("")).unwrap();
        assert!(f2.is_empty());
    }

    #[test]
    fn round_trips() {
        let mut f = FieldMap::new();
        f.insert("severity", Value::String("high".into()));
        let stored = f.to_stored();
        let parsed = FieldMap::from_stored(Some(&stored)).unwrap();
        assert_eq!(parsed.get("severity").unwrap(), "high");
    }
}
