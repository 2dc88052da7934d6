//! Flat, ragged-schema record model shared by sources, staging, the snapshot
//! store, and the order aggregation queries.
//!
//! A `Record` is an ordered field-name -> scalar mapping; records in one
//! `RecordSet` describe the same entity kind but are not required to share a
//! field set. Types are discovered empirically downstream (see the database
//! crate's `infer` module), never declared up front.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Rendered in staged/output JSON for a binary field whose payload is empty,
/// so "no data" stays distinguishable from a real zero-length payload.
pub const EMPTY_BINARY_SENTINEL: &str = "No valid image";

/// One scalar field value.
///
/// `Date` and `Bytes` only originate from the relational source driver; once
/// a record has passed through staged JSON they re-enter as `Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Real(f64),
    Text(String),
    Date(NaiveDate),
    Bytes(Vec<u8>),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view used for join keys; joins never match on non-integers.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Real(v) => serializer.serialize_f64(*v),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            Value::Bytes(b) if b.is_empty() => serializer.serialize_str(EMPTY_BINARY_SENTINEL),
            Value::Bytes(b) => serializer.serialize_str(&BASE64.encode(b)),
            Value::Null => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON scalar")
            }

            fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<Value, E> {
                Ok(Value::Int(i64::from(v)))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Value, E> {
                Ok(Value::Int(v))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Value, E> {
                i64::try_from(v)
                    .map(Value::Int)
                    .map_err(|_| E::custom(format!("integer out of range: {v}")))
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Value, E> {
                Ok(Value::Real(v))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Value, E> {
                Ok(Value::Text(v.to_string()))
            }

            fn visit_none<E: serde::de::Error>(self) -> Result<Value, E> {
                Ok(Value::Null)
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Value, E> {
                Ok(Value::Null)
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

/// One flat entity instance: ordered field name -> scalar value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = Record;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a flat JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Record, A::Error> {
                let mut fields = IndexMap::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, Value>()? {
                    fields.insert(key, value);
                }
                Ok(Record { fields })
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

/// Named ordered collection of records from one logical source table.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    pub name: String,
    pub records: Vec<Record>,
}

impl RecordSet {
    pub fn new(name: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn record_json_preserves_field_order() {
        let rec = record(&[
            ("zulu", Value::Int(1)),
            ("alpha", Value::Text("x".into())),
            ("mike", Value::Real(2.5)),
        ]);
        let json = serde_json::to_string(&rec).expect("serialize");
        assert_eq!(json, r#"{"zulu":1,"alpha":"x","mike":2.5}"#);

        let back: Record = serde_json::from_str(&json).expect("deserialize");
        let names: Vec<&str> = back.field_names().collect();
        assert_eq!(names, vec!["zulu", "alpha", "mike"]);
    }

    #[test]
    fn dates_serialize_as_iso_strings() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let rec = record(&[("shipped_date", Value::Date(d))]);
        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(json, r#"{"shipped_date":"2024-03-09"}"#);
    }

    #[test]
    fn empty_bytes_render_as_sentinel() {
        let rec = record(&[("picture", Value::Bytes(vec![]))]);
        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(json, format!(r#"{{"picture":"{EMPTY_BINARY_SENTINEL}"}}"#));
    }

    #[test]
    fn nonempty_bytes_render_as_base64() {
        let rec = record(&[("picture", Value::Bytes(vec![1, 2, 3]))]);
        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(json, r#"{"picture":"AQID"}"#);
    }

    #[test]
    fn nulls_round_trip() {
        let back: Record = serde_json::from_str(r#"{"region":null,"id":7}"#).unwrap();
        assert_eq!(back.get("region"), Some(&Value::Null));
        assert_eq!(back.get("id"), Some(&Value::Int(7)));
    }
}
