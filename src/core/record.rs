//! Log records and the values they carry
//!
//! A [`Record`] is an ordered key/value container enriched step by step as it
//! travels through a channel pipeline. Keys are unique and keep their
//! insertion order, which is also the order used when the record is
//! serialized.

use super::level::Level;
use serde_json::{Map, Value};
use std::fmt;

/// Display form of an error stored in a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorValue {
    pub message: String,
    pub source: Option<String>,
}

impl ErrorValue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Capture an error and the first link of its source chain
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        Self {
            message: error.to_string(),
            source: error.source().map(|source| source.to_string()),
        }
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Value type for record fields
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Level(Level),
    Error(ErrorValue),
    List(Vec<FieldValue>),
    Map(Fields),
}

impl FieldValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Whether the value renders as an absent field (`-`) in templates
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Convert to serde_json::Value, keeping native JSON types
    #[must_use]
    pub fn to_json_value(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int(i) => Value::Number((*i).into()),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Bytes(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
            FieldValue::Level(level) => Value::String(level.name().to_string()),
            FieldValue::Error(err) => Value::String(err.to_string()),
            FieldValue::List(items) => Value::Array(items.iter().map(Self::to_json_value).collect()),
            FieldValue::Map(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.to_string(), value.to_json_value()))
                    .collect(),
            ),
        }
    }

    /// Build a field value from arbitrary JSON
    #[must_use]
    pub fn from_json_value(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Int(i),
                None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => FieldValue::String(s),
            Value::Array(items) => {
                FieldValue::List(items.into_iter().map(Self::from_json_value).collect())
            }
            Value::Object(map) => FieldValue::Map(
                map.into_iter()
                    .map(|(key, value)| (key, Self::from_json_value(value)))
                    .collect(),
            ),
        }
    }

    /// Reduce the value to the string-only shape used by [`Record`]'s
    /// `Display`: scalars become their display string, lists recurse, maps
    /// keep one level with every entry stringified.
    fn stringified(&self) -> Value {
        match self {
            FieldValue::List(items) => Value::Array(items.iter().map(Self::stringified).collect()),
            FieldValue::Map(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
                    .collect(),
            ),
            other => Value::String(other.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::String(s) => f.write_str(s),
            FieldValue::Bytes(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
            FieldValue::Level(level) => f.write_str(level.name()),
            FieldValue::Error(err) => write!(f, "{}", err),
            FieldValue::List(_) | FieldValue::Map(_) => write!(f, "{}", self.to_json_value()),
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<u32> for FieldValue {
    fn from(i: u32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(bytes: Vec<u8>) -> Self {
        FieldValue::Bytes(bytes)
    }
}

impl From<Level> for FieldValue {
    fn from(level: Level) -> Self {
        FieldValue::Level(level)
    }
}

impl From<ErrorValue> for FieldValue {
    fn from(err: ErrorValue) -> Self {
        FieldValue::Error(err)
    }
}

impl From<Fields> for FieldValue {
    fn from(fields: Fields) -> Self {
        FieldValue::Map(fields)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(items: Vec<FieldValue>) -> Self {
        FieldValue::List(items)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(items: Vec<&str>) -> Self {
        FieldValue::List(items.into_iter().map(FieldValue::from).collect())
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        FieldValue::List(items.into_iter().map(FieldValue::String).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

/// Insertion-ordered key/value map with unique keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, FieldValue)>,
}

impl Fields {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite; an overwritten key keeps its position
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    /// Builder form of [`Fields::set`]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(key, value);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overwrite with every entry of `other`, in `other`'s order
    pub fn merge(&mut self, other: Fields) {
        for (key, value) in other.entries {
            self.set(key, value);
        }
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (key, value) in iter {
            fields.set(key, value);
        }
        fields
    }
}

impl<K: Into<String>, V: Into<FieldValue>, const N: usize> From<[(K, V); N]> for Fields {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl IntoIterator for Fields {
    type Item = (String, FieldValue);
    type IntoIter = std::vec::IntoIter<(String, FieldValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// One log event
///
/// Canonical keys are `level`, `msg`, `pri`, `pub`, `timestamp`, `procid`,
/// `version`, `facility`, `hostname`, `appname` and `sd`; any other key is
/// carried through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fields: Fields,
    transform: bool,
}

impl Default for Record {
    fn default() -> Self {
        Self {
            fields: Fields::new(),
            transform: true,
        }
    }
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record carrying only a message
    pub fn message(msg: impl Into<FieldValue>) -> Self {
        let mut record = Self::new();
        record.set("msg", msg);
        record
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        self.fields.set(key, value);
        self
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.set(key, value);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.fields.has(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.fields.remove(key)
    }

    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Set `key` only when it is absent
    pub fn fill(&mut self, key: &str, value: impl FnOnce() -> FieldValue) -> &mut Self {
        if !self.fields.has(key) {
            self.fields.set(key, value());
        }
        self
    }

    /// The record's level.
    ///
    /// `None` when the field holds something that is not a level. A missing
    /// field reads as [`Level::Debug`], the level enrichment would assign.
    #[must_use]
    pub fn level(&self) -> Option<Level> {
        match self.fields.get("level") {
            None => Some(Level::Debug),
            Some(FieldValue::Level(level)) => Some(*level),
            Some(FieldValue::String(name)) => Level::from_name(name),
            Some(FieldValue::Int(code)) => u8::try_from(*code).ok().and_then(Level::from_code),
            Some(_) => None,
        }
    }

    /// Whether formatters should render the full template.
    ///
    /// `false` marks a record whose `msg` was already rendered elsewhere.
    #[must_use]
    pub fn transform(&self) -> bool {
        self.transform
    }

    pub fn set_transform(&mut self, transform: bool) -> &mut Self {
        self.transform = transform;
        self
    }

    /// JSON object with native value types, `level` as its name
    #[must_use]
    pub fn to_json_value(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_json_value()))
                .collect(),
        )
    }

    fn stringified(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    FieldValue::Level(level) if key == "level" => {
                        Value::String(level.name().to_string())
                    }
                    other => other.stringified(),
                };
                (key.to_string(), value)
            })
            .collect()
    }
}

impl fmt::Display for Record {
    /// JSON object where every value except `level` is stringified
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.stringified()))
    }
}

impl From<Fields> for Record {
    fn from(fields: Fields) -> Self {
        Self {
            fields,
            transform: true,
        }
    }
}

/// Raw value handed to a channel's `write`, `end` or `push`
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Record(Record),
    Value(FieldValue),
}

impl Payload {
    #[must_use]
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Payload::Record(record) => Some(record),
            Payload::Value(_) => None,
        }
    }

    /// Turn the payload into a record: maps spread into fields, any other
    /// value becomes `msg`
    #[must_use]
    pub fn into_record(self) -> Record {
        match self {
            Payload::Record(record) => record,
            Payload::Value(FieldValue::Map(fields)) => Record::from(fields),
            Payload::Value(value) => Record::message(value),
        }
    }
}

impl From<Record> for Payload {
    fn from(record: Record) -> Self {
        Payload::Record(record)
    }
}

impl From<FieldValue> for Payload {
    fn from(value: FieldValue) -> Self {
        Payload::Value(value)
    }
}

impl From<Fields> for Payload {
    fn from(fields: Fields) -> Self {
        Payload::Value(FieldValue::Map(fields))
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Value(FieldValue::from(s))
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Value(FieldValue::String(s))
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Value(FieldValue::Bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_keep_insertion_order() {
        let mut fields = Fields::new();
        fields.set("b", 1).set("a", 2).set("b", 3);

        let keys: Vec<_> = fields.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(fields.get("b"), Some(&FieldValue::Int(3)));
    }

    #[test]
    fn test_record_fill_never_overwrites() {
        let mut record = Record::message("hello");
        record.fill("msg", || "other".into());
        record.fill("version", || 1.into());

        assert_eq!(record.get("msg"), Some(&FieldValue::from("hello")));
        assert_eq!(record.get("version"), Some(&FieldValue::Int(1)));
    }

    #[test]
    fn test_record_level_lookup() {
        assert_eq!(Record::new().level(), Some(Level::Debug));
        assert_eq!(
            Record::new().with("level", Level::Alert).level(),
            Some(Level::Alert)
        );
        assert_eq!(Record::new().with("level", "warn").level(), Some(Level::Warning));
        assert_eq!(Record::new().with("level", "loud").level(), None);
    }

    #[test]
    fn test_record_display_stringifies_values() {
        let sd = Fields::from([("id", FieldValue::from("req")), ("n", FieldValue::Int(3))]);
        let record = Record::new()
            .with("level", Level::Info)
            .with("msg", "started")
            .with("pri", 14)
            .with("sd", sd)
            .with("tags", vec!["a", "b"]);

        assert_eq!(
            record.to_string(),
            r#"{"level":"info","msg":"started","pri":"14","sd":{"id":"req","n":"3"},"tags":["a","b"]}"#
        );
        assert_eq!(record.to_string(), record.to_string());
    }

    #[test]
    fn test_record_display_renders_errors() {
        let record = Record::message(ErrorValue::new("disk full"));
        assert_eq!(record.to_string(), r#"{"msg":"disk full"}"#);
    }

    #[test]
    fn test_payload_into_record() {
        let map = Fields::from([("msg", "x"), ("user", "kim")]);
        let record = Payload::from(map).into_record();
        assert_eq!(record.get("user"), Some(&FieldValue::from("kim")));

        let record = Payload::from("plain").into_record();
        assert_eq!(record.get("msg"), Some(&FieldValue::from("plain")));
        assert!(record.transform());
    }

    #[test]
    fn test_json_roundtrip_of_nested_values() {
        let value = serde_json::json!({"a": [1, 2.5, null], "b": {"c": true}});
        let field = FieldValue::from_json_value(value.clone());
        assert_eq!(field.to_json_value(), value);
    }
}
