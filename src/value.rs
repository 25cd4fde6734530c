use std::fmt;

use serde::de::{Error as DeError, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The dynamically-typed values held by the store and carried in messages.
///
/// A `Value` is a finite tree: objects map text keys to nested values, with
/// keys unique and insertion order preserved. Values are never mutated in
/// place; the store replaces a key's value wholesale.
///
/// The JSON mapping used for persistence and Select replies is the obvious
/// one: `Null` ↔ `null`, `Boolean` ↔ `true`/`false`, `Integer` ↔ an i64
/// number, `Text` ↔ a string, `Object` ↔ a JSON object in entry order.
/// JSON floats and arrays have no counterpart and are rejected on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// the absent value, `null` in JSON
    Null,
    /// a boolean
    Boolean(bool),
    /// a signed 64-bit integer
    Integer(i64),
    /// a UTF-8 string
    Text(String),
    /// an insertion-ordered mapping of unique text keys to values
    Object(Vec<(String, Value)>),
}

impl Value {
    /// Builds a [`Value::Object`] from `entries`, keeping the first
    /// occurrence's position when a key repeats (last write wins).
    pub fn object(entries: impl IntoIterator<Item = (String, Value)>) -> Value {
        let mut unique: Vec<(String, Value)> = Vec::new();
        for (key, value) in entries {
            match unique.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => unique.push((key, value)),
            }
        }
        Value::Object(unique)
    }

    /// short name of this value's type, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Text(_) => "text",
            Value::Object(_) => "object",
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Text(t) => serializer.serialize_str(t),
            Value::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a null, boolean, integer, string or object")
    }

    fn visit_unit<E: DeError>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: DeError>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_bool<E: DeError>(self, b: bool) -> std::result::Result<Value, E> {
        Ok(Value::Boolean(b))
    }

    fn visit_i64<E: DeError>(self, i: i64) -> std::result::Result<Value, E> {
        Ok(Value::Integer(i))
    }

    fn visit_u64<E: DeError>(self, u: u64) -> std::result::Result<Value, E> {
        i64::try_from(u)
            .map(Value::Integer)
            .map_err(|_| E::custom(format!("integer {} out of range", u)))
    }

    fn visit_str<E: DeError>(self, s: &str) -> std::result::Result<Value, E> {
        Ok(Value::Text(s.to_owned()))
    }

    fn visit_string<E: DeError>(self, s: String) -> std::result::Result<Value, E> {
        Ok(Value::Text(s))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Value, A::Error> {
        let mut entries: Vec<(String, Value)> = Vec::new();
        while let Some((key, value)) = access.next_entry::<String, Value>()? {
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => entries.push((key, value)),
            }
        }
        Ok(Value::Object(entries))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_preserves_entry_order() {
        let value = Value::Object(vec![
            ("b".to_owned(), Value::Integer(1)),
            ("a".to_owned(), Value::Integer(2)),
        ]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"b":1,"a":2}"#);
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn json_scalars() {
        assert_eq!(serde_json::to_string(&Value::Null).unwrap(), "null");
        assert_eq!(serde_json::to_string(&Value::Boolean(true)).unwrap(), "true");
        assert_eq!(serde_json::to_string(&Value::Integer(-7)).unwrap(), "-7");
        assert_eq!(serde_json::to_string(&Value::Text("hi".into())).unwrap(), r#""hi""#);
        let back: Value = serde_json::from_str("null").unwrap();
        assert_eq!(back, Value::Null);
    }

    #[test]
    fn json_floats_and_arrays_are_rejected() {
        assert!(serde_json::from_str::<Value>("1.5").is_err());
        assert!(serde_json::from_str::<Value>("[1,2]").is_err());
    }

    #[test]
    fn object_builder_deduplicates_keys_in_place() {
        let value = Value::object(vec![
            ("a".to_owned(), Value::Integer(1)),
            ("b".to_owned(), Value::Integer(2)),
            ("a".to_owned(), Value::Integer(3)),
        ]);
        assert_eq!(
            value,
            Value::Object(vec![
                ("a".to_owned(), Value::Integer(3)),
                ("b".to_owned(), Value::Integer(2)),
            ])
        );
    }
}
