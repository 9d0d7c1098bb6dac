//! The live value model held by component properties.
//!
//! Primitives and plain containers ([`Value::Array`], [`Value::Object`]) pass
//! through the codec unchanged. Every other variant is owned by a synth.

use std::any::Any;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::model::{EnumCase, Form, Record, RecordCollection, TemporaryUpload};

/// A scalar used as a natural record key or an enum backing value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Str(String),
}

impl Scalar {
    /// Converts a JSON number or string to a scalar.
    pub fn from_json(json: &Json) -> Option<Scalar> {
        match json {
            Json::Number(n) => n.as_i64().map(Scalar::Int),
            Json::String(s) => Some(Scalar::Str(s.clone())),
            _ => None,
        }
    }

    /// Returns the JSON form of this scalar.
    pub fn to_json(&self) -> Json {
        match self {
            Scalar::Int(i) => Json::from(*i),
            Scalar::Str(s) => Json::from(s.as_str()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(v as i64)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

/// A value type defined outside this crate.
///
/// Implemented automatically for every `Clone + PartialEq + Debug` type, so a
/// third-party synth only has to define its data type and register itself.
pub trait CustomValue: Any + fmt::Debug + Send + Sync {
    /// Clones into a new box.
    fn clone_boxed(&self) -> Box<dyn CustomValue>;
    /// Compares with another custom value of possibly different type.
    fn eq_dyn(&self, other: &dyn CustomValue) -> bool;
    /// Upcast for downcasting.
    fn as_any(&self) -> &dyn Any;
    /// Mutable upcast for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Type name used in error messages.
    fn type_name(&self) -> &'static str;
}

impl<T> CustomValue for T
where
    T: Any + fmt::Debug + Clone + PartialEq + Send + Sync,
{
    fn clone_boxed(&self) -> Box<dyn CustomValue> {
        Box::new(self.clone())
    }

    fn eq_dyn(&self, other: &dyn CustomValue) -> bool {
        other.as_any().downcast_ref::<T>().is_some_and(|o| o == self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl Clone for Box<dyn CustomValue> {
    fn clone(&self) -> Self {
        // Deref twice: the blanket impl also covers the box itself.
        (**self).clone_boxed()
    }
}

impl PartialEq for Box<dyn CustomValue> {
    fn eq(&self, other: &Self) -> bool {
        (**self).eq_dyn(&**other)
    }
}

/// A live value in a component's state tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Plain ordered container; no synth, children walked structurally.
    Array(Vec<Value>),
    /// Plain keyed container; no synth, children walked structurally.
    Object(IndexMap<String, Value>),
    /// Typed ordered collection.
    Collection(Vec<Value>),
    /// Typed keyed map, serialized as ordered `[key, value]` pairs.
    Map(IndexMap<String, Value>),
    /// Records backed by the persistence collaborator.
    Records(RecordCollection),
    /// A single persisted record.
    Record(Box<Record>),
    Enum(EnumCase),
    Form(Form),
    Upload(TemporaryUpload),
    Custom(Box<dyn CustomValue>),
}

impl Value {
    /// Wraps a custom value.
    pub fn custom<T: CustomValue>(value: T) -> Self {
        Value::Custom(Box::new(value))
    }

    /// Returns a short name for the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Collection(_) => "collection",
            Value::Map(_) => "map",
            Value::Records(_) => "record collection",
            Value::Record(_) => "record",
            Value::Enum(_) => "enum",
            Value::Form(_) => "form",
            Value::Upload(_) => "upload",
            Value::Custom(_) => "custom",
        }
    }

    /// Returns true for scalars and null.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_)
        )
    }

    /// Converts JSON to a value made of primitives and plain containers.
    pub fn from_json(json: Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::Str(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts a primitive or plain container back to JSON.
    ///
    /// Returns `None` if the tree holds a synth-owned value or a non-finite
    /// float anywhere.
    pub fn to_plain_json(&self) -> Option<Json> {
        match self {
            Value::Null => Some(Json::Null),
            Value::Bool(b) => Some(Json::Bool(*b)),
            Value::Int(i) => Some(Json::from(*i)),
            Value::Float(f) => serde_json::Number::from_f64(*f).map(Json::Number),
            Value::Str(s) => Some(Json::String(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Value::to_plain_json)
                .collect::<Option<Vec<_>>>()
                .map(Json::Array),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| v.to_plain_json().map(|j| (k.clone(), j)))
                .collect::<Option<serde_json::Map<_, _>>>()
                .map(Json::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a float, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_records(&self) -> Option<&RecordCollection> {
        match self {
            Value::Records(c) => Some(c),
            _ => None,
        }
    }

    /// Downcasts a [`Value::Custom`] to `T`.
    pub fn downcast_custom<T: 'static>(&self) -> Option<&T> {
        match self {
            Value::Custom(c) => (**c).as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Mutably downcasts a [`Value::Custom`] to `T`.
    pub fn downcast_custom_mut<T: 'static>(&mut self) -> Option<&mut T> {
        match self {
            Value::Custom(c) => (**c).as_any_mut().downcast_mut::<T>(),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<Scalar> for Value {
    fn from(v: Scalar) -> Self {
        match v {
            Scalar::Int(i) => Value::Int(i),
            Scalar::Str(s) => Value::Str(s),
        }
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(Box::new(v))
    }
}

impl From<RecordCollection> for Value {
    fn from(v: RecordCollection) -> Self {
        Value::Records(v)
    }
}

impl From<EnumCase> for Value {
    fn from(v: EnumCase) -> Self {
        Value::Enum(v)
    }
}

impl From<Form> for Value {
    fn from(v: Form) -> Self {
        Value::Form(v)
    }
}

impl From<TemporaryUpload> for Value {
    fn from(v: TemporaryUpload) -> Self {
        Value::Upload(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq)]
    struct Celsius(f64);

    #[test]
    fn test_from_json_plain() {
        let value = Value::from_json(json!({"a": 1, "b": [true, null, 2.5, "x"]}));
        let Value::Object(map) = &value else {
            panic!("expected object");
        };
        assert_eq!(map.get("a"), Some(&Value::Int(1)));
        assert_eq!(
            map.get("b"),
            Some(&Value::Array(vec![
                Value::Bool(true),
                Value::Null,
                Value::Float(2.5),
                Value::Str("x".to_string()),
            ]))
        );
        assert_eq!(value.to_plain_json(), Some(json!({"a": 1, "b": [true, null, 2.5, "x"]})));
    }

    #[test]
    fn test_object_order_preserved() {
        let value = Value::from_json(json!({"z": 1, "a": 2, "m": 3}));
        let Value::Object(map) = value else {
            panic!("expected object");
        };
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_to_plain_json_rejects_typed() {
        let value = Value::Array(vec![Value::Collection(vec![])]);
        assert_eq!(value.to_plain_json(), None);
        assert_eq!(Value::Float(f64::NAN).to_plain_json(), None);
    }

    #[test]
    fn test_custom_value_clone_and_eq() {
        let a = Value::custom(Celsius(21.5));
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, Value::custom(Celsius(3.0)));
        assert_ne!(a, Value::custom("not celsius".to_string()));
        assert_eq!(b.downcast_custom::<Celsius>(), Some(&Celsius(21.5)));
    }

    #[test]
    fn test_scalar_json() {
        assert_eq!(Scalar::from_json(&json!(3)), Some(Scalar::Int(3)));
        assert_eq!(Scalar::from_json(&json!("k")), Some(Scalar::Str("k".to_string())));
        assert_eq!(Scalar::from_json(&json!(1.5)), None);
        assert_eq!(Scalar::Int(7).to_json(), json!(7));
    }
}
