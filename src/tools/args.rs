//! Declared operation arguments and their validation.

use serde_json::{Map, Value, json};

use crate::{Error, Result};

/// Type tag of a declared argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    String,
    /// Non-negative integer.
    Integer,
    Number,
    Boolean,
    StringList,
    IntegerList,
    NumberList,
    Object,
    ObjectList,
}

impl ArgType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            ArgType::String => value.is_string(),
            ArgType::Integer => value.is_u64(),
            ArgType::Number => value.is_number(),
            ArgType::Boolean => value.is_boolean(),
            ArgType::StringList => all_items(value, Value::is_string),
            ArgType::IntegerList => all_items(value, Value::is_u64),
            ArgType::NumberList => all_items(value, Value::is_number),
            ArgType::Object => value.is_object(),
            ArgType::ObjectList => all_items(value, Value::is_object),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ArgType::String => "a string",
            ArgType::Integer => "a non-negative integer",
            ArgType::Number => "a number",
            ArgType::Boolean => "a boolean",
            ArgType::StringList => "a list of strings",
            ArgType::IntegerList => "a list of non-negative integers",
            ArgType::NumberList => "a list of numbers",
            ArgType::Object => "an object",
            ArgType::ObjectList => "a list of objects",
        }
    }

    /// JSON Schema fragment for this type.
    pub fn schema(&self) -> Value {
        match self {
            ArgType::String => json!({ "type": "string" }),
            ArgType::Integer => json!({ "type": "integer", "minimum": 0 }),
            ArgType::Number => json!({ "type": "number" }),
            ArgType::Boolean => json!({ "type": "boolean" }),
            ArgType::StringList => json!({ "type": "array", "items": { "type": "string" } }),
            ArgType::IntegerList => {
                json!({ "type": "array", "items": { "type": "integer", "minimum": 0 } })
            }
            ArgType::NumberList => json!({ "type": "array", "items": { "type": "number" } }),
            ArgType::Object => json!({ "type": "object", "additionalProperties": true }),
            ArgType::ObjectList => json!({
                "type": "array",
                "items": { "type": "object", "additionalProperties": true }
            }),
        }
    }
}

fn all_items(value: &Value, check: fn(&Value) -> bool) -> bool {
    value.as_array().is_some_and(|items| items.iter().all(check))
}

/// One declared argument of an operation.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: ArgType,
    pub required: bool,
    pub description: &'static str,
}

impl FieldSpec {
    pub const fn required(name: &'static str, ty: ArgType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            required: true,
            description,
        }
    }

    pub const fn optional(name: &'static str, ty: ArgType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            required: false,
            description,
        }
    }
}

/// Arguments that passed validation against an operation's fields.
///
/// `null` values are dropped during validation, so every getter sees either
/// a value of the declared type or nothing.
#[derive(Debug, Clone, Default)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    pub fn validate(fields: &[FieldSpec], raw: Value) -> Result<Self> {
        let map = match raw {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(Error::invalid_arguments(format!(
                    "arguments must be an object, got {}",
                    json_type(&other)
                )));
            }
        };
        let map: Map<String, Value> = map.into_iter().filter(|(_, v)| !v.is_null()).collect();

        if let Some(unknown) = map.keys().find(|k| !fields.iter().any(|f| f.name == k.as_str())) {
            return Err(Error::invalid_arguments(format!("unknown argument '{}'", unknown)));
        }

        let missing: Vec<&str> = fields
            .iter()
            .filter(|f| f.required && !map.contains_key(f.name))
            .map(|f| f.name)
            .collect();
        if !missing.is_empty() {
            return Err(Error::invalid_arguments(format!(
                "missing required argument{} {}",
                if missing.len() > 1 { "s" } else { "" },
                missing.iter().map(|m| format!("'{}'", m)).collect::<Vec<_>>().join(", ")
            )));
        }

        for field in fields {
            if let Some(value) = map.get(field.name)
                && !field.ty.matches(value)
            {
                return Err(Error::invalid_arguments(format!(
                    "argument '{}' must be {}, got {}",
                    field.name,
                    field.ty.name(),
                    json_type(value)
                )));
            }
        }

        Ok(Self(map))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn require_str(&self, name: &str) -> Result<&str> {
        self.str(name).ok_or_else(|| missing(name))
    }

    pub fn u64(&self, name: &str) -> Option<u64> {
        self.0.get(name).and_then(Value::as_u64)
    }

    pub fn require_u64(&self, name: &str) -> Result<u64> {
        self.u64(name).ok_or_else(|| missing(name))
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(Value::as_bool)
    }

    pub fn strings(&self, name: &str) -> Option<Vec<String>> {
        self.list(name, |v| v.as_str().map(str::to_string))
    }

    pub fn require_strings(&self, name: &str) -> Result<Vec<String>> {
        self.strings(name).ok_or_else(|| missing(name))
    }

    pub fn u64s(&self, name: &str) -> Option<Vec<u64>> {
        self.list(name, Value::as_u64)
    }

    pub fn f64s(&self, name: &str) -> Option<Vec<f64>> {
        self.list(name, Value::as_f64)
    }

    pub fn object(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| v.is_object())
    }

    pub fn require_object(&self, name: &str) -> Result<&Value> {
        self.object(name).ok_or_else(|| missing(name))
    }

    pub fn objects(&self, name: &str) -> Option<&[Value]> {
        self.0.get(name).and_then(Value::as_array).map(Vec::as_slice)
    }

    pub fn require_objects(&self, name: &str) -> Result<&[Value]> {
        self.objects(name).ok_or_else(|| missing(name))
    }

    fn list<T>(&self, name: &str, item: impl Fn(&Value) -> Option<T>) -> Option<Vec<T>> {
        self.0
            .get(name)
            .and_then(Value::as_array)
            .and_then(|items| items.iter().map(item).collect())
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

fn missing(name: &str) -> Error {
    Error::invalid_arguments(format!("missing required argument '{}'", name))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_u64() || n.is_i64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[FieldSpec] = &[
        FieldSpec::required("indexUid", ArgType::String, "index"),
        FieldSpec::optional("limit", ArgType::Integer, "limit"),
        FieldSpec::optional("fields", ArgType::StringList, "fields"),
        FieldSpec::optional("vector", ArgType::NumberList, "vector"),
    ];

    #[test]
    fn test_valid_arguments() {
        let args = Arguments::validate(
            FIELDS,
            json!({"indexUid": "movies", "limit": 5, "fields": ["title"], "vector": [0.1, 2]}),
        )
        .unwrap();
        assert_eq!(args.require_str("indexUid").unwrap(), "movies");
        assert_eq!(args.u64("limit"), Some(5));
        assert_eq!(args.strings("fields"), Some(vec!["title".to_string()]));
        assert_eq!(args.f64s("vector"), Some(vec![0.1, 2.0]));
    }

    #[test]
    fn test_missing_required() {
        let err = Arguments::validate(FIELDS, json!({"limit": 5})).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidArguments);
        assert!(err.to_string().contains("'indexUid'"));

        assert!(Arguments::validate(FIELDS, Value::Null).is_err());
    }

    #[test]
    fn test_null_counts_as_absent() {
        let args = Arguments::validate(FIELDS, json!({"indexUid": "movies", "limit": null})).unwrap();
        assert!(!args.contains("limit"));

        assert!(Arguments::validate(FIELDS, json!({"indexUid": null})).is_err());
    }

    #[test]
    fn test_type_mismatch() {
        let cases = [
            json!({"indexUid": 42}),
            json!({"indexUid": "movies", "limit": -1}),
            json!({"indexUid": "movies", "limit": 2.5}),
            json!({"indexUid": "movies", "limit": "10"}),
            json!({"indexUid": "movies", "fields": ["title", 3]}),
            json!({"indexUid": "movies", "vector": "0.1,0.2"}),
        ];
        for case in cases {
            let err = Arguments::validate(FIELDS, case.clone()).unwrap_err();
            assert!(err.is_validation_error(), "{} should be rejected", case);
        }
    }

    #[test]
    fn test_unknown_argument_rejected() {
        let err = Arguments::validate(FIELDS, json!({"indexUid": "movies", "lmit": 5})).unwrap_err();
        assert!(err.to_string().contains("unknown argument 'lmit'"));
    }

    #[test]
    fn test_non_object_arguments() {
        assert!(Arguments::validate(&[], json!(["a"])).is_err());
        assert!(Arguments::validate(&[], Value::Null).unwrap().is_empty());
    }
}
