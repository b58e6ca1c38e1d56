//! Closed structural schema subset for leaf I/O validation.
//!
//! Leaves declare typed input/output shapes using this subset; argument
//! validation happens once here, field by field, returning the first
//! violation found. Unknown argument keys are rejected.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A structural schema node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schema {
    Object {
        #[serde(default)]
        properties: BTreeMap<String, Schema>,
        #[serde(default)]
        required: Vec<String>,
    },
    String {
        #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
        allowed: Option<Vec<String>>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },
    Integer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<i64>,
    },
    Boolean,
    Array {
        items: Box<Schema>,
    },
}

impl Schema {
    /// An object schema with no properties (accepts `{}` only).
    pub fn empty_object() -> Self {
        Schema::Object {
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    /// Validate a value, returning the first violation as a path-qualified
    /// message.
    pub fn validate(&self, value: &serde_json::Value) -> Result<(), String> {
        self.validate_at(value, "$")
    }

    fn validate_at(&self, value: &serde_json::Value, path: &str) -> Result<(), String> {
        match self {
            Schema::Object {
                properties,
                required,
            } => {
                let Some(map) = value.as_object() else {
                    return Err(format!("{path}: expected object"));
                };
                for key in required {
                    if !map.contains_key(key) {
                        return Err(format!("{path}: missing required field '{key}'"));
                    }
                }
                for (key, field_value) in map {
                    match properties.get(key) {
                        Some(schema) => {
                            schema.validate_at(field_value, &format!("{path}.{key}"))?
                        }
                        None => return Err(format!("{path}: unknown field '{key}'")),
                    }
                }
                Ok(())
            }
            Schema::String { allowed } => {
                let Some(s) = value.as_str() else {
                    return Err(format!("{path}: expected string"));
                };
                if let Some(allowed) = allowed {
                    if !allowed.iter().any(|a| a == s) {
                        return Err(format!("{path}: '{s}' not in enum"));
                    }
                }
                Ok(())
            }
            Schema::Number { minimum, maximum } => {
                let Some(n) = value.as_f64() else {
                    return Err(format!("{path}: expected number"));
                };
                if let Some(min) = minimum {
                    if n < *min {
                        return Err(format!("{path}: {n} below minimum {min}"));
                    }
                }
                if let Some(max) = maximum {
                    if n > *max {
                        return Err(format!("{path}: {n} above maximum {max}"));
                    }
                }
                Ok(())
            }
            Schema::Integer { minimum, maximum } => {
                let Some(n) = value.as_i64() else {
                    return Err(format!("{path}: expected integer"));
                };
                if let Some(min) = minimum {
                    if n < *min {
                        return Err(format!("{path}: {n} below minimum {min}"));
                    }
                }
                if let Some(max) = maximum {
                    if n > *max {
                        return Err(format!("{path}: {n} above maximum {max}"));
                    }
                }
                Ok(())
            }
            Schema::Boolean => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    Err(format!("{path}: expected boolean"))
                }
            }
            Schema::Array { items } => {
                let Some(arr) = value.as_array() else {
                    return Err(format!("{path}: expected array"));
                };
                for (i, item) in arr.iter().enumerate() {
                    items.validate_at(item, &format!("{path}[{i}]"))?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn move_to_schema() -> Schema {
        let mut properties = BTreeMap::new();
        properties.insert(
            "x".to_string(),
            Schema::Number {
                minimum: None,
                maximum: None,
            },
        );
        properties.insert(
            "y".to_string(),
            Schema::Number {
                minimum: Some(-64.0),
                maximum: Some(320.0),
            },
        );
        properties.insert(
            "mode".to_string(),
            Schema::String {
                allowed: Some(vec!["walk".to_string(), "sprint".to_string()]),
            },
        );
        Schema::Object {
            properties,
            required: vec!["x".to_string(), "y".to_string()],
        }
    }

    #[test]
    fn test_valid_args_pass() {
        let schema = move_to_schema();
        assert!(schema
            .validate(&json!({"x": 10.0, "y": 64.0, "mode": "walk"}))
            .is_ok());
        assert!(schema.validate(&json!({"x": 10.0, "y": 64.0})).is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let schema = move_to_schema();
        let err = schema.validate(&json!({"x": 10.0})).unwrap_err();
        assert!(err.contains("missing required field 'y'"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let schema = move_to_schema();
        let err = schema
            .validate(&json!({"x": 1.0, "y": 1.0, "z": 1.0}))
            .unwrap_err();
        assert!(err.contains("unknown field 'z'"));
    }

    #[test]
    fn test_enum_violation() {
        let schema = move_to_schema();
        let err = schema
            .validate(&json!({"x": 1.0, "y": 1.0, "mode": "fly"}))
            .unwrap_err();
        assert!(err.contains("not in enum"));
    }

    #[test]
    fn test_range_violation_has_path() {
        let schema = move_to_schema();
        let err = schema.validate(&json!({"x": 1.0, "y": 400.0})).unwrap_err();
        assert!(err.starts_with("$.y"));
    }

    #[test]
    fn test_array_items_validated() {
        let schema = Schema::Array {
            items: Box::new(Schema::Integer {
                minimum: Some(0),
                maximum: None,
            }),
        };
        assert!(schema.validate(&json!([1, 2, 3])).is_ok());
        let err = schema.validate(&json!([1, -2])).unwrap_err();
        assert!(err.contains("[1]"));
    }

    #[test]
    fn test_schema_serde_roundtrip() {
        let schema = move_to_schema();
        let json = serde_json::to_string(&schema).unwrap();
        let back: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(schema, back);
    }
}
