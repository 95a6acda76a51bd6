//! Parameter schemas for tools and prompts.
//!
//! A [`SchemaDescriptor`] is an ordered list of [`ParamSpec`]s built once at
//! registration time. It serves two purposes:
//!
//! - **Discovery**: rendered as a JSON Schema object for `tools/list` and as
//!   prompt arguments for `prompts/list`.
//! - **Validation**: raw client arguments are checked and coerced against it
//!   before a tool or prompt ever runs.
//!
//! Validation is exhaustive: every violation is collected so the client sees
//! all problems in a single response.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::debug;

// ============================================================================
// Types
// ============================================================================

/// The JSON type a parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    /// Any JSON value, passed through untouched.
    Any,
}

impl ParamType {
    /// JSON Schema `type` keyword for this parameter type.
    pub fn json_type(&self) -> Option<&'static str> {
        match self {
            Self::String => Some("string"),
            Self::Number => Some("number"),
            Self::Integer => Some("integer"),
            Self::Boolean => Some("boolean"),
            Self::Array => Some("array"),
            Self::Object => Some("object"),
            Self::Any => None,
        }
    }

    /// Check and coerce a raw value into this type.
    ///
    /// Coercion is lax in the same places clients commonly cut corners:
    /// numeric strings are accepted for numbers, `"true"`/`"false"` for
    /// booleans and integral floats for integers.
    pub fn coerce(&self, value: &Value) -> Result<Value, String> {
        match (self, value) {
            (Self::Any, v) => Ok(v.clone()),
            (Self::String, Value::String(_)) => Ok(value.clone()),
            (Self::Number, Value::Number(_)) => Ok(value.clone()),
            (Self::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(|n| json!(n))
                .ok_or_else(|| format!("expected number, got string '{}'", s)),
            (Self::Integer, Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    Ok(json!(i))
                } else {
                    match n.as_f64() {
                        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                            Ok(json!(f as i64))
                        }
                        _ => Err(format!("expected integer, got {}", n)),
                    }
                }
            }
            (Self::Integer, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(|i| json!(i))
                .map_err(|_| format!("expected integer, got string '{}'", s)),
            (Self::Boolean, Value::Bool(_)) => Ok(value.clone()),
            (Self::Boolean, Value::String(s)) => match s.to_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(format!("expected boolean, got string '{}'", s)),
            },
            (Self::Array, Value::Array(_)) => Ok(value.clone()),
            (Self::Object, Value::Object(_)) => Ok(value.clone()),
            (expected, got) => Err(format!(
                "expected {}, got {}",
                expected.json_type().unwrap_or("any"),
                value_kind(got)
            )),
        }
    }
}

/// A constraint checked after type coercion succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    /// Value must equal one of the listed values.
    OneOf(Vec<Value>),
    /// Numeric lower bound (inclusive).
    Minimum(f64),
    /// Numeric upper bound (inclusive).
    Maximum(f64),
    /// Minimum string length in characters.
    MinLength(usize),
    /// Maximum string length in characters.
    MaxLength(usize),
}

impl Constraint {
    fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Self::OneOf(allowed) => {
                if allowed.contains(value) {
                    Ok(())
                } else {
                    let allowed: Vec<String> = allowed.iter().map(Value::to_string).collect();
                    Err(format!("must be one of [{}]", allowed.join(", ")))
                }
            }
            Self::Minimum(min) => match value.as_f64() {
                Some(n) if n < *min => Err(format!("must be >= {}", min)),
                _ => Ok(()),
            },
            Self::Maximum(max) => match value.as_f64() {
                Some(n) if n > *max => Err(format!("must be <= {}", max)),
                _ => Ok(()),
            },
            Self::MinLength(len) => match value.as_str() {
                Some(s) if s.chars().count() < *len => {
                    Err(format!("must be at least {} characters", len))
                }
                _ => Ok(()),
            },
            Self::MaxLength(len) => match value.as_str() {
                Some(s) if s.chars().count() > *len => {
                    Err(format!("must be at most {} characters", len))
                }
                _ => Ok(()),
            },
        }
    }

    fn apply_to_schema(&self, schema: &mut Map<String, Value>) {
        match self {
            Self::OneOf(allowed) => {
                schema.insert("enum".into(), Value::Array(allowed.clone()));
            }
            Self::Minimum(min) => {
                schema.insert("minimum".into(), json!(min));
            }
            Self::Maximum(max) => {
                schema.insert("maximum".into(), json!(max));
            }
            Self::MinLength(len) => {
                schema.insert("minLength".into(), json!(len));
            }
            Self::MaxLength(len) => {
                schema.insert("maxLength".into(), json!(len));
            }
        }
    }
}

/// Description of a single parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
}

impl ParamSpec {
    /// A parameter the caller must supply.
    pub fn required(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            default: None,
            description: None,
            constraints: Vec::new(),
        }
    }

    /// A parameter that may be omitted; absent values stay absent.
    pub fn optional(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty)
        }
    }

    /// An optional parameter filled with `default` when omitted.
    pub fn with_default(name: impl Into<String>, ty: ParamType, default: impl Into<Value>) -> Self {
        Self {
            default: Some(default.into()),
            ..Self::optional(name, ty)
        }
    }

    /// Attach a human readable description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach a constraint.
    pub fn constrain(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    fn to_json_schema(&self) -> Value {
        let mut schema = Map::new();
        if let Some(ty) = self.ty.json_type() {
            schema.insert("type".into(), json!(ty));
        }
        schema.insert("title".into(), json!(title_case(&self.name)));
        if let Some(description) = &self.description {
            schema.insert("description".into(), json!(description));
        }
        if let Some(default) = &self.default {
            schema.insert("default".into(), default.clone());
        }
        for constraint in &self.constraints {
            constraint.apply_to_schema(&mut schema);
        }
        Value::Object(schema)
    }
}

// ============================================================================
// Validation errors
// ============================================================================

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub param: String,
    pub reason: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.param, self.reason)
    }
}

/// Every violation found while validating one set of arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{}", join_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// Whether a violation was recorded for `param`.
    pub fn mentions(&self, param: &str) -> bool {
        self.violations.iter().any(|v| v.param == param)
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Pseudo-parameter name used when the argument container itself is wrong.
pub const ARGUMENTS_PARAM: &str = "<arguments>";

// ============================================================================
// Schema descriptor
// ============================================================================

/// Ordered parameter list for one tool or prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    params: Vec<ParamSpec>,
}

impl SchemaDescriptor {
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn push(&mut self, param: ParamSpec) {
        self.params.push(param);
    }

    /// Render as a JSON Schema object (`inputSchema` in discovery).
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.clone(), p.to_json_schema()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Validate raw arguments, returning typed and defaulted arguments.
    ///
    /// `None` and `null` are treated as an empty argument object. Keys not
    /// named by the schema are ignored.
    pub fn validate(&self, raw: Option<&Value>) -> Result<Map<String, Value>, ValidationError> {
        let empty = Map::new();
        let raw = match raw {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(ValidationError {
                    violations: vec![Violation {
                        param: ARGUMENTS_PARAM.to_string(),
                        reason: format!("expected an object, got {}", value_kind(other)),
                    }],
                });
            }
        };

        let mut typed = Map::new();
        let mut violations = Vec::new();

        for param in &self.params {
            match raw.get(&param.name) {
                None | Some(Value::Null) => {
                    if let Some(default) = &param.default {
                        typed.insert(param.name.clone(), default.clone());
                    } else if param.required {
                        violations.push(Violation {
                            param: param.name.clone(),
                            reason: "missing required parameter".to_string(),
                        });
                    }
                }
                Some(value) => match param.ty.coerce(value) {
                    Ok(coerced) => {
                        let before = violations.len();
                        for constraint in &param.constraints {
                            if let Err(reason) = constraint.check(&coerced) {
                                violations.push(Violation {
                                    param: param.name.clone(),
                                    reason,
                                });
                            }
                        }
                        if violations.len() == before {
                            typed.insert(param.name.clone(), coerced);
                        }
                    }
                    Err(reason) => violations.push(Violation {
                        param: param.name.clone(),
                        reason,
                    }),
                },
            }
        }

        for key in raw.keys() {
            if !self.params.iter().any(|p| &p.name == key) {
                debug!("Ignoring unknown argument: {}", key);
            }
        }

        if violations.is_empty() {
            Ok(typed)
        } else {
            Err(ValidationError { violations })
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum_schema() -> SchemaDescriptor {
        SchemaDescriptor::new(vec![
            ParamSpec::required("a", ParamType::Number),
            ParamSpec::required("b", ParamType::Number),
        ])
    }

    #[test]
    fn test_valid_arguments_pass() {
        let args = sum_schema()
            .validate(Some(&json!({ "a": 2, "b": 3.5 })))
            .unwrap();
        assert_eq!(args["a"], json!(2));
        assert_eq!(args["b"], json!(3.5));
    }

    #[test]
    fn test_missing_required_lists_every_param() {
        let err = sum_schema().validate(Some(&json!({}))).unwrap_err();
        assert_eq!(err.violations.len(), 2);
        assert!(err.mentions("a"));
        assert!(err.mentions("b"));
    }

    #[test]
    fn test_validation_is_exhaustive_across_kinds() {
        let schema = SchemaDescriptor::new(vec![
            ParamSpec::required("a", ParamType::Number),
            ParamSpec::required("b", ParamType::Number),
            ParamSpec::optional("mode", ParamType::String)
                .constrain(Constraint::OneOf(vec![json!("fast"), json!("slow")])),
        ]);

        let err = schema
            .validate(Some(&json!({ "a": true, "mode": "medium" })))
            .unwrap_err();

        assert_eq!(err.violations.len(), 3);
        assert!(err.mentions("a"));
        assert!(err.mentions("b"));
        assert!(err.mentions("mode"));
        assert!(err.to_string().contains("missing required parameter"));
    }

    #[test]
    fn test_defaults_are_applied() {
        let schema = SchemaDescriptor::new(vec![ParamSpec::with_default(
            "city",
            ParamType::String,
            "San Francisco",
        )]);

        let args = schema.validate(None).unwrap();
        assert_eq!(args["city"], json!("San Francisco"));

        let args = schema.validate(Some(&json!({ "city": null }))).unwrap();
        assert_eq!(args["city"], json!("San Francisco"));
    }

    #[test]
    fn test_optional_without_default_stays_absent() {
        let schema =
            SchemaDescriptor::new(vec![ParamSpec::optional("style", ParamType::String)]);
        let args = schema.validate(Some(&json!({}))).unwrap();
        assert!(!args.contains_key("style"));
    }

    #[test]
    fn test_lax_coercion() {
        assert_eq!(ParamType::Number.coerce(&json!("2.5")).unwrap(), json!(2.5));
        assert_eq!(ParamType::Integer.coerce(&json!(4.0)).unwrap(), json!(4));
        assert_eq!(ParamType::Integer.coerce(&json!("7")).unwrap(), json!(7));
        assert_eq!(ParamType::Boolean.coerce(&json!("TRUE")).unwrap(), json!(true));
        assert!(ParamType::Integer.coerce(&json!(4.5)).is_err());
        assert!(ParamType::Number.coerce(&json!("abc")).is_err());
        assert!(ParamType::String.coerce(&json!(12)).is_err());
    }

    #[test]
    fn test_numeric_bounds() {
        let schema = SchemaDescriptor::new(vec![
            ParamSpec::required("ratio", ParamType::Number)
                .constrain(Constraint::Minimum(0.0))
                .constrain(Constraint::Maximum(1.0)),
        ]);
        assert!(schema.validate(Some(&json!({ "ratio": 0.5 }))).is_ok());
        let err = schema.validate(Some(&json!({ "ratio": 1.5 }))).unwrap_err();
        assert_eq!(err.violations[0].reason, "must be <= 1");
    }

    #[test]
    fn test_non_object_arguments_rejected() {
        let err = sum_schema().validate(Some(&json!([1, 2]))).unwrap_err();
        assert!(err.mentions(ARGUMENTS_PARAM));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let args = sum_schema()
            .validate(Some(&json!({ "a": 1, "b": 2, "extra": "x" })))
            .unwrap();
        assert!(!args.contains_key("extra"));
    }

    #[test]
    fn test_json_schema_rendering() {
        let schema = SchemaDescriptor::new(vec![
            ParamSpec::required("message", ParamType::String).describe("A message to process"),
            ParamSpec::with_default("format", ParamType::String, "brief"),
        ]);

        let rendered = schema.to_json_schema();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["required"], json!(["message"]));
        assert_eq!(rendered["properties"]["message"]["type"], "string");
        assert_eq!(rendered["properties"]["message"]["title"], "Message");
        assert_eq!(rendered["properties"]["format"]["default"], "brief");
    }
}
