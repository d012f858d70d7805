//! Query definitions and validation of caller-supplied parameters.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use graphgate_graph::Parameters;

use crate::error::ParameterError;

/// Converts a raw caller value into the value bound to the query.
pub type Caster = fn(&Value) -> Result<Value, String>;

/// Declared type of a query parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
}

impl ParameterType {
    /// Built-in cast. Strings are parsed for the numeric and boolean types.
    pub fn cast(self, raw: &Value) -> Result<Value, String> {
        match self {
            Self::String => cast_string(raw),
            Self::Integer => cast_integer(raw),
            Self::Float => cast_float(raw),
            Self::Boolean => cast_boolean(raw),
        }
    }
}

fn cast_string(raw: &Value) -> Result<Value, String> {
    match raw {
        Value::String(_) => Ok(raw.clone()),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        other => Err(format!("expected a string, got {}", kind(other))),
    }
}

fn cast_integer(raw: &Value) -> Result<Value, String> {
    match raw {
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(Value::from(i)),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Ok(Value::from(f as i64))
            }
            _ => Err(format!("{n} is not an integer")),
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("invalid literal for integer: '{s}'")),
        other => Err(format!("expected an integer, got {}", kind(other))),
    }
}

fn cast_float(raw: &Value) -> Result<Value, String> {
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        other => return Err(format!("expected a number, got {}", kind(other))),
    };
    parsed
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| format!("could not convert to float: {raw}"))
}

fn cast_boolean(raw: &Value) -> Result<Value, String> {
    match raw {
        Value::Bool(_) => Ok(raw.clone()),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Value::Bool(true)),
            "false" | "0" | "no" => Ok(Value::Bool(false)),
            _ => Err(format!("invalid literal for boolean: '{s}'")),
        },
        other => Err(format!("expected a boolean, got {}", kind(other))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A parameter a catalog query expects from its caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryParameterDefinition {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub data_type: ParameterType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    /// Replaces the cast of `data_type` when set.
    #[serde(skip)]
    pub cast: Option<Caster>,
}

impl QueryParameterDefinition {
    pub fn new(name: impl Into<String>, data_type: ParameterType) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            data_type,
            description: None,
            placeholder: None,
            cast: None,
        }
    }

    pub fn with_cast(mut self, cast: Caster) -> Self {
        self.cast = Some(cast);
        self
    }

    pub fn cast(&self, raw: &Value) -> Result<Value, String> {
        match self.cast {
            Some(cast) => cast(raw),
            None => self.data_type.cast(raw),
        }
    }
}

/// A predefined query offered by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub description: String,
    pub provider: String,
    pub cypher: String,
    #[serde(default)]
    pub parameters: Vec<QueryParameterDefinition>,
}

/// Validate `provided` against `definition` and build the bound parameters.
///
/// The provided names must match the declared names exactly. Each value goes
/// through its parameter's cast. `provider_uid` and `provider_id` are always
/// added to the result.
pub fn prepare_parameters(
    definition: &QueryDefinition,
    provided: &Map<String, Value>,
    provider_uid: &str,
    provider_id: &str,
) -> Result<Parameters, ParameterError> {
    let expected: BTreeSet<&str> = definition.parameters.iter().map(|p| p.name.as_str()).collect();
    let given: BTreeSet<&str> = provided.keys().map(String::as_str).collect();

    let unknown: Vec<String> = given.difference(&expected).map(|s| s.to_string()).collect();
    if !unknown.is_empty() {
        return Err(ParameterError::UnknownParameter(unknown));
    }
    let missing: Vec<String> = expected.difference(&given).map(|s| s.to_string()).collect();
    if !missing.is_empty() {
        return Err(ParameterError::MissingParameter(missing));
    }

    let mut parameters = Parameters::new();
    parameters.insert("provider_uid".to_string(), Value::from(provider_uid));
    parameters.insert("provider_id".to_string(), Value::from(provider_id));

    for param in &definition.parameters {
        let raw = provided.get(&param.name).unwrap_or(&Value::Null);
        let value = param
            .cast(raw)
            .map_err(|reason| ParameterError::InvalidParameterValue {
                name: param.name.clone(),
                reason,
            })?;
        parameters.insert(param.name.clone(), value);
    }

    Ok(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition(params: Vec<QueryParameterDefinition>) -> QueryDefinition {
        QueryDefinition {
            id: "aws-internet-exposed".to_string(),
            name: "Internet exposed instances".to_string(),
            short_description: String::new(),
            description: String::new(),
            provider: "aws".to_string(),
            cypher: "MATCH (n) RETURN n".to_string(),
            parameters: params,
        }
    }

    fn provided(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_casts_values_and_merges_provider_ids() {
        let def = definition(vec![
            QueryParameterDefinition::new("port", ParameterType::Integer),
            QueryParameterDefinition::new("region", ParameterType::String),
        ]);

        let params = prepare_parameters(
            &def,
            &provided(json!({"port": "443", "region": "us-east-1"})),
            "123456789012",
            "prov-1",
        )
        .unwrap();

        assert_eq!(
            Value::Object(params),
            json!({
                "port": 443,
                "region": "us-east-1",
                "provider_uid": "123456789012",
                "provider_id": "prov-1",
            })
        );
    }

    #[test]
    fn test_unknown_parameters_listed_sorted() {
        let def = definition(vec![QueryParameterDefinition::new("port", ParameterType::Integer)]);

        let err = prepare_parameters(
            &def,
            &provided(json!({"port": 1, "zeta": 1, "alpha": 2})),
            "uid",
            "pid",
        )
        .unwrap_err();

        assert_eq!(
            err,
            ParameterError::UnknownParameter(vec!["alpha".to_string(), "zeta".to_string()])
        );
        assert_eq!(err.to_string(), "Unknown parameter(s): alpha, zeta");
    }

    #[test]
    fn test_missing_parameters_listed_sorted() {
        let def = definition(vec![
            QueryParameterDefinition::new("tag", ParameterType::String),
            QueryParameterDefinition::new("name", ParameterType::String),
        ]);

        let err = prepare_parameters(&def, &Map::new(), "uid", "pid").unwrap_err();

        assert_eq!(err.to_string(), "Missing required parameter(s): name, tag");
    }

    #[test]
    fn test_invalid_value_names_parameter() {
        let def = definition(vec![QueryParameterDefinition::new("port", ParameterType::Integer)]);

        let err = prepare_parameters(&def, &provided(json!({"port": "https"})), "uid", "pid")
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Invalid value for parameter `port`: invalid literal for integer: 'https'"
        );
    }

    #[test]
    fn test_custom_caster_replaces_builtin() {
        fn upper(raw: &Value) -> Result<Value, String> {
            raw.as_str()
                .map(|s| Value::from(s.to_uppercase()))
                .ok_or_else(|| "not text".to_string())
        }
        let def = definition(vec![
            QueryParameterDefinition::new("region", ParameterType::String).with_cast(upper),
        ]);

        let params =
            prepare_parameters(&def, &provided(json!({"region": "eu-west-1"})), "uid", "pid")
                .unwrap();

        assert_eq!(params.get("region"), Some(&json!("EU-WEST-1")));
    }

    #[test]
    fn test_builtin_casts() {
        assert_eq!(ParameterType::Boolean.cast(&json!("Yes")), Ok(json!(true)));
        assert_eq!(ParameterType::Float.cast(&json!("2.5")), Ok(json!(2.5)));
        assert_eq!(ParameterType::Integer.cast(&json!(3.0)), Ok(json!(3)));
        assert!(ParameterType::Integer.cast(&json!(3.5)).is_err());
        assert_eq!(ParameterType::String.cast(&json!(42)), Ok(json!("42")));
        assert!(ParameterType::String.cast(&Value::Null).is_err());
    }

    #[test]
    fn test_definition_deserializes_with_defaults() {
        let def: QueryDefinition = serde_json::from_value(json!({
            "id": "q1",
            "name": "Query one",
            "provider": "aws",
            "cypher": "MATCH (n) RETURN n",
            "parameters": [{"name": "port", "data_type": "integer"}]
        }))
        .unwrap();

        assert_eq!(def.parameters[0].data_type, ParameterType::Integer);
        assert!(def.parameters[0].cast.is_none());
        assert_eq!(def.description, "");
    }
}
