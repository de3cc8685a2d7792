//! Configuration values and their string protocol.
//!
//! Every setting crosses the boundary as a pair of C strings. This module
//! provides the typed value ([`ConfigValue`]), the coercion rule ([`coerce`]),
//! and [`BoosterConfig`], a schema-validated set of assignments built with the
//! builder pattern.
//!
//! # Example
//!
//! ```
//! use bitboost_host::{BoosterConfig, ConfigSchema};
//!
//! let schema = ConfigSchema::parse(
//!     "name,default,type,description\n\
//!      max_depth,6,usize,Maximum depth.\n\
//!      categorical_features,,Vec<usize>,Categorical columns.\n",
//! )
//! .expect("valid schema");
//!
//! let config = BoosterConfig::builder(&schema)
//!     .set("max_depth", 3)
//!     .set("categorical_features", vec![0, 2])
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.value_of("categorical_features"), Some("0,2"));
//! ```

use std::fmt;

use serde_json::Value;

use crate::error::BitBoostError;
use crate::schema::{ConfigParam, ConfigSchema, ParamType};

/// Delimiter joining list elements.
pub const LIST_DELIMITER: &str = ",";

/// A configuration value before coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// Integer scalar.
    Int(i64),
    /// Float scalar.
    Float(f64),
    /// Boolean scalar.
    Bool(bool),
    /// Text, passed through as-is (also for list parameters).
    Str(String),
    /// Repeated value, already in string form per element.
    List(Vec<String>),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Int(v) => write!(f, "{v}"),
            ConfigValue::Float(v) => write!(f, "{v}"),
            ConfigValue::Bool(v) => write!(f, "{v}"),
            ConfigValue::Str(v) => f.write_str(v),
            ConfigValue::List(items) => f.write_str(&items.join(LIST_DELIMITER)),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for ConfigValue {
            fn from(v: $t) -> Self {
                ConfigValue::Int(i64::from(v))
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<usize> for ConfigValue {
    fn from(v: usize) -> Self {
        // usize values above i64::MAX are kept exact as text.
        i64::try_from(v).map_or_else(|_| ConfigValue::Str(v.to_string()), ConfigValue::Int)
    }
}

impl From<u64> for ConfigValue {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or_else(|_| ConfigValue::Str(v.to_string()), ConfigValue::Int)
    }
}

impl From<f32> for ConfigValue {
    fn from(v: f32) -> Self {
        // Widen through the f32's shortest decimal form so 0.1f32 prints as "0.1".
        ConfigValue::Float(v.to_string().parse().unwrap_or(f64::from(v)))
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Float(v)
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::Str(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::Str(v)
    }
}

impl<T: fmt::Display> From<Vec<T>> for ConfigValue {
    fn from(items: Vec<T>) -> Self {
        ConfigValue::List(items.iter().map(ToString::to_string).collect())
    }
}

impl<T: fmt::Display> From<&[T]> for ConfigValue {
    fn from(items: &[T]) -> Self {
        ConfigValue::List(items.iter().map(ToString::to_string).collect())
    }
}

impl TryFrom<&Value> for ConfigValue {
    type Error = BitBoostError;

    /// Converts a JSON scalar or flat array.
    ///
    /// Objects, nulls and nested arrays have no string form the engine accepts.
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(b) => Ok(ConfigValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(ConfigValue::Int(i)),
                None => match n.as_f64() {
                    Some(f) if n.is_f64() => Ok(ConfigValue::Float(f)),
                    _ => Ok(ConfigValue::Str(n.to_string())),
                },
            },
            Value::String(s) => Ok(ConfigValue::Str(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    Value::Number(n) => Ok(n.to_string()),
                    Value::Bool(b) => Ok(b.to_string()),
                    other => Err(BitBoostError::InvalidConfig(format!(
                        "unsupported list element {other}"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(ConfigValue::List),
            other => Err(BitBoostError::InvalidConfig(format!(
                "unsupported value {other}"
            ))),
        }
    }
}

/// Converts `value` into the string sent to the engine for `param`.
///
/// - List parameters: a [`ConfigValue::Str`] passes through unchanged, a
///   [`ConfigValue::List`] is joined with `,`, a scalar becomes a one-element
///   list.
/// - Scalar parameters: the value's string form.
///
/// The engine alone decides whether the resulting string is valid.
///
/// # Errors
///
/// Returns [`BitBoostError::InvalidConfig`] if a list is given for a scalar
/// parameter, or if the string contains a NUL byte (it could not cross the
/// boundary as a C string).
///
/// # Examples
///
/// ```
/// use bitboost_host::{coerce, ConfigParam, ConfigValue, ParamType};
///
/// let param = ConfigParam {
///     name: "categorical_features".into(),
///     default: String::new(),
///     type_tag: "Vec<usize>".into(),
///     param_type: ParamType::List,
///     description: String::new(),
/// };
/// assert_eq!(coerce(&param, &vec![1, 2, 3].into()).unwrap(), "1,2,3");
/// assert_eq!(coerce(&param, &"a,b".into()).unwrap(), "a,b");
/// ```
pub fn coerce(param: &ConfigParam, value: &ConfigValue) -> Result<String, BitBoostError> {
    let text = match (param.param_type, value) {
        (ParamType::List, _) => value.to_string(),
        (_, ConfigValue::List(_)) => {
            return Err(BitBoostError::InvalidConfig(format!(
                "parameter '{}' of type {} takes a single value, got a list",
                param.name, param.type_tag
            )));
        }
        (_, scalar) => scalar.to_string(),
    };

    if text.contains('\0') {
        return Err(BitBoostError::InvalidConfig(format!(
            "value for parameter '{}' contains a NUL byte",
            param.name
        )));
    }
    Ok(text)
}

/// A validated, coerced set of parameter assignments.
///
/// Built with [`BoosterConfig::builder`]; applied to a booster with
/// [`Booster::apply_config`](crate::Booster::apply_config). Assignments keep
/// the order in which they were first set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoosterConfig {
    assignments: Vec<(String, String)>,
    defaults: Vec<(String, String)>,
}

impl BoosterConfig {
    /// Create a new builder validating against `schema`.
    #[must_use]
    pub fn builder(schema: &ConfigSchema) -> BoosterConfigBuilder<'_> {
        BoosterConfigBuilder {
            schema,
            pending: Vec::new(),
        }
    }

    /// Builds a configuration from a JSON object of `name: value` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`BitBoostError::InvalidConfig`] if `json` is not an object or
    /// holds an unsupported value, and the errors of
    /// [`BoosterConfigBuilder::build`].
    pub fn from_json(schema: &ConfigSchema, json: &Value) -> Result<Self, BitBoostError> {
        let object = json.as_object().ok_or_else(|| {
            BitBoostError::InvalidConfig("configuration must be a JSON object".to_string())
        })?;

        let mut builder = Self::builder(schema);
        for (name, value) in object {
            builder = builder.set(name.as_str(), ConfigValue::try_from(value)?);
        }
        builder.build()
    }

    /// Explicitly set `(name, value)` pairs, in order.
    pub fn assignments(&self) -> impl Iterator<Item = (&str, &str)> {
        self.assignments
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of explicit assignments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Returns `true` if nothing was set explicitly.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Effective value of `name`: the explicit assignment, else the schema
    /// default. `None` for names outside the schema.
    #[must_use]
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.assignments
            .iter()
            .chain(self.defaults.iter())
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Builder for [`BoosterConfig`].
///
/// Setters only record values; every name and value is checked against the
/// schema in [`build()`](Self::build).
#[derive(Debug, Clone)]
pub struct BoosterConfigBuilder<'a> {
    schema: &'a ConfigSchema,
    pending: Vec<(String, ConfigValue)>,
}

impl BoosterConfigBuilder<'_> {
    /// Sets a parameter. A later call for the same name replaces the value.
    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.pending.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.pending.push((name, value)),
        }
        self
    }

    /// Validates and coerces all assignments.
    ///
    /// # Errors
    ///
    /// Returns [`BitBoostError::UnknownParameter`] for names outside the
    /// schema and [`BitBoostError::InvalidConfig`] for values that fail
    /// [`coerce`].
    pub fn build(self) -> Result<BoosterConfig, BitBoostError> {
        let assignments = self
            .pending
            .iter()
            .map(|(name, value)| {
                let param = self.schema.param(name)?;
                Ok((name.clone(), coerce(param, value)?))
            })
            .collect::<Result<Vec<_>, BitBoostError>>()?;

        let defaults = self
            .schema
            .iter()
            .map(|p| (p.name.clone(), p.default.clone()))
            .collect();

        Ok(BoosterConfig {
            assignments,
            defaults,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> ConfigSchema {
        ConfigSchema::parse(
            "name,default,type,description\n\
             max_depth,6,usize,Maximum depth.\n\
             learning_rate,0.1,NumT,Shrinkage.\n\
             compression,true,bool,Use bitslice compression.\n\
             objective,L2,String,Objective.\n\
             categorical_features,,Vec<usize>,Categorical columns.\n\
             csv_has_header,true,bool,Input has a header (cli only).\n",
        )
        .unwrap()
    }

    #[test]
    fn test_coerce_list_from_numbers() {
        let schema = schema();
        let param = schema.get("categorical_features").unwrap();
        assert_eq!(coerce(param, &vec![1, 2, 3].into()).unwrap(), "1,2,3");
    }

    #[test]
    fn test_coerce_list_string_unchanged() {
        let schema = schema();
        let param = schema.get("categorical_features").unwrap();
        assert_eq!(coerce(param, &"a,b".into()).unwrap(), "a,b");
    }

    #[test]
    fn test_coerce_list_from_scalar() {
        let schema = schema();
        let param = schema.get("categorical_features").unwrap();
        assert_eq!(coerce(param, &4.into()).unwrap(), "4");
        assert_eq!(coerce(param, &Vec::<u32>::new().into()).unwrap(), "");
    }

    #[test]
    fn test_coerce_scalars() {
        let schema = schema();
        assert_eq!(
            coerce(schema.get("max_depth").unwrap(), &3.into()).unwrap(),
            "3"
        );
        assert_eq!(
            coerce(schema.get("learning_rate").unwrap(), &0.25.into()).unwrap(),
            "0.25"
        );
        assert_eq!(
            coerce(schema.get("compression").unwrap(), &false.into()).unwrap(),
            "false"
        );
        assert_eq!(
            coerce(schema.get("objective").unwrap(), &"Binary".into()).unwrap(),
            "Binary"
        );
    }

    #[test]
    fn test_coerce_rejects_list_for_scalar() {
        let schema = schema();
        let err = coerce(schema.get("max_depth").unwrap(), &vec![1, 2].into()).unwrap_err();
        assert!(matches!(err, BitBoostError::InvalidConfig(_)));
    }

    #[test]
    fn test_coerce_rejects_nul() {
        let schema = schema();
        let err = coerce(schema.get("objective").unwrap(), &"L2\0".into()).unwrap_err();
        assert!(err.to_string().contains("NUL"));
    }

    #[test]
    fn test_builder_validates_names() {
        let schema = schema();
        let err = BoosterConfig::builder(&schema)
            .set("max_depth", 3)
            .set("nonexistent", 1)
            .build()
            .unwrap_err();
        assert!(matches!(err, BitBoostError::UnknownParameter(ref n) if n == "nonexistent"));

        let err = BoosterConfig::builder(&schema)
            .set("csv_has_header", false)
            .build()
            .unwrap_err();
        assert!(matches!(err, BitBoostError::UnknownParameter(ref n) if n == "csv_has_header"));
    }

    #[test]
    fn test_coerce_f32_keeps_short_form() {
        let schema = schema();
        let param = schema.get("learning_rate").unwrap();
        assert_eq!(coerce(param, &0.1f32.into()).unwrap(), "0.1");
        assert_eq!(coerce(param, &ConfigValue::from(1.5f32)).unwrap(), "1.5");
    }

    #[test]
    fn test_builder_keeps_order_and_replaces() {
        let schema = schema();
        let config = BoosterConfig::builder(&schema)
            .set("objective", "Binary")
            .set("max_depth", 3)
            .set("objective", "L1")
            .build()
            .unwrap();

        let pairs: Vec<_> = config.assignments().collect();
        assert_eq!(pairs, vec![("objective", "L1"), ("max_depth", "3")]);
        assert_eq!(config.len(), 2);
    }

    #[test]
    fn test_value_of_falls_back_to_default() {
        let schema = schema();
        let config = BoosterConfig::builder(&schema)
            .set("max_depth", 3)
            .build()
            .unwrap();

        assert_eq!(config.value_of("max_depth"), Some("3"));
        assert_eq!(config.value_of("learning_rate"), Some("0.1"));
        assert_eq!(config.value_of("nonexistent"), None);
    }

    #[test]
    fn test_from_json() {
        let schema = schema();
        let config = BoosterConfig::from_json(
            &schema,
            &json!({
                "max_depth": 4,
                "learning_rate": 0.5,
                "compression": false,
                "categorical_features": [0, 3],
            }),
        )
        .unwrap();

        assert_eq!(config.value_of("max_depth"), Some("4"));
        assert_eq!(config.value_of("learning_rate"), Some("0.5"));
        assert_eq!(config.value_of("compression"), Some("false"));
        assert_eq!(config.value_of("categorical_features"), Some("0,3"));
    }

    #[test]
    fn test_from_json_rejects_non_object_and_nested() {
        let schema = schema();
        assert!(BoosterConfig::from_json(&schema, &json!([1, 2])).is_err());
        assert!(
            BoosterConfig::from_json(&schema, &json!({"categorical_features": [[1]]})).is_err()
        );
        assert!(BoosterConfig::from_json(&schema, &json!({"objective": null})).is_err());
    }

    #[test]
    fn test_config_value_conversions() {
        assert_eq!(ConfigValue::from(3u32), ConfigValue::Int(3));
        assert_eq!(ConfigValue::from(7usize), ConfigValue::Int(7));
        assert_eq!(
            ConfigValue::from(u64::MAX),
            ConfigValue::Str(u64::MAX.to_string())
        );
        assert_eq!(
            ConfigValue::from(&["a", "b"][..]),
            ConfigValue::List(vec!["a".into(), "b".into()])
        );
        assert_eq!(
            ConfigValue::try_from(&json!(1.5)).unwrap(),
            ConfigValue::Float(1.5)
        );
    }
}
