//! Compiled artifacts: the descriptive `Information` half and the executable
//! `Runtime` half of every declared field and cross-field rule.
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ParamError;

// ————————————————————————————————————————————————————————————————————————————
// CLOSURES
// ————————————————————————————————————————————————————————————————————————————

/// A JSON object record: an incoming payload, or the result of parsing one.
pub type Record = Map<String, Value>;

/// Applied to the whole record when this field's key is absent.
pub type NilFn = Arc<dyn Fn(Record) -> Result<Record, ParamError> + Send + Sync>;

/// Composed coercion chain for one value.
pub type ParserFn = Arc<dyn Fn(Value) -> Result<Value, ParamError> + Send + Sync>;

/// One prepared field validator, called with the attribute name and value.
pub type FieldCheck = Arc<dyn Fn(&str, &Value) -> Result<(), String> + Send + Sync>;

/// Composed field-level validation chain for one coerced value.
pub type ValidateFn = Arc<dyn Fn(&Value) -> Result<(), ParamError> + Send + Sync>;

/// Cross-field check over a fully assembled sibling result record.
pub type RuleFn = Arc<dyn Fn(&Record) -> Result<(), ParamError> + Send + Sync>;

// ————————————————————————————————————————————————————————————————————————————
// PARAMETERS
// ————————————————————————————————————————————————————————————————————————————

/// How a field's children are applied to its coerced value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Nested {
    #[default]
    None,
    /// Children run once per element of an array.
    List,
    /// Children run once against an object.
    Map,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Information {
    pub attr_name: String,
    pub param_key: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Information>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<ValidatorInformation>,
}

#[derive(Clone)]
pub struct Runtime {
    pub attr_name: String,
    pub param_key: String,
    pub nil_func: NilFn,
    pub parser_func: ParserFn,
    pub validate_func: ValidateFn,
    pub nested: Nested,
    pub children: Vec<Runtime>,
    pub rules: Vec<ValidatorRuntime>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("attr_name", &self.attr_name)
            .field("param_key", &self.param_key)
            .field("nested", &self.nested)
            .field("children", &self.children)
            .field("rules", &self.rules.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub information: Information,
    pub runtime: Runtime,
}

impl Parameter {
    pub fn attr_name(&self) -> &str {
        &self.information.attr_name
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CROSS-FIELD VALIDATORS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatorInformation {
    pub action: String,
    pub attr_names: Vec<String>,
}

#[derive(Clone)]
pub struct ValidatorRuntime {
    pub validate_func: RuleFn,
}

impl fmt::Debug for ValidatorRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValidatorRuntime")
    }
}

#[derive(Debug, Clone)]
pub struct Validator {
    pub information: ValidatorInformation,
    pub runtime: ValidatorRuntime,
}

/// One slot in a scope: a named field or a cross-field rule.
#[derive(Debug, Clone)]
pub enum Entry {
    Parameter(Parameter),
    Validator(Validator),
}

impl Entry {
    pub fn as_parameter(&self) -> Option<&Parameter> {
        match self {
            Entry::Parameter(p) => Some(p),
            Entry::Validator(_) => None,
        }
    }
}

/// Split a scope's entries into named fields and cross-field rules,
/// keeping the relative order of each.
pub fn partition_entries(entries: Vec<Entry>) -> (Vec<Parameter>, Vec<Validator>) {
    let mut params = Vec::new();
    let mut rules = Vec::new();
    for entry in entries {
        match entry {
            Entry::Parameter(p) => params.push(p),
            Entry::Validator(v) => rules.push(v),
        }
    }
    (params, rules)
}
