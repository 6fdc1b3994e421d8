//! Validator compiler.
//!
//! Field validators check one coerced value; cross-field validators check the
//! assembled result of a whole scope. Both are resolved by name through the
//! [`Registry`] while the schema is built and compiled into single closures.
pub mod builtin;

use std::sync::Arc;

use serde_json::Value;

use crate::error::{ParamError, SchemaError};
use crate::param::{
    FieldCheck, Record, RuleFn, ValidateFn, Validator, ValidatorInformation, ValidatorRuntime,
};
use crate::registry::Registry;

pub const MUTUALLY_EXCLUSIVE: &str = "mutually_exclusive";
pub const EXACTLY_ONE_OF: &str = "exactly_one_of";
pub const AT_LEAST_ONE_OF: &str = "at_least_one_of";
pub const ALL_OR_NONE_OF: &str = "all_or_none_of";

/// Named per-field check.
///
/// `compile` runs once while the schema is built: it rejects bad options and
/// returns the check applied to every coerced value at request time.
pub trait FieldValidator: Send + Sync {
    fn compile(&self, options: &Value) -> Result<FieldCheck, String>;
}

pub trait CrossFieldValidator: Send + Sync {
    fn validate(&self, attr_names: &[String], result: &Record) -> Result<(), String>;
}

/// Fields a cross-field validator checks.
#[derive(Debug, Clone, PartialEq)]
pub enum Targets {
    Named(Vec<String>),
    /// Every field declared so far in the current scope.
    AboveAll,
}

impl<S: Into<String>> FromIterator<S> for Targets {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Targets::Named(iter.into_iter().map(Into::into).collect())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// FIELD VALIDATORS
// ————————————————————————————————————————————————————————————————————————————

/// Resolve `(name, options)` pairs and compose them into one fail-fast check.
pub fn compile_field_validators(
    attr_name: &str,
    declared: Vec<(String, Value)>,
    registry: &Registry,
) -> Result<ValidateFn, SchemaError> {
    let mut chain = Vec::with_capacity(declared.len());
    for (name, options) in declared {
        let validator = registry.field_validator(&name).ok_or_else(|| SchemaError::UnknownValidator {
            attr_name: attr_name.to_string(),
            name: name.clone(),
        })?;
        let check = validator
            .compile(&options)
            .map_err(|reason| SchemaError::invalid_option(attr_name, &name, reason))?;
        chain.push((name, check));
    }

    let attr_name = attr_name.to_string();
    Ok(Arc::new(move |value| {
        for (name, check) in &chain {
            check(&attr_name, value).map_err(|reason| ParamError::Validation {
                attr_names: vec![attr_name.clone()],
                rule: name.clone(),
                reason,
            })?;
        }
        Ok(())
    }))
}

// ————————————————————————————————————————————————————————————————————————————
// CROSS-FIELD VALIDATORS
// ————————————————————————————————————————————————————————————————————————————

pub fn compile_cross_field(
    action: &str,
    attr_names: Vec<String>,
    registry: &Registry,
) -> Result<Validator, SchemaError> {
    let validator = registry
        .cross_field_validator(action)
        .ok_or_else(|| SchemaError::UnknownAction(action.to_string()))?;

    let names = attr_names.clone();
    let rule = action.to_string();
    let validate_func: RuleFn = Arc::new(move |result| {
        validator.validate(&names, result).map_err(|reason| ParamError::Validation {
            attr_names: names.clone(),
            rule: rule.clone(),
            reason,
        })
    });

    Ok(Validator {
        information: ValidatorInformation { action: action.to_string(), attr_names },
        runtime: ValidatorRuntime { validate_func },
    })
}
