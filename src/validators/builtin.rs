use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use super::{CrossFieldValidator, FieldValidator};
use crate::param::{FieldCheck, Record};

// ------------------------------- Field ------------------------------------ //

/// String must match a pattern.
pub struct Regexp;

/// Value must be one of a list, or fall inside `{"min", "max"}`.
pub struct Values;

/// String chars, array items or object entries within `{"min", "max"}`.
pub struct Length;

/// `false` rejects blank strings and empty containers.
pub struct AllowBlank;

type Bounds = (Option<f64>, Option<f64>);

fn bounds(options: &Value) -> Result<Bounds, String> {
    let Value::Object(map) = options else {
        return Err(format!("expected {{\"min\", \"max\"}}, got {options}"));
    };
    if let Some(key) = map.keys().find(|k| *k != "min" && *k != "max") {
        return Err(format!("unexpected key `{key}`"));
    }
    let read = |key: &str| match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or_else(|| format!("`{key}` must be a number")),
    };
    Ok((read("min")?, read("max")?))
}

fn within(n: f64, (min, max): Bounds) -> bool {
    min.is_none_or(|m| n >= m) && max.is_none_or(|m| n <= m)
}

impl FieldValidator for Regexp {
    fn compile(&self, options: &Value) -> Result<FieldCheck, String> {
        let pattern = options.as_str().ok_or("regexp expects a string pattern")?;
        let rx = Regex::new(pattern).map_err(|e| e.to_string())?;
        Ok(Arc::new(move |_, value| match value {
            Value::String(s) if rx.is_match(s) => Ok(()),
            Value::String(s) => Err(format!("{s:?} does not match {}", rx.as_str())),
            other => Err(format!("{other} is not a string")),
        }))
    }
}

impl FieldValidator for Values {
    fn compile(&self, options: &Value) -> Result<FieldCheck, String> {
        if let Value::Array(allowed) = options {
            let listed = options.clone();
            let allowed = allowed.clone();
            return Ok(Arc::new(move |_, value| {
                if allowed.contains(value) {
                    Ok(())
                } else {
                    Err(format!("{value} is not one of {listed}"))
                }
            }));
        }
        let range = bounds(options)?;
        let shown = options.clone();
        Ok(Arc::new(move |_, value| {
            let n = value.as_f64().ok_or_else(|| format!("{value} is not a number"))?;
            if within(n, range) {
                Ok(())
            } else {
                Err(format!("{value} is outside {shown}"))
            }
        }))
    }
}

impl FieldValidator for Length {
    fn compile(&self, options: &Value) -> Result<FieldCheck, String> {
        let range = bounds(options)?;
        let shown = options.clone();
        Ok(Arc::new(move |_, value| {
            let len = match value {
                Value::String(s) => s.chars().count(),
                Value::Array(xs) => xs.len(),
                Value::Object(m) => m.len(),
                other => return Err(format!("{other} has no length")),
            };
            if within(len as f64, range) {
                Ok(())
            } else {
                Err(format!("length {len} is outside {shown}"))
            }
        }))
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(xs) => xs.is_empty(),
        Value::Object(m) => m.is_empty(),
        _ => false,
    }
}

impl FieldValidator for AllowBlank {
    fn compile(&self, options: &Value) -> Result<FieldCheck, String> {
        let allow = options.as_bool().ok_or("allow_blank expects a boolean")?;
        Ok(Arc::new(move |_, value| {
            if !allow && is_blank(value) {
                Err("must not be blank".to_string())
            } else {
                Ok(())
            }
        }))
    }
}

// ----------------------------- Cross-field -------------------------------- //

pub struct MutuallyExclusive;
pub struct ExactlyOneOf;
pub struct AtLeastOneOf;
pub struct AllOrNoneOf;

fn present(attr_names: &[String], result: &Record) -> usize {
    attr_names.iter().filter(|name| result.contains_key(name.as_str())).count()
}

impl CrossFieldValidator for MutuallyExclusive {
    fn validate(&self, attr_names: &[String], result: &Record) -> Result<(), String> {
        match present(attr_names, result) {
            0 | 1 => Ok(()),
            n => Err(format!("at most one may be given, got {n}")),
        }
    }
}

impl CrossFieldValidator for ExactlyOneOf {
    fn validate(&self, attr_names: &[String], result: &Record) -> Result<(), String> {
        match present(attr_names, result) {
            1 => Ok(()),
            n => Err(format!("exactly one must be given, got {n}")),
        }
    }
}

impl CrossFieldValidator for AtLeastOneOf {
    fn validate(&self, attr_names: &[String], result: &Record) -> Result<(), String> {
        match present(attr_names, result) {
            0 => Err("at least one must be given".to_string()),
            _ => Ok(()),
        }
    }
}

impl CrossFieldValidator for AllOrNoneOf {
    fn validate(&self, attr_names: &[String], result: &Record) -> Result<(), String> {
        let n = present(attr_names, result);
        if n == 0 || n == attr_names.len() {
            Ok(())
        } else {
            Err(format!("all or none must be given, got {n} of {}", attr_names.len()))
        }
    }
}
