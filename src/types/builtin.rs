use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Number, Value};

use super::{Args, Coercer};
use crate::param::Nested;

pub struct StringType;
pub struct IntegerType;
pub struct FloatType;
pub struct BooleanType;
pub struct JsonType;
pub struct DateType;
pub struct DateTimeType;
pub struct ListType;
pub struct MapType;

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Coercer for StringType {
    fn name(&self) -> &str {
        "String"
    }

    fn coerce(&self, value: Value, _: &Args) -> Result<Value, String> {
        match value {
            Value::String(_) => Ok(value),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(format!("expected a string, got {}", kind(&other))),
        }
    }
}

impl Coercer for IntegerType {
    fn name(&self) -> &str {
        "Integer"
    }

    fn coerce(&self, value: Value, _: &Args) -> Result<Value, String> {
        match &value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value),
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                    Ok(Value::from(f as i64))
                }
                _ => Err(format!("{n} is not an integer")),
            },
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("{s:?} is not an integer")),
            other => Err(format!("expected an integer, got {}", kind(other))),
        }
    }
}

impl Coercer for FloatType {
    fn name(&self) -> &str {
        "Float"
    }

    fn coerce(&self, value: Value, _: &Args) -> Result<Value, String> {
        let f = match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            other => return Err(format!("expected a number, got {}", kind(other))),
        };
        f.and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("{value} is not a finite number"))
    }
}

impl Coercer for BooleanType {
    fn name(&self) -> &str {
        "Boolean"
    }

    fn coerce(&self, value: Value, _: &Args) -> Result<Value, String> {
        match &value {
            Value::Bool(_) => Ok(value),
            Value::String(s) => match s.trim() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(format!("{s:?} is not a boolean")),
            },
            Value::Number(n) => match n.as_i64() {
                Some(1) => Ok(Value::Bool(true)),
                Some(0) => Ok(Value::Bool(false)),
                _ => Err(format!("{n} is not a boolean")),
            },
            other => Err(format!("expected a boolean, got {}", kind(other))),
        }
    }
}

/// Accepts anything as-is.
impl Coercer for JsonType {
    fn name(&self) -> &str {
        "Json"
    }

    fn coerce(&self, value: Value, _: &Args) -> Result<Value, String> {
        Ok(value)
    }
}

impl Coercer for DateType {
    fn name(&self) -> &str {
        "Date"
    }

    fn coerce(&self, value: Value, _: &Args) -> Result<Value, String> {
        let Value::String(s) = &value else {
            return Err(format!("expected a date string, got {}", kind(&value)));
        };
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(|d| Value::String(d.to_string()))
            .map_err(|e| format!("{s:?} is not an ISO-8601 date: {e}"))
    }
}

const DATETIME_FORMATS: &[&str] = &["iso8601", "unix"];

impl Coercer for DateTimeType {
    fn name(&self) -> &str {
        "DateTime"
    }

    fn extra_options(&self) -> &[&'static str] {
        &["format"]
    }

    fn check_args(&self, args: &Args) -> Result<(), String> {
        match args.get("format") {
            None => Ok(()),
            Some(Value::String(f)) if DATETIME_FORMATS.contains(&f.as_str()) => Ok(()),
            Some(other) => Err(format!(
                "DateTime format must be one of {DATETIME_FORMATS:?}, got {other}"
            )),
        }
    }

    fn coerce(&self, value: Value, args: &Args) -> Result<Value, String> {
        let unix = matches!(args.get("format"), Some(Value::String(f)) if f == "unix");
        let parsed: DateTime<Utc> = if unix {
            let secs = match &value {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            }
            .ok_or_else(|| format!("{value} is not a unix timestamp"))?;
            DateTime::from_timestamp(secs, 0).ok_or_else(|| format!("{secs} is out of range"))?
        } else {
            let Value::String(s) = &value else {
                return Err(format!("expected a datetime string, got {}", kind(&value)));
            };
            DateTime::parse_from_rfc3339(s.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| format!("{s:?} is not an ISO-8601 datetime: {e}"))?
        };
        Ok(Value::String(parsed.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
    }
}

impl Coercer for ListType {
    fn name(&self) -> &str {
        "List"
    }

    fn nested(&self) -> Nested {
        Nested::List
    }

    fn coerce(&self, value: Value, _: &Args) -> Result<Value, String> {
        match value {
            Value::Array(_) => Ok(value),
            other => Err(format!("expected an array, got {}", kind(&other))),
        }
    }
}

impl Coercer for MapType {
    fn name(&self) -> &str {
        "Map"
    }

    fn nested(&self) -> Nested {
        Nested::Map
    }

    fn coerce(&self, value: Value, _: &Args) -> Result<Value, String> {
        match value {
            Value::Object(_) => Ok(value),
            other => Err(format!("expected an object, got {}", kind(&other))),
        }
    }
}
