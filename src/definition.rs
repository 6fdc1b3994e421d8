//! Schema definitions as JSON documents.
//!
//! ```json
//! {"params": [
//!   {"requires": "name", "desc": "display name"},
//!   {"optional": "age", "type": "Integer", "default": 0, "values": {"min": 0}},
//!   {"group": "items", "params": [{"requires": "sku"}]},
//!   {"optional": "email"}, {"optional": "phone"},
//!   {"mutually_exclusive": ["email", "phone"]},
//!   {"at_least_one_of": "above_all"}
//! ]}
//! ```
//!
//! Every statement has exactly one verb key: `requires`, `optional`, `group`,
//! or a registered cross-field action. Field statements accept `type` (a name,
//! or an array of names for a chain), `params` for a nested block, and any
//! other key as an option.
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::builder::{Options, SchemaBuilder};
use crate::error::SchemaError;
use crate::exec::Schema;
use crate::registry::Registry;
use crate::types::TypeSpec;
use crate::validators::Targets;

const FIELD_VERBS: [&str; 3] = ["requires", "optional", "group"];
const NESTED: &str = "params";
const TYPE: &str = "type";
const ABOVE_ALL: &str = "above_all";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DefinitionFile {
    params: Vec<Map<String, Value>>,
}

pub fn schema_from_str(src: &str, registry: Registry) -> Result<Schema, SchemaError> {
    let file: DefinitionFile = crate::path_de::from_str_with_path(src)?;
    compile(&file, registry)
}

pub fn schema_from_slice(bytes: &[u8], registry: Registry) -> Result<Schema, SchemaError> {
    let file: DefinitionFile = crate::path_de::from_slice_with_path(bytes)?;
    compile(&file, registry)
}

fn compile(file: &DefinitionFile, registry: Registry) -> Result<Schema, SchemaError> {
    let mut builder = SchemaBuilder::with_registry(registry);
    apply_statements(&mut builder, &file.params, NESTED);
    builder.build()
}

fn invalid(path: &str, reason: impl Into<String>) -> SchemaError {
    SchemaError::InvalidDefinition { path: path.to_string(), reason: reason.into() }
}

fn apply_statements(b: &mut SchemaBuilder, statements: &[Map<String, Value>], path: &str) {
    for (i, statement) in statements.iter().enumerate() {
        let here = format!("{path}[{i}]");
        if let Err(err) = apply_statement(b, statement, &here) {
            b.fail(err);
            return;
        }
    }
}

fn apply_statement(
    b: &mut SchemaBuilder,
    statement: &Map<String, Value>,
    path: &str,
) -> Result<(), SchemaError> {
    let verbs: Vec<&String> = statement
        .keys()
        .filter(|k| FIELD_VERBS.contains(&k.as_str()) || b.registry().is_cross_field_action(k))
        .collect();
    let verb = match verbs.as_slice() {
        [verb] => verb.as_str(),
        [] => return Err(invalid(path, "statement has no verb")),
        _ => return Err(invalid(path, format!("statement has several verbs: {verbs:?}"))),
    };

    if FIELD_VERBS.contains(&verb) {
        apply_field(b, verb, statement, path)
    } else {
        apply_cross_field(b, verb, statement, path)
    }
}

fn apply_field(
    b: &mut SchemaBuilder,
    verb: &str,
    statement: &Map<String, Value>,
    path: &str,
) -> Result<(), SchemaError> {
    let name = statement[verb]
        .as_str()
        .ok_or_else(|| invalid(&format!("{path}.{verb}"), "expected an attribute name"))?;

    let mut options = Options::new();
    let mut block: Option<Vec<Map<String, Value>>> = None;
    for (key, value) in statement {
        match key.as_str() {
            k if k == verb => {}
            TYPE => options = options.ty(parse_type(value, &format!("{path}.{TYPE}"))?),
            NESTED => block = Some(parse_block(value, &format!("{path}.{NESTED}"))?),
            _ => options = options.set(key.clone(), value.clone()),
        }
    }

    match (verb, block) {
        ("group", None) => Err(invalid(path, "group needs nested params")),
        ("group", Some(children)) => {
            let child_path = format!("{path}.{NESTED}");
            b.group(name, options, |b| apply_statements(b, &children, &child_path));
            Ok(())
        }
        (verb, Some(children)) => {
            let child_path = format!("{path}.{NESTED}");
            let body = |b: &mut SchemaBuilder| apply_statements(b, &children, &child_path);
            if verb == "requires" {
                b.requires_block(name, options, body);
            } else {
                b.optional_block(name, options, body);
            }
            Ok(())
        }
        ("requires", None) => {
            b.requires_with(name, options);
            Ok(())
        }
        (_, None) => {
            b.optional_with(name, options);
            Ok(())
        }
    }
}

fn apply_cross_field(
    b: &mut SchemaBuilder,
    action: &str,
    statement: &Map<String, Value>,
    path: &str,
) -> Result<(), SchemaError> {
    if let Some(extra) = statement.keys().find(|k| k.as_str() != action) {
        return Err(invalid(path, format!("unexpected key `{extra}` on {action}")));
    }
    let targets = match &statement[action] {
        Value::String(s) if s == ABOVE_ALL => Targets::AboveAll,
        Value::Array(names) => names
            .iter()
            .map(|n| n.as_str().map(str::to_string))
            .collect::<Option<Vec<String>>>()
            .map(Targets::Named)
            .ok_or_else(|| invalid(&format!("{path}.{action}"), "names must be strings"))?,
        _ => {
            return Err(invalid(
                &format!("{path}.{action}"),
                format!("expected an array of names or \"{ABOVE_ALL}\""),
            ));
        }
    };
    b.cross_field(action, targets);
    Ok(())
}

fn parse_type(value: &Value, path: &str) -> Result<TypeSpec, SchemaError> {
    match value {
        Value::String(name) => Ok(TypeSpec::named(name.clone())),
        Value::Array(chain) if !chain.is_empty() => chain
            .iter()
            .map(|v| v.as_str().map(TypeSpec::from))
            .collect::<Option<Vec<_>>>()
            .map(TypeSpec::Chain)
            .ok_or_else(|| invalid(path, "type chain entries must be names")),
        _ => Err(invalid(path, "expected a type name or a non-empty array of names")),
    }
}

fn parse_block(value: &Value, path: &str) -> Result<Vec<Map<String, Value>>, SchemaError> {
    let Value::Array(items) = value else {
        return Err(invalid(path, "expected an array of statements"));
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_object()
                .cloned()
                .ok_or_else(|| invalid(&format!("{path}[{i}]"), "expected a statement object"))
        })
        .collect()
}
