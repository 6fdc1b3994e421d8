//! Stage pipeline: one flat declaration in, one [`Parameter`] out.
//!
//! Stages run in a fixed order over a shared accumulator. Each consumes the
//! option keys it owns; whatever is left when the last stage runs is read as
//! field validators. The order matters: `nil_func` must see `default` and
//! `required` before they are removed, and `type` must strip its arguments
//! before `validators` claims the remainder.
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{ParamError, SchemaError};
use crate::param::{
    Information, NilFn, Nested, Parameter, ParserFn, Record, Runtime, ValidateFn, Validator,
    ValidatorInformation, ValidatorRuntime,
};
use crate::registry::Registry;
use crate::types::{self, TypeSpec};
use crate::validators;

pub const ATTR_NAME: &str = "attr_name";
pub const SOURCE: &str = "source";
pub const REQUIRED: &str = "required";
pub const DEFAULT: &str = "default";
pub const DESC: &str = "desc";

/// Everything the builder knows about one field before compilation.
#[derive(Debug, Clone, Default)]
pub struct Declaration {
    /// Flat option map: `attr_name`, `required`, `source`, `default`,
    /// `desc`, type arguments and validator options, in declared order.
    pub options: IndexMap<String, Value>,
    pub ty: Option<TypeSpec>,
    pub children: Option<Vec<Parameter>>,
    /// Cross-field rules collected from the field's nested block.
    pub rules: Vec<Validator>,
}

impl Declaration {
    pub fn new(attr_name: impl Into<String>, required: bool) -> Self {
        let mut options = IndexMap::new();
        options.insert(ATTR_NAME.to_string(), Value::String(attr_name.into()));
        options.insert(REQUIRED.to_string(), Value::Bool(required));
        Self { options, ..Self::default() }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ACCUMULATOR
// ————————————————————————————————————————————————————————————————————————————

#[derive(Default)]
struct InformationDraft {
    attr_name: String,
    param_key: String,
    ty: String,
    required: bool,
    default: Option<Value>,
    desc: Option<String>,
    children: Vec<Information>,
    rules: Vec<ValidatorInformation>,
}

#[derive(Default)]
struct RuntimeDraft {
    attr_name: String,
    param_key: String,
    nil_func: Option<NilFn>,
    parser_func: Option<ParserFn>,
    validate_func: Option<ValidateFn>,
    nested: Nested,
    children: Vec<Runtime>,
    rules: Vec<ValidatorRuntime>,
}

struct Accumulator<'r> {
    /// Name used in compile errors; stamped into the drafts by `attr_name`.
    name: String,
    options: Declaration,
    information: InformationDraft,
    runtime: RuntimeDraft,
    registry: &'r Registry,
}

type Stage = fn(&mut Accumulator<'_>) -> Result<(), SchemaError>;

const STAGES: [(&str, Stage); 8] = [
    ("nil_func", nil_func),
    ("attr_name", attr_name),
    ("required", required),
    ("children", children),
    ("type", type_chain),
    ("default", default),
    ("desc", desc),
    ("validators", field_validators),
];

/// Run every stage over `declaration`.
pub fn compile(declaration: Declaration, registry: &Registry) -> Result<Parameter, SchemaError> {
    let name = match declaration.options.get(ATTR_NAME) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::String(_)) => {
            return Err(SchemaError::invalid_option("?", ATTR_NAME, "must be a non-empty string"));
        }
        Some(other) => {
            return Err(SchemaError::invalid_option(
                "?",
                ATTR_NAME,
                format!("must be a string, got {other}"),
            ));
        }
        None => return Err(SchemaError::invalid_option("?", ATTR_NAME, "missing")),
    };

    let mut acc = Accumulator {
        name,
        options: declaration,
        information: InformationDraft::default(),
        runtime: RuntimeDraft::default(),
        registry,
    };
    for (stage, run) in STAGES {
        run(&mut acc)?;
        tracing::trace!(attr_name = %acc.name, stage, "stage done");
    }
    acc.finish()
}

impl Accumulator<'_> {
    fn string_option(&self, key: &str) -> Result<Option<String>, SchemaError> {
        match self.options.options.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(SchemaError::invalid_option(
                &self.name,
                key,
                format!("expected a string, got {other}"),
            )),
        }
    }

    fn required_option(&self) -> Result<bool, SchemaError> {
        match self.options.options.get(REQUIRED) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(SchemaError::invalid_option(
                &self.name,
                REQUIRED,
                format!("expected a boolean, got {other}"),
            )),
        }
    }

    fn finish(self) -> Result<Parameter, SchemaError> {
        let Accumulator { name, information: info, runtime: rt, .. } = self;
        let incomplete = |what: &str| SchemaError::invalid_option(&name, what, "stage did not run");

        let runtime = Runtime {
            attr_name: rt.attr_name,
            param_key: rt.param_key,
            nil_func: rt.nil_func.ok_or_else(|| incomplete("nil_func"))?,
            parser_func: rt.parser_func.ok_or_else(|| incomplete("type"))?,
            validate_func: rt.validate_func.ok_or_else(|| incomplete("validators"))?,
            nested: rt.nested,
            children: rt.children,
            rules: rt.rules,
        };
        let information = Information {
            attr_name: info.attr_name,
            param_key: info.param_key,
            ty: info.ty,
            required: info.required,
            default: info.default,
            desc: info.desc,
            children: info.children,
            rules: info.rules,
        };
        tracing::debug!(
            attr_name = %information.attr_name,
            ty = %information.ty,
            required = information.required,
            children = information.children.len(),
            "compiled parameter"
        );
        Ok(Parameter { information, runtime })
    }
}

// ————————————————————————————————————————————————————————————————————————————
// STAGES
// ————————————————————————————————————————————————————————————————————————————

/// Reads `default` and `required` (and peeks at `source`) without removing them.
fn nil_func(acc: &mut Accumulator<'_>) -> Result<(), SchemaError> {
    let param_key = acc.string_option(SOURCE)?.unwrap_or_else(|| acc.name.clone());
    let required = acc.required_option()?;
    let default = acc.options.options.get(DEFAULT).cloned();

    let f: NilFn = match default {
        Some(default) => Arc::new(move |mut record: Record| -> Result<Record, ParamError> {
            record.insert(param_key.clone(), default.clone());
            Ok(record)
        }),
        None if required => {
            let attr_name = acc.name.clone();
            Arc::new(move |_: Record| -> Result<Record, ParamError> {
                Err(ParamError::RequiredFieldMissing { attr_name: attr_name.clone() })
            })
        }
        None => Arc::new(|record: Record| -> Result<Record, ParamError> { Ok(record) }),
    };
    acc.runtime.nil_func = Some(f);
    Ok(())
}

fn attr_name(acc: &mut Accumulator<'_>) -> Result<(), SchemaError> {
    let source = acc.string_option(SOURCE)?;
    acc.options.options.shift_remove(ATTR_NAME);
    acc.options.options.shift_remove(SOURCE);

    let param_key = source.unwrap_or_else(|| acc.name.clone());
    acc.information.attr_name = acc.name.clone();
    acc.information.param_key = param_key.clone();
    acc.runtime.attr_name = acc.name.clone();
    acc.runtime.param_key = param_key;
    Ok(())
}

/// Information only: the runtime already carries required-ness in `nil_func`.
fn required(acc: &mut Accumulator<'_>) -> Result<(), SchemaError> {
    acc.information.required = acc.required_option()?;
    acc.options.options.shift_remove(REQUIRED);
    Ok(())
}

fn children(acc: &mut Accumulator<'_>) -> Result<(), SchemaError> {
    for child in acc.options.children.take().unwrap_or_default() {
        acc.information.children.push(child.information);
        acc.runtime.children.push(child.runtime);
    }
    Ok(())
}

fn type_chain(acc: &mut Accumulator<'_>) -> Result<(), SchemaError> {
    let spec = acc
        .options
        .ty
        .take()
        .unwrap_or_else(|| TypeSpec::named(types::DEFAULT_TYPE));
    let resolved = types::resolve(&acc.name, &spec, &mut acc.options.options, acc.registry)?;

    let has_block = !acc.runtime.children.is_empty() || !acc.options.rules.is_empty();
    if has_block && resolved.nested == Nested::None {
        return Err(SchemaError::invalid_option(
            &acc.name,
            "type",
            format!("{} cannot hold nested parameters", resolved.display_name),
        ));
    }

    acc.runtime.parser_func = Some(resolved.parser_func(&acc.name));
    acc.runtime.nested = resolved.nested;
    acc.information.ty = resolved.display_name;
    Ok(())
}

fn default(acc: &mut Accumulator<'_>) -> Result<(), SchemaError> {
    acc.information.default = acc.options.options.shift_remove(DEFAULT);
    Ok(())
}

fn desc(acc: &mut Accumulator<'_>) -> Result<(), SchemaError> {
    acc.information.desc = acc.string_option(DESC)?;
    acc.options.options.shift_remove(DESC);
    Ok(())
}

/// Every option still present is a `(validator_name, validator_options)` pair.
fn field_validators(acc: &mut Accumulator<'_>) -> Result<(), SchemaError> {
    let declared: Vec<(String, Value)> = acc.options.options.drain(..).collect();
    acc.runtime.validate_func = Some(validators::compile_field_validators(
        &acc.name,
        declared,
        acc.registry,
    )?);

    for rule in std::mem::take(&mut acc.options.rules) {
        acc.information.rules.push(rule.information);
        acc.runtime.rules.push(rule.runtime);
    }
    Ok(())
}
