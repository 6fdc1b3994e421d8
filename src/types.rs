//! Type resolution: a declared type specification becomes an ordered
//! coercion chain plus a nesting classification.
//!
//! A specification is a registered type name, a raw function, or a
//! left-to-right chain of either. Chains flatten; named steps are looked up
//! in the [`Registry`] and may claim extra option keys (type arguments) which
//! are stripped from the declaration before later stages see it.
pub mod builtin;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{ParamError, SchemaError};
use crate::param::{Nested, ParserFn};
use crate::registry::Registry;

/// Type arguments claimed by a coercer from the declaration options.
pub type Args = IndexMap<String, Value>;

/// A user-supplied coercion step. Contributes no display name.
pub type RawCoerceFn = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// Display name used when a chain names no type.
pub const DEFAULT_TYPE: &str = "String";

/// A named type that can convert incoming values.
pub trait Coercer: Send + Sync {
    /// Display name, e.g. `Integer`.
    fn name(&self) -> &str;

    /// Option keys this type reads as arguments.
    fn extra_options(&self) -> &[&'static str] {
        &[]
    }

    fn nested(&self) -> Nested {
        Nested::None
    }

    /// Reject bad arguments while the schema is built.
    fn check_args(&self, _args: &Args) -> Result<(), String> {
        Ok(())
    }

    fn coerce(&self, value: Value, args: &Args) -> Result<Value, String>;
}

// ————————————————————————————————————————————————————————————————————————————
// SPECIFICATION
// ————————————————————————————————————————————————————————————————————————————

#[derive(Clone)]
pub enum TypeSpec {
    Named(String),
    Func(RawCoerceFn),
    Chain(Vec<TypeSpec>),
}

impl TypeSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn func<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self::Func(Arc::new(f))
    }

    /// Feed this step's output into `next`.
    pub fn then(self, next: impl Into<TypeSpec>) -> Self {
        let next = next.into();
        match self {
            Self::Chain(mut steps) => {
                steps.push(next);
                Self::Chain(steps)
            }
            first => Self::Chain(vec![first, next]),
        }
    }
}

impl From<&str> for TypeSpec {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for TypeSpec {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl fmt::Debug for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{name}"),
            Self::Func(_) => f.write_str("<fn>"),
            Self::Chain(steps) => f.debug_list().entries(steps).finish(),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// RESOLUTION
// ————————————————————————————————————————————————————————————————————————————

#[derive(Clone)]
pub enum Step {
    Typed { coercer: Arc<dyn Coercer>, args: Args },
    Raw(RawCoerceFn),
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Typed { coercer, args } => f
                .debug_struct("Typed")
                .field("name", &coercer.name())
                .field("args", args)
                .finish(),
            Step::Raw(_) => f.write_str("Raw"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedType {
    pub display_name: String,
    pub nested: Nested,
    pub steps: Vec<Step>,
}

fn flatten(spec: &TypeSpec, out: &mut Vec<TypeSpec>) {
    match spec {
        TypeSpec::Chain(steps) => steps.iter().for_each(|s| flatten(s, out)),
        other => out.push(other.clone()),
    }
}

/// Resolve `spec` for `attr_name`, removing the type arguments it claims
/// from `options`.
pub fn resolve(
    attr_name: &str,
    spec: &TypeSpec,
    options: &mut IndexMap<String, Value>,
    registry: &Registry,
) -> Result<ResolvedType, SchemaError> {
    let mut flat = Vec::new();
    flatten(spec, &mut flat);

    let mut steps = Vec::with_capacity(flat.len());
    let mut claimed: Vec<&'static str> = Vec::new();
    for item in flat {
        match item {
            TypeSpec::Named(name) => {
                let coercer = registry.coercer(&name).ok_or_else(|| SchemaError::UnknownType {
                    attr_name: attr_name.to_string(),
                    name: name.clone(),
                })?;
                let args: Args = coercer
                    .extra_options()
                    .iter()
                    .filter_map(|key| options.get(*key).map(|v| (key.to_string(), v.clone())))
                    .collect();
                coercer
                    .check_args(&args)
                    .map_err(|reason| SchemaError::invalid_option(attr_name, "type", reason))?;
                claimed.extend(coercer.extra_options());
                steps.push(Step::Typed { coercer, args });
            }
            TypeSpec::Func(f) => steps.push(Step::Raw(f)),
            TypeSpec::Chain(_) => unreachable!("chains are flattened"),
        }
    }
    for key in claimed {
        options.shift_remove(key);
    }

    let display_name = steps
        .iter()
        .rev()
        .find_map(|s| match s {
            Step::Typed { coercer, .. } => Some(coercer.name().to_string()),
            Step::Raw(_) => None,
        })
        .unwrap_or_else(|| DEFAULT_TYPE.to_string());
    let nested = match steps.last() {
        Some(Step::Typed { coercer, .. }) => coercer.nested(),
        _ => Nested::None,
    };

    Ok(ResolvedType { display_name, nested, steps })
}

impl ResolvedType {
    /// Compose every step into one parser, applied left to right.
    pub fn parser_func(&self, attr_name: &str) -> ParserFn {
        let steps = self.steps.clone();
        let display_name = self.display_name.clone();
        let attr_name = attr_name.to_string();
        Arc::new(move |value| {
            steps.iter().try_fold(value, |acc, step| match step {
                Step::Typed { coercer, args } => {
                    coercer.coerce(acc, args).map_err(|reason| ParamError::Coercion {
                        attr_name: attr_name.clone(),
                        ty: coercer.name().to_string(),
                        reason,
                    })
                }
                Step::Raw(f) => f(acc).map_err(|reason| ParamError::Coercion {
                    attr_name: attr_name.clone(),
                    ty: display_name.clone(),
                    reason,
                }),
            })
        })
    }
}
