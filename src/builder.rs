//! Declaration surface: `requires` / `optional` / `group` and cross-field
//! rules, over an explicit builder context that owns the scope stack.
//!
//! ```
//! use json_params::{Options, SchemaBuilder};
//! use serde_json::json;
//!
//! let mut b = SchemaBuilder::new();
//! b.requires("name")
//!     .optional_with("age", Options::new().ty("Integer").with_default(0))
//!     .optional("email")
//!     .optional("phone")
//!     .mutually_exclusive(["email", "phone"]);
//! let schema = b.build().unwrap();
//!
//! let out = schema.parse_value(&json!({"name": "Ann"})).unwrap();
//! assert_eq!(out, json!({"name": "Ann", "age": 0}));
//! ```
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::SchemaError;
use crate::exec::Schema;
use crate::param::{partition_entries, Entry, Parameter, Validator};
use crate::pipeline::{self, Declaration, ATTR_NAME, DEFAULT, DESC, REQUIRED, SOURCE};
use crate::registry::Registry;
use crate::scope::ScopeStack;
use crate::types::TypeSpec;
use crate::validators::{self, Targets};

/// Type given to nested blocks that don't declare one.
pub const BLOCK_TYPE: &str = "List";

/// Set by the declaring verb, never by caller options.
const RESERVED: [&str; 2] = [ATTR_NAME, REQUIRED];

// ————————————————————————————————————————————————————————————————————————————
// OPTIONS
// ————————————————————————————————————————————————————————————————————————————

/// Caller-side options for one field declaration.
#[derive(Debug, Clone)]
pub struct Options {
    entries: IndexMap<String, Value>,
    ty: Option<TypeSpec>,
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

impl Options {
    pub fn new() -> Self {
        Self { entries: IndexMap::new(), ty: None }
    }

    pub fn ty(mut self, spec: impl Into<TypeSpec>) -> Self {
        self.ty = Some(spec.into());
        self
    }

    /// Read the value from this input key instead of the attribute name.
    pub fn source(self, key: impl Into<String>) -> Self {
        self.set(SOURCE, Value::String(key.into()))
    }

    pub fn with_default(self, value: impl Into<Value>) -> Self {
        self.set(DEFAULT, value)
    }

    pub fn desc(self, text: impl Into<String>) -> Self {
        self.set(DESC, Value::String(text.into()))
    }

    /// Any other option: a type argument or a field validator.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }
}

// ————————————————————————————————————————————————————————————————————————————
// BUILDER
// ————————————————————————————————————————————————————————————————————————————

/// Compiles declarations into a [`Schema`].
///
/// The first compile error is latched: later declarations are ignored and
/// [`SchemaBuilder::build`] returns that error.
pub struct SchemaBuilder {
    registry: Registry,
    scope: ScopeStack,
    error: Option<SchemaError>,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::with_registry(Registry::builtin())
    }

    pub fn with_registry(registry: Registry) -> Self {
        Self { registry, scope: ScopeStack::new(), error: None }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Entries declared so far in the active scope.
    pub fn scope(&self) -> &ScopeStack {
        &self.scope
    }

    pub fn requires(&mut self, name: &str) -> &mut Self {
        self.declare(name, true, Options::new(), None::<fn(&mut Self)>)
    }

    pub fn requires_with(&mut self, name: &str, options: Options) -> &mut Self {
        self.declare(name, true, options, None::<fn(&mut Self)>)
    }

    pub fn requires_block(
        &mut self,
        name: &str,
        options: Options,
        block: impl FnOnce(&mut Self),
    ) -> &mut Self {
        self.declare(name, true, options, Some(block))
    }

    pub fn optional(&mut self, name: &str) -> &mut Self {
        self.declare(name, false, Options::new(), None::<fn(&mut Self)>)
    }

    pub fn optional_with(&mut self, name: &str, options: Options) -> &mut Self {
        self.declare(name, false, options, None::<fn(&mut Self)>)
    }

    pub fn optional_block(
        &mut self,
        name: &str,
        options: Options,
        block: impl FnOnce(&mut Self),
    ) -> &mut Self {
        self.declare(name, false, options, Some(block))
    }

    /// A required nested block.
    pub fn group(&mut self, name: &str, options: Options, block: impl FnOnce(&mut Self)) -> &mut Self {
        self.requires_block(name, options, block)
    }

    pub fn mutually_exclusive<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cross_field(validators::MUTUALLY_EXCLUSIVE, names.into_iter().collect())
    }

    pub fn exactly_one_of<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cross_field(validators::EXACTLY_ONE_OF, names.into_iter().collect())
    }

    pub fn at_least_one_of<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cross_field(validators::AT_LEAST_ONE_OF, names.into_iter().collect())
    }

    pub fn all_or_none_of<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cross_field(validators::ALL_OR_NONE_OF, names.into_iter().collect())
    }

    pub fn mutually_exclusive_above_all(&mut self) -> &mut Self {
        self.cross_field(validators::MUTUALLY_EXCLUSIVE, Targets::AboveAll)
    }

    pub fn exactly_one_of_above_all(&mut self) -> &mut Self {
        self.cross_field(validators::EXACTLY_ONE_OF, Targets::AboveAll)
    }

    pub fn at_least_one_of_above_all(&mut self) -> &mut Self {
        self.cross_field(validators::AT_LEAST_ONE_OF, Targets::AboveAll)
    }

    pub fn all_or_none_of_above_all(&mut self) -> &mut Self {
        self.cross_field(validators::ALL_OR_NONE_OF, Targets::AboveAll)
    }

    /// Declare a cross-field rule by its registered action name.
    ///
    /// `Targets::AboveAll` checks only the fields declared before this call
    /// in the current scope; earlier cross-field rules are not fields.
    pub fn cross_field(&mut self, action: &str, targets: Targets) -> &mut Self {
        if self.error.is_some() {
            return self;
        }
        let attr_names: Vec<String> = match targets {
            Targets::Named(names) => names,
            Targets::AboveAll => self
                .scope
                .snapshot()
                .entries()
                .iter()
                .filter_map(Entry::as_parameter)
                .map(|p| p.attr_name().to_string())
                .collect(),
        };
        if attr_names.is_empty() {
            tracing::warn!(action, "cross-field validator has no fields to check");
        }

        match validators::compile_cross_field(action, attr_names, &self.registry) {
            Ok(rule) => {
                tracing::debug!(action, attr_names = ?rule.information.attr_names, "compiled cross-field validator");
                self.scope.push(Entry::Validator(rule));
            }
            Err(err) => self.fail(err),
        }
        self
    }

    /// Latch `err` unless an earlier error is already held.
    pub fn fail(&mut self, err: SchemaError) {
        if self.error.is_none() {
            tracing::debug!(error = %err, "schema definition failed");
            self.error = Some(err);
        }
    }

    pub fn build(mut self) -> Result<Schema, SchemaError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        let (parameters, rules) = partition_entries(self.scope.pop());
        warn_undeclared_targets("(root)", &parameters, &rules);
        Ok(Schema::new(parameters, rules))
    }

    fn declare<F>(&mut self, name: &str, required: bool, options: Options, block: Option<F>) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        if self.error.is_some() {
            return self;
        }
        let Options { entries, ty } = options;
        if let Some(key) = RESERVED.into_iter().find(|key| entries.contains_key(*key)) {
            self.fail(SchemaError::invalid_option(
                name,
                key,
                "is set by the declaring verb and cannot be overridden",
            ));
            return self;
        }
        let mut decl = Declaration::new(name, required);
        decl.options.extend(entries);
        decl.ty = ty;

        if let Some(block) = block {
            let entries = self.collect_block(name, block);
            if self.error.is_some() {
                return self;
            }
            let (children, rules) = partition_entries(entries);
            warn_undeclared_targets(name, &children, &rules);
            decl.children = Some(children);
            decl.rules = rules;
            decl.ty.get_or_insert_with(|| TypeSpec::named(BLOCK_TYPE));
        }

        match pipeline::compile(decl, &self.registry) {
            Ok(param) => self.scope.push(Entry::Parameter(param)),
            Err(err) => self.fail(err),
        }
        self
    }

    /// Run `block` against a fresh scope and return exactly what it declared.
    /// The outer scope is back in place afterwards, error or not.
    fn collect_block<F>(&mut self, name: &str, block: F) -> Vec<Entry>
    where
        F: FnOnce(&mut Self),
    {
        let outer = self.scope.snapshot();
        self.scope.pop();

        let span = tracing::debug_span!("block", attr_name = name);
        {
            let _guard = span.enter();
            block(self);
        }

        let entries = self.scope.pop();
        self.scope.restore(outer);
        entries
    }
}

fn warn_undeclared_targets(scope: &str, params: &[Parameter], rules: &[Validator]) {
    for rule in rules {
        for target in &rule.information.attr_names {
            if !params.iter().any(|p| p.attr_name() == target) {
                tracing::warn!(
                    scope,
                    action = %rule.information.action,
                    target = %target,
                    "cross-field target is not declared in this scope"
                );
            }
        }
    }
}
