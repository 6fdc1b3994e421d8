//! The compiled schema and the walk that runs it against one input record.
use serde_json::{json, Value};

use crate::error::ParamError;
use crate::param::{Information, Nested, Parameter, Record, Runtime, Validator, ValidatorRuntime};

/// Root of a compiled schema. Immutable; share it freely across threads.
#[derive(Debug, Clone)]
pub struct Schema {
    parameters: Vec<Parameter>,
    rules: Vec<Validator>,
    runtimes: Vec<Runtime>,
    rule_runtimes: Vec<ValidatorRuntime>,
}

impl Schema {
    pub(crate) fn new(parameters: Vec<Parameter>, rules: Vec<Validator>) -> Self {
        let runtimes = parameters.iter().map(|p| p.runtime.clone()).collect();
        let rule_runtimes = rules.iter().map(|r| r.runtime.clone()).collect();
        Self { parameters, rules, runtimes, rule_runtimes }
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Cross-field rules declared at the top level.
    pub fn rules(&self) -> &[Validator] {
        &self.rules
    }

    pub fn information(&self) -> impl Iterator<Item = &Information> {
        self.parameters.iter().map(|p| &p.information)
    }

    /// The Information tree as JSON, for documentation output.
    pub fn describe(&self) -> Value {
        let params: Vec<&Information> = self.information().collect();
        let rules: Vec<_> = self.rules.iter().map(|r| &r.information).collect();
        json!({ "params": params, "rules": rules })
    }

    /// Coerce and validate `input`. The result is keyed by attribute name.
    pub fn parse(&self, input: &Record) -> Result<Record, ParamError> {
        run_scope(&self.runtimes, &self.rule_runtimes, input)
    }

    /// Like [`Schema::parse`] for an arbitrary JSON value, which must be an object.
    pub fn parse_value(&self, input: &Value) -> Result<Value, ParamError> {
        match input {
            Value::Object(record) => self.parse(record).map(Value::Object),
            other => Err(ParamError::Coercion {
                attr_name: "(root)".to_string(),
                ty: "Map".to_string(),
                reason: format!("expected an object, got {other}"),
            }),
        }
    }
}

fn is_absent(record: &Record, key: &str) -> bool {
    record.get(key).is_none_or(Value::is_null)
}

/// Run sibling fields in declaration order, then the scope's cross-field rules
/// against the assembled result.
fn run_scope(
    children: &[Runtime],
    rules: &[ValidatorRuntime],
    input: &Record,
) -> Result<Record, ParamError> {
    let mut working = input.clone();
    let mut result = Record::new();

    for node in children {
        if is_absent(&working, &node.param_key) {
            working = (node.nil_func)(working)?;
            if is_absent(&working, &node.param_key) {
                continue;
            }
        }
        let Some(raw) = working.get(&node.param_key).cloned() else {
            continue;
        };
        let value = node.process(raw)?;
        result.insert(node.attr_name.clone(), value);
    }

    for rule in rules {
        (rule.validate_func)(&result)?;
    }
    Ok(result)
}

impl Runtime {
    /// Coerce, validate, then descend into children for nested values.
    pub fn process(&self, raw: Value) -> Result<Value, ParamError> {
        let value = (self.parser_func)(raw)?;
        (self.validate_func)(&value)?;

        if self.children.is_empty() && self.rules.is_empty() {
            return Ok(value);
        }
        match (self.nested, value) {
            (Nested::None, value) => Ok(value),
            (Nested::Map, Value::Object(record)) => run_scope(&self.children, &self.rules, &record)
                .map(Value::Object)
                .map_err(|e| e.nested_under(&self.attr_name)),
            (Nested::List, Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| self.process_element(i, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
                .map_err(|e| e.nested_under(&self.attr_name)),
            (nested, other) => Err(self.shape_error(nested, &other)),
        }
    }

    fn process_element(&self, index: usize, item: Value) -> Result<Value, ParamError> {
        let at = format!("[{index}]");
        match item {
            Value::Object(record) => run_scope(&self.children, &self.rules, &record)
                .map(Value::Object)
                .map_err(|e| e.nested_under(&at)),
            other => Err(ParamError::Coercion {
                attr_name: at,
                ty: "Map".to_string(),
                reason: format!("expected an object, got {other}"),
            }),
        }
    }

    fn shape_error(&self, nested: Nested, value: &Value) -> ParamError {
        let ty = match nested {
            Nested::List => "List",
            _ => "Map",
        };
        ParamError::Coercion {
            attr_name: self.attr_name.clone(),
            ty: ty.to_string(),
            reason: format!("nested parameters need {ty}, got {value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Options, SchemaBuilder};
    use crate::types::TypeSpec;
    use serde_json::json;

    fn example_schema() -> Schema {
        let mut b = SchemaBuilder::new();
        b.requires("name")
            .optional_with("age", Options::new().ty("Integer").with_default(0))
            .optional("email")
            .optional("phone")
            .mutually_exclusive(["email", "phone"]);
        b.build().unwrap()
    }

    #[test]
    fn defaults_are_injected_and_absent_optionals_skipped() {
        let out = example_schema().parse_value(&json!({"name": "Ann"})).unwrap();
        assert_eq!(out, json!({"name": "Ann", "age": 0}));
    }

    #[test]
    fn missing_required_is_reported_before_cross_field_rules() {
        let err = example_schema()
            .parse_value(&json!({"email": "a@b.com", "phone": "123"}))
            .unwrap_err();
        assert_eq!(err, ParamError::RequiredFieldMissing { attr_name: "name".into() });
    }

    #[test]
    fn mutually_exclusive_violation() {
        let err = example_schema()
            .parse_value(&json!({"name": "Ann", "email": "a@b.com", "phone": "123"}))
            .unwrap_err();
        match err {
            ParamError::Validation { attr_names, rule, .. } => {
                assert_eq!(rule, "mutually_exclusive");
                assert_eq!(attr_names, ["email", "phone"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn null_counts_as_absent() {
        let out = example_schema()
            .parse_value(&json!({"name": "Ann", "age": null, "email": null}))
            .unwrap();
        assert_eq!(out, json!({"name": "Ann", "age": 0}));
    }

    #[test]
    fn source_renames_input_key_only() {
        let mut b = SchemaBuilder::new();
        b.requires_with("user_id", Options::new().source("userId").ty("Integer"));
        let schema = b.build().unwrap();
        assert_eq!(schema.parse_value(&json!({"userId": "7"})).unwrap(), json!({"user_id": 7}));
        assert!(schema.parse_value(&json!({"user_id": 7})).is_err());
    }

    #[test]
    fn list_blocks_run_per_element_with_paths() {
        let mut b = SchemaBuilder::new();
        b.group("items", Options::new(), |b| {
            b.requires("sku");
            b.optional_with("qty", Options::new().ty("Integer").with_default(1));
        });
        let schema = b.build().unwrap();

        let out = schema
            .parse_value(&json!({"items": [{"sku": "a"}, {"sku": "b", "qty": "3", "extra": true}]}))
            .unwrap();
        assert_eq!(out, json!({"items": [{"sku": "a", "qty": 1}, {"sku": "b", "qty": 3}]}));

        let err = schema.parse_value(&json!({"items": [{"sku": "a"}, {"qty": 2}]})).unwrap_err();
        assert_eq!(err, ParamError::RequiredFieldMissing { attr_name: "items[1].sku".into() });

        let err = schema.parse_value(&json!({"items": ["a"]})).unwrap_err();
        assert_eq!(err.attr_names(), vec!["items[0]"]);
    }

    #[test]
    fn map_blocks_apply_children_and_rules_once() {
        let mut b = SchemaBuilder::new();
        b.requires_block("contact", Options::new().ty("Map"), |b| {
            b.optional("email").optional("phone");
            b.at_least_one_of_above_all();
        });
        let schema = b.build().unwrap();

        let ok = schema.parse_value(&json!({"contact": {"phone": 5}})).unwrap();
        assert_eq!(ok, json!({"contact": {"phone": "5"}}));

        let err = schema.parse_value(&json!({"contact": {}})).unwrap_err();
        assert_eq!(err.attr_names(), vec!["contact.email", "contact.phone"]);
    }

    #[test]
    fn field_validation_runs_on_coerced_values() {
        let mut b = SchemaBuilder::new();
        b.requires_with(
            "level",
            Options::new().ty("Integer").set("values", json!({"min": 1, "max": 5})),
        );
        let schema = b.build().unwrap();
        assert!(schema.parse_value(&json!({"level": "3"})).is_ok());
        match schema.parse_value(&json!({"level": "9"})).unwrap_err() {
            ParamError::Validation { rule, .. } => assert_eq!(rule, "values"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn raw_function_steps_join_the_chain() {
        let trim_upper = TypeSpec::func(|v| {
            v.as_str()
                .map(|s| Value::String(s.trim().to_uppercase()))
                .ok_or_else(|| "expected text".to_string())
        });
        let mut b = SchemaBuilder::new();
        b.requires_with("code", Options::new().ty(TypeSpec::from("String").then(trim_upper)));
        let schema = b.build().unwrap();
        assert_eq!(schema.parameters()[0].information.ty, "String");
        assert_eq!(schema.parse_value(&json!({"code": " ab "})).unwrap(), json!({"code": "AB"}));
    }

    #[test]
    fn plain_lists_pass_through_without_children() {
        let mut b = SchemaBuilder::new();
        b.optional_with("tags", Options::new().ty("List"));
        let schema = b.build().unwrap();
        let input = json!({"tags": ["a", 1, {"b": 2}]});
        assert_eq!(schema.parse_value(&input).unwrap(), input);
    }

    #[test]
    fn non_object_roots_are_rejected() {
        assert!(example_schema().parse_value(&json!([1])).is_err());
    }

    #[test]
    fn describe_emits_the_information_tree() {
        let doc = example_schema().describe();
        assert_eq!(doc["params"][1]["type"], "Integer");
        assert_eq!(doc["params"][1]["default"], 0);
        assert_eq!(doc["rules"][0]["action"], "mutually_exclusive");
    }

    #[test]
    fn compiled_schemas_are_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Schema>();
    }
}
