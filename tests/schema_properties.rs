//! End-to-end behaviour of compiled schemas through the public API.
use std::sync::Arc;
use std::thread;

use json_params::param::{FieldCheck, Record};
use json_params::types::Args;
use json_params::{
    Coercer, CrossFieldValidator, FieldValidator, Options, ParamError, Registry, Schema,
    SchemaBuilder, SchemaError, TypeSpec,
};
use proptest::prelude::*;
use serde_json::{json, Value};

fn signup_schema() -> Schema {
    let mut b = SchemaBuilder::new();
    b.requires("name")
        .optional_with("age", Options::new().ty("Integer").with_default(0))
        .optional("email")
        .optional("phone")
        .mutually_exclusive(["email", "phone"]);
    b.build().expect("schema compiles")
}

#[test]
fn signup_example() {
    let schema = signup_schema();

    assert_eq!(
        schema.parse_value(&json!({"name": "Ann"})).unwrap(),
        json!({"name": "Ann", "age": 0})
    );
    assert_eq!(
        schema.parse_value(&json!({"email": "a@b.com", "phone": "123"})).unwrap_err(),
        ParamError::RequiredFieldMissing { attr_name: "name".into() }
    );
    assert!(matches!(
        schema.parse_value(&json!({"name": "Ann", "email": "a@b.com", "phone": "123"})),
        Err(ParamError::Validation { ref rule, .. }) if rule == "mutually_exclusive"
    ));
}

#[test]
fn default_injection_ignores_requiredness() {
    let mut b = SchemaBuilder::new();
    b.requires_with("page", Options::new().ty("Integer").with_default(1))
        .optional_with("per_page", Options::new().ty("Integer").with_default(20));
    let schema = b.build().unwrap();
    assert_eq!(
        schema.parse_value(&json!({})).unwrap(),
        json!({"page": 1, "per_page": 20})
    );
}

#[test]
fn exactly_one_of_above_all_ignores_later_fields() {
    let mut b = SchemaBuilder::new();
    b.optional("a").optional("b").optional("c");
    b.exactly_one_of_above_all();
    b.optional("d");
    let schema = b.build().unwrap();

    assert!(schema.parse_value(&json!({"a": "1", "d": "4"})).is_ok());
    assert!(schema.parse_value(&json!({"d": "4"})).is_err());
    assert!(schema.parse_value(&json!({"a": "1", "b": "2"})).is_err());
}

#[test]
fn compiled_schema_is_shared_across_threads() {
    let schema = Arc::new(signup_schema());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let schema = Arc::clone(&schema);
            thread::spawn(move || schema.parse_value(&json!({"name": format!("user-{i}"), "age": i})))
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let out = handle.join().unwrap().unwrap();
        assert_eq!(out["age"], json!(i));
    }
}

// -------------------------- custom collaborators -------------------------- //

struct Cents;

impl Coercer for Cents {
    fn name(&self) -> &str {
        "Cents"
    }

    fn extra_options(&self) -> &[&'static str] {
        &["currency"]
    }

    fn check_args(&self, args: &Args) -> Result<(), String> {
        match args.get("currency") {
            None | Some(Value::String(_)) => Ok(()),
            Some(other) => Err(format!("currency must be a string, got {other}")),
        }
    }

    fn coerce(&self, value: Value, args: &Args) -> Result<Value, String> {
        let amount = value.as_f64().ok_or("amount must be a number")?;
        let currency = args.get("currency").and_then(Value::as_str).unwrap_or("USD");
        Ok(json!({"cents": (amount * 100.0).round() as i64, "currency": currency}))
    }
}

struct Positive;

impl FieldValidator for Positive {
    fn compile(&self, _: &Value) -> Result<FieldCheck, String> {
        Ok(Arc::new(|attr_name, value| match value["cents"].as_i64() {
            Some(c) if c > 0 => Ok(()),
            _ => Err(format!("{attr_name} must be positive")),
        }))
    }
}

struct SameCurrency;

impl CrossFieldValidator for SameCurrency {
    fn validate(&self, attr_names: &[String], result: &Record) -> Result<(), String> {
        let mut currencies = attr_names
            .iter()
            .filter_map(|n| result.get(n))
            .map(|v| v["currency"].clone());
        let first = currencies.next();
        if currencies.all(|c| Some(&c) == first.as_ref()) {
            Ok(())
        } else {
            Err("currencies differ".to_string())
        }
    }
}

fn money_registry() -> Registry {
    let mut registry = Registry::builtin();
    registry
        .register_type(Cents)
        .register_field_validator("positive", Positive)
        .register_cross_field_validator("same_currency", SameCurrency);
    registry
}

#[test]
fn custom_types_and_validators_plug_in() {
    let mut b = SchemaBuilder::with_registry(money_registry());
    b.requires_with(
        "price",
        Options::new().ty("Cents").set("currency", "EUR").set("positive", true),
    )
    .optional_with("discount", Options::new().ty(TypeSpec::from("Float").then("Cents")));
    b.cross_field("same_currency", ["price", "discount"].into_iter().collect());
    let schema = b.build().unwrap();

    assert_eq!(schema.parameters()[1].information.ty, "Cents");
    assert_eq!(
        schema.parse_value(&json!({"price": 1.5})).unwrap(),
        json!({"price": {"cents": 150, "currency": "EUR"}})
    );
    assert!(matches!(
        schema.parse_value(&json!({"price": -1})),
        Err(ParamError::Validation { ref rule, .. }) if rule == "positive"
    ));
    assert!(matches!(
        schema.parse_value(&json!({"price": 2, "discount": "0.5"})),
        Err(ParamError::Validation { ref rule, .. }) if rule == "same_currency"
    ));
}

#[test]
fn bad_type_arguments_fail_at_build_time() {
    let mut b = SchemaBuilder::with_registry(money_registry());
    b.requires_with("price", Options::new().ty("Cents").set("currency", 978));
    assert!(matches!(b.build(), Err(SchemaError::InvalidOption { .. })));
}

// ------------------------------- properties ------------------------------- //

fn field_names(range: std::ops::Range<usize>) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z]{1,8}", range).prop_map(|set| set.into_iter().collect())
}

proptest! {
    #[test]
    fn prop_block_children_are_exactly_block_declarations(
        before in field_names(0..5),
        inner in field_names(0..6),
        after in field_names(0..5),
    ) {
        let mut b = SchemaBuilder::new();
        for name in &before { b.optional(&format!("before_{name}")); }
        b.optional_block("block", Options::new(), |b| {
            for name in &inner { b.optional(name); }
        });
        for name in &after { b.optional(&format!("after_{name}")); }
        let schema = b.build().unwrap();

        let top: Vec<String> = schema.parameters().iter().map(|p| p.attr_name().to_string()).collect();
        prop_assert_eq!(top.len(), before.len() + 1 + after.len());
        prop_assert_eq!(&top[before.len()], "block");

        let block = &schema.parameters()[before.len()];
        let children: Vec<String> = block.information.children.iter().map(|c| c.attr_name.clone()).collect();
        prop_assert_eq!(children, inner.clone());
        let runtime_children: Vec<String> = block.runtime.children.iter().map(|c| c.attr_name.clone()).collect();
        prop_assert_eq!(runtime_children, inner);
    }

    #[test]
    fn prop_above_all_checks_exactly_the_prefix(
        fields in field_names(0..8),
        split in 0usize..8,
    ) {
        let split = split.min(fields.len());
        let mut b = SchemaBuilder::new();
        for name in &fields[..split] { b.optional(name); }
        b.at_least_one_of_above_all();
        for name in &fields[split..] { b.optional(name); }
        let schema = b.build().unwrap();

        prop_assert_eq!(&schema.rules()[0].information.attr_names, &fields[..split].to_vec());
    }

    #[test]
    fn prop_optional_without_default_leaves_absent_keys_absent(
        fields in field_names(1..6),
    ) {
        let mut b = SchemaBuilder::new();
        for name in &fields { b.optional(name); }
        let schema = b.build().unwrap();
        prop_assert_eq!(schema.parse_value(&json!({})).unwrap(), json!({}));
    }
}
