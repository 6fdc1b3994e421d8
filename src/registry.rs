//! Name → implementation maps consulted while a schema is compiled.
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::types::{builtin as ty, Coercer};
use crate::validators::{self, builtin as va, CrossFieldValidator, FieldValidator};

#[derive(Clone, Default)]
pub struct Registry {
    types: HashMap<String, Arc<dyn Coercer>>,
    field_validators: HashMap<String, Arc<dyn FieldValidator>>,
    cross_field_validators: HashMap<String, Arc<dyn CrossFieldValidator>>,
}

static BUILTIN: Lazy<Registry> = Lazy::new(|| {
    let mut r = Registry::empty();
    r.register_type(ty::StringType);
    r.register_type(ty::IntegerType);
    r.register_type(ty::FloatType);
    r.register_type(ty::BooleanType);
    r.register_type(ty::JsonType);
    r.register_type(ty::DateType);
    r.register_type(ty::DateTimeType);
    r.register_type(ty::ListType);
    r.register_type(ty::MapType);

    r.register_field_validator("regexp", va::Regexp);
    r.register_field_validator("values", va::Values);
    r.register_field_validator("length", va::Length);
    r.register_field_validator("allow_blank", va::AllowBlank);

    r.register_cross_field_validator(validators::MUTUALLY_EXCLUSIVE, va::MutuallyExclusive);
    r.register_cross_field_validator(validators::EXACTLY_ONE_OF, va::ExactlyOneOf);
    r.register_cross_field_validator(validators::AT_LEAST_ONE_OF, va::AtLeastOneOf);
    r.register_cross_field_validator(validators::ALL_OR_NONE_OF, va::AllOrNoneOf);
    r
});

impl Registry {
    /// No types or validators at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in types and validators. Extend the returned copy to add
    /// your own.
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Registered under [`Coercer::name`]; replaces any type of the same name.
    pub fn register_type(&mut self, coercer: impl Coercer + 'static) -> &mut Self {
        self.types.insert(coercer.name().to_string(), Arc::new(coercer));
        self
    }

    pub fn register_field_validator(
        &mut self,
        name: impl Into<String>,
        validator: impl FieldValidator + 'static,
    ) -> &mut Self {
        self.field_validators.insert(name.into(), Arc::new(validator));
        self
    }

    pub fn register_cross_field_validator(
        &mut self,
        action: impl Into<String>,
        validator: impl CrossFieldValidator + 'static,
    ) -> &mut Self {
        self.cross_field_validators.insert(action.into(), Arc::new(validator));
        self
    }

    pub fn coercer(&self, name: &str) -> Option<Arc<dyn Coercer>> {
        self.types.get(name).cloned()
    }

    pub fn field_validator(&self, name: &str) -> Option<Arc<dyn FieldValidator>> {
        self.field_validators.get(name).cloned()
    }

    pub fn cross_field_validator(&self, action: &str) -> Option<Arc<dyn CrossFieldValidator>> {
        self.cross_field_validators.get(action).cloned()
    }

    pub fn is_cross_field_action(&self, action: &str) -> bool {
        self.cross_field_validators.contains_key(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Args;
    use serde_json::{json, Value};

    struct Upper;

    impl Coercer for Upper {
        fn name(&self) -> &str {
            "Upper"
        }

        fn coerce(&self, value: Value, _: &Args) -> Result<Value, String> {
            value
                .as_str()
                .map(|s| Value::String(s.to_uppercase()))
                .ok_or_else(|| "not a string".to_string())
        }
    }

    #[test]
    fn builtin_registry_knows_standard_names() {
        let r = Registry::builtin();
        for name in ["String", "Integer", "Float", "Boolean", "Json", "Date", "DateTime", "List", "Map"] {
            assert!(r.coercer(name).is_some(), "missing type {name}");
        }
        for name in ["regexp", "values", "length", "allow_blank"] {
            assert!(r.field_validator(name).is_some(), "missing validator {name}");
        }
        assert!(r.is_cross_field_action("all_or_none_of"));
        assert!(Registry::empty().coercer("String").is_none());
    }

    #[test]
    fn custom_types_extend_a_copy() {
        let mut r = Registry::builtin();
        r.register_type(Upper);
        let upper = r.coercer("Upper").unwrap();
        assert_eq!(upper.coerce(json!("ab"), &Args::new()).unwrap(), json!("AB"));
        assert!(Registry::builtin().coercer("Upper").is_none());
    }
}
