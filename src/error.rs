//! Compile-time and request-time failures.
use thiserror::Error;

/// Malformed declaration. Raised while the schema is being built, never
/// while a record is being parsed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("unknown type `{name}` declared on `{attr_name}`")]
    UnknownType { attr_name: String, name: String },

    #[error("unknown validator `{name}` declared on `{attr_name}`")]
    UnknownValidator { attr_name: String, name: String },

    #[error("unknown cross-field validator `{0}`")]
    UnknownAction(String),

    #[error("invalid option `{option}` on `{attr_name}`: {reason}")]
    InvalidOption {
        attr_name: String,
        option: String,
        reason: String,
    },

    /// Malformed definition document, located by JSON path.
    #[error("invalid definition at {path}: {reason}")]
    InvalidDefinition { path: String, reason: String },
}

impl SchemaError {
    pub(crate) fn invalid_option(attr_name: &str, option: &str, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            attr_name: attr_name.to_string(),
            option: option.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure while running a compiled schema against an input record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("missing required parameter `{attr_name}`")]
    RequiredFieldMissing { attr_name: String },

    #[error("parameter `{attr_name}` cannot be coerced to {ty}: {reason}")]
    Coercion {
        attr_name: String,
        ty: String,
        reason: String,
    },

    #[error("{rule} failed for {}: {reason}", .attr_names.join(", "))]
    Validation {
        attr_names: Vec<String>,
        rule: String,
        reason: String,
    },
}

impl ParamError {
    /// Attribute names the failure refers to.
    pub fn attr_names(&self) -> Vec<&str> {
        match self {
            Self::RequiredFieldMissing { attr_name } | Self::Coercion { attr_name, .. } => {
                vec![attr_name.as_str()]
            }
            Self::Validation { attr_names, .. } => attr_names.iter().map(String::as_str).collect(),
        }
    }

    /// Re-root the reported attribute names under `prefix`, giving
    /// `items[2].sku` style paths for failures inside nested blocks.
    pub(crate) fn nested_under(self, prefix: &str) -> Self {
        let join = |name: String| {
            if name.starts_with('[') {
                format!("{prefix}{name}")
            } else {
                format!("{prefix}.{name}")
            }
        };
        match self {
            Self::RequiredFieldMissing { attr_name } => Self::RequiredFieldMissing {
                attr_name: join(attr_name),
            },
            Self::Coercion { attr_name, ty, reason } => Self::Coercion {
                attr_name: join(attr_name),
                ty,
                reason,
            },
            Self::Validation { attr_names, rule, reason } => Self::Validation {
                attr_names: attr_names.into_iter().map(join).collect(),
                rule,
                reason,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_paths_join_with_dots_and_indexes() {
        let err = ParamError::RequiredFieldMissing { attr_name: "sku".into() }
            .nested_under("[1]")
            .nested_under("items");
        assert_eq!(err.attr_names(), vec!["items[1].sku"]);
    }

    #[test]
    fn validation_message_lists_every_field() {
        let err = ParamError::Validation {
            attr_names: vec!["email".into(), "phone".into()],
            rule: "mutually_exclusive".into(),
            reason: "at most one may be given".into(),
        };
        assert_eq!(
            err.to_string(),
            "mutually_exclusive failed for email, phone: at most one may be given"
        );
    }
}
