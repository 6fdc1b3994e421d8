//! Declarative parameter schemas for JSON request input.
//!
//! Declarations (`requires`, `optional`, `group`, cross-field rules) compile
//! into two parallel trees: [`Information`] for documentation and [`Runtime`]
//! closures that coerce and validate incoming records.
//!
//! Pipeline:
//! - [`builder`] assembles sibling declarations on a [`scope::ScopeStack`];
//! - [`pipeline`] turns each declaration into a [`Parameter`] in eight stages;
//! - [`types`] resolves type chains, [`validators`] compiles checks;
//! - [`exec`] runs the compiled [`Schema`] against a record.
pub mod builder;
pub mod definition;
pub mod error;
pub mod exec;
pub mod param;
pub mod path_de;
pub mod pipeline;
pub mod registry;
pub mod scope;
pub mod types;
pub mod validators;

pub use builder::{Options, SchemaBuilder};
pub use error::{ParamError, SchemaError};
pub use exec::Schema;
pub use param::{Entry, Information, Nested, Parameter, Runtime, Validator};
pub use registry::Registry;
pub use types::{Coercer, TypeSpec};
pub use validators::{CrossFieldValidator, FieldValidator, Targets};
