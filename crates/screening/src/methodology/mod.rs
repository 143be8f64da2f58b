//! Methodology editing pipeline: schema, operator vocabulary, validation, mutation, and
//! compilation into evaluator-ready conditions.

pub mod compiler;
pub mod domain;
pub mod instance;
pub mod operators;
pub mod schema;
pub mod validation;

pub use compiler::{generate_rules_set, CompiledCondition, ENTITY_FACT};
pub use domain::{
    CriterionValue, ProposedValue, RuleDeletion, RuleEdit, RuleKey, RuleValue, ThresholdRange,
};
pub use instance::{AddOutcome, DeleteOutcome, MethodologyInstance};
pub use operators::{translate, Operator};
pub use schema::{
    build_root_methodology, build_root_methodology_from_namespace, Bucket, MethodologyParams,
    RootMethodology, RuleType, SchemaError,
};
pub use validation::{validate_rule, RuleErrorKind, RuleValidationError, ValidatedEdit};
