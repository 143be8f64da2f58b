use super::comparators;
use super::entity::Entity;
use crate::methodology::compiler::CompiledCondition;
use crate::methodology::domain::CriterionValue;
use crate::methodology::operators::WITHIN_PREFIX;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Comparison between an entity fact and a condition threshold.
pub type Comparator =
    Arc<dyn Fn(&Value, Option<&CriterionValue>) -> Result<bool, ComparatorError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComparatorError {
    #[error("expected a {expected} fact, found {found}")]
    FactType {
        expected: &'static str,
        found: String,
    },
    #[error("operator requires a {0} threshold")]
    Threshold(&'static str),
    #[error("{0}")]
    Unsupported(String),
}

/// Failure evaluating one entity. Never aborts the rest of a run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("operator '{0}' is not registered with the evaluator")]
    UnknownOperator(String),
    #[error("condition {code} ({operator}) could not be evaluated: {source}")]
    Comparator {
        code: String,
        operator: String,
        #[source]
        source: ComparatorError,
    },
    #[error("evaluation was interrupted: {0}")]
    Interrupted(String),
}

/// Condition as reported back from an evaluation, in human terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionResult {
    pub code: String,
    pub operator: String,
    pub value: Option<CriterionValue>,
}

impl From<&CompiledCondition> for ConditionResult {
    fn from(condition: &CompiledCondition) -> Self {
        Self {
            code: condition.code.clone(),
            operator: condition.original_operator.clone(),
            value: condition.value.clone(),
        }
    }
}

/// Partition of the registered conditions for one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub satisfied: Vec<ConditionResult>,
    pub unsatisfied: Vec<ConditionResult>,
}

/// Boolean condition engine the classification pass runs against.
///
/// Registration happens before a run; evaluation takes `&self` so one configured
/// evaluator can be shared by every in-flight entity.
#[async_trait]
pub trait ConditionEvaluator: Send + Sync {
    fn register_condition(&mut self, condition: CompiledCondition);
    fn register_operator(&mut self, name: &str, comparator: Comparator);
    fn has_operator(&self, name: &str) -> bool;
    async fn evaluate(&self, entity: &Entity) -> Result<EvaluationOutcome, EvaluationError>;
}

/// Register a placeholder for every `within-<code>` operator the conditions use and the
/// evaluator does not already know.
pub fn register_custom_operators(
    evaluator: &mut dyn ConditionEvaluator,
    conditions: &[CompiledCondition],
) {
    for condition in conditions {
        let name = condition.operator.as_str();
        if name.starts_with(WITHIN_PREFIX) && !evaluator.has_operator(name) {
            evaluator.register_operator(name, comparators::unconfigured_benchmark(name));
        }
    }
}

/// In-process predicate evaluator over flat entity records.
///
/// A missing or `null` fact never satisfies a condition and is not handed to a
/// comparator.
#[derive(Clone)]
pub struct PredicateEngine {
    conditions: Vec<CompiledCondition>,
    operators: HashMap<String, Comparator>,
}

impl PredicateEngine {
    /// Engine with no operators registered.
    pub fn empty() -> Self {
        Self {
            conditions: Vec::new(),
            operators: HashMap::new(),
        }
    }

    /// Engine preloaded with the built-in comparators.
    pub fn new() -> Self {
        let mut engine = Self::empty();
        for (name, comparator) in comparators::builtin() {
            engine.register_operator(name, comparator);
        }
        engine
    }

    pub fn conditions(&self) -> &[CompiledCondition] {
        &self.conditions
    }

    fn check(
        &self,
        condition: &CompiledCondition,
        entity: &Entity,
    ) -> Result<bool, EvaluationError> {
        let comparator = self
            .operators
            .get(&condition.operator)
            .ok_or_else(|| EvaluationError::UnknownOperator(condition.operator.clone()))?;

        let fact = match entity.field(&condition.code) {
            None | Some(Value::Null) => return Ok(false),
            Some(fact) => fact,
        };

        comparator(fact, condition.value.as_ref()).map_err(|source| {
            EvaluationError::Comparator {
                code: condition.code.clone(),
                operator: condition.operator.clone(),
                source,
            }
        })
    }
}

impl Default for PredicateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PredicateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut operators: Vec<_> = self.operators.keys().collect();
        operators.sort();
        f.debug_struct("PredicateEngine")
            .field("conditions", &self.conditions.len())
            .field("operators", &operators)
            .finish()
    }
}

#[async_trait]
impl ConditionEvaluator for PredicateEngine {
    fn register_condition(&mut self, condition: CompiledCondition) {
        self.conditions.push(condition);
    }

    fn register_operator(&mut self, name: &str, comparator: Comparator) {
        self.operators.insert(name.to_string(), comparator);
    }

    fn has_operator(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    async fn evaluate(&self, entity: &Entity) -> Result<EvaluationOutcome, EvaluationError> {
        let mut outcome = EvaluationOutcome::default();
        for condition in &self.conditions {
            if self.check(condition, entity)? {
                outcome.satisfied.push(condition.into());
            } else {
                outcome.unsatisfied.push(condition.into());
            }
        }
        Ok(outcome)
    }
}
