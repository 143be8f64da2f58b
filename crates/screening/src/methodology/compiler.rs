use super::domain::{CriterionValue, RuleValue};
use super::instance::MethodologyInstance;
use super::operators::Operator;
use serde::{Deserialize, Serialize};

/// Fact every compiled condition reads from.
pub const ENTITY_FACT: &str = "entity";

/// Atomic, evaluator-ready condition derived from one selected option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledCondition {
    pub fact: String,
    pub operator: String,
    pub value: Option<CriterionValue>,
    pub code: String,
    #[serde(rename = "originalOperator", alias = "original_operator")]
    pub original_operator: String,
}

impl CompiledCondition {
    fn from_value(value: &RuleValue) -> Self {
        // Values only enter an instance through validation, so an unknown engine token can
        // only come from a hand-edited document. It is passed through and left for the
        // evaluator to reject.
        let operator = Operator::from_engine(&value.operator)
            .map(|operator| operator.compiled_name(&value.code))
            .unwrap_or_else(|| value.operator.clone());

        Self {
            fact: ENTITY_FACT.to_string(),
            operator,
            value: value.value.clone(),
            code: value.code.clone(),
            original_operator: value.original_operator.clone(),
        }
    }
}

/// Flatten an instance into compiled conditions.
///
/// Order follows declaration order: steps, categories, rules, then values within a rule.
/// Rule nodes without values contribute nothing.
pub fn generate_rules_set(instance: &MethodologyInstance) -> Vec<CompiledCondition> {
    instance
        .rule_nodes()
        .flat_map(|(_, rule)| rule.values().iter().map(CompiledCondition::from_value))
        .collect()
}
