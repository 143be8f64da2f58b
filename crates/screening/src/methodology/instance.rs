use super::domain::{RuleDeletion, RuleEdit, RuleKey, RuleValue};
use super::operators::Operator;
use super::schema::RootMethodology;
use super::validation::RuleValidationError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceMetadata {
    pub version: String,
}

/// Editable rule node; `value` is absent until an option is selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRule {
    pub code: String,
    pub category_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<RuleValue>>,
}

impl InstanceRule {
    pub fn values(&self) -> &[RuleValue] {
        self.value.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceCategory {
    pub code: String,
    pub rules: Vec<InstanceRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceStep {
    pub code: String,
    pub categories: Vec<InstanceCategory>,
}

/// Outcome of [`MethodologyInstance::apply_add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOutcome {
    /// The node had no values; it now holds exactly this one.
    Created,
    /// A value with the same code was overwritten in place.
    Replaced,
    Appended,
}

/// Outcome of [`MethodologyInstance::apply_delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Removed,
    Unchanged,
}

/// User-editable methodology mirroring the step/category/rule shape of its root.
///
/// At most one value is stored per option code within a rule node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodologyInstance {
    pub metadata: InstanceMetadata,
    pub steps: Vec<InstanceStep>,
}

impl MethodologyInstance {
    /// Empty instance with the exact shape of `root` and no values set.
    pub fn empty(root: &RootMethodology) -> Self {
        let steps = root
            .steps()
            .iter()
            .map(|step| InstanceStep {
                code: step.code.clone(),
                categories: step
                    .categories
                    .iter()
                    .map(|category| InstanceCategory {
                        code: category.code.clone(),
                        rules: category
                            .rules
                            .iter()
                            .map(|rule| InstanceRule {
                                code: rule.code.clone(),
                                category_code: category.code.clone(),
                                value: None,
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            metadata: InstanceMetadata {
                version: root.version().to_string(),
            },
            steps,
        }
    }

    /// Rule nodes in declaration order, paired with their address.
    pub fn rule_nodes(&self) -> impl Iterator<Item = (RuleKey, &InstanceRule)> + '_ {
        self.steps.iter().flat_map(|step| {
            step.categories.iter().flat_map(move |category| {
                category.rules.iter().map(move |rule| {
                    (
                        RuleKey::new(&step.code, &category.code, &rule.code),
                        rule,
                    )
                })
            })
        })
    }

    pub fn rule(&self, key: &RuleKey) -> Option<&InstanceRule> {
        self.rule_nodes()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, rule)| rule)
    }

    fn rule_mut(&mut self, key: &RuleKey) -> Option<&mut InstanceRule> {
        self.steps
            .iter_mut()
            .filter(|step| step.code == key.step_code)
            .flat_map(|step| step.categories.iter_mut())
            .filter(|category| category.code == key.category_code)
            .flat_map(|category| category.rules.iter_mut())
            .find(|rule| rule.code == key.rule_code)
    }

    /// Store an edit's value on its rule node, replacing any value with the same code.
    ///
    /// The operator is stored in engine form and the human form is kept as the original
    /// operator. Expects an edit that already passed validation; an unknown node or
    /// operator is still reported rather than silently ignored.
    pub fn apply_add(&mut self, edit: &RuleEdit) -> Result<AddOutcome, RuleValidationError> {
        let proposed = &edit.value;
        let operator = Operator::resolve(&proposed.operator).ok_or_else(|| {
            RuleValidationError::InvalidOperator {
                code: proposed.code.clone(),
                operator: proposed.operator.clone(),
            }
        })?;

        let rule = self
            .rule_mut(&edit.rule)
            .ok_or_else(|| RuleValidationError::RuleNotFound(edit.rule.clone()))?;

        let value = RuleValue {
            code: proposed.code.clone(),
            operator: operator.engine_name().to_string(),
            value: proposed.value.clone(),
            original_operator: operator.human_name().to_string(),
        };

        let has_values = rule
            .value
            .as_ref()
            .is_some_and(|values| !values.is_empty());
        if !has_values {
            rule.value = Some(vec![value]);
            return Ok(AddOutcome::Created);
        }

        let values = rule.value.get_or_insert_with(Vec::new);
        match values.iter_mut().find(|existing| existing.code == value.code) {
            Some(existing) => {
                *existing = value;
                Ok(AddOutcome::Replaced)
            }
            None => {
                values.push(value);
                Ok(AddOutcome::Appended)
            }
        }
    }

    /// Remove the value stored under the deletion's code. Missing codes are a no-op.
    pub fn apply_delete(
        &mut self,
        deletion: &RuleDeletion,
    ) -> Result<DeleteOutcome, RuleValidationError> {
        let rule = self
            .rule_mut(&deletion.rule)
            .ok_or_else(|| RuleValidationError::RuleNotFound(deletion.rule.clone()))?;

        let Some(values) = rule.value.as_mut() else {
            return Ok(DeleteOutcome::Unchanged);
        };

        let before = values.len();
        values.retain(|value| value.code != deletion.code);
        if values.len() == before {
            return Ok(DeleteOutcome::Unchanged);
        }

        if values.is_empty() {
            rule.value = None;
        }
        Ok(DeleteOutcome::Removed)
    }

    /// True when the step/category/rule skeleton matches `root` exactly.
    pub fn mirrors(&self, root: &RootMethodology) -> bool {
        let expected = root.rules().map(|rule| rule.key());
        let actual = self.rule_nodes().map(|(key, _)| key);
        expected.eq(actual)
            && self
                .rule_nodes()
                .all(|(key, rule)| rule.category_code == key.category_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methodology::domain::CriterionValue;
    use crate::methodology::schema::{build_root_methodology, default_params, default_template};

    fn instance() -> MethodologyInstance {
        let root =
            build_root_methodology(&default_template(), &default_params()).expect("root builds");
        MethodologyInstance::empty(&root)
    }

    fn threshold_key() -> RuleKey {
        RuleKey::new(
            "passes_negative_screening",
            "principal_adverse_impacts",
            "pais_upon_threshold",
        )
    }

    fn edit(code: &str, threshold: f64) -> RuleEdit {
        RuleEdit::new(
            threshold_key(),
            code,
            "less",
            Some(CriterionValue::Number(threshold)),
        )
    }

    #[test]
    fn empty_instance_mirrors_root_without_values() {
        let root =
            build_root_methodology(&default_template(), &default_params()).expect("root builds");
        let instance = MethodologyInstance::empty(&root);

        assert!(instance.mirrors(&root));
        assert_eq!(instance.metadata.version, "1.0");
        assert_eq!(instance.rule_nodes().count(), 2);
        assert!(instance.rule_nodes().all(|(_, rule)| rule.value.is_none()));
    }

    #[test]
    fn add_stores_engine_operator_and_keeps_original() {
        let mut instance = instance();

        let outcome = instance
            .apply_add(&edit("scope_1_emissions", 60.0))
            .expect("add applies");

        assert_eq!(outcome, AddOutcome::Created);
        let stored = instance.rule(&threshold_key()).expect("node").values();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].operator, "lessThanInclusive");
        assert_eq!(stored[0].original_operator, "less");
    }

    #[test]
    fn repeated_add_replaces_by_code() {
        let mut instance = instance();
        instance
            .apply_add(&edit("scope_1_emissions", 60.0))
            .expect("first add");
        let outcome = instance
            .apply_add(&edit("scope_1_emissions", 40.0))
            .expect("second add");

        assert_eq!(outcome, AddOutcome::Replaced);
        let stored = instance.rule(&threshold_key()).expect("node").values();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].value, Some(CriterionValue::Number(40.0)));
    }

    #[test]
    fn distinct_codes_append_in_order() {
        let mut instance = instance();
        instance
            .apply_add(&edit("scope_1_emissions", 60.0))
            .expect("add scope 1");
        let outcome = instance
            .apply_add(&edit("scope_2_emissions", 30.0))
            .expect("add scope 2");

        assert_eq!(outcome, AddOutcome::Appended);
        let codes: Vec<_> = instance
            .rule(&threshold_key())
            .expect("node")
            .values()
            .iter()
            .map(|value| value.code.as_str())
            .collect();
        assert_eq!(codes, ["scope_1_emissions", "scope_2_emissions"]);
    }

    #[test]
    fn delete_missing_code_is_a_no_op() {
        let mut instance = instance();
        let deletion = RuleDeletion::new(threshold_key(), "scope_3_emissions");

        assert_eq!(
            instance.apply_delete(&deletion).expect("delete on empty node"),
            DeleteOutcome::Unchanged
        );

        instance
            .apply_add(&edit("scope_1_emissions", 60.0))
            .expect("add");
        let snapshot = instance.clone();
        assert_eq!(
            instance.apply_delete(&deletion).expect("delete unknown code"),
            DeleteOutcome::Unchanged
        );
        assert_eq!(instance, snapshot);
    }

    #[test]
    fn deleting_last_value_clears_the_node() {
        let mut instance = instance();
        instance
            .apply_add(&edit("scope_1_emissions", 60.0))
            .expect("add");

        let outcome = instance
            .apply_delete(&RuleDeletion::new(threshold_key(), "scope_1_emissions"))
            .expect("delete");

        assert_eq!(outcome, DeleteOutcome::Removed);
        assert!(instance.rule(&threshold_key()).expect("node").value.is_none());
    }

    #[test]
    fn mutations_never_create_structure() {
        let mut instance = instance();
        let mut key = threshold_key();
        key.rule_code = "invented".to_string();

        let err = instance
            .apply_add(&RuleEdit::new(
                key.clone(),
                "scope_1_emissions",
                "less",
                Some(CriterionValue::Number(1.0)),
            ))
            .expect_err("unknown node");
        assert!(matches!(err, RuleValidationError::RuleNotFound(missing) if missing == key));
        assert!(instance.rule(&key).is_none());
    }
}
