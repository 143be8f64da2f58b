//! Explicit editing and screening context around one root methodology.
//!
//! A session is built once per root. Its instance changes only through validated edits
//! or a validated replacement, and every classification run reads it without mutating it.

pub mod router;

#[cfg(test)]
mod tests;

pub use router::{methodology_router, SharedSession};

use crate::classification::{
    register_custom_operators, ClassificationEngine, ClassificationReport, ConditionEvaluator,
    Entity, PredicateEngine, DEFAULT_CONCURRENCY,
};
use crate::methodology::{
    generate_rules_set, validate_rule, AddOutcome, CompiledCondition, DeleteOutcome,
    MethodologyInstance, Operator, ProposedValue, RootMethodology, RuleDeletion, RuleEdit,
    RuleKey, RuleValidationError,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a batch of edits reacts to an invalid entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Reject the whole batch and leave the instance untouched.
    #[default]
    Abort,
    /// Apply the valid edits and report the others.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedEdit {
    pub index: usize,
    pub error: String,
    #[serde(skip)]
    pub source: RuleValidationError,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub applied: Vec<AddOutcome>,
    pub rejected: Vec<RejectedEdit>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Rule(#[from] RuleValidationError),
    #[error("edit {index} rejected: {source}")]
    Batch {
        index: usize,
        #[source]
        source: RuleValidationError,
    },
    #[error("methodology version {found} does not match root version {expected}")]
    VersionMismatch { expected: String, found: String },
    #[error("methodology does not mirror the root step/category/rule structure")]
    ShapeMismatch,
    #[error("stored value {code} on rule {rule} is invalid: {source}")]
    StoredValue {
        rule: RuleKey,
        code: String,
        #[source]
        source: RuleValidationError,
    },
}

/// Root methodology plus the instance being edited against it.
#[derive(Debug, Clone)]
pub struct MethodologySession {
    root: Arc<RootMethodology>,
    instance: MethodologyInstance,
    concurrency: usize,
}

impl MethodologySession {
    /// Session with an empty instance shaped like `root`.
    pub fn new(root: Arc<RootMethodology>) -> Self {
        let instance = MethodologyInstance::empty(&root);
        Self {
            root,
            instance,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Session resuming a previously saved instance.
    pub fn with_instance(
        root: Arc<RootMethodology>,
        instance: MethodologyInstance,
    ) -> Result<Self, SessionError> {
        let mut session = Self::new(root);
        session.replace_instance(instance)?;
        Ok(session)
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn root(&self) -> &RootMethodology {
        &self.root
    }

    pub fn shared_root(&self) -> Arc<RootMethodology> {
        Arc::clone(&self.root)
    }

    pub fn instance(&self) -> &MethodologyInstance {
        &self.instance
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Check an edit against the root without touching the instance.
    pub fn validate(&self, edit: &RuleEdit) -> Result<(), RuleValidationError> {
        validate_rule(edit, &self.root).map(|_| ())
    }

    /// Validate an edit and store it, replacing any value with the same option code.
    pub fn add_rule(&mut self, edit: &RuleEdit) -> Result<AddOutcome, RuleValidationError> {
        if let Err(err) = validate_rule(edit, &self.root) {
            warn!(rule = %edit.rule, code = %edit.value.code, error = %err, "edit rejected");
            return Err(err);
        }

        let outcome = self.instance.apply_add(edit)?;
        info!(
            rule = %edit.rule,
            code = %edit.value.code,
            operator = %edit.value.operator,
            outcome = ?outcome,
            "methodology value stored"
        );
        Ok(outcome)
    }

    /// Remove the value stored under an option code. An unknown code is a no-op.
    pub fn delete_rule(
        &mut self,
        deletion: &RuleDeletion,
    ) -> Result<DeleteOutcome, RuleValidationError> {
        let outcome = self.instance.apply_delete(deletion)?;
        info!(
            rule = %deletion.rule,
            code = %deletion.code,
            outcome = ?outcome,
            "methodology value deleted"
        );
        Ok(outcome)
    }

    /// Apply a batch of edits in order under the given policy.
    pub fn apply_batch(
        &mut self,
        edits: &[RuleEdit],
        policy: BatchPolicy,
    ) -> Result<BatchReport, SessionError> {
        if policy == BatchPolicy::Abort {
            for (index, edit) in edits.iter().enumerate() {
                validate_rule(edit, &self.root)
                    .map_err(|source| SessionError::Batch { index, source })?;
            }
        }

        let mut report = BatchReport::default();
        for (index, edit) in edits.iter().enumerate() {
            match self.add_rule(edit) {
                Ok(outcome) => report.applied.push(outcome),
                Err(source) if policy == BatchPolicy::Skip => report.rejected.push(RejectedEdit {
                    index,
                    error: source.to_string(),
                    source,
                }),
                Err(source) => return Err(SessionError::Batch { index, source }),
            }
        }

        debug!(
            applied = report.applied.len(),
            rejected = report.rejected.len(),
            "edit batch processed"
        );
        Ok(report)
    }

    /// Swap in a whole instance after checking it against the root.
    ///
    /// The version and structure must match, and every stored value must pass the same
    /// validation an individual edit would. Stored operators must be in engine form with
    /// a matching `originalOperator`. On error the current instance is kept.
    pub fn replace_instance(&mut self, instance: MethodologyInstance) -> Result<(), SessionError> {
        if instance.metadata.version != self.root.version() {
            return Err(SessionError::VersionMismatch {
                expected: self.root.version().to_string(),
                found: instance.metadata.version.clone(),
            });
        }

        if !instance.mirrors(&self.root) {
            return Err(SessionError::ShapeMismatch);
        }

        for (rule, node) in instance.rule_nodes() {
            let mut seen = std::collections::HashSet::new();
            for stored in node.values() {
                let edit = RuleEdit {
                    rule: rule.clone(),
                    value: ProposedValue {
                        code: stored.code.clone(),
                        operator: stored.operator.clone(),
                        value: stored.value.clone(),
                    },
                };
                let stored_value = |source: RuleValidationError| SessionError::StoredValue {
                    rule: rule.clone(),
                    code: stored.code.clone(),
                    source,
                };
                let validated = validate_rule(&edit, &self.root).map_err(stored_value)?;

                // Stored operators are engine tokens paired with the human token they came from.
                let operator = validated.operator;
                if Operator::from_engine(&stored.operator) != Some(operator) {
                    return Err(stored_value(RuleValidationError::InvalidOperator {
                        code: stored.code.clone(),
                        operator: stored.operator.clone(),
                    }));
                }
                if stored.original_operator != operator.human_name() {
                    return Err(stored_value(RuleValidationError::InvalidOperator {
                        code: stored.code.clone(),
                        operator: stored.original_operator.clone(),
                    }));
                }

                if !seen.insert(stored.code.as_str()) {
                    return Err(SessionError::StoredValue {
                        rule: rule.clone(),
                        code: stored.code.clone(),
                        source: RuleValidationError::InvalidValue {
                            code: stored.code.clone(),
                            reason: "option code is stored more than once".to_string(),
                        },
                    });
                }
            }
        }

        info!(version = %instance.metadata.version, "methodology instance replaced");
        self.instance = instance;
        Ok(())
    }

    /// Conditions for the current instance, in declaration order.
    pub fn compile(&self) -> Vec<CompiledCondition> {
        generate_rules_set(&self.instance)
    }

    /// Bundled evaluator loaded with the current conditions.
    pub fn evaluator(&self) -> PredicateEngine {
        self.prepare(PredicateEngine::new())
    }

    /// Load the current conditions into any evaluator.
    ///
    /// Comparators the caller registered beforehand, including `within-<code>` ones,
    /// are left in place.
    pub fn prepare<E: ConditionEvaluator>(&self, mut evaluator: E) -> E {
        let conditions = self.compile();
        register_custom_operators(&mut evaluator, &conditions);
        for condition in conditions {
            evaluator.register_condition(condition);
        }
        evaluator
    }

    /// Classify entities with the bundled evaluator.
    pub async fn classify(&self, entities: Vec<Entity>) -> ClassificationReport {
        self.classify_with(PredicateEngine::new(), entities).await
    }

    /// Classify entities with a caller-supplied evaluator.
    pub async fn classify_with<E>(
        &self,
        evaluator: E,
        entities: Vec<Entity>,
    ) -> ClassificationReport
    where
        E: ConditionEvaluator + 'static,
    {
        let evaluator = self.prepare(evaluator);
        ClassificationEngine::new(
            Arc::new(evaluator),
            self.root.classification_table().clone(),
            self.root.version(),
        )
        .with_concurrency(self.concurrency)
        .classify(entities)
        .await
    }
}
