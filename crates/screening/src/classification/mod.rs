//! Entity classification against compiled methodology conditions.
//!
//! Each entity is evaluated on its own. Unsatisfied conditions whose fact is missing are
//! treated as data gaps rather than failures, and the resulting bucket is mapped to the
//! classification code the root methodology declares for it.

mod comparators;
pub mod engine;
pub mod entity;
pub mod report;

pub use comparators::unconfigured_benchmark;
pub use engine::{
    register_custom_operators, Comparator, ComparatorError, ConditionEvaluator, ConditionResult,
    EvaluationError, EvaluationOutcome, PredicateEngine,
};
pub(crate) use entity::ensure_unique;
pub use entity::{
    load_entities_csv, load_entities_from_path, load_entities_json, Entity, EntityLoadError,
};
pub use report::{ClassificationReport, EntityClassification, EntityFailure, ReportTotals};

use crate::methodology::schema::{Bucket, ClassificationTable};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Upper bound on entities evaluated at the same time.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Runs a configured evaluator over a batch of entities.
#[derive(Clone)]
pub struct ClassificationEngine {
    evaluator: Arc<dyn ConditionEvaluator>,
    table: Arc<ClassificationTable>,
    methodology_version: String,
    concurrency: usize,
}

impl ClassificationEngine {
    pub fn new(
        evaluator: Arc<dyn ConditionEvaluator>,
        table: ClassificationTable,
        methodology_version: impl Into<String>,
    ) -> Self {
        Self {
            evaluator,
            table: Arc::new(table),
            methodology_version: methodology_version.into(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Override the in-flight limit. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Classify every entity exactly once.
    ///
    /// A failing entity is reported in `failures` and does not stop the others. Within a
    /// classification code, entities keep their input order.
    pub async fn classify(&self, entities: Vec<Entity>) -> ClassificationReport {
        let total = entities.len();
        info!(
            entities = total,
            concurrency = self.concurrency,
            version = %self.methodology_version,
            "classification run started"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(total);

        for entity in entities {
            let entity_id = entity.id.clone();
            let evaluator = Arc::clone(&self.evaluator);
            let table = Arc::clone(&self.table);
            let semaphore = Arc::clone(&semaphore);

            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|err| EvaluationError::Interrupted(err.to_string()))?;
                classify_entity(evaluator.as_ref(), &table, entity).await
            });
            handles.push((entity_id, handle));
        }

        let mut report = ClassificationReport::new(&self.methodology_version, &self.table);
        for (entity_id, handle) in handles {
            let outcome = handle
                .await
                .unwrap_or_else(|err| Err(EvaluationError::Interrupted(err.to_string())));

            match outcome {
                Ok(classification) => {
                    debug!(
                        entity = %entity_id,
                        bucket = %classification.bucket,
                        code = %classification.classification_code,
                        "entity classified"
                    );
                    report.record(classification);
                }
                Err(err) => {
                    warn!(entity = %entity_id, error = %err, "entity evaluation failed");
                    report.record_failure(entity_id, err.to_string());
                }
            }
        }

        let totals = report.totals();
        info!(
            pass = totals.pass,
            not_pass = totals.not_pass,
            none = totals.none,
            failed = totals.failed,
            "classification run finished"
        );
        report
    }
}

impl std::fmt::Debug for ClassificationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassificationEngine")
            .field("table", &self.table)
            .field("methodology_version", &self.methodology_version)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

/// Evaluate one entity and place it in a bucket.
pub async fn classify_entity(
    evaluator: &dyn ConditionEvaluator,
    table: &ClassificationTable,
    entity: Entity,
) -> Result<EntityClassification, EvaluationError> {
    let outcome = evaluator.evaluate(&entity).await?;

    let (inapplicable, failures): (Vec<_>, Vec<_>) = outcome
        .unsatisfied
        .into_iter()
        .partition(|condition| entity.is_missing(&condition.code));

    let bucket = Bucket::from_counts(failures.len(), inapplicable.len());
    Ok(EntityClassification {
        classification_code: table.code_for(bucket).to_string(),
        bucket,
        entity,
        pass_conditions: outcome.satisfied,
        not_pass_conditions: failures,
        inapplicable_conditions: inapplicable,
    })
}
