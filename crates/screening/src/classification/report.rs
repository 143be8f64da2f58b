use super::engine::ConditionResult;
use super::entity::Entity;
use crate::methodology::schema::{Bucket, ClassificationTable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entity placed in a bucket, with the conditions that put it there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityClassification {
    pub entity: Entity,
    pub bucket: Bucket,
    pub classification_code: String,
    pub pass_conditions: Vec<ConditionResult>,
    pub not_pass_conditions: Vec<ConditionResult>,
    pub inapplicable_conditions: Vec<ConditionResult>,
}

/// Entity the evaluator could not process. It appears in no bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityFailure {
    pub entity_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTotals {
    pub pass: usize,
    pub not_pass: usize,
    pub none: usize,
    pub failed: usize,
}

/// Result of a classification run, keyed by classification code.
///
/// Every configured classification code is present even when no entity landed in it.
/// Entities appear in input order within each bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub methodology_version: String,
    pub evaluated_at: DateTime<Utc>,
    pub classifications: BTreeMap<String, Vec<EntityClassification>>,
    pub failures: Vec<EntityFailure>,
    pub totals: ReportTotals,
}

impl ClassificationReport {
    pub(crate) fn new(methodology_version: impl Into<String>, table: &ClassificationTable) -> Self {
        let classifications = table
            .codes()
            .into_iter()
            .map(|code| (code.to_string(), Vec::new()))
            .collect();

        Self {
            methodology_version: methodology_version.into(),
            evaluated_at: Utc::now(),
            classifications,
            failures: Vec::new(),
            totals: ReportTotals::default(),
        }
    }

    pub(crate) fn record(&mut self, classification: EntityClassification) {
        match classification.bucket {
            Bucket::Pass => self.totals.pass += 1,
            Bucket::NotPass => self.totals.not_pass += 1,
            Bucket::None => self.totals.none += 1,
        }
        self.classifications
            .entry(classification.classification_code.clone())
            .or_default()
            .push(classification);
    }

    pub(crate) fn record_failure(
        &mut self,
        entity_id: impl Into<String>,
        reason: impl Into<String>,
    ) {
        self.totals.failed += 1;
        self.failures.push(EntityFailure {
            entity_id: entity_id.into(),
            reason: reason.into(),
        });
    }

    pub fn totals(&self) -> ReportTotals {
        self.totals
    }

    /// Entities filed under one classification code.
    pub fn bucket(&self, classification_code: &str) -> &[EntityClassification] {
        self.classifications
            .get(classification_code)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn find(&self, entity_id: &str) -> Option<&EntityClassification> {
        self.classifications
            .values()
            .flatten()
            .find(|classification| classification.entity.id == entity_id)
    }

    pub fn failure(&self, entity_id: &str) -> Option<&EntityFailure> {
        self.failures
            .iter()
            .find(|failure| failure.entity_id == entity_id)
    }
}
