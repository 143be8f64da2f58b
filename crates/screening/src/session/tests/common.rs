use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::classification::Entity;
use crate::methodology::schema::{build_root_methodology, default_params, default_template};
use crate::methodology::{CriterionValue, RootMethodology, RuleDeletion, RuleEdit, RuleKey};
use crate::session::{methodology_router, MethodologySession, SharedSession};

pub(super) const STEP: &str = "passes_negative_screening";
pub(super) const CATEGORY: &str = "principal_adverse_impacts";
pub(super) const EXCLUDED: &str = "pais_excluded";
pub(super) const THRESHOLD: &str = "pais_upon_threshold";

pub(super) fn root() -> Arc<RootMethodology> {
    Arc::new(build_root_methodology(&default_template(), &default_params()).expect("root builds"))
}

pub(super) fn session() -> MethodologySession {
    MethodologySession::new(root())
}

pub(super) fn key(rule_code: &str) -> RuleKey {
    RuleKey::new(STEP, CATEGORY, rule_code)
}

/// `pais_excluded`: biodiversity activities must be absent.
pub(super) fn biodiversity_excluded() -> RuleEdit {
    RuleEdit::new(
        key(EXCLUDED),
        "activities_affecting_biodiversity",
        "equal",
        Some(CriterionValue::Boolean(false)),
    )
}

/// `pais_upon_threshold`: scope 1 emissions at or below 60.
pub(super) fn scope_1_cap() -> RuleEdit {
    threshold_edit("scope_1_emissions", "less", 60.0)
}

pub(super) fn threshold_edit(code: &str, operator: &str, threshold: f64) -> RuleEdit {
    RuleEdit::new(
        key(THRESHOLD),
        code,
        operator,
        Some(CriterionValue::Number(threshold)),
    )
}

pub(super) fn scope_1_deletion() -> RuleDeletion {
    RuleDeletion::new(key(THRESHOLD), "scope_1_emissions")
}

pub(super) fn configured_session() -> MethodologySession {
    let mut session = session();
    session
        .add_rule(&biodiversity_excluded())
        .expect("biodiversity edit accepted");
    session.add_rule(&scope_1_cap()).expect("scope 1 edit accepted");
    session
}

pub(super) fn entity(id: &str, biodiversity: Value, scope_1: Value) -> Entity {
    Entity::new(id)
        .with_field("activities_affecting_biodiversity", biodiversity)
        .with_field("scope_1_emissions", scope_1)
}

pub(super) fn shared(session: MethodologySession) -> SharedSession {
    Arc::new(RwLock::new(session))
}

pub(super) fn router_for(session: &SharedSession) -> axum::Router {
    methodology_router(Arc::clone(session))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
