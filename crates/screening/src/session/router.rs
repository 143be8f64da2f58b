use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;

use super::{BatchPolicy, MethodologySession};
use crate::classification::{ensure_unique, Entity};
use crate::error::AppError;
use crate::methodology::{MethodologyInstance, RuleDeletion, RuleEdit};

/// Session shared by request handlers. Edits take the write lock; a classification
/// run holds the read lock until it finishes, so edits never land mid-run.
pub type SharedSession = Arc<RwLock<MethodologySession>>;

/// Body accepted by the rule submission route: one edit or a batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RuleSubmission {
    Batch {
        edits: Vec<RuleEdit>,
        #[serde(default)]
        policy: BatchPolicy,
    },
    Single(RuleEdit),
}

/// Router builder exposing methodology editing and screening endpoints.
pub fn methodology_router(session: SharedSession) -> Router {
    Router::new()
        .route("/api/v1/methodology/root", get(root_handler))
        .route(
            "/api/v1/methodology",
            get(instance_handler).put(replace_handler),
        )
        .route("/api/v1/methodology/validate", post(validate_handler))
        .route(
            "/api/v1/methodology/rules",
            post(add_rules_handler).delete(delete_rule_handler),
        )
        .route("/api/v1/methodology/conditions", get(conditions_handler))
        .route("/api/v1/screening/classify", post(classify_handler))
        .with_state(session)
}

pub(crate) async fn root_handler(State(session): State<SharedSession>) -> Response {
    let root = session.read().await.shared_root();
    (StatusCode::OK, Json(&*root)).into_response()
}

pub(crate) async fn instance_handler(State(session): State<SharedSession>) -> Response {
    let session = session.read().await;
    (StatusCode::OK, Json(session.instance())).into_response()
}

pub(crate) async fn replace_handler(
    State(session): State<SharedSession>,
    Json(instance): Json<MethodologyInstance>,
) -> Result<Response, AppError> {
    let mut session = session.write().await;
    session.replace_instance(instance)?;
    Ok((StatusCode::OK, Json(session.instance())).into_response())
}

pub(crate) async fn validate_handler(
    State(session): State<SharedSession>,
    Json(edit): Json<RuleEdit>,
) -> Response {
    let session = session.read().await;
    match session.validate(&edit) {
        Ok(()) => (StatusCode::OK, Json(json!({ "valid": true }))).into_response(),
        Err(error) => {
            let payload = json!({
                "valid": false,
                "kind": error.kind(),
                "error": error.to_string(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn add_rules_handler(
    State(session): State<SharedSession>,
    Json(submission): Json<RuleSubmission>,
) -> Result<Response, AppError> {
    let mut session = session.write().await;
    match submission {
        RuleSubmission::Single(edit) => {
            let outcome = session.add_rule(&edit)?;
            let payload = json!({
                "outcome": outcome,
                "methodology": session.instance(),
            });
            Ok((StatusCode::OK, Json(payload)).into_response())
        }
        RuleSubmission::Batch { edits, policy } => {
            let report = session.apply_batch(&edits, policy)?;
            let payload = json!({
                "applied": report.applied,
                "rejected": report.rejected,
                "methodology": session.instance(),
            });
            Ok((StatusCode::OK, Json(payload)).into_response())
        }
    }
}

pub(crate) async fn delete_rule_handler(
    State(session): State<SharedSession>,
    Json(deletion): Json<RuleDeletion>,
) -> Result<Response, AppError> {
    let mut session = session.write().await;
    let outcome = session.delete_rule(&deletion)?;
    let payload = json!({
        "outcome": outcome,
        "methodology": session.instance(),
    });
    Ok((StatusCode::OK, Json(payload)).into_response())
}

pub(crate) async fn conditions_handler(State(session): State<SharedSession>) -> Response {
    let conditions = session.read().await.compile();
    (StatusCode::OK, Json(conditions)).into_response()
}

pub(crate) async fn classify_handler(
    State(session): State<SharedSession>,
    Json(entities): Json<Vec<Entity>>,
) -> Result<Response, AppError> {
    ensure_unique(&entities)?;
    let session = session.read().await;
    let report = session.classify(entities).await;
    Ok((StatusCode::OK, Json(report)).into_response())
}
