use anyhow::{anyhow, bail, Context};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use trainer_core::metrics::{record_configure, record_verification};
use trainer_core::{
    render_metrics, ConfigStore, DocumentKind, FederatedConfig, JobConfiguration, JobId, LocalConfig,
    MalformedConfigError, ModelSnapshot, ModelStateChecker,
};

use crate::error::ApiError;
use crate::trainer::{TrainingReport, TrainingRunner};
use crate::AppState;

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "TRAINING API IS FUNCTIONAL" }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "Healthy" }))
}

pub async fn metrics() -> Response {
    match render_metrics() {
        Ok(body) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => {
            error!(error = %e, "metrics_encode_failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("encode error: {e}")).into_response()
        }
    }
}

/// Register (or replace) a job's local, federated and model documents.
pub async fn configure(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let outcome: anyhow::Result<JobId> = async {
        let Json(body) = body.map_err(|e| anyhow!(e.body_text()))?;
        let store = state.store.clone();
        tokio::task::spawn_blocking(move || register(store.as_ref(), body)).await?
    }
    .await;

    match outcome {
        Ok(job_id) => {
            record_configure("ok");
            info!(job_id = %job_id, "training_procedure_registered");
            Ok(Json(json!({
                "message": format!("Successfully registered the training procedure for job_id: {job_id}")
            })))
        }
        Err(e) => {
            record_configure("failed");
            error!(error = ?e, "training_procedure_registration_failed");
            Err(ApiError::Configure(e))
        }
    }
}

fn register(store: &dyn ConfigStore, mut body: Value) -> anyhow::Result<JobId> {
    let request = body.as_object_mut().context("request body must be a mapping")?;
    let local = LocalConfig::from_value(request.remove("local").context("missing local configuration")?)?;
    let federated_doc = request.remove("federated").context("missing federated configuration")?;
    let federated: FederatedConfig =
        serde_json::from_value(federated_doc.clone()).context("invalid federated configuration")?;
    let snapshot = match request.remove("model") {
        Some(Value::Object(model)) => Some(ModelSnapshot::from_tensors(&model)?),
        None | Some(Value::Null) => None,
        Some(_) => bail!("model must be a mapping of parameter name to values"),
    };

    let job = JobConfiguration { local, federated };
    let job_id = job.job_id().clone();
    store.put(&job_id, DocumentKind::LocalTraining, &serde_json::to_value(&job.local)?)?;
    store.put(&job_id, DocumentKind::FederatedTraining, &federated_doc)?;
    match snapshot {
        Some(snapshot) => store.put(&job_id, DocumentKind::Model, &snapshot.to_document())?,
        None => store.remove(&job_id, DocumentKind::Model)?,
    }
    Ok(job_id)
}

/// Verify a training payload against the job's registered state, then hand it to the runner.
pub async fn train(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(payload) = body.map_err(|e| {
        warn!(error = %e.body_text(), "train_request_rejected");
        ApiError::BadRequest(e.body_text())
    })?;
    let job_id = payload
        .get("job_id")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::BadRequest("missing job_id".into()))
        .and_then(|id| JobId::new(id).map_err(ApiError::from))?;

    let store = state.store.clone();
    let trainer = state.trainer.clone();
    let id = job_id.clone();
    let outcome = tokio::task::spawn_blocking(move || verify_and_run(store.as_ref(), trainer.as_ref(), &id, &payload))
        .await
        .map_err(|e| ApiError::Internal(e.into()))
        .and_then(|result| result);

    match outcome {
        Ok(report) => Ok(Json(json!({
            "message": format!("Successfully verified the training payload for job_id: {}", report.job_id),
            "rounds": report.rounds,
        }))),
        Err(e) => {
            warn!(job_id = %job_id, status = %e.status(), error = %e, "training_request_failed");
            Err(e)
        }
    }
}

fn verify_and_run(
    store: &dyn ConfigStore,
    trainer: &dyn TrainingRunner,
    job_id: &JobId,
    payload: &Value,
) -> Result<TrainingReport, ApiError> {
    let local = store.get(job_id, DocumentKind::LocalTraining)?;
    let model = store.get(job_id, DocumentKind::Model)?;
    let federated = store.get(job_id, DocumentKind::FederatedTraining)?;

    let checker = ModelStateChecker::from_documents(local, &model)?;
    if let Err(e) = checker.verify(payload) {
        record_verification(e.kind());
        warn!(job_id = %job_id, kind = e.kind(), error = %e, "training_payload_rejected");
        return Err(e.into());
    }
    record_verification("ok");

    let federated: FederatedConfig = serde_json::from_value(federated)
        .map_err(|e| MalformedConfigError::new(DocumentKind::FederatedTraining.name(), e.to_string()))?;
    let job = JobConfiguration { local: checker.local().clone(), federated };
    trainer.run(&job, payload).map_err(ApiError::Internal)
}
