//! Post-verification training step. No training happens here; the stub only acknowledges the job.

use serde::Serialize;
use serde_json::Value;
use tracing::info;
use trainer_core::{JobConfiguration, JobId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub job_id: JobId,
    pub rounds: Option<u64>,
}

pub trait TrainingRunner: Send + Sync {
    /// Called only after the payload has passed verification.
    fn run(&self, job: &JobConfiguration, payload: &Value) -> anyhow::Result<TrainingReport>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalTrainingStub;

impl TrainingRunner for LocalTrainingStub {
    fn run(&self, job: &JobConfiguration, payload: &Value) -> anyhow::Result<TrainingReport> {
        let parameters = payload.get("model").and_then(Value::as_object).map_or(0, |m| m.len());
        let rounds = job.rounds();
        info!(job_id = %job.job_id(), ?rounds, parameters, "training_acknowledged");
        Ok(TrainingReport { job_id: job.job_id().clone(), rounds })
    }
}
