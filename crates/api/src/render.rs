//! HTTP bridge to the render service that executes generation stages.
//!
//! The engine stays agnostic of how stages run; this adapter forwards
//! each stage to the render service and maps transport/status failures
//! onto the transient/permanent taxonomy the retry policy consumes.
//! Requests carry the stage idempotency key so the service can dedupe
//! re-runs after a retry or a lease re-delivery.

use async_trait::async_trait;
use serde::Deserialize;

use scenecast_core::pipeline::{Pipeline, PipelineError, Stage, StageContext, StageOutcome};

/// Stage plan for a script-to-video job. Render dominates wall-clock
/// time, so it carries most of the progress weight.
const STAGE_PLAN: [(&str, f64); 4] = [
    ("voiceover", 0.15),
    ("assemble", 0.20),
    ("render", 0.55),
    ("finalize", 0.10),
];

/// Executes pipeline stages against the render service's HTTP API.
pub struct RenderServicePipeline {
    client: reqwest::Client,
    base_url: String,
}

impl RenderServicePipeline {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

/// Body returned by `POST /stages/{name}`.
#[derive(Deserialize)]
struct StageResponse {
    #[serde(default)]
    scratch: serde_json::Value,
    result: Option<scenecast_core::job::RawJobResult>,
}

/// Whether an HTTP status from the render service is worth retrying.
fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status.is_server_error()
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl Pipeline for RenderServicePipeline {
    fn stages(&self, _parameters: &serde_json::Value) -> Vec<Stage> {
        STAGE_PLAN
            .iter()
            .map(|&(name, weight)| Stage::new(name, weight))
            .collect()
    }

    async fn execute_stage(&self, ctx: StageContext<'_>) -> Result<StageOutcome, PipelineError> {
        let url = format!("{}/stages/{}", self.base_url, ctx.stage_name);
        let body = serde_json::json!({
            "job_id": ctx.job_id,
            "idempotency_key": ctx.idempotency_key(),
            "attempt": ctx.retry_count,
            "parameters": ctx.parameters,
            "scratch": ctx.scratch,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Transient(format!("Render service unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let message = format!("Render service returned {status} for {}: {detail}", ctx.stage_name);
            return if is_transient_status(status) {
                Err(PipelineError::Transient(message))
            } else {
                Err(PipelineError::Permanent(message))
            };
        }

        let parsed: StageResponse = response.json().await.map_err(|e| {
            PipelineError::Permanent(format!(
                "Render service returned an unparseable body for {}: {e}",
                ctx.stage_name
            ))
        })?;

        Ok(StageOutcome {
            scratch: parsed.scratch,
            result: parsed.result,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
