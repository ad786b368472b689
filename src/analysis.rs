use reqwest::Client;
use serde_json::{json, Value};
use std::env;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("analysis request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("analysis service returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Client for the external form-analysis service. One POST per uploaded
/// video; the service reports back through the analysis webhook.
#[derive(Clone)]
pub struct AnalysisClient {
    client: Client,
    base_url: String,
}

impl AnalysisClient {
    pub fn from_env() -> Self {
        let base_url =
            env::var("AI_SERVICE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
        Self::new(base_url)
    }

    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, base_url }
    }

    pub async fn request_analysis(
        &self,
        video_id: Uuid,
        public_url: &str,
        exercise_type: &str,
        bearer_token: &str,
    ) -> Result<(), HandoffError> {
        let url = format!("{}/analyze/", self.base_url.trim_end_matches('/'));
        let body = handoff_body(video_id, public_url, exercise_type);

        let response = self
            .client
            .post(&url)
            .bearer_auth(bearer_token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(HandoffError::Status { status, body });
        }

        Ok(())
    }
}

/// Fire-and-forget hand-off. The upload response never waits on this; a
/// missing credential skips the call entirely and a failed call is logged,
/// leaving the row in its pre-analysis status.
pub fn spawn_analysis_request(
    client: AnalysisClient,
    video_id: Uuid,
    public_url: String,
    exercise_type: String,
    bearer_token: Option<String>,
) {
    let Some(token) = bearer_token else {
        tracing::warn!(
            video_id = %video_id,
            "no bearer credential on request, skipping analysis hand-off"
        );
        metrics::counter!("formcheck_analysis_handoffs_skipped_total").increment(1);
        return;
    };

    tokio::spawn(async move {
        match client
            .request_analysis(video_id, &public_url, &exercise_type, &token)
            .await
        {
            Ok(()) => {
                tracing::info!(video_id = %video_id, "analysis hand-off accepted");
                metrics::counter!("formcheck_analysis_handoffs_total").increment(1);
            }
            Err(e) => {
                tracing::error!(video_id = %video_id, error = %e, "analysis hand-off failed");
                metrics::counter!("formcheck_analysis_handoff_failures_total").increment(1);
            }
        }
    });
}

fn handoff_body(video_id: Uuid, public_url: &str, exercise_type: &str) -> Value {
    json!({
        "video_route": public_url,
        "exercise": exercise_type,
        "video_id": video_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handoff_body_matches_analysis_service_contract() {
        let id = Uuid::new_v4();
        let body = handoff_body(id, "https://storage.googleapis.com/b/42/1_a.mp4", "legs");

        assert_eq!(
            body["video_route"],
            json!("https://storage.googleapis.com/b/42/1_a.mp4")
        );
        assert_eq!(body["exercise"], json!("legs"));
        assert_eq!(body["video_id"], json!(id.to_string()));
    }

    #[test]
    fn status_error_keeps_response_context() {
        let err = HandoffError::Status {
            status: 422,
            body: "field required: video_route".into(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("422"));
        assert!(rendered.contains("video_route"));
    }
}
