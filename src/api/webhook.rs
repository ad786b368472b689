use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde_json::json;
use uuid::Uuid;

use crate::entities::video;
use crate::error::ApiError;

pub const WEBHOOK_TOKEN_HEADER: &str = "x-analysis-token";

#[derive(Debug, serde::Deserialize)]
pub struct AnalysisCallback {
    pub video_id: Uuid,
    pub status: String,
    pub analysis_result: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Reported by the analysis service once it has picked up or finished a
/// video. The only writer of post-upload status transitions.
pub async fn analysis_callback(
    Extension(db): Extension<DatabaseConnection>,
    headers: HeaderMap,
    Json(payload): Json<AnalysisCallback>,
) -> Result<Response, ApiError> {
    verify_webhook_token(&headers)?;
    validate_callback(&payload).map_err(ApiError::Validation)?;

    let found = video::Entity::find_by_id(payload.video_id)
        .one(&db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Video not found.".to_string()))?;

    let mut active: video::ActiveModel = found.into();
    active.status = Set(payload.status.clone());
    match payload.status.as_str() {
        video::STATUS_ANALYZED => {
            active.analysis_result = Set(payload.analysis_result.clone());
            active.failure_reason = Set(None);
        }
        video::STATUS_FAILED => {
            active.analysis_result = Set(None);
            active.failure_reason = Set(payload.error.clone());
        }
        _ => {
            active.analysis_result = Set(None);
            active.failure_reason = Set(None);
        }
    }
    active.updated_at = Set(Utc::now().with_timezone(&chrono::FixedOffset::east_opt(0).unwrap()));
    active.update(&db).await?;

    tracing::info!(video_id = %payload.video_id, status = %payload.status, "analysis status recorded");
    metrics::counter!("formcheck_analysis_results_total", "status" => payload.status.clone())
        .increment(1);

    Ok((StatusCode::OK, Json(json!({"success": true}))).into_response())
}

fn verify_webhook_token(headers: &HeaderMap) -> Result<(), ApiError> {
    let expected = match std::env::var("ANALYSIS_WEBHOOK_TOKEN") {
        Ok(v) if !v.is_empty() => v,
        _ => return Ok(()),
    };

    let presented = headers
        .get(WEBHOOK_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if presented == expected {
        Ok(())
    } else {
        Err(ApiError::Unauthorized(
            "Invalid analysis webhook token.".to_string(),
        ))
    }
}

/// Enforces the status vocabulary and the analysis_result-iff-analyzed
/// invariant, and insists every failure carries a reason so it stays
/// diagnosable.
fn validate_callback(payload: &AnalysisCallback) -> Result<(), String> {
    match payload.status.as_str() {
        video::STATUS_PROCESSING => {
            if payload.analysis_result.is_some() {
                return Err("A processing update must not carry an analysis result.".to_string());
            }
        }
        video::STATUS_ANALYZED => {
            if payload.analysis_result.is_none() {
                return Err("An analyzed update must carry an analysis result.".to_string());
            }
        }
        video::STATUS_FAILED => {
            if payload.error.as_deref().unwrap_or("").is_empty() {
                return Err("A failed update must carry an error reason.".to_string());
            }
            if payload.analysis_result.is_some() {
                return Err("A failed update must not carry an analysis result.".to_string());
            }
        }
        other => {
            return Err(format!(
                "Unknown status '{}': expected processing, analyzed or failed.",
                other
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn callback(status: &str, result: Option<serde_json::Value>, error: Option<&str>) -> AnalysisCallback {
        AnalysisCallback {
            video_id: Uuid::new_v4(),
            status: status.to_string(),
            analysis_result: result,
            error: error.map(String::from),
        }
    }

    #[test]
    fn analyzed_requires_a_result_payload() {
        assert!(validate_callback(&callback("analyzed", None, None)).is_err());
        assert!(
            validate_callback(&callback("analyzed", Some(json!({"reps": 8})), None)).is_ok()
        );
    }

    #[test]
    fn processing_must_not_carry_a_result() {
        assert!(validate_callback(&callback("processing", None, None)).is_ok());
        assert!(
            validate_callback(&callback("processing", Some(json!({"reps": 8})), None)).is_err()
        );
    }

    #[test]
    fn failed_requires_a_reason_and_no_result() {
        assert!(validate_callback(&callback("failed", None, None)).is_err());
        assert!(validate_callback(&callback("failed", None, Some(""))).is_err());
        assert!(validate_callback(&callback("failed", None, Some("could not open video"))).is_ok());
        assert!(validate_callback(&callback(
            "failed",
            Some(json!({"partial": true})),
            Some("boom")
        ))
        .is_err());
    }

    #[test]
    fn unknown_statuses_are_rejected() {
        assert!(validate_callback(&callback("uploaded", None, None)).is_err());
        assert!(validate_callback(&callback("PROCESSED", None, None)).is_err());
        assert!(validate_callback(&callback("", None, None)).is_err());
    }
}
