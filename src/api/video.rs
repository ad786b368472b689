use std::collections::HashSet;
use std::path::PathBuf;

use axum::{
    extract::{Extension, Multipart, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::analysis::{spawn_analysis_request, AnalysisClient};
use crate::api::middleware::BearerToken;
use crate::entities::{favorite, video};
use crate::error::ApiError;
use crate::sanitize::sanitize_filename;
use crate::storage::{build_object_key, BlobStore};

const MAX_FILES_PER_BATCH: usize = 3;
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

// One file part spooled to disk during multipart intake. The temp file is
// owned by the handling request and removed on every exit path.
struct PendingUpload {
    temp_path: PathBuf,
    original_name: String,
    content_type: String,
}

async fn remove_temp_files(uploads: &[PendingUpload]) {
    for upload in uploads {
        let _ = tokio::fs::remove_file(&upload.temp_path).await;
    }
}

pub async fn upload_videos(
    Extension(db): Extension<DatabaseConnection>,
    Extension(blobs): Extension<BlobStore>,
    Extension(analysis): Extension<AnalysisClient>,
    Extension(user_id): Extension<i32>,
    bearer: Option<Extension<BearerToken>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut title: Option<String> = None;
    let mut exercise_type: Option<String> = None;
    let mut pending: Vec<PendingUpload> = Vec::new();

    // 1. Multipart intake: text fields plus up to three file parts, each
    // spooled to its own temp file.
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => {
                remove_temp_files(&pending).await;
                return Err(ApiError::Validation(format!(
                    "Malformed multipart request: {}",
                    e
                )));
            }
        };

        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "title" => match field.text().await {
                Ok(v) => title = Some(v.trim().to_string()),
                Err(e) => {
                    remove_temp_files(&pending).await;
                    return Err(ApiError::Validation(format!("Failed to read title: {}", e)));
                }
            },
            "exerciseType" => match field.text().await {
                Ok(v) => exercise_type = Some(v.trim().to_string()),
                Err(e) => {
                    remove_temp_files(&pending).await;
                    return Err(ApiError::Validation(format!(
                        "Failed to read exercise type: {}",
                        e
                    )));
                }
            },
            "videos" => {
                if pending.len() >= MAX_FILES_PER_BATCH {
                    remove_temp_files(&pending).await;
                    return Err(ApiError::Validation(
                        "A maximum of 3 videos per upload is allowed.".to_string(),
                    ));
                }

                let original_name = field.file_name().unwrap_or("video.mp4").to_string();
                let content_type = field.content_type().map(|s| s.to_string()).unwrap_or_else(
                    || {
                        mime_guess::from_path(&original_name)
                            .first_or_octet_stream()
                            .to_string()
                    },
                );

                let data = match field.bytes().await {
                    Ok(d) => d,
                    Err(e) => {
                        remove_temp_files(&pending).await;
                        return Err(ApiError::Validation(format!(
                            "Failed to read video data: {}",
                            e
                        )));
                    }
                };

                if data.len() > MAX_UPLOAD_BYTES {
                    remove_temp_files(&pending).await;
                    return Err(ApiError::PayloadTooLarge(
                        "Each video must be 100 MB or smaller.".to_string(),
                    ));
                }

                let temp_path =
                    std::env::temp_dir().join(format!("formcheck_{}_{}", user_id, Uuid::new_v4()));
                if let Err(e) = tokio::fs::write(&temp_path, &data).await {
                    remove_temp_files(&pending).await;
                    return Err(ApiError::Internal(format!(
                        "Failed to spool upload to disk: {}",
                        e
                    )));
                }

                pending.push(PendingUpload {
                    temp_path,
                    original_name,
                    content_type,
                });
            }
            _ => {}
        }
    }

    // 2. Whole-request validation before any blob or row is touched.
    if pending.is_empty() {
        return Err(ApiError::Validation("No videos were received.".to_string()));
    }
    let (title, exercise_type) = match (title.as_deref(), exercise_type.as_deref()) {
        (Some(t), Some(e)) if !t.is_empty() && !e.is_empty() => (t.to_string(), e.to_string()),
        _ => {
            remove_temp_files(&pending).await;
            return Err(ApiError::Validation(
                "Missing title or exercise type.".to_string(),
            ));
        }
    };

    let token = bearer.map(|Extension(BearerToken(t))| t);

    // 3. Sequential per-file pipeline, fail fast: the first error aborts the
    // batch; blobs and rows already created are kept, remaining temp files
    // are dropped.
    let mut uploaded_urls = Vec::with_capacity(pending.len());
    for index in 0..pending.len() {
        let upload = &pending[index];
        let result = store_and_register(
            &db,
            &blobs,
            &analysis,
            user_id,
            &title,
            &exercise_type,
            token.as_deref(),
            upload,
        )
        .await;
        let _ = tokio::fs::remove_file(&upload.temp_path).await;

        match result {
            Ok(url) => uploaded_urls.push(url),
            Err(e) => {
                remove_temp_files(&pending[index + 1..]).await;
                return Err(e);
            }
        }
    }

    tracing::Span::current()
        .record("table", "videos")
        .record("action", "upload_videos")
        .record("user_id", user_id)
        .record("business_event", "Videos uploaded");

    metrics::counter!("formcheck_videos_uploaded_total").increment(uploaded_urls.len() as u64);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "uploaded": uploaded_urls,
            "message": "Videos uploaded, analysis requested."
        })),
    )
        .into_response())
}

// Blob upload must complete before the metadata insert, and the insert
// before the hand-off is attempted. A failed insert deletes the freshly
// uploaded blob so no storage is orphaned.
#[allow(clippy::too_many_arguments)]
async fn store_and_register(
    db: &DatabaseConnection,
    blobs: &BlobStore,
    analysis: &AnalysisClient,
    user_id: i32,
    title: &str,
    exercise_type: &str,
    token: Option<&str>,
    upload: &PendingUpload,
) -> Result<String, ApiError> {
    let data = tokio::fs::read(&upload.temp_path)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to read spooled upload: {}", e)))?;

    let key = build_object_key(
        user_id,
        &sanitize_filename(&upload.original_name),
        Utc::now().timestamp_millis(),
    );

    if let Err(e) = blobs.upload(&key, data, &upload.content_type).await {
        metrics::counter!("formcheck_upload_errors_total", "stage" => "blob").increment(1);
        return Err(e.into());
    }

    let public_url = blobs.public_url(&key);

    let now = Utc::now().with_timezone(&chrono::FixedOffset::east_opt(0).unwrap());
    let row = video::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        storage_key: Set(key.clone()),
        public_url: Set(public_url.clone()),
        title: Set(title.to_string()),
        exercise_type: Set(exercise_type.to_string()),
        status: Set(video::STATUS_UPLOADED.to_string()),
        analysis_result: Set(None),
        failure_reason: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let saved = match row.insert(db).await {
        Ok(v) => v,
        Err(e) => {
            // Compensating delete; losing it only strands a blob, so best effort.
            if let Err(del) = blobs.delete(&key).await {
                tracing::warn!(key = %key, error = %del, "orphaned blob cleanup failed");
            }
            metrics::counter!("formcheck_upload_errors_total", "stage" => "db").increment(1);
            return Err(ApiError::MetadataStore(e));
        }
    };

    spawn_analysis_request(
        analysis.clone(),
        saved.id,
        public_url.clone(),
        exercise_type.to_string(),
        token.map(|t| t.to_string()),
    );

    Ok(public_url)
}

#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    10
}

#[derive(Debug, Serialize)]
pub struct VideoListItem {
    #[serde(flatten)]
    pub video: video::Model,
    pub is_favorited: bool,
}

#[derive(Debug, Serialize)]
pub struct VideoListResponse {
    pub videos: Vec<VideoListItem>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

pub async fn list_user_videos(
    Extension(db): Extension<DatabaseConnection>,
    Extension(user_id): Extension<i32>,
    Query(params): Query<PaginationParams>,
) -> Result<Response, ApiError> {
    let page = params.page.max(1);
    let per_page = params.per_page.clamp(1, 100);

    let paginator = video::Entity::find()
        .filter(video::Column::UserId.eq(user_id))
        .order_by_desc(video::Column::CreatedAt)
        .paginate(&db, per_page);

    let total_pages = paginator.num_pages().await?;
    let videos = paginator.fetch_page(page - 1).await?;

    let total = video::Entity::find()
        .filter(video::Column::UserId.eq(user_id))
        .count(&db)
        .await?;

    let favorite_ids: HashSet<Uuid> = favorite::Entity::find()
        .filter(favorite::Column::UserId.eq(user_id))
        .all(&db)
        .await?
        .into_iter()
        .map(|f| f.video_id)
        .collect();

    let videos = videos
        .into_iter()
        .map(|v| VideoListItem {
            is_favorited: favorite_ids.contains(&v.id),
            video: v,
        })
        .collect();

    Ok((
        StatusCode::OK,
        Json(VideoListResponse {
            videos,
            total,
            page,
            per_page,
            total_pages,
        }),
    )
        .into_response())
}

pub async fn get_video(
    Extension(db): Extension<DatabaseConnection>,
    Extension(user_id): Extension<i32>,
    Path(video_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let found = video::Entity::find_by_id(video_id)
        .one(&db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Video not found.".to_string()))?;

    if found.user_id != user_id {
        return Err(ApiError::Forbidden(
            "You do not have permission to view this video.".to_string(),
        ));
    }

    Ok((StatusCode::OK, Json(json!({"success": true, "video": found}))).into_response())
}

pub async fn delete_video(
    Extension(db): Extension<DatabaseConnection>,
    Extension(blobs): Extension<BlobStore>,
    Extension(user_id): Extension<i32>,
    Path(video_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let found = video::Entity::find_by_id(video_id)
        .one(&db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Video not found.".to_string()))?;

    if found.user_id != user_id {
        return Err(ApiError::Forbidden(
            "You do not have permission to delete this video.".to_string(),
        ));
    }

    // Blob first, best effort: a blob that is already gone should not block
    // removing the row.
    if let Err(e) = blobs.delete(&found.storage_key).await {
        tracing::warn!(key = %found.storage_key, error = %e, "blob delete failed (may already be gone)");
    }

    found.delete(&db).await?;

    tracing::Span::current()
        .record("table", "videos")
        .record("action", "delete_video")
        .record("user_id", user_id);

    Ok((
        StatusCode::OK,
        Json(json!({"success": true, "message": "Video deleted."})),
    )
        .into_response())
}

// Polled by the gallery until status leaves "uploaded"/"processing".
pub async fn get_video_status(
    Extension(db): Extension<DatabaseConnection>,
    Path(video_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let found = video::Entity::find_by_id(video_id)
        .one(&db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Video not found.".to_string()))?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": found.status,
            "analysis_result": found.analysis_result,
            "error": found.failure_reason,
        })),
    )
        .into_response())
}
