use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, ModelTrait, QueryFilter,
    Set,
};
use serde_json::json;
use uuid::Uuid;

use crate::entities::favorite;
use crate::error::ApiError;

#[derive(serde::Deserialize)]
pub struct ToggleFavoriteRequest {
    #[serde(rename = "videoId")]
    video_id: Uuid,
}

/// Flip favorite membership for (caller, video). The composite primary key
/// on the table is the duplicate guard; a concurrent double-insert comes
/// back as a unique violation and is reported as already-favorited.
pub async fn toggle_favorite(
    Extension(db): Extension<DatabaseConnection>,
    Extension(user_id): Extension<i32>,
    Json(payload): Json<ToggleFavoriteRequest>,
) -> Result<Response, ApiError> {
    let existing = favorite::Entity::find_by_id((user_id, payload.video_id))
        .one(&db)
        .await?;

    if let Some(row) = existing {
        row.delete(&db).await?;

        metrics::counter!("formcheck_favorites_toggled_total", "action" => "removed").increment(1);
        return Ok(toggle_response("removed", false));
    }

    let row = favorite::ActiveModel {
        user_id: Set(user_id),
        video_id: Set(payload.video_id),
        created_at: Set(Utc::now().with_timezone(&chrono::FixedOffset::east_opt(0).unwrap())),
    };

    match row.insert(&db).await {
        Ok(_) => {
            metrics::counter!("formcheck_favorites_toggled_total", "action" => "added")
                .increment(1);
            Ok(toggle_response("added", true))
        }
        // Lost a race against another toggle from the same user; the row is
        // there, which is what "added" means.
        Err(e) if is_unique_violation(&e) => Ok(toggle_response("added", true)),
        Err(e) if is_foreign_key_violation(&e) => Err(ApiError::Validation(
            "That video no longer exists or was deleted.".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

pub async fn list_favorites(
    Extension(db): Extension<DatabaseConnection>,
    Extension(user_id): Extension<i32>,
) -> Result<Response, ApiError> {
    let video_ids: Vec<Uuid> = favorite::Entity::find()
        .filter(favorite::Column::UserId.eq(user_id))
        .all(&db)
        .await?
        .into_iter()
        .map(|f| f.video_id)
        .collect();

    Ok((
        StatusCode::OK,
        Json(json!({"success": true, "favorites": video_ids})),
    )
        .into_response())
}

fn toggle_response(status: &str, favorited: bool) -> Response {
    (
        StatusCode::OK,
        Json(json!({"success": true, "status": status, "favorited": favorited})),
    )
        .into_response()
}

fn is_unique_violation(err: &DbErr) -> bool {
    err.to_string()
        .contains("duplicate key value violates unique constraint")
}

fn is_foreign_key_violation(err: &DbErr) -> bool {
    err.to_string().contains("violates foreign key constraint")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_postgres_unique_violation() {
        let err = DbErr::Custom(
            "error returned from database: duplicate key value violates unique constraint \"pk_video_favorites\"".to_string(),
        );
        assert!(is_unique_violation(&err));
        assert!(!is_foreign_key_violation(&err));
    }

    #[test]
    fn recognizes_postgres_foreign_key_violation() {
        let err = DbErr::Custom(
            "error returned from database: insert or update on table \"video_favorites\" violates foreign key constraint \"fk_video_favorites_video_id\"".to_string(),
        );
        assert!(is_foreign_key_violation(&err));
        assert!(!is_unique_violation(&err));
    }
}
