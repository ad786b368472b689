use crate::api::middleware::ACCESS_TOKEN_COOKIE;
use crate::entities::{user, video};
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, Set,
};
use serde_json::json;
use tower_cookies::{Cookie, Cookies};

#[derive(serde::Deserialize)]
pub struct UpdateUserRequest {
    #[serde(rename = "userName")]
    user_name: Option<String>,
    #[serde(rename = "fullName")]
    full_name: Option<String>,
    age: Option<i32>,
    email: Option<String>,
}

pub async fn get_user(
    Extension(db): Extension<DatabaseConnection>,
    Extension(user_id): Extension<i32>,
) -> Response {
    let found = match user::Entity::find_by_id(user_id).one(&db).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"success": false, "error": "User not found"})),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "profile lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Database error, please try again later."})),
            )
                .into_response();
        }
    };

    let video_count = video::Entity::find()
        .filter(video::Column::UserId.eq(user_id))
        .count(&db)
        .await
        .unwrap_or(0);

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "user": {
                "id": found.id,
                "email": found.email,
                "userName": found.user_name,
                "fullName": found.full_name,
                "age": found.age,
                "created_at": found.created_at,
            },
            "videoCount": video_count,
        })),
    )
        .into_response()
}

pub async fn update_user(
    Extension(db): Extension<DatabaseConnection>,
    Extension(user_id): Extension<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> Response {
    let found = match user::Entity::find_by_id(user_id).one(&db).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"success": false, "error": "User not found"})),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "profile lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Database error, please try again later."})),
            )
                .into_response();
        }
    };

    let mut active = found.into_active_model();
    if let Some(user_name) = payload.user_name {
        active.user_name = Set(user_name);
    }
    if let Some(full_name) = payload.full_name {
        active.full_name = Set(full_name);
    }
    if let Some(age) = payload.age {
        active.age = Set(age);
    }
    if let Some(email) = payload.email {
        active.email = Set(email);
    }
    active.updated_at = Set(chrono::Utc::now().naive_utc());

    match active.update(&db).await {
        Ok(u) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "user": {"id": u.id, "email": u.email, "userName": u.user_name, "fullName": u.full_name, "age": u.age}
            })),
        )
            .into_response(),
        Err(e) => {
            if e.to_string()
                .contains("duplicate key value violates unique constraint")
            {
                return (
                    StatusCode::CONFLICT,
                    Json(json!({"success": false, "error": "That username or email is already taken."})),
                )
                    .into_response();
            }
            tracing::error!(error = %e, "profile update failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Database error, please try again later."})),
            )
                .into_response()
        }
    }
}

// Cascades wipe the user's videos and favorites rows; their blobs are left
// for a storage lifecycle policy to reap.
pub async fn delete_user(
    Extension(db): Extension<DatabaseConnection>,
    Extension(user_id): Extension<i32>,
    cookies: Cookies,
) -> Response {
    match user::Entity::delete_by_id(user_id).exec(&db).await {
        Ok(res) if res.rows_affected == 0 => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "error": "User not found"})),
        )
            .into_response(),
        Ok(_) => {
            let mut cookie = Cookie::new(ACCESS_TOKEN_COOKIE, "");
            cookie.set_path("/");
            cookie.make_removal();
            cookies.add(cookie);

            metrics::gauge!("formcheck_users_total").decrement(1.0);

            (
                StatusCode::OK,
                Json(json!({"success": true, "message": "Account deleted"})),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "account deletion failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Database error, please try again later."})),
            )
                .into_response()
        }
    }
}
