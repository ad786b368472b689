use crate::api::middleware::ACCESS_TOKEN_COOKIE;
use crate::entities::user;
use crate::notifications;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set,
};
use serde_json::json;
use tower_cookies::{Cookie, Cookies};
use tracing::field::display;

const DUPLICATE_KEY_FRAGMENT: &str = "duplicate key value violates unique constraint";

#[derive(serde::Deserialize)]
pub struct RegisterRequest {
    email: Option<String>,
    password: Option<String>,
    #[serde(rename = "userName")]
    user_name: Option<String>,
    #[serde(rename = "fullName")]
    full_name: Option<String>,
    age: Option<i32>,
}

pub async fn register(
    Extension(db): Extension<DatabaseConnection>,
    Json(payload): Json<RegisterRequest>,
) -> Response {
    let (email, password, user_name, full_name, age) = match (
        payload.email,
        payload.password,
        payload.user_name,
        payload.full_name,
        payload.age,
    ) {
        (Some(e), Some(p), Some(u), Some(f), Some(a))
            if !e.is_empty() && !p.is_empty() && !u.is_empty() && !f.is_empty() =>
        {
            (e, p, u, f, a)
        }
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"success": false, "error": "Missing required fields"})),
            )
                .into_response()
        }
    };

    if !is_plausible_email(&email) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "Please enter a valid email address (name@domain.com)"})),
        )
            .into_response();
    }

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => hash.to_string(),
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Failed to hash password"})),
            )
                .into_response()
        }
    };

    let now = chrono::Utc::now().naive_utc();
    let new_user = user::ActiveModel {
        email: Set(email),
        password_hash: Set(password_hash),
        user_name: Set(user_name),
        full_name: Set(full_name),
        age: Set(age),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    match new_user.insert(&db).await {
        Ok(u) => {
            tracing::Span::current()
                .record("table", "users")
                .record("action", "register_user")
                .record("user_id", u.id)
                .record("user_email", &u.email)
                .record("business_event", "User registered successfully")
                .record("error", tracing::field::Empty);

            metrics::counter!("formcheck_users_registered_total").increment(1);
            metrics::gauge!("formcheck_users_total").increment(1.0);

            (
                StatusCode::CREATED,
                Json(json!({
                    "success": true,
                    "user": {"id": u.id, "email": u.email, "userName": u.user_name}
                })),
            )
                .into_response()
        }
        Err(e) => {
            // Postgres 23505 surfaces as a duplicate-key message
            let error_msg = e.to_string();
            if error_msg.contains(DUPLICATE_KEY_FRAGMENT) {
                tracing::Span::current()
                    .record("table", "users")
                    .record("action", "register_user_failed")
                    .record("error", "duplicate_identity");

                return (
                    StatusCode::CONFLICT,
                    Json(json!({"success": false, "error": "Email or username already in use"})),
                )
                    .into_response();
            }

            tracing::Span::current()
                .record("table", "users")
                .record("action", "register_user_error")
                .record("error", display(&e));

            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Database error, please try again later."})),
            )
                .into_response()
        }
    }
}

#[derive(serde::Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

pub async fn login(
    Extension(db): Extension<DatabaseConnection>,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> Response {
    let found = match user::Entity::find()
        .filter(user::Column::Email.eq(payload.email.clone()))
        .one(&db)
        .await
    {
        Ok(Some(u)) => u,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"success": false, "error": "Invalid email or password"})),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "login lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Database error, please try again later."})),
            )
                .into_response();
        }
    };

    let parsed_hash = match PasswordHash::new(&found.password_hash) {
        Ok(h) => h,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Invalid password hash in DB"})),
            )
                .into_response()
        }
    };

    if Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        tracing::Span::current()
            .record("table", "users")
            .record("action", "login_user_failed")
            .record("error", "invalid_credentials");

        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "error": "Invalid email or password"})),
        )
            .into_response();
    }

    // Opaque session token; the same value is the bearer credential the
    // analysis hand-off forwards.
    let token = uuid::Uuid::new_v4().simple().to_string();
    let mut active = found.clone().into_active_model();
    active.session_token = Set(Some(token.clone()));
    active.updated_at = Set(chrono::Utc::now().naive_utc());
    if let Err(e) = active.update(&db).await {
        tracing::error!(error = %e, "failed to persist session token");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"success": false, "error": "Database error, please try again later."})),
        )
            .into_response();
    }

    let mut cookie = Cookie::new(ACCESS_TOKEN_COOKIE, token.clone());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookies.add(cookie);

    tracing::Span::current()
        .record("table", "users")
        .record("action", "login_user")
        .record("user_id", found.id)
        .record("user_email", &found.email)
        .record("business_event", "User logged in successfully")
        .record("error", tracing::field::Empty);

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Login successful",
            "user": {"id": found.id, "email": found.email, "userName": found.user_name},
            "token": token
        })),
    )
        .into_response()
}

pub async fn logout(Extension(db): Extension<DatabaseConnection>, cookies: Cookies) -> Response {
    if let Some(cookie) = cookies.get(ACCESS_TOKEN_COOKIE) {
        let token = cookie.value().trim_matches('"').to_string();
        if !token.is_empty() {
            let found = user::Entity::find()
                .filter(user::Column::SessionToken.eq(token))
                .one(&db)
                .await;
            if let Ok(Some(u)) = found {
                let mut active = u.into_active_model();
                active.session_token = Set(None);
                active.updated_at = Set(chrono::Utc::now().naive_utc());
                let _ = active.update(&db).await;
            }
        }
    }

    let mut cookie = Cookie::new(ACCESS_TOKEN_COOKIE, "");
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.make_removal();
    cookies.add(cookie);

    (
        StatusCode::OK,
        Json(json!({"success": true, "message": "Logged out"})),
    )
        .into_response()
}

#[derive(serde::Deserialize)]
pub struct PasswordResetRequest {
    email: String,
}

// Always answers 200 so the endpoint cannot be used to probe which emails
// are registered.
pub async fn request_password_reset(
    Extension(db): Extension<DatabaseConnection>,
    Json(payload): Json<PasswordResetRequest>,
) -> Response {
    let found = user::Entity::find()
        .filter(user::Column::Email.eq(payload.email.clone()))
        .one(&db)
        .await;

    if let Ok(Some(u)) = found {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let email = u.email.clone();
        let user_name = u.user_name.clone();

        let mut active = u.into_active_model();
        active.reset_token = Set(Some(token.clone()));
        active.reset_token_expires =
            Set(Some(chrono::Utc::now().naive_utc() + chrono::Duration::hours(1)));
        active.updated_at = Set(chrono::Utc::now().naive_utc());

        match active.update(&db).await {
            Ok(_) => notifications::spawn_password_reset_email(email, user_name, &token),
            Err(e) => tracing::error!(error = %e, "failed to store reset token"),
        }
    }

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "If that email is registered, a reset link has been sent."
        })),
    )
        .into_response()
}

#[derive(serde::Deserialize)]
pub struct PasswordUpdateRequest {
    token: String,
    password: String,
}

pub async fn update_password(
    Extension(db): Extension<DatabaseConnection>,
    Json(payload): Json<PasswordUpdateRequest>,
) -> Response {
    if payload.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "Password must not be empty"})),
        )
            .into_response();
    }

    let found = match user::Entity::find()
        .filter(user::Column::ResetToken.eq(payload.token.clone()))
        .one(&db)
        .await
    {
        Ok(Some(u)) => u,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"success": false, "error": "Invalid or expired reset token"})),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "reset token lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Database error, please try again later."})),
            )
                .into_response();
        }
    };

    let expired = found
        .reset_token_expires
        .map(|expires| expires < chrono::Utc::now().naive_utc())
        .unwrap_or(true);
    if expired {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "Invalid or expired reset token"})),
        )
            .into_response();
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = match Argon2::default().hash_password(payload.password.as_bytes(), &salt) {
        Ok(hash) => hash.to_string(),
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Failed to hash password"})),
            )
                .into_response()
        }
    };

    let mut active = found.into_active_model();
    active.password_hash = Set(password_hash);
    active.reset_token = Set(None);
    active.reset_token_expires = Set(None);
    // Existing sessions die with the old password.
    active.session_token = Set(None);
    active.updated_at = Set(chrono::Utc::now().naive_utc());

    match active.update(&db).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({"success": true, "message": "Password updated"})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to update password");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Database error, please try again later."})),
            )
                .into_response()
        }
    }
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_emails() {
        assert!(is_plausible_email("ana@example.com"));
        assert!(is_plausible_email("a.b+tag@sub.domain.org"));
    }

    #[test]
    fn rejects_malformed_emails() {
        assert!(!is_plausible_email("not-an-email"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("ana@"));
        assert!(!is_plausible_email("ana@nodot"));
        assert!(!is_plausible_email("ana@.com"));
        assert!(!is_plausible_email("ana@example.com."));
        assert!(!is_plausible_email("ana maria@example.com"));
    }
}
