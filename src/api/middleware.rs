use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde_json::json;
use tower_cookies::Cookies;

use crate::entities::user;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// The normalized bearer credential the request arrived with. Kept on the
/// request so the analysis hand-off can forward it unchanged.
#[derive(Clone)]
pub struct BearerToken(pub String);

pub async fn auth_middleware(
    Extension(db): Extension<DatabaseConnection>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Response {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let cookie_value = cookies
        .get(ACCESS_TOKEN_COOKIE)
        .map(|c| c.value().to_string());

    let Some(token) = bearer_from_parts(header_value.as_deref(), cookie_value.as_deref()) else {
        return unauthorized();
    };

    match user::Entity::find()
        .filter(user::Column::SessionToken.eq(token.clone()))
        .one(&db)
        .await
    {
        Ok(Some(u)) => {
            request.extensions_mut().insert(u.id);
            request.extensions_mut().insert(BearerToken(token));
            next.run(request).await
        }
        Ok(None) => unauthorized(),
        Err(e) => {
            tracing::error!(error = %e, "session lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Database error, please try again later."})),
            )
                .into_response()
        }
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"success": false, "error": "Unauthorized"})),
    )
        .into_response()
}

/// One place decides what the caller's credential is: the `Authorization`
/// header wins over the cookie, an optional `Bearer ` scheme prefix is
/// stripped, and cookie values lose any wrapping quotes left over from
/// client-side serialization.
pub fn bearer_from_parts(header: Option<&str>, cookie: Option<&str>) -> Option<String> {
    if let Some(raw) = header {
        let raw = raw.trim();
        let token = if let Some(rest) = raw.strip_prefix("Bearer ") {
            rest.trim()
        } else if raw == "Bearer" {
            ""
        } else {
            raw
        };
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    if let Some(raw) = cookie {
        let token = raw.trim().trim_matches('"');
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_takes_precedence_over_cookie() {
        let token = bearer_from_parts(Some("Bearer abc123"), Some("cookie-token"));
        assert_eq!(token.as_deref(), Some("abc123"));
    }

    #[test]
    fn header_without_scheme_is_accepted_as_is() {
        let token = bearer_from_parts(Some("raw-token"), None);
        assert_eq!(token.as_deref(), Some("raw-token"));
    }

    #[test]
    fn cookie_quotes_are_stripped() {
        let token = bearer_from_parts(None, Some("\"quoted-token\""));
        assert_eq!(token.as_deref(), Some("quoted-token"));
    }

    #[test]
    fn empty_values_yield_none() {
        assert_eq!(bearer_from_parts(None, None), None);
        assert_eq!(bearer_from_parts(Some("   "), Some("\"\"")), None);
        assert_eq!(bearer_from_parts(Some("Bearer "), None), None);
    }
}
