/**
 * Authentication Routes
 * Registration, cookie-based login/logout, current user and password change
 */
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::{self, request};
use crate::db::models::PublicUser;
use crate::error::ApiError;
use crate::routes::{ApiJson, ApiResponse};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user_id: i32,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth::register_user(
        state.users(),
        &state.config.auth,
        &payload.username,
        &payload.email,
        &payload.password,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "Registrace proběhla úspěšně".to_string(),
            user_id,
        }),
    ))
}

/// POST /api/auth/login
/// Sets the session cookie and also returns the token for header-based clients.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let login = auth::login_user(
        state.users(),
        &state.config.auth,
        &payload.username,
        &payload.password,
    )
    .await?;

    let cookie = request::session_cookie(&login.token, &state.config.auth);

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(LoginResponse {
            success: true,
            message: "Přihlášení proběhlo úspěšně".to_string(),
            token: login.token,
            user: login.user,
        }),
    ))
}

/// POST /api/auth/logout
/// Tokens are stateless; logging out only expires the cookies.
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let [primary, legacy] = request::clear_session_cookies(&state.config.auth);
    (
        AppendHeaders([(header::SET_COOKIE, primary), (header::SET_COOKIE, legacy)]),
        Json(ApiResponse::message("Odhlášení proběhlo úspěšně")),
    )
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<PublicUser>>, ApiError> {
    let user = state.current_user(&headers).await?;
    Ok(Json(ApiResponse::data(user)))
}

/// POST /api/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let user = state.current_user(&headers).await?;

    auth::change_password(
        state.users(),
        &state.config.auth,
        user.id,
        &payload.current_password,
        &payload.new_password,
    )
    .await?;

    Ok(Json(ApiResponse::message("Heslo bylo úspěšně změněno")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::{get, post};
    use axum::Router;
    use tower::ServiceExt;

    fn auth_router() -> Router {
        Router::new()
            .route("/api/auth/register", post(register))
            .route("/api/auth/login", post(login))
            .route("/api/auth/logout", post(logout))
            .route("/api/auth/me", get(me))
            .route("/api/auth/change-password", post(change_password))
            .with_state(test_state())
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, HeaderMap, serde_json::Value) {
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post_json(
        app: Router,
        uri: &str,
        json: &impl serde::Serialize,
        bearer: Option<&str>,
    ) -> (StatusCode, HeaderMap, serde_json::Value) {
        let mut req = Request::post(uri).header("content-type", "application/json");
        if let Some(token) = bearer {
            req = req.header("authorization", format!("Bearer {token}"));
        }
        let req = req.body(Body::from(serde_json::to_vec(json).unwrap())).unwrap();
        send(app, req).await
    }

    fn register_body(username: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password: "abcdef".to_string(),
        }
    }

    async fn login_token(app: Router, username: &str, password: &str) -> String {
        let (status, _, body) = post_json(
            app,
            "/api/auth/login",
            &LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            },
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_register_then_duplicate() {
        let app = auth_router();

        let (status, _, body) = post_json(
            app.clone(),
            "/api/auth/register",
            &RegisterRequest {
                username: "ab".to_string(),
                email: "x@y.com".to_string(),
                password: "abcdef".to_string(),
            },
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Uživatelské jméno musí mít alespoň 3 znaky");

        let (status, _, body) = post_json(
            app.clone(),
            "/api/auth/register",
            &RegisterRequest {
                username: "abc".to_string(),
                email: "x@y.com".to_string(),
                password: "abcdef".to_string(),
            },
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert!(body["userId"].as_i64().is_some());

        let (status, _, body) = post_json(
            app,
            "/api/auth/register",
            &RegisterRequest {
                username: "abc".to_string(),
                email: "other@y.com".to_string(),
                password: "abcdef".to_string(),
            },
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("již obsazeno"));
    }

    #[tokio::test]
    async fn test_register_missing_fields() {
        let (status, _, body) = post_json(
            auth_router(),
            "/api/auth/register",
            &serde_json::json!({ "username": "wolf" }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Všechna pole jsou povinná");
    }

    #[tokio::test]
    async fn test_malformed_json_uses_envelope() {
        let req = Request::post("/api/auth/login")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _, body) = send(auth_router(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_login_sets_cookie_and_returns_user() {
        let app = auth_router();
        post_json(app.clone(), "/api/auth/register", &register_body("otter"), None).await;

        let (status, headers, body) = post_json(
            app,
            "/api/auth/login",
            &LoginRequest {
                username: "otter".to_string(),
                password: "abcdef".to_string(),
            },
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["username"], "otter");
        assert!(body["user"].get("password_hash").is_none());

        let token = body["token"].as_str().unwrap();
        let cookie = headers[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with(&format!("auth_token={token};")));
        assert!(cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn test_login_wrong_credentials_returns_unauthorized() {
        let app = auth_router();
        post_json(app.clone(), "/api/auth/register", &register_body("otter"), None).await;

        let (status, headers, body) = post_json(
            app,
            "/api/auth/login",
            &LoginRequest {
                username: "otter".to_string(),
                password: "wrongpassword".to_string(),
            },
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(headers[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[tokio::test]
    async fn test_login_empty_fields_returns_bad_request() {
        let (status, _, _) = post_json(
            auth_router(),
            "/api/auth/login",
            &LoginRequest::default(),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_me_requires_token() {
        let req = Request::get("/api/auth/me").body(Body::empty()).unwrap();
        let (status, _, body) = send(auth_router(), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Nepřihlášený uživatel");
    }

    #[tokio::test]
    async fn test_me_accepts_cookie() {
        let app = auth_router();
        post_json(app.clone(), "/api/auth/register", &register_body("otter"), None).await;
        let token = login_token(app.clone(), "otter", "abcdef").await;

        let req = Request::get("/api/auth/me")
            .header("cookie", format!("auth_token={token}"))
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["username"], "otter");
        assert_eq!(body["data"]["role"], "user");
    }

    #[tokio::test]
    async fn test_change_password_flow() {
        let app = auth_router();
        post_json(app.clone(), "/api/auth/register", &register_body("otter"), None).await;
        let token = login_token(app.clone(), "otter", "abcdef").await;

        let (status, _, body) = post_json(
            app.clone(),
            "/api/auth/change-password",
            &ChangePasswordRequest {
                current_password: "wrong!".to_string(),
                new_password: "fresh-pass".to_string(),
            },
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Současné heslo není správné");

        let (status, _, _) = post_json(
            app.clone(),
            "/api/auth/change-password",
            &ChangePasswordRequest {
                current_password: "abcdef".to_string(),
                new_password: "fresh-pass".to_string(),
            },
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        login_token(app, "otter", "fresh-pass").await;
    }

    #[tokio::test]
    async fn test_logout_clears_both_cookies() {
        let req = Request::post("/api/auth/logout").body(Body::empty()).unwrap();
        let (status, headers, body) = send(auth_router(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let cookies: Vec<_> = headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
    }
}
