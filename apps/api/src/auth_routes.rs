use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use libra_auth::models::{
    ForgotPasswordRequest, LoginRequest, RefreshTokenRequest, RegisterRequest,
    ResetPasswordRequest, TokenResponse, User,
};
use libra_auth::JwtService;
use libra_core::SuccessResponse;
use libra_error::{LibraError, Result};
use serde::Deserialize;

use crate::AppState;

/// 认证路由，全部公开（/me 自带令牌校验）
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/me", get(me))
        .route("/verify-email", get(verify_email))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

async fn signup(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let user = state.auth.register(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    Ok(Json(state.auth.login(req).await?))
}

async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>> {
    Ok(Json(state.auth.refresh_tokens(&req.refresh_token).await?))
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<User>> {
    let header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| LibraError::Unauthorized {
            message: "Missing Authorization header".to_string(),
        })?;
    let token = JwtService::extract_token_from_header(header)?;
    Ok(Json(state.auth.current_user(token).await?))
}

#[derive(Debug, Deserialize)]
struct VerifyEmailQuery {
    token: String,
}

async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<SuccessResponse>> {
    Ok(Json(state.auth.verify_email(&query.token).await?))
}

async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<SuccessResponse>> {
    Ok(Json(state.auth.forgot_password(&req.email).await?))
}

async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<SuccessResponse>> {
    Ok(Json(state.auth.reset_password(&req.token, &req.password).await?))
}
