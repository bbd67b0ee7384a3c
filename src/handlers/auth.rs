use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::TokenResponse,
    errors::ServiceError,
    services::customers::SignupRequest,
    ApiResponse, AppState,
};

use super::users::UserResponse;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GoogleLoginRequest {
    /// Google ID token obtained by the frontend
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl From<TokenResponse> for AuthTokenResponse {
    fn from(token: TokenResponse) -> Self {
        Self {
            access_token: token.access_token,
            token_type: token.token_type,
            expires_in: token.expires_in,
        }
    }
}

/// Register a new account with a password credential
#[utoipa::path(
    post,
    path = "/api/v1/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ServiceError> {
    let user = state.services.customers.signup(request).await?;
    info!(user_id = %user.id, "Signup complete");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(UserResponse::from(user))),
    ))
}

/// Password login, returns a bearer token
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = ApiResponse<AuthTokenResponse>),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthTokenResponse>>, ServiceError> {
    request.validate()?;

    let user = state
        .services
        .customers
        .authenticate(&request.email, &request.password)
        .await?;

    let token = state
        .auth_service
        .generate_token(&user)
        .map_err(|e| ServiceError::InternalError(e.to_string()))?;

    info!(user_id = %user.id, "User logged in");
    Ok(Json(ApiResponse::success(token.into())))
}

/// Login or signup with a Google ID token
#[utoipa::path(
    post,
    path = "/api/v1/auth/google",
    request_body = GoogleLoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = ApiResponse<AuthTokenResponse>),
        (status = 401, description = "Token rejected", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn google_login(
    State(state): State<AppState>,
    Json(request): Json<GoogleLoginRequest>,
) -> Result<Json<ApiResponse<AuthTokenResponse>>, ServiceError> {
    let user = state
        .services
        .customers
        .social_signin(&request.token)
        .await?;

    let token = state
        .auth_service
        .generate_token(&user)
        .map_err(|e| ServiceError::InternalError(e.to_string()))?;

    info!(user_id = %user.id, "User logged in via Google");
    Ok(Json(ApiResponse::success(token.into())))
}
