use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::{address::Model as AddressModel, user::Model as UserModel},
    errors::ServiceError,
    services::customers::{AddressPatch, CreateAddressInput, UserPatch},
    ApiResponse, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<UserModel> for UserResponse {
    fn from(user: UserModel) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            phone: user.phone,
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddressResponse {
    pub id: Uuid,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    pub is_default: bool,
}

impl From<AddressModel> for AddressResponse {
    fn from(address: AddressModel) -> Self {
        Self {
            id: address.id,
            street: address.street,
            city: address.city,
            state: address.state,
            zip: address.zip,
            country: address.country,
            is_default: address.is_default,
        }
    }
}

/// Get the current user's profile
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<UserResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Users"
)]
pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<UserResponse>>, ServiceError> {
    let user = state
        .services
        .customers
        .get_user(auth_user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(user.into())))
}

/// Update the current user's profile
#[utoipa::path(
    put,
    path = "/api/v1/users/me",
    request_body = UserPatch,
    responses(
        (status = 200, description = "Profile updated", body = ApiResponse<UserResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Users"
)]
pub async fn update_me(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(patch): Json<UserPatch>,
) -> Result<Json<ApiResponse<UserResponse>>, ServiceError> {
    let user = state
        .services
        .customers
        .update_profile(auth_user.user_id, patch)
        .await?;
    Ok(Json(ApiResponse::success(user.into())))
}

/// List the current user's saved addresses
#[utoipa::path(
    get,
    path = "/api/v1/users/me/addresses",
    responses(
        (status = 200, description = "Saved addresses", body = ApiResponse<Vec<AddressResponse>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Users"
)]
pub async fn list_addresses(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<Vec<AddressResponse>>>, ServiceError> {
    let addresses = state
        .services
        .customers
        .list_addresses(auth_user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(
        addresses.into_iter().map(Into::into).collect(),
    )))
}

/// Save a new address for the current user
#[utoipa::path(
    post,
    path = "/api/v1/users/me/addresses",
    request_body = CreateAddressInput,
    responses(
        (status = 201, description = "Address created", body = ApiResponse<AddressResponse>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Users"
)]
pub async fn create_address(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(input): Json<CreateAddressInput>,
) -> Result<(StatusCode, Json<ApiResponse<AddressResponse>>), ServiceError> {
    let address = state
        .services
        .customers
        .create_address(auth_user.user_id, input)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(address.into())),
    ))
}

/// Update one of the current user's addresses
#[utoipa::path(
    put,
    path = "/api/v1/users/me/addresses/{id}",
    params(("id" = Uuid, Path, description = "Address id")),
    request_body = AddressPatch,
    responses(
        (status = 200, description = "Address updated", body = ApiResponse<AddressResponse>),
        (status = 404, description = "Address not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Users"
)]
pub async fn update_address(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<AddressPatch>,
) -> Result<Json<ApiResponse<AddressResponse>>, ServiceError> {
    let address = state
        .services
        .customers
        .update_address(auth_user.user_id, id, patch)
        .await?;
    Ok(Json(ApiResponse::success(address.into())))
}

/// Delete one of the current user's addresses
#[utoipa::path(
    delete,
    path = "/api/v1/users/me/addresses/{id}",
    params(("id" = Uuid, Path, description = "Address id")),
    responses(
        (status = 200, description = "Address deleted", body = ApiResponse<AddressResponse>),
        (status = 404, description = "Address not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Users"
)]
pub async fn delete_address(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<AddressResponse>>, ServiceError> {
    let address = state
        .services
        .customers
        .delete_address(auth_user.user_id, id)
        .await?;
    Ok(Json(ApiResponse::success(address.into())))
}
