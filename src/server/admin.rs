use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::auth::{RequireAdmin, TokenGenerator};
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{
    CreateTokenResponse, CreateUserRequest, CreateUserTokenRequest, PaginationParams, TokenResponse,
};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, StoreOptionExt, StoreResultExt,
    paginate,
};
use crate::server::validation::validate_email;
use crate::types::{Token, User};

const MAX_TOKEN_RETRIES: u32 = 3;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users", get(list_users))
        .route("/users/{id}", get(get_user))
        .route("/users/{id}/tokens", post(create_user_token))
        .route("/users/{id}/tokens", get(list_user_tokens))
        .route("/tokens/{id}", delete(delete_token))
}

fn token_to_response(token: Token) -> TokenResponse {
    TokenResponse {
        id: token.id,
        is_admin: token.is_admin,
        user_id: token.user_id,
        created_at: token.created_at,
        expires_at: token.expires_at,
        last_used_at: token.last_used_at,
    }
}

async fn create_user(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> impl IntoResponse {
    let email = req.email.trim().to_lowercase();
    validate_email(&email)?;

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        email,
        display_name: req.display_name,
        created_at: now,
        updated_at: now,
    };

    state
        .store
        .create_user(&user)
        .api_err("User with this email already exists")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

async fn list_users(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let cursor = params.cursor.as_deref().unwrap_or("");

    let users = state
        .store
        .list_users(cursor, DEFAULT_PAGE_SIZE + 1)
        .api_err("Failed to list users")?;

    let (users, next_cursor, has_more) =
        paginate(users, DEFAULT_PAGE_SIZE as usize, |u| u.id.clone());

    Ok::<_, ApiError>(Json(PaginatedResponse::new(users, next_cursor, has_more)))
}

async fn get_user(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let user = state
        .store
        .get_user(&id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(user)))
}

async fn create_user_token(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateUserTokenRequest>,
) -> impl IntoResponse {
    let user = state
        .store
        .get_user(&id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;

    if req.expires_in_seconds.is_some_and(|s| s < 0) {
        return Err(ApiError::bad_request(
            "expires_in_seconds cannot be negative",
        ));
    }

    let expires_at = req
        .expires_in_seconds
        .map(|s| Utc::now() + Duration::seconds(s));

    let generator = TokenGenerator::new();

    for _ in 0..MAX_TOKEN_RETRIES {
        let (raw_token, lookup, hash) = generator
            .generate()
            .map_err(|_| ApiError::internal("Failed to generate token"))?;

        let token = Token {
            id: Uuid::new_v4().to_string(),
            token_hash: hash,
            token_lookup: lookup,
            is_admin: false,
            user_id: Some(user.id.clone()),
            created_at: Utc::now(),
            expires_at,
            last_used_at: None,
        };

        match state.store.create_token(&token) {
            Ok(()) => {
                return Ok((
                    StatusCode::CREATED,
                    Json(ApiResponse::success(CreateTokenResponse {
                        token: raw_token,
                        metadata: token_to_response(token),
                    })),
                ));
            }
            Err(Error::TokenLookupCollision) => continue,
            Err(_) => return Err(ApiError::internal("Failed to create token")),
        }
    }

    Err(ApiError::internal("Failed to create token after retries"))
}

async fn list_user_tokens(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let user = state
        .store
        .get_user(&id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;

    let tokens: Vec<TokenResponse> = state
        .store
        .list_user_tokens(&user.id)
        .api_err("Failed to list tokens")?
        .into_iter()
        .map(token_to_response)
        .collect();

    Ok::<_, ApiError>(Json(ApiResponse::success(tokens)))
}

/// Revokes a token. The admin token making the call cannot revoke itself.
async fn delete_token(
    admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if id == admin.0.id {
        return Err(ApiError::bad_request("Cannot delete current token"));
    }

    let deleted = state
        .store
        .delete_token(&id)
        .api_err("Failed to delete token")?;
    if !deleted {
        return Err(ApiError::not_found("Token not found"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
