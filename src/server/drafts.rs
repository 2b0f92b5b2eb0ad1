use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::RequireUser;
use crate::draft::compute_progress;
use crate::server::AppState;
use crate::server::dto::DraftRequest;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::validate_form;
use crate::store::Store;
use crate::types::Draft;

/// Fetches a draft by id, hiding drafts that belong to someone else.
fn owned_draft(store: &dyn Store, id: &str, owner_id: &str) -> Result<Draft, ApiError> {
    store
        .get_draft(id)
        .api_err("Failed to get draft")?
        .filter(|d| d.owner_id == owner_id)
        .or_not_found("Draft not found")
}

/// Stored progress is a cache; always hand out the derived value.
fn with_fresh_progress(mut draft: Draft) -> Draft {
    draft.progress = compute_progress(&draft.form_data);
    draft
}

pub async fn get_draft(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let draft = state
        .store
        .get_draft_by_owner(&auth.user.id)
        .api_err("Failed to get draft")?
        .or_not_found("No draft saved")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(with_fresh_progress(draft))))
}

pub async fn create_draft(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<DraftRequest>,
) -> impl IntoResponse {
    validate_form(&req.form_data)?;

    let now = Utc::now();
    let draft = Draft {
        id: Uuid::new_v4().to_string(),
        owner_id: auth.user.id.clone(),
        progress: compute_progress(&req.form_data),
        form_data: req.form_data,
        last_saved_at: now,
        created_at: now,
        updated_at: now,
    };

    // An existing draft for this owner is updated in place.
    let saved = state
        .store
        .upsert_draft(&draft)
        .api_err("Failed to save draft")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(saved))))
}

pub async fn update_draft(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<DraftRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    validate_form(&req.form_data)?;

    let draft = owned_draft(store, &id, &auth.user.id)?;
    let progress = compute_progress(&req.form_data);

    let saved = store
        .update_draft(&draft.id, &req.form_data, &progress)
        .api_err("Failed to save draft")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(saved)))
}

pub async fn delete_draft(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let draft = owned_draft(store, &id, &auth.user.id)?;

    store
        .delete_draft(&draft.id)
        .api_err("Failed to delete draft")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
