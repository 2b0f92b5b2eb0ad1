use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::ListApplicationsParams;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::store::Store;
use crate::types::{Application, ApplicationStatus};

fn owned_application(
    store: &dyn Store,
    id: &str,
    owner_id: &str,
) -> Result<Option<Application>, ApiError> {
    Ok(store
        .get_application(id)
        .api_err("Failed to get application")?
        .filter(|app| app.owner_id == owner_id))
}

pub async fn list_applications(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListApplicationsParams>,
) -> impl IntoResponse {
    let status = match params.status.as_deref() {
        None => None,
        Some(s) => Some(
            ApplicationStatus::parse(s)
                .ok_or_else(|| ApiError::bad_request(format!("Unknown status '{s}'")))?,
        ),
    };

    let apps = state
        .store
        .list_owner_applications(&auth.user.id, status)
        .api_err("Failed to list applications")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(apps)))
}

pub async fn list_application_documents(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let app = owned_application(store, &id, &auth.user.id)?.or_not_found("Application not found")?;

    let docs = store
        .list_application_documents(&app.id)
        .api_err("Failed to list documents")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(docs)))
}

/// Removing the documents of an application that is already gone succeeds, so
/// an interrupted discard can be retried from the start.
pub async fn delete_application_documents(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    match store.get_application(&id).api_err("Failed to get application")? {
        None => return Ok(StatusCode::NO_CONTENT),
        Some(app) if app.owner_id != auth.user.id => {
            return Err(ApiError::not_found("Application not found"));
        }
        Some(_) => {}
    }

    let removed = store
        .delete_application_documents(&id)
        .api_err("Failed to delete documents")?;
    tracing::debug!("Deleted {removed} documents of application {id}");

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn delete_application(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let app = owned_application(store, &id, &auth.user.id)?.or_not_found("Application not found")?;

    if !app.status.is_pending() {
        return Err(ApiError::conflict(format!(
            "Only draft applications can be deleted (status is {})",
            app.status
        )));
    }

    store
        .delete_application(&app.id)
        .api_err("Failed to delete application")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
