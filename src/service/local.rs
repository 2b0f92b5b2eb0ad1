use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::PersistenceService;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Application, ApplicationStatus, Draft, FormData, Progress};

/// In-process persistence backed directly by a [`Store`].
///
/// Store calls are synchronous, so each one runs on the blocking pool.
#[derive(Clone)]
pub struct LocalService {
    store: Arc<dyn Store>,
}

impl LocalService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Store) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref())).await?
    }
}

fn found(deleted: bool) -> Result<()> {
    if deleted { Ok(()) } else { Err(Error::NotFound) }
}

impl PersistenceService for LocalService {
    async fn get_draft(&self, owner_id: &str) -> Result<Option<Draft>> {
        let owner_id = owner_id.to_string();
        self.blocking(move |store| store.get_draft_by_owner(&owner_id))
            .await
    }

    async fn create_draft(
        &self,
        owner_id: &str,
        form_data: &FormData,
        progress: &Progress,
    ) -> Result<Draft> {
        let now = Utc::now();
        let draft = Draft {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            form_data: form_data.clone(),
            progress: *progress,
            last_saved_at: now,
            created_at: now,
            updated_at: now,
        };
        self.blocking(move |store| store.upsert_draft(&draft)).await
    }

    async fn update_draft(
        &self,
        draft_id: &str,
        form_data: &FormData,
        progress: &Progress,
    ) -> Result<Draft> {
        let draft_id = draft_id.to_string();
        let form_data = form_data.clone();
        let progress = *progress;
        self.blocking(move |store| store.update_draft(&draft_id, &form_data, &progress))
            .await
    }

    async fn delete_draft(&self, draft_id: &str) -> Result<()> {
        let draft_id = draft_id.to_string();
        found(self.blocking(move |store| store.delete_draft(&draft_id)).await?)
    }

    async fn list_draft_applications(&self, owner_id: &str) -> Result<Vec<Application>> {
        let owner_id = owner_id.to_string();
        self.blocking(move |store| {
            store.list_owner_applications(&owner_id, Some(ApplicationStatus::Draft))
        })
        .await
    }

    async fn delete_application_documents(&self, application_id: &str) -> Result<()> {
        let application_id = application_id.to_string();
        let removed = self
            .blocking(move |store| store.delete_application_documents(&application_id))
            .await?;
        tracing::debug!("Removed {removed} documents");
        Ok(())
    }

    async fn delete_application(&self, application_id: &str) -> Result<()> {
        let application_id = application_id.to_string();
        found(
            self.blocking(move |store| store.delete_application(&application_id))
                .await?,
        )
    }
}
