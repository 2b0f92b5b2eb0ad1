use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::notify::{Notification, Notifier, TracingNotifier};
use crate::service::PersistenceService;
use crate::session::SessionContext;
use crate::types::Application;

use super::route::EntryRoute;

#[derive(Debug, Default)]
struct Prompt {
    visible: bool,
    applications: Vec<Application>,
}

/// Finds applications the parent started but never finished and offers, once
/// per session, to resume or discard them.
pub struct PendingApplicationResolver<S> {
    service: Arc<S>,
    session: Arc<SessionContext>,
    notifier: Arc<dyn Notifier>,
    prompt: Mutex<Prompt>,
}

impl<S: PersistenceService> PendingApplicationResolver<S> {
    pub fn new(service: Arc<S>, session: Arc<SessionContext>) -> Self {
        Self {
            service,
            session,
            notifier: Arc::new(TracingNotifier),
            prompt: Mutex::new(Prompt::default()),
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    fn prompt(&self) -> MutexGuard<'_, Prompt> {
        self.prompt.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_prompt_visible(&self) -> bool {
        self.prompt().visible
    }

    /// Applications offered by the current prompt.
    pub fn applications(&self) -> Vec<Application> {
        self.prompt().applications.clone()
    }

    /// Draft-status applications of the session's actor, newest first.
    /// Anonymous sessions have none.
    pub async fn list(&self) -> Result<Vec<Application>> {
        let Some(owner_id) = self.session.actor_id() else {
            return Ok(Vec::new());
        };

        match self.service.list_draft_applications(owner_id).await {
            Ok(apps) => Ok(apps),
            Err(Error::NotFound | Error::Unauthorized) => Ok(Vec::new()),
            Err(e) => {
                tracing::warn!("Failed to list pending applications: {e}");
                Err(e)
            }
        }
    }

    /// Lists pending applications and shows the prompt if this session has
    /// not shown it yet. Returns whether the prompt became visible on this
    /// call.
    pub async fn evaluate(&self) -> Result<bool> {
        let apps = self.list().await?;
        if apps.is_empty() {
            return Ok(false);
        }

        if !self.session.mark_pending_prompt_shown() {
            tracing::debug!("Pending applications prompt already shown this session");
            return Ok(false);
        }

        tracing::info!("Found {} pending applications", apps.len());
        let mut prompt = self.prompt();
        prompt.visible = true;
        prompt.applications = apps;
        Ok(true)
    }

    /// Hides the prompt, remembers `application_id` as the session's
    /// in-progress application and routes into its entry flow.
    pub fn resume(&self, application_id: &str) -> EntryRoute {
        self.prompt().visible = false;
        self.session.set_draft_marker(application_id);
        tracing::info!("Resuming application {application_id}");
        EntryRoute::Resume {
            application_id: application_id.to_string(),
        }
    }

    /// Hides the prompt, forgets any locally remembered in-progress
    /// application and routes to a blank entry flow.
    pub fn start_new(&self) -> EntryRoute {
        self.prompt().visible = false;
        self.session.clear_draft_marker();
        EntryRoute::New
    }

    /// Deletes an application and its documents, documents first.
    ///
    /// Safe to retry after a partial failure: missing documents or an
    /// already deleted application count as done.
    pub async fn discard(&self, application_id: &str) -> Result<()> {
        if let Err(e) = self.service.delete_application_documents(application_id).await {
            return Err(self.discard_failed(application_id, e));
        }

        match self.service.delete_application(application_id).await {
            Ok(()) | Err(Error::NotFound) => {}
            Err(e) => return Err(self.discard_failed(application_id, e)),
        }

        self.prompt()
            .applications
            .retain(|app| app.id != application_id);
        tracing::info!("Discarded application {application_id}");
        Ok(())
    }

    fn discard_failed(&self, application_id: &str, e: Error) -> Error {
        tracing::warn!("Failed to discard application {application_id}: {e}");
        self.notifier.notify(Notification::error(
            "Could not discard application",
            "The application was not removed. Please try again.",
        ));
        e
    }

    /// Dismisses the prompt. Pending applications stay and are offered again
    /// next session.
    pub fn close(&self) {
        self.prompt().visible = false;
    }
}
