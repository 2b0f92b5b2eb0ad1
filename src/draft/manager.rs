use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::debounce::Debouncer;
use super::progress::compute_progress;
use crate::config::DraftConfig;
use crate::error::{Error, Result};
use crate::notify::{Notification, Notifier, TracingNotifier};
use crate::service::PersistenceService;
use crate::session::SessionContext;
use crate::types::{Draft, FieldValue, FormData, FormField, Progress};

const ANONYMOUS_KEY: &str = "anonymous";

#[derive(Debug, Default)]
struct LocalState {
    form_data: FormData,
    progress: Progress,
    /// Id of the owner's stored draft, once known from a load or a create.
    draft_id: Option<String>,
    last_saved_at: Option<DateTime<Utc>>,
    /// Bumped by every discard and adopted load; snapshots taken before it
    /// are not written.
    epoch: u64,
}

struct Inner<S> {
    service: Arc<S>,
    owner_id: Option<String>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<LocalState>,
    /// Persists run one at a time so the create-or-update choice always sees
    /// the outcome of the previous write.
    lane: tokio::sync::Mutex<()>,
    in_flight: AtomicUsize,
}

/// Client-side owner of one parent's in-progress application form.
///
/// Local state is the source of truth between successful persists. Edits go
/// through [`DraftManager::autosave`] (debounced) or [`DraftManager::save`]
/// (immediate); both send the full form, so the store keeps whichever write
/// arrives last.
pub struct DraftManager<S: PersistenceService> {
    inner: Arc<Inner<S>>,
    debouncer: Debouncer<String>,
}

impl<S: PersistenceService> DraftManager<S> {
    pub fn new(service: Arc<S>, session: &SessionContext, config: DraftConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                service,
                owner_id: session.actor_id().map(str::to_string),
                notifier: Arc::new(TracingNotifier),
                state: Mutex::new(LocalState::default()),
                lane: tokio::sync::Mutex::new(()),
                in_flight: AtomicUsize::new(0),
            }),
            debouncer: Debouncer::new(config.autosave_delay),
        }
    }

    /// Replaces the notifier. Call before the manager is shared.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.notifier = notifier,
            None => tracing::warn!("Notifier not replaced: draft manager already shared"),
        }
        self
    }

    pub fn form_data(&self) -> FormData {
        self.inner.state().form_data.clone()
    }

    pub fn progress(&self) -> Progress {
        self.inner.state().progress
    }

    pub fn progress_percentage(&self) -> u8 {
        self.progress().percentage()
    }

    pub fn draft_id(&self) -> Option<String> {
        self.inner.state().draft_id.clone()
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.inner.state().last_saved_at
    }

    pub fn is_saving(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn has_pending_autosave(&self) -> bool {
        self.debouncer.is_pending(&self.debounce_key())
    }

    fn debounce_key(&self) -> String {
        self.inner
            .owner_id
            .clone()
            .unwrap_or_else(|| ANONYMOUS_KEY.to_string())
    }

    /// Fetches the owner's stored draft and adopts it as local state.
    ///
    /// Returns `Ok(None)` when the owner has no draft or the session is
    /// anonymous. When a draft is adopted, local edits made before this
    /// resolves are dropped along with their queued autosave.
    pub async fn load(&self) -> Result<Option<Draft>> {
        let Some(owner_id) = self.inner.owner_id.as_deref() else {
            return Ok(None);
        };

        let _lane = self.inner.lane.lock().await;
        let draft = match self.inner.service.get_draft(owner_id).await {
            Ok(draft) => draft,
            Err(Error::NotFound) => None,
            Err(e) => {
                tracing::warn!("Failed to load draft for {owner_id}: {e}");
                return Err(e);
            }
        };

        let Some(draft) = draft else {
            tracing::debug!("No stored draft for {owner_id}");
            return Ok(None);
        };

        self.debouncer.cancel(&self.debounce_key());
        let mut state = self.inner.state();
        // Snapshots already waiting on the lane predate the adopted draft.
        state.epoch += 1;
        state.progress = compute_progress(&draft.form_data);
        state.form_data = draft.form_data.clone();
        state.draft_id = Some(draft.id.clone());
        state.last_saved_at = Some(draft.last_saved_at);
        tracing::info!("Loaded draft {} ({}% complete)", draft.id, state.progress.percentage());

        Ok(Some(draft))
    }

    /// Adopts `form_data` and schedules a persist once edits go quiet.
    ///
    /// Each call replaces the pending persist, so only the last snapshot of a
    /// burst is written.
    pub fn autosave(&self, form_data: FormData) {
        let progress = compute_progress(&form_data);
        let epoch = {
            let mut state = self.inner.state();
            state.form_data = form_data.clone();
            state.progress = progress;
            state.epoch
        };

        if self.inner.owner_id.is_none() {
            tracing::debug!("Autosave skipped: no signed-in owner");
            return;
        }

        let inner = Arc::clone(&self.inner);
        let key = self.debounce_key();
        tracing::debug!(
            "Autosave scheduled in {}ms for {key}",
            self.debouncer.delay().as_millis()
        );
        self.debouncer.schedule(key, async move {
            // Failures are reported through the notifier.
            let _ = inner.persist(form_data, progress, epoch).await;
        });
    }

    /// Changes one field and autosaves the resulting form.
    pub fn update_field(&self, field: FormField, value: impl Into<FieldValue>) -> Result<()> {
        let mut form = self.form_data();
        form.set(field, value.into())?;
        self.autosave(form);
        Ok(())
    }

    /// Persists the current form right away.
    ///
    /// A pending autosave is left in place; whichever write reaches the store
    /// last wins, and both carry the full form.
    pub async fn save(&self) -> Result<Draft> {
        let (form_data, progress, epoch) = {
            let mut state = self.inner.state();
            state.progress = compute_progress(&state.form_data);
            (state.form_data.clone(), state.progress, state.epoch)
        };
        self.inner.persist(form_data, progress, epoch).await
    }

    /// Deletes the stored draft, if any, and resets the form.
    pub async fn discard(&self) -> Result<()> {
        self.debouncer.cancel(&self.debounce_key());

        let _lane = self.inner.lane.lock().await;
        let draft_id = self.inner.state().draft_id.clone();

        if let Some(draft_id) = draft_id {
            match self.inner.service.delete_draft(&draft_id).await {
                Ok(()) | Err(Error::NotFound) => {
                    tracing::info!("Discarded draft {draft_id}");
                }
                Err(e) => {
                    tracing::warn!("Failed to discard draft {draft_id}: {e}");
                    self.inner.notifier.notify(Notification::error(
                        "Could not discard draft",
                        "Your saved progress is still there. Please try again.",
                    ));
                    return Err(e);
                }
            }
        }

        let mut state = self.inner.state();
        *state = LocalState {
            epoch: state.epoch + 1,
            ..LocalState::default()
        };
        Ok(())
    }
}

/// Counts a write as in flight until dropped, including when the awaiting
/// future is dropped early.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<S: PersistenceService> Inner<S> {
    fn state(&self) -> MutexGuard<'_, LocalState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Writes one snapshot: update when the draft row is known, create
    /// otherwise. Local form state is never rolled back on failure.
    async fn persist(&self, form_data: FormData, progress: Progress, epoch: u64) -> Result<Draft> {
        let _lane = self.lane.lock().await;
        if self.state().epoch != epoch {
            tracing::debug!("Dropping snapshot taken before the draft was discarded or reloaded");
            return Err(Error::Conflict("draft was replaced".to_string()));
        }
        let result = {
            let _saving = InFlight::enter(&self.in_flight);
            self.write(&form_data, &progress).await
        };

        match &result {
            Ok(draft) => {
                let mut state = self.state();
                state.draft_id = Some(draft.id.clone());
                state.last_saved_at = Some(draft.last_saved_at);
                tracing::debug!("Draft {} saved", draft.id);
            }
            Err(e) => {
                tracing::warn!("Failed to save draft: {e}");
                self.notifier.notify(Notification::warning(
                    "Autosave failed",
                    "Your changes may be lost. They will be saved again on your next edit.",
                ));
            }
        }

        result
    }

    async fn write(&self, form_data: &FormData, progress: &Progress) -> Result<Draft> {
        let Some(owner_id) = self.owner_id.as_deref() else {
            return Err(Error::Unauthorized);
        };

        let draft_id = self.state().draft_id.clone();
        if let Some(id) = draft_id {
            match self.service.update_draft(&id, form_data, progress).await {
                Err(Error::NotFound) => {
                    tracing::warn!("Draft {id} no longer exists, creating a new one");
                    self.state().draft_id = None;
                }
                result => return result,
            }
        }

        let draft = self
            .service
            .create_draft(owner_id, form_data, progress)
            .await?;
        tracing::info!("Created draft {} for {owner_id}", draft.id);
        Ok(draft)
    }
}
