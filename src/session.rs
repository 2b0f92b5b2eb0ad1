use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Per-session state shared by the draft and pending-application components.
///
/// One value lives for one signed-in (or anonymous) session and is passed
/// explicitly to the components that need it. Call [`SessionContext::reset`]
/// when a new session begins on the same client.
#[derive(Debug, Default)]
pub struct SessionContext {
    actor_id: Option<String>,
    pending_applications_shown: AtomicBool,
    draft_marker: Mutex<Option<String>>,
}

impl SessionContext {
    #[must_use]
    pub fn new(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: Some(actor_id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn actor_id(&self) -> Option<&str> {
        self.actor_id.as_deref()
    }

    #[must_use]
    pub fn pending_prompt_shown(&self) -> bool {
        self.pending_applications_shown.load(Ordering::SeqCst)
    }

    /// Sets the shown flag. Returns true only for the call that flipped it.
    pub fn mark_pending_prompt_shown(&self) -> bool {
        !self.pending_applications_shown.swap(true, Ordering::SeqCst)
    }

    /// Marker for an application the client was in the middle of filling in.
    pub fn draft_marker(&self) -> Option<String> {
        self.draft_marker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_draft_marker(&self, application_id: impl Into<String>) {
        *self.draft_marker.lock().unwrap_or_else(|e| e.into_inner()) = Some(application_id.into());
    }

    pub fn clear_draft_marker(&self) {
        *self.draft_marker.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Starts a fresh session for the same actor.
    pub fn reset(&self) {
        self.pending_applications_shown.store(false, Ordering::SeqCst);
        self.clear_draft_marker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_flag_flips_once() {
        let session = SessionContext::new("parent-1");
        assert!(!session.pending_prompt_shown());
        assert!(session.mark_pending_prompt_shown());
        assert!(!session.mark_pending_prompt_shown());
        assert!(session.pending_prompt_shown());

        session.reset();
        assert!(!session.pending_prompt_shown());
    }

    #[test]
    fn test_anonymous_session() {
        let session = SessionContext::anonymous();
        assert_eq!(session.actor_id(), None);
    }

    #[test]
    fn test_draft_marker() {
        let session = SessionContext::new("parent-1");
        session.set_draft_marker("app-1");
        assert_eq!(session.draft_marker().as_deref(), Some("app-1"));
        session.reset();
        assert_eq!(session.draft_marker(), None);
    }
}
