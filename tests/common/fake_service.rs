//! In-memory [`PersistenceService`] for driving the draft manager and the
//! pending-application resolver without a server.
//!
//! Every call is recorded with the (tokio) instant it arrived, so tests can
//! check ordering and debounce timing under paused time.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use uuid::Uuid;

use enrollment::draft::compute_progress;
use enrollment::error::{Error, Result};
use enrollment::service::PersistenceService;
use enrollment::types::{Application, ApplicationStatus, Document, Draft, FormData, Progress};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetDraft(String),
    CreateDraft { owner_id: String, form_data: FormData },
    UpdateDraft { draft_id: String, form_data: FormData },
    DeleteDraft(String),
    ListDraftApplications(String),
    DeleteApplicationDocuments(String),
    DeleteApplication(String),
}

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    GetDraft,
    CreateDraft,
    UpdateDraft,
    DeleteDraft,
    ListDraftApplications,
    DeleteApplicationDocuments,
    DeleteApplication,
}

#[derive(Default)]
struct State {
    drafts: HashMap<String, Draft>,
    applications: Vec<Application>,
    documents: Vec<Document>,
    calls: Vec<(Instant, Call)>,
    failing: HashSet<Op>,
}

/// Unlike the SQLite store, `create_draft` always inserts a new row, so a
/// caller that creates twice for one owner shows up as two drafts.
#[derive(Default)]
pub struct FakeService {
    state: Mutex<State>,
    latency: Option<Duration>,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call waits `latency` before touching state.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn fail(&self, op: Op) {
        self.state().failing.insert(op);
    }

    pub fn heal(&self, op: Op) {
        self.state().failing.remove(&op);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn timed_calls(&self) -> Vec<(Instant, Call)> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn insert_draft(&self, owner_id: &str, form_data: FormData, progress: Progress) -> Draft {
        let now = Utc::now();
        let draft = Draft {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            form_data,
            progress,
            last_saved_at: now,
            created_at: now,
            updated_at: now,
        };
        self.state().drafts.insert(draft.id.clone(), draft.clone());
        draft
    }

    /// Drops a draft row behind the client's back.
    pub fn remove_draft(&self, draft_id: &str) {
        self.state().drafts.remove(draft_id);
    }

    pub fn drafts_for(&self, owner_id: &str) -> Vec<Draft> {
        self.state()
            .drafts
            .values()
            .filter(|d| d.owner_id == owner_id)
            .cloned()
            .collect()
    }

    /// Adds an application last touched `age` ago.
    pub fn insert_application(
        &self,
        owner_id: &str,
        student_name: &str,
        status: ApplicationStatus,
        age: chrono::Duration,
    ) -> Application {
        let updated_at = Utc::now() - age;
        let app = Application {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            student_name: student_name.to_string(),
            grade: None,
            school_id: None,
            status,
            created_at: updated_at,
            updated_at,
        };
        self.state().applications.push(app.clone());
        app
    }

    pub fn insert_document(&self, application_id: &str, name: &str) -> Document {
        let doc = Document {
            id: Uuid::new_v4().to_string(),
            application_id: application_id.to_string(),
            name: name.to_string(),
            kind: "birth_certificate".to_string(),
            created_at: Utc::now(),
        };
        self.state().documents.push(doc.clone());
        doc
    }

    pub fn has_application(&self, id: &str) -> bool {
        self.state().applications.iter().any(|a| a.id == id)
    }

    pub fn document_count(&self, application_id: &str) -> usize {
        self.state()
            .documents
            .iter()
            .filter(|d| d.application_id == application_id)
            .count()
    }

    async fn enter(&self, op: Op, call: Call) -> Result<MutexGuard<'_, State>> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.state();
        state.calls.push((Instant::now(), call));
        if state.failing.contains(&op) {
            return Err(Error::Remote(format!("injected {op:?} failure")));
        }
        Ok(state)
    }
}

impl PersistenceService for FakeService {
    async fn get_draft(&self, owner_id: &str) -> Result<Option<Draft>> {
        let state = self
            .enter(Op::GetDraft, Call::GetDraft(owner_id.to_string()))
            .await?;
        Ok(state
            .drafts
            .values()
            .find(|d| d.owner_id == owner_id)
            .cloned())
    }

    async fn create_draft(
        &self,
        owner_id: &str,
        form_data: &FormData,
        progress: &Progress,
    ) -> Result<Draft> {
        let call = Call::CreateDraft {
            owner_id: owner_id.to_string(),
            form_data: form_data.clone(),
        };
        let mut state = self.enter(Op::CreateDraft, call).await?;
        assert_eq!(*progress, compute_progress(form_data), "stale progress sent");

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
        state.drafts.insert(draft.id.clone(), draft.clone());
        Ok(draft)
    }

    async fn update_draft(
        &self,
        draft_id: &str,
        form_data: &FormData,
        progress: &Progress,
    ) -> Result<Draft> {
        let call = Call::UpdateDraft {
            draft_id: draft_id.to_string(),
            form_data: form_data.clone(),
        };
        let mut state = self.enter(Op::UpdateDraft, call).await?;
        let draft = state.drafts.get_mut(draft_id).ok_or(Error::NotFound)?;

        let now = Utc::now();
        draft.form_data = form_data.clone();
        draft.progress = *progress;
        draft.last_saved_at = now;
        draft.updated_at = now;
        Ok(draft.clone())
    }

    async fn delete_draft(&self, draft_id: &str) -> Result<()> {
        let mut state = self
            .enter(Op::DeleteDraft, Call::DeleteDraft(draft_id.to_string()))
            .await?;
        state
            .drafts
            .remove(draft_id)
            .map(|_| ())
            .ok_or(Error::NotFound)
    }

    async fn list_draft_applications(&self, owner_id: &str) -> Result<Vec<Application>> {
        let call = Call::ListDraftApplications(owner_id.to_string());
        let state = self.enter(Op::ListDraftApplications, call).await?;
        let mut apps: Vec<Application> = state
            .applications
            .iter()
            .filter(|a| a.owner_id == owner_id && a.status == ApplicationStatus::Draft)
            .cloned()
            .collect();
        apps.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(apps)
    }

    async fn delete_application_documents(&self, application_id: &str) -> Result<()> {
        let call = Call::DeleteApplicationDocuments(application_id.to_string());
        let mut state = self.enter(Op::DeleteApplicationDocuments, call).await?;
        state.documents.retain(|d| d.application_id != application_id);
        Ok(())
    }

    async fn delete_application(&self, application_id: &str) -> Result<()> {
        let call = Call::DeleteApplication(application_id.to_string());
        let mut state = self.enter(Op::DeleteApplication, call).await?;
        if state
            .documents
            .iter()
            .any(|d| d.application_id == application_id)
        {
            return Err(Error::Conflict("application still has documents".to_string()));
        }
        let before = state.applications.len();
        state.applications.retain(|a| a.id != application_id);
        if state.applications.len() == before {
            return Err(Error::NotFound);
        }
        Ok(())
    }
}
