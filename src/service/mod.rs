//! The persistence contract the draft and pending-application components talk
//! to. Implementations may be in-process ([`LocalService`]) or remote
//! ([`ApiClient`], behind the `client` feature).

#[cfg(feature = "client")]
mod http;
mod local;

#[cfg(feature = "client")]
pub use http::ApiClient;
pub use local::LocalService;

use std::future::Future;

use crate::error::Result;
use crate::types::{Application, Draft, FormData, Progress};

/// Remote store operations used by [`crate::draft::DraftManager`] and
/// [`crate::pending::PendingApplicationResolver`].
///
/// A missing row is reported as [`crate::error::Error::NotFound`] so callers
/// can tell "nothing there" apart from a failed call.
pub trait PersistenceService: Send + Sync + 'static {
    fn get_draft(&self, owner_id: &str) -> impl Future<Output = Result<Option<Draft>>> + Send;

    fn create_draft(
        &self,
        owner_id: &str,
        form_data: &FormData,
        progress: &Progress,
    ) -> impl Future<Output = Result<Draft>> + Send;

    fn update_draft(
        &self,
        draft_id: &str,
        form_data: &FormData,
        progress: &Progress,
    ) -> impl Future<Output = Result<Draft>> + Send;

    fn delete_draft(&self, draft_id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Draft-status applications of `owner_id`, most recently updated first.
    fn list_draft_applications(
        &self,
        owner_id: &str,
    ) -> impl Future<Output = Result<Vec<Application>>> + Send;

    /// Removes every document of the application. Succeeds when there are none.
    fn delete_application_documents(
        &self,
        application_id: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    fn delete_application(&self, application_id: &str) -> impl Future<Output = Result<()>> + Send;
}
