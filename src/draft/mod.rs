//! Autosaved application drafts: derived progress, debounced persistence and
//! the manager that ties them together.

mod debounce;
mod manager;
mod progress;

pub use debounce::Debouncer;
pub use manager::DraftManager;
pub use progress::compute_progress;
