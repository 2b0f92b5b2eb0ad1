//! # Enrollment
//!
//! School enrollment backend and client components for autosaved
//! application drafts and recovery of unfinished applications.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use enrollment::config::DraftConfig;
//! use enrollment::draft::DraftManager;
//! use enrollment::pending::PendingApplicationResolver;
//! use enrollment::service::ApiClient;
//! use enrollment::session::SessionContext;
//!
//! let service = Arc::new(ApiClient::new("http://127.0.0.1:8080", &token)?);
//! let session = Arc::new(SessionContext::new(user_id));
//!
//! let resolver = PendingApplicationResolver::new(service.clone(), session.clone());
//! if resolver.evaluate().await? {
//!     // show resolver.applications() and offer resume / discard
//! }
//!
//! let drafts = DraftManager::new(service, &session, DraftConfig::default());
//! drafts.load().await?;
//! drafts.update_field(FormField::StudentName, "Grace")?;
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): the `enrollment` binary.
//! - `client` (default): [`service::ApiClient`], the HTTP persistence client.

pub mod auth;
pub mod config;
pub mod draft;
pub mod error;
pub mod notify;
pub mod pending;
pub mod server;
pub mod service;
pub mod session;
pub mod store;
pub mod types;
