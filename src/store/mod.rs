mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>>;

    // Token operations
    fn create_token(&self, token: &Token) -> Result<()>;
    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>>;
    fn list_user_tokens(&self, user_id: &str) -> Result<Vec<Token>>;
    fn delete_token(&self, id: &str) -> Result<bool>;
    fn update_token_last_used(&self, id: &str) -> Result<()>;

    // Draft operations (at most one draft per owner)
    fn get_draft_by_owner(&self, owner_id: &str) -> Result<Option<Draft>>;
    fn get_draft(&self, id: &str) -> Result<Option<Draft>>;
    /// Inserts the owner's draft, or overwrites the existing one in place.
    /// The returned row carries the id that was kept.
    fn upsert_draft(&self, draft: &Draft) -> Result<Draft>;
    fn update_draft(&self, id: &str, form_data: &FormData, progress: &Progress) -> Result<Draft>;
    fn delete_draft(&self, id: &str) -> Result<bool>;

    // Application operations
    fn create_application(&self, app: &Application) -> Result<()>;
    fn get_application(&self, id: &str) -> Result<Option<Application>>;
    fn list_owner_applications(
        &self,
        owner_id: &str,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<Application>>;
    fn delete_application(&self, id: &str) -> Result<bool>;

    // Document operations
    fn create_document(&self, doc: &Document) -> Result<()>;
    fn list_application_documents(&self, application_id: &str) -> Result<Vec<Document>>;
    fn delete_application_documents(&self, application_id: &str) -> Result<usize>;

    // Admin token check
    fn has_admin_token(&self) -> Result<bool>;
}
