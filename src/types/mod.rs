mod form;
mod models;
mod status;

pub use form::{FieldValue, FormData, FormField, Progress};
pub use models::*;
pub use status::ApplicationStatus;
