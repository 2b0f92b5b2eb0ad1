use std::fmt;

/// Where the application entry flow should go after the pending prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryRoute {
    /// Continue the named application; the entry flow loads its data.
    Resume { application_id: String },
    /// Start a blank application.
    New,
}

impl EntryRoute {
    #[must_use]
    pub fn application_id(&self) -> Option<&str> {
        match self {
            EntryRoute::Resume { application_id } => Some(application_id),
            EntryRoute::New => None,
        }
    }
}

impl fmt::Display for EntryRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryRoute::Resume { application_id } => write!(f, "/apply?resume={application_id}"),
            EntryRoute::New => f.write_str("/apply"),
        }
    }
}
