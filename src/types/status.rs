use std::fmt;

use serde::{Deserialize, Serialize};

/// Review state of a submitted application.
///
/// Only `Draft` rows are considered pending; every other state is owned by the
/// review workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    #[default]
    Draft,
    Submitted,
    UnderReview,
    Accepted,
    Rejected,
    Waitlisted,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 6] = [
        Self::Draft,
        Self::Submitted,
        Self::UnderReview,
        Self::Accepted,
        Self::Rejected,
        Self::Waitlisted,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Waitlisted => "waitlisted",
        }
    }

    /// Converts a stored status string to its enum value.
    pub fn parse(s: &str) -> Option<ApplicationStatus> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Draft)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
