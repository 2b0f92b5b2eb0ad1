use std::time::Duration;

/// Quiet period before an autosave is written.
pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftConfig {
    pub autosave_delay: Duration,
}

impl DraftConfig {
    #[must_use]
    pub fn with_delay_ms(ms: u64) -> Self {
        Self {
            autosave_delay: Duration::from_millis(ms),
        }
    }
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            autosave_delay: DEFAULT_AUTOSAVE_DELAY,
        }
    }
}
