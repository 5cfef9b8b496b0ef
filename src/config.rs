//! Process-level configuration.
//!
//! Business settings (radius, percentages, assignment mode) are not here: they
//! are read from the settings collaborator on every invocation, see
//! [`crate::domain::settings::EngineSettings`].

use std::time::Duration;

pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const DEFAULT_OPERATOR_ID: &str = "operations";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Upper bound on every store, directory, settings or notifier call.
    pub io_timeout: Duration,
    /// Recipient of operator alerts for unfulfillable orders.
    pub operator_id: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            io_timeout: DEFAULT_IO_TIMEOUT,
            operator_id: DEFAULT_OPERATOR_ID.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    pub fn with_operator_id(mut self, operator_id: impl Into<String>) -> Self {
        self.operator_id = operator_id.into();
        self
    }
}
