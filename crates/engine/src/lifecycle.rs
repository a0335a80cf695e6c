use std::fmt;

use tracing::{debug, info, instrument, warn};

use contactsync_storage::{ContactStore, TableName};

/// Staging cleanup that did not go through. The run still counts as a
/// success: leftover rows are re-deduplicated by the next merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupWarning {
    pub table: String,
    pub reason: String,
}

impl fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not drop staging table {}: {}", self.table, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Removed,
    AlreadyAbsent,
    Failed(CleanupWarning),
}

impl CleanupOutcome {
    pub fn warning(&self) -> Option<&CleanupWarning> {
        match self {
            Self::Failed(warning) => Some(warning),
            Self::Removed | Self::AlreadyAbsent => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StagingLifecycle {
    table: TableName,
}

impl StagingLifecycle {
    pub fn new(table: TableName) -> Self {
        Self { table }
    }

    /// Best-effort drop of the staging table. Never fails.
    #[instrument(level = "info", skip_all, fields(table = %self.table))]
    pub fn cleanup<S: ContactStore>(&self, store: &mut S) -> CleanupOutcome {
        match store.delete_if_exists(&self.table) {
            Ok(true) => {
                info!("staging table dropped");
                CleanupOutcome::Removed
            }
            Ok(false) => {
                debug!("staging table already absent");
                CleanupOutcome::AlreadyAbsent
            }
            Err(err) => {
                let warning = CleanupWarning {
                    table: self.table.to_string(),
                    reason: err.to_string(),
                };
                warn!(error = %err, "staging cleanup failed; leftover rows will be merged again next run");
                CleanupOutcome::Failed(warning)
            }
        }
    }
}
