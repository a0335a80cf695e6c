pub mod config;
pub mod error;
pub mod lifecycle;
pub mod merge;
pub mod pipeline;
pub mod staging;

pub use config::{StoreConfig, SyncConfig};
pub use error::SyncError;
pub use lifecycle::{CleanupOutcome, CleanupWarning, StagingLifecycle};
pub use merge::MergeEngine;
pub use pipeline::{SyncPipeline, SyncReport, run_once};
pub use staging::{StagedBatch, StagingSink};
