use tracing::{error, info, info_span, warn};

use contactsync_core::{ContactId, LabelMap, RunId, normalize_contacts};
use contactsync_source::{ContactSource, SystemeClient};
use contactsync_storage::{ContactStore, MergeStats, RowError, SqliteStore, TableRole};

use crate::config::{StoreConfig, SyncConfig};
use crate::error::SyncError;
use crate::lifecycle::{CleanupOutcome, CleanupWarning, StagingLifecycle};
use crate::merge::MergeEngine;
use crate::staging::{StagedBatch, StagingSink};

/// Outcome of one synchronization pass.
#[derive(Debug)]
pub struct SyncReport {
    pub run_id: RunId,
    pub labels: usize,
    pub fetched: usize,
    pub staged: Option<StagedBatch>,
    pub merge: Option<MergeStats>,
    pub cleanup: Option<CleanupOutcome>,
    pub error: Option<SyncError>,
}

impl SyncReport {
    fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            labels: 0,
            fetched: 0,
            staged: None,
            merge: None,
            cleanup: None,
            error: None,
        }
    }

    fn failed(run_id: RunId, error: SyncError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(run_id)
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn cleanup_warning(&self) -> Option<&CleanupWarning> {
        self.cleanup.as_ref().and_then(CleanupOutcome::warning)
    }

    /// Short human-readable status line.
    pub fn message(&self) -> String {
        if let Some(err) = &self.error {
            return format!("synchronization failed: {err}");
        }
        let mut message = match &self.merge {
            Some(stats) => format!(
                "synchronization completed: {} contacts fetched, {} merged ({} inserted, {} updated)",
                self.fetched, stats.deduplicated, stats.inserted, stats.updated
            ),
            None => "synchronization completed: no contacts to synchronize".to_string(),
        };
        if let Some(warning) = self.cleanup_warning() {
            message.push_str(&format!("; warning: {warning}"));
        }
        message
    }

    /// Status message and success flag, as returned to the caller.
    pub fn status(&self) -> (String, bool) {
        (self.message(), self.is_success())
    }
}

/// Fetch, normalize, stage, merge, clean up. One pass per `run` call.
///
/// Two pipelines must not run at once against the same staging table: their
/// rows would interleave and the dedup would arbitrate across both snapshots.
/// Schedule a single instance if that matters.
pub struct SyncPipeline<Src, S> {
    source: Src,
    store: S,
    sink: StagingSink,
    engine: MergeEngine,
    lifecycle: StagingLifecycle,
}

impl<Src: ContactSource, S: ContactStore> SyncPipeline<Src, S> {
    pub fn new(source: Src, store: S, config: &StoreConfig) -> Self {
        Self {
            source,
            store,
            sink: StagingSink::new(config.staging_table.clone()),
            engine: MergeEngine::new(config.target_table.clone()),
            lifecycle: StagingLifecycle::new(config.staging_table.clone()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn source_mut(&mut self) -> &mut Src {
        &mut self.source
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Run one pass. Errors are logged and folded into the report.
    pub fn run(&mut self) -> SyncReport {
        let run_id = RunId::new();
        let span = info_span!("sync_run", %run_id);
        let _guard = span.enter();

        let mut report = SyncReport::new(run_id);
        if let Err(err) = self.execute(&mut report) {
            error!(error = %err, "synchronization failed");
            report.error = Some(err);
        } else if let Some(warning) = report.cleanup_warning() {
            warn!(%warning, "synchronization completed with a cleanup warning");
        } else {
            info!(fetched = report.fetched, "synchronization completed");
        }
        report
    }

    fn execute(&mut self, report: &mut SyncReport) -> Result<(), SyncError> {
        let tags = self.source.fetch_tags()?;
        report.labels = tags.count();
        let contacts = self.source.fetch_contacts()?;
        report.fetched = contacts.count();

        if contacts.is_empty() {
            info!("no contacts to synchronize");
            return Ok(());
        }

        let labels = LabelMap::from_tags(&tags.items);
        let batch = normalize_contacts(&contacts.items, &labels);
        let undecodable = contacts
            .malformed
            .iter()
            .map(|item| RowError {
                index: item.index,
                contact_id: item.id.map(ContactId::new),
                reason: format!("malformed contact: {}", item.reason),
            })
            .collect();

        let landed = self.sink.land_listing(
            &mut self.store,
            &batch,
            &contacts.positions(),
            undecodable,
        );
        let staged = match landed {
            Ok(staged) => staged,
            Err(err) => {
                // Never leave a partial batch behind for the next merge.
                report.cleanup = Some(self.lifecycle.cleanup(&mut self.store));
                return Err(err);
            }
        };

        let merged = self.engine.merge(&mut self.store, &staged);
        report.staged = Some(staged);
        report.cleanup = Some(self.lifecycle.cleanup(&mut self.store));
        report.merge = Some(merged?);
        Ok(())
    }
}

/// Invocation entry point: one full pass against systeme.io and the
/// configured SQLite database. Never fails; inspect the report.
pub fn run_once(config: &SyncConfig) -> SyncReport {
    let store = match open_store(&config.store) {
        Ok(store) => store,
        Err(err) => {
            error!(error = %err, "could not open the contact store");
            return SyncReport::failed(RunId::new(), err);
        }
    };
    let source = SystemeClient::new(config.source.clone());
    SyncPipeline::new(source, store, &config.store).run()
}

fn open_store(config: &StoreConfig) -> Result<SqliteStore, SyncError> {
    let mut store = SqliteStore::open(&config.database_path)?;
    if store.create_if_absent(&config.target_table, TableRole::Target)? {
        info!(table = %config.target_table, "created target table");
    }
    Ok(store)
}
