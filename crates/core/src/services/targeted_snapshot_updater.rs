use std::sync::Arc;

use log::{debug, info};

use crate::errors::CoreError;
use crate::models::import::ImportMetadata;

use super::reactive::PassOutcome;
use super::snapshot_aggregator::{run_loaders, SnapshotInner};
use super::snapshot_loaders::LoadScope;

/// Refreshes only the snapshots an import touched: the touched accounts,
/// their parent broker or bank, and the investment overview.
///
/// Runs under the snapshot aggregator's gate, so it never overlaps a full
/// pass, and produces the same entries a full pass would for those keys.
pub struct TargetedSnapshotUpdater {
    inner: Arc<SnapshotInner>,
}

impl TargetedSnapshotUpdater {
    pub(crate) fn new(inner: Arc<SnapshotInner>) -> Self {
        Self { inner }
    }

    pub async fn update_for_import(
        &self,
        metadata: &ImportMetadata,
    ) -> Result<PassOutcome, CoreError> {
        if metadata.is_empty() {
            debug!("Import {} touched no account, nothing to update", metadata.import_id);
            return Ok(PassOutcome::Completed);
        }
        if self.inner.import_state.is_import_in_progress() {
            debug!(
                "Targeted update for import {} skipped, import in progress",
                metadata.import_id
            );
            return Ok(PassOutcome::SuppressedByImport);
        }

        let _guard = self.inner.gate.begin().await;
        let scope = LoadScope::from_import(metadata);
        let published = run_loaders(&self.inner.store, &self.inner.loaders, &scope).await?;
        info!(
            "Import {}: {} snapshots updated for {} broker and {} bank accounts",
            metadata.import_id,
            published,
            metadata.broker_account_ids.len(),
            metadata.bank_account_ids.len()
        );
        Ok(PassOutcome::Completed)
    }
}

impl std::fmt::Debug for TargetedSnapshotUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetedSnapshotUpdater")
            .field("loaders", &self.inner.loaders.len())
            .finish()
    }
}
