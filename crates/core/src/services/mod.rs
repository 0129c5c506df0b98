pub mod calculations;
pub mod conversion;
pub mod fifo;
pub mod import_state;
pub mod movement_aggregator;
pub mod reactive;
pub mod snapshot_aggregator;
pub mod snapshot_loaders;
pub mod targeted_snapshot_updater;

pub use import_state::{ImportGuard, ImportState};
pub use movement_aggregator::MovementAggregator;
pub use reactive::PassOutcome;
pub use snapshot_aggregator::SnapshotAggregator;
pub use snapshot_loaders::{LoadScope, LoaderContext, SnapshotLoader};
pub use targeted_snapshot_updater::TargetedSnapshotUpdater;
