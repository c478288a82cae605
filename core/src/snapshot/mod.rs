//! Durability: write-ahead log records, tree snapshots, and recovery.

pub mod checkpoint;
pub mod journal;
pub mod recovery;
pub mod state;

pub use checkpoint::{load_snapshot, save_snapshot};
pub use journal::{Journal, LogRecord, Mutation};
pub use recovery::{load_journal, plan_recovery, RecoveryPlan};
pub use state::{SnapshotEntry, SnapshotMetadata, TreeSnapshot};
