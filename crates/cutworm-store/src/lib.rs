//! Snapshot persistence for simulation runs.
//!
//! Every `spacing` ticks the per-bin genotype counts are dumped into a SQLite
//! file named by the elapsed tick range. Files are written beside their final
//! name and renamed once complete, so a crashed run leaves either a whole
//! snapshot or none. [`reconcile`] inspects a set of output directories and
//! reports which runs are complete.

pub mod database;
pub mod reconcile;

pub use database::{Database, SnapshotMeta};
pub use reconcile::{reconcile, RunStatus, SnapshotFile};
