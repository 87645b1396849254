//! Event processing: routing, snapshots and the feed runner.

pub mod feed;
pub mod router;
pub mod snapshot;

pub use feed::{FeedRunner, FeedStats};
pub use router::{DispatchReport, EventRouter};
pub use snapshot::{SnapshotBuilder, SnapshotOutcome};
