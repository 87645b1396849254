//! Pure computation for pool snapshots: the rate curve and TVL reconciliation.

pub mod rate_model;
pub mod reconcile;

pub use rate_model::{borrow_rate, supply_apr, utilization, RateError};
pub use reconcile::{apply_delta, TvlDelta};
