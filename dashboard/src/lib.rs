//! Staker dashboard core.
//!
//! Reconciles independently refreshing chain values into one consistent
//! view and gates user transactions on it:
//! - [`source`]: background read tasks, one per chain value
//! - [`countdown`]: local deadline estimate between authoritative reads
//! - [`derived`]: progress and action eligibility from a snapshot
//! - [`orchestrator`]: eligibility-checked transaction submission
//! - [`controller`]: the merge point publishing [`DashboardView`]

pub mod config;
pub mod controller;
pub mod countdown;
pub mod derived;
pub mod error;
pub mod history;
pub mod metrics;
pub mod orchestrator;
pub mod queries;
pub mod shutdown;
pub mod source;

pub use config::DashboardConfig;
pub use controller::{
    DashboardCommand, DashboardController, DashboardHandle, DashboardSettings, DashboardView,
    LatestValues, SourceHealth,
};
pub use countdown::{CountdownClock, CountdownPhase, CountdownView};
pub use derived::{compute, eligibility, progress_percent, ActionEligibility, DerivedState};
pub use error::DashboardError;
pub use history::{HistoryEntry, StakeHistory};
pub use metrics::DashboardMetrics;
pub use orchestrator::{TransactionOrchestrator, TxId, TxNotification, TxStatus};
pub use queries::{read_status_once, StakerQuery, StatusReport};
pub use shutdown::ShutdownController;
pub use source::{spawn_source, MonotonicGate, RefreshTrigger, SourceEvent, SourceHandle, SourceKind, SourceValue};
