//! Domain services built on top of `LicenseStore`

pub mod activation;
pub mod intake;
pub mod stats;

pub use activation::{ActivationEngine, ActivationOutcome, Rejection};
pub use intake::{BulkIntake, IntakeReport, IntakeRow, IntakeSource};
pub use stats::{ConsistencyReport, UsageAggregator, UsageStats};
