//! Account purge: delete every stored asset and record of one user, then end
//! their session.

pub mod coordinator;
pub mod report;

pub use coordinator::PurgeCoordinator;
pub use report::{FileDeletion, FileOutcome, PurgeReport, PurgeStatus, StepOutcome};
