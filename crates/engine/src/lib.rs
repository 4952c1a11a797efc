//! Reconciliation engine.
//!
//! Given an object location, determines (or creates) the index record that
//! describes it, hashes the object in one pass, and merges size, hashes and
//! URL into the record with a rev-checked update.

pub mod error;
pub mod reconciler;
pub mod resolver;
pub mod retry;
pub mod uploader;

pub use error::{ReconcileError, ReconcileResult};
pub use reconciler::{Outcome, Reconciler};
pub use resolver::{IdentityPlan, Resolution, SkipReason};
pub use retry::RetryBudget;
pub use uploader::{ManifestTable, UploaderLookup};
