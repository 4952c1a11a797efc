//! Client for the external index service.
//!
//! The [`IndexService`] trait is the seam the reconciler depends on;
//! [`IndexClient`] implements it over authenticated HTTP.

pub mod client;
pub mod error;
pub mod types;

pub use client::{IndexClient, IndexService};
pub use error::{ClientError, ClientResult};
pub use types::{
    CreateBlankRequest, IndexRecord, RecordRef, UpdateRecordRequest, UpdateStatus,
};
