//! Request/response types of the index service.

use indexer_core::{DigestSet, Hashes};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity and concurrency token of a record, as returned by search and create.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RecordRef {
    pub did: String,
    #[serde(default)]
    pub baseid: Option<String>,
    #[serde(default)]
    pub rev: String,
}

/// Full record as returned by a fetch.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct IndexRecord {
    #[serde(default)]
    pub did: String,
    #[serde(default)]
    pub baseid: Option<String>,
    #[serde(default)]
    pub rev: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub hashes: BTreeMap<String, String>,
    #[serde(default)]
    pub urls: Vec<String>,
}

impl IndexRecord {
    /// Current rev, or `None` when there is nothing left to populate:
    /// the rev is absent/empty or size and hashes are already present.
    pub fn pending_rev(&self) -> Option<&str> {
        if self.size.is_some() && !self.hashes.is_empty() {
            return None;
        }
        self.rev.as_deref().filter(|rev| !rev.is_empty())
    }
}

/// Search results arrive either as a bare list or wrapped in `records`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SearchResponse {
    Wrapped { records: Vec<RecordRef> },
    Bare(Vec<RecordRef>),
}

impl SearchResponse {
    pub(crate) fn into_records(self) -> Vec<RecordRef> {
        match self {
            SearchResponse::Wrapped { records } => records,
            SearchResponse::Bare(records) => records,
        }
    }
}

/// Payload creating a blank record for an extramural object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreateBlankRequest {
    pub uploader: String,
    pub file_name: String,
}

/// Payload merged into a record by a conditional update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UpdateRecordRequest {
    pub size: u64,
    pub urls: Vec<String>,
    pub hashes: Hashes,
}

impl UpdateRecordRequest {
    pub fn new(url: impl Into<String>, digests: &DigestSet) -> Self {
        Self {
            size: digests.size,
            urls: vec![url.into()],
            hashes: digests.hashes.clone(),
        }
    }
}

/// Server verdict on a conditional update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateStatus {
    /// 200: the record now carries the payload.
    Applied,
    /// 409: the supplied rev is stale.
    Conflict { body: String },
    /// Any other status.
    Rejected { status: u16, body: String },
}
