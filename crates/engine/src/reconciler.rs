//! Reconciliation of one object with its index record.
//!
//! ```text
//! Resolve ──► Digest ──► Update ──► Done
//!    │                    │  ▲
//!    │ skip               │  │ refreshed rev
//!    ▼            409     ▼  │
//!   Done        ◄──── RefreshRev
//! ```
//!
//! Every failed network interaction spends one unit of a single per-object
//! retry budget; the step that failed is re-run after a fixed delay.

use crate::error::{ReconcileError, ReconcileResult};
use crate::resolver::{IdentityResolver, Resolution, SkipReason};
use crate::retry::RetryBudget;
use crate::uploader::UploaderLookup;
use indexer_client::{IndexService, UpdateRecordRequest, UpdateStatus};
use indexer_core::{DigestSet, IndexServiceConfig, ObjectReference, digest_stream};
use indexer_storage::{BlobStore, StorageError};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Result of a completed reconciliation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The record now carries the object's size, hashes and URL.
    Updated { did: String, digests: DigestSet },
    /// Nothing to do.
    Skipped { reason: SkipReason },
}

enum Step {
    Resolve,
    Digest { did: String, rev: String },
    Update { did: String, rev: String, digests: DigestSet },
    RefreshRev { did: String, digests: DigestSet },
    Done(Outcome),
}

/// Drives objects through identity resolution, hashing and the conditional update.
///
/// Holds only immutable configuration and shared clients; every call to
/// [`Reconciler::reconcile`] owns its own identity, rev, digests and budget.
#[derive(Clone)]
pub struct Reconciler {
    config: Arc<IndexServiceConfig>,
    index: Arc<dyn IndexService>,
    store: Arc<dyn BlobStore>,
    uploader_lookup: Option<Arc<dyn UploaderLookup>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("index_url", &self.config.url)
            .field("extramural_bucket", &self.config.extramural_bucket)
            .field("storage", &self.store.backend_name())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        config: IndexServiceConfig,
        index: Arc<dyn IndexService>,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            index,
            store,
            uploader_lookup: None,
        }
    }

    /// Use `lookup` instead of the configured manifest for uploader lookups.
    pub fn with_uploader_lookup(mut self, lookup: Arc<dyn UploaderLookup>) -> Self {
        self.uploader_lookup = Some(lookup);
        self
    }

    pub fn config(&self) -> &IndexServiceConfig {
        &self.config
    }

    /// Reconcile the object at `raw_url` with its index record.
    ///
    /// Malformed URLs, unrecognized key layouts and other misconfiguration
    /// fail immediately. Transient failures are retried until the budget is
    /// spent, after which `RetryExhausted` is returned.
    #[instrument(skip(self), fields(url = %raw_url))]
    pub async fn reconcile(&self, raw_url: &str) -> ReconcileResult<Outcome> {
        let object = ObjectReference::parse(raw_url)?;
        let mut budget = RetryBudget::new(&self.config.retry);
        let resolver = IdentityResolver {
            config: &self.config,
            index: self.index.as_ref(),
            store: self.store.as_ref(),
            lookup: self.uploader_lookup.as_ref(),
        };

        let mut step = Step::Resolve;
        loop {
            step = match step {
                Step::Resolve => match resolver.resolve(&object, &mut budget).await? {
                    Resolution::Ready { did, rev } => Step::Digest { did, rev },
                    Resolution::Skip(reason) => Step::Done(Outcome::Skipped { reason }),
                },
                Step::Digest { did, rev } => match self.digest(&object).await {
                    Ok(digests) => Step::Update { did, rev, digests },
                    Err(err) if is_transient_storage(&err) => {
                        budget
                            .fail(format!("read {}: {err}", object.full_url()))
                            .await?;
                        Step::Digest { did, rev }
                    }
                    Err(err) => return Err(ReconcileError::Storage(err)),
                },
                Step::Update { did, rev, digests } => {
                    self.update(&object, did, rev, digests, &mut budget).await?
                }
                Step::RefreshRev { did, digests } => {
                    match resolver.current_rev(did, &mut budget).await? {
                        Resolution::Ready { did, rev } => Step::Update { did, rev, digests },
                        Resolution::Skip(reason) => Step::Done(Outcome::Skipped { reason }),
                    }
                }
                Step::Done(outcome) => {
                    info!(failed_attempts = budget.failures(), "Done");
                    return Ok(outcome);
                }
            };
        }
    }

    async fn digest(&self, object: &ObjectReference) -> Result<DigestSet, StorageError> {
        info!(key = object.key(), "Start computing hashes");
        let stream = self
            .store
            .get_stream(object.bucket(), object.key())
            .await?;
        let digests = digest_stream(stream).await?;
        info!(key = object.key(), size = digests.size, "Finished computing hashes");
        Ok(digests)
    }

    async fn update(
        &self,
        object: &ObjectReference,
        did: String,
        rev: String,
        digests: DigestSet,
        budget: &mut RetryBudget,
    ) -> ReconcileResult<Step> {
        budget.track(&did, Some(&rev));
        let request = UpdateRecordRequest::new(object.full_url(), &digests);

        match self.index.conditional_update(&did, &rev, &request).await {
            Ok(UpdateStatus::Applied) => {
                info!(%did, %rev, size = digests.size, "Updated record");
                Ok(Step::Done(Outcome::Updated { did, digests }))
            }
            Ok(UpdateStatus::Conflict { body }) => {
                budget
                    .fail(format!("update rejected, rev {rev} is stale: {body}"))
                    .await?;
                debug!(%did, "Refreshing rev after conflict");
                Ok(Step::RefreshRev { did, digests })
            }
            Ok(UpdateStatus::Rejected { status, body }) => {
                budget
                    .fail(format!("update rejected with status {status}: {body}"))
                    .await?;
                Ok(Step::Update { did, rev, digests })
            }
            Err(err) if err.is_transient() => {
                budget.fail(format!("update: {err}")).await?;
                Ok(Step::Update { did, rev, digests })
            }
            Err(err) => Err(ReconcileError::Index(err)),
        }
    }
}

/// Read failures worth retrying; missing objects and bad keys are not.
fn is_transient_storage(err: &StorageError) -> bool {
    matches!(err, StorageError::Io(_) | StorageError::S3(_))
}
