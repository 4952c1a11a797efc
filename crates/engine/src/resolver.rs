//! Identity resolution: which record describes an object, and at which rev.

use crate::error::{ReconcileError, ReconcileResult};
use crate::retry::RetryBudget;
use crate::uploader::{UploaderLookup, UploaderResolver};
use indexer_client::{CreateBlankRequest, IndexService, RecordRef};
use indexer_core::{IndexServiceConfig, ObjectReference};
use indexer_storage::BlobStore;
use std::sync::Arc;
use tracing::info;

/// How the identity of an object will be found, decided from configuration
/// and the object location alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentityPlan {
    /// Managed bucket: the identity is embedded in the key.
    Embedded { did: String },
    /// Extramural bucket: look the URL up first, then create if nothing matched.
    SearchThenCreate,
    /// Extramural bucket in fast mode: always create.
    Create,
}

impl IdentityPlan {
    pub fn for_object(config: &IndexServiceConfig, object: &ObjectReference) -> ReconcileResult<Self> {
        if !config.extramural_bucket {
            return Ok(IdentityPlan::Embedded {
                did: object.embedded_identity()?,
            });
        }
        if config.extramural_fast_mode {
            Ok(IdentityPlan::Create)
        } else {
            Ok(IdentityPlan::SearchThenCreate)
        }
    }
}

/// Why a reconciliation ended without an update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The record already carries size and hashes.
    AlreadyIndexed { did: String },
    /// Initial mode found an existing record for the URL.
    ExistingRecord { did: String },
}

/// Outcome of identity resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Ready { did: String, rev: String },
    Skip(SkipReason),
}

pub(crate) struct IdentityResolver<'a> {
    pub(crate) config: &'a IndexServiceConfig,
    pub(crate) index: &'a dyn IndexService,
    pub(crate) store: &'a dyn BlobStore,
    pub(crate) lookup: Option<&'a Arc<dyn UploaderLookup>>,
}

impl IdentityResolver<'_> {
    pub(crate) async fn resolve(
        &self,
        object: &ObjectReference,
        budget: &mut RetryBudget,
    ) -> ReconcileResult<Resolution> {
        match IdentityPlan::for_object(self.config, object)? {
            IdentityPlan::Embedded { did } => {
                budget.track(&did, None);
                self.current_rev(did, budget).await
            }
            IdentityPlan::SearchThenCreate => self.search_then_create(object, budget).await,
            IdentityPlan::Create => {
                let request = self.blank_request(object).await;
                let index = self.index;
                let request_ref = &request;
                let created = budget
                    .run("create blank record", move || index.create_blank(request_ref))
                    .await?;
                Ok(Self::created(created, &request, budget))
            }
        }
    }

    /// Search by URL and create only when nothing matched.
    ///
    /// A create that fails transiently may still have been committed, so it
    /// is never re-sent blindly: one budget unit is spent and the search runs
    /// again before another create is attempted.
    async fn search_then_create(
        &self,
        object: &ObjectReference,
        budget: &mut RetryBudget,
    ) -> ReconcileResult<Resolution> {
        let index = self.index;
        let url = object.full_url();
        let mut request = None;

        loop {
            let found = budget
                .run("search by url", move || index.search_by_url(url))
                .await?;

            match found.into_iter().next() {
                Some(record) if self.config.extramural_initial_mode && request.is_none() => {
                    info!(url, did = %record.did, "Object already indexed during initial run, skipping");
                    return Ok(Resolution::Skip(SkipReason::ExistingRecord { did: record.did }));
                }
                // Also reached when our own lost create turns up: fill it in
                Some(record) => {
                    budget.track(&record.did, None);
                    return self.current_rev(record.did, budget).await;
                }
                None => {}
            }

            let pending = match request.take() {
                Some(pending) => pending,
                None => self.blank_request(object).await,
            };
            match index.create_blank(&pending).await {
                Ok(created) => return Ok(Self::created(created, &pending, budget)),
                Err(err) if err.is_transient() => {
                    request = Some(pending);
                    budget.fail(format!("create blank record: {err}")).await?;
                }
                Err(err) => return Err(ReconcileError::Index(err)),
            }
        }
    }

    /// Fetch the rev to update with; an already indexed record is a skip.
    pub(crate) async fn current_rev(
        &self,
        did: String,
        budget: &mut RetryBudget,
    ) -> ReconcileResult<Resolution> {
        let index = self.index;
        let did_ref = did.as_str();
        let rev = budget
            .run("fetch rev", move || index.fetch_rev(did_ref))
            .await?;

        Ok(match rev {
            Some(rev) => {
                budget.track(&did, Some(&rev));
                Resolution::Ready { did, rev }
            }
            None => {
                info!(%did, "Record already has size and hashes");
                Resolution::Skip(SkipReason::AlreadyIndexed { did })
            }
        })
    }

    async fn blank_request(&self, object: &ObjectReference) -> CreateBlankRequest {
        let uploader = UploaderResolver {
            config: self.config,
            store: self.store,
            lookup: self.lookup,
        }
        .resolve(object)
        .await;

        CreateBlankRequest {
            uploader,
            file_name: object.file_name().to_string(),
        }
    }

    fn created(
        created: RecordRef,
        request: &CreateBlankRequest,
        budget: &mut RetryBudget,
    ) -> Resolution {
        info!(did = %created.did, uploader = %request.uploader, "Created blank record");
        budget.track(&created.did, Some(&created.rev));
        Resolution::Ready {
            did: created.did,
            rev: created.rev,
        }
    }
}
