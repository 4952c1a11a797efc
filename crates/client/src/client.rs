//! HTTP implementation of the index service.

use crate::error::{ClientError, ClientResult};
use crate::types::{
    CreateBlankRequest, IndexRecord, RecordRef, SearchResponse, UpdateRecordRequest, UpdateStatus,
};
use async_trait::async_trait;
use indexer_core::IndexServiceConfig;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

/// Operations the reconciler needs from the index service.
///
/// Each call is a single round trip. Retrying is left to the caller so it can
/// re-resolve state (e.g. refresh a stale rev) between attempts.
#[async_trait]
pub trait IndexService: Send + Sync {
    /// Records whose URL list contains `url`. Possibly empty.
    async fn search_by_url(&self, url: &str) -> ClientResult<Vec<RecordRef>>;

    /// Current rev of `did`, or `None` when the record already has size and hashes.
    async fn fetch_rev(&self, did: &str) -> ClientResult<Option<String>>;

    /// Create a blank record and return its identity.
    async fn create_blank(&self, request: &CreateBlankRequest) -> ClientResult<RecordRef>;

    /// Merge `request` into `did`, accepted only if `rev` is current.
    async fn conditional_update(
        &self,
        did: &str,
        rev: &str,
        request: &UpdateRecordRequest,
    ) -> ClientResult<UpdateStatus>;
}

#[derive(Clone)]
pub struct IndexClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Option<(String, String)>,
}

impl std::fmt::Debug for IndexClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexClient")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}

impl IndexClient {
    /// Build a client from configuration.
    ///
    /// Certificate validation is relaxed only for this client's transport when
    /// `accept_invalid_certs` is set.
    pub fn new(config: &IndexServiceConfig) -> ClientResult<Self> {
        let mut base_url = Url::parse(&config.url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {e}", config.url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(config.url.clone()));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        if config.accept_invalid_certs {
            tracing::warn!(url = %config.url, "TLS certificate validation disabled for index client");
        }

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url,
            credentials: config
                .credentials()
                .map(|(user, pass)| (user.to_string(), pass.to_string())),
        })
    }

    /// `{base}/{segments...}`; DID slashes become path separators.
    fn url(&self, path: &str) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some((user, pass)) => req.basic_auth(user, Some(pass)),
            None => req,
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> ClientResult<T> {
        let response = self.authorize(req).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| ClientError::Decode(format!("{e}: {body}")))
    }

    /// Fetch the full record for `did`.
    #[instrument(skip(self))]
    pub async fn fetch_record(&self, did: &str) -> ClientResult<IndexRecord> {
        let url = self.url(did)?;
        self.send_json(self.http.get(url)).await
    }
}

#[async_trait]
impl IndexService for IndexClient {
    #[instrument(skip(self))]
    async fn search_by_url(&self, url: &str) -> ClientResult<Vec<RecordRef>> {
        let mut endpoint = self.url("search")?;
        endpoint.query_pairs_mut().append_pair("url", url);
        let response: SearchResponse = self.send_json(self.http.get(endpoint)).await?;
        Ok(response.into_records())
    }

    #[instrument(skip(self))]
    async fn fetch_rev(&self, did: &str) -> ClientResult<Option<String>> {
        let record = self.fetch_record(did).await?;
        Ok(record.pending_rev().map(str::to_string))
    }

    #[instrument(skip(self))]
    async fn create_blank(&self, request: &CreateBlankRequest) -> ClientResult<RecordRef> {
        let url = self.base_url.clone();
        self.send_json(self.http.post(url).json(request)).await
    }

    #[instrument(skip(self, request), fields(size = request.size))]
    async fn conditional_update(
        &self,
        did: &str,
        rev: &str,
        request: &UpdateRecordRequest,
    ) -> ClientResult<UpdateStatus> {
        let mut url = self.url(did)?;
        url.query_pairs_mut().append_pair("rev", rev);

        let response = self
            .authorize(self.http.put(url).json(request))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        Ok(match status {
            StatusCode::OK => UpdateStatus::Applied,
            StatusCode::CONFLICT => UpdateStatus::Conflict { body },
            other => UpdateStatus::Rejected {
                status: other.as_u16(),
                body,
            },
        })
    }
}
