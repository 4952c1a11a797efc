//! S3 blob store: object reads across buckets and bucket owner lookup.

use crate::error::{StorageError, StorageResult};
use crate::traits::{BlobStore, ByteStream};
use async_trait::async_trait;
use aws_config::default_provider::credentials::DefaultCredentialsChain;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_credential_types::provider::error::CredentialsError;
use aws_credential_types::provider::{self, ProvideCredentials, future};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use aws_smithy_http_client::Builder as SmithyHttpClientBuilder;
use bytes::Bytes;
use futures::StreamExt;
use std::fmt;
use tokio::sync::OnceCell;
use tokio_util::io::ReaderStream;
use tracing::instrument;

const DEFAULT_REGION: &str = "us-east-1";

/// Tag carried by credential failures so they surface as configuration errors.
const AMBIENT_CREDENTIALS_TAG: &str = "indexer-ambient-credentials";

/// Ambient AWS credentials (environment, profile, instance metadata), with
/// the provider chain built on the first signed request.
struct AmbientCredentials {
    region: Region,
    chain: OnceCell<DefaultCredentialsChain>,
}

impl fmt::Debug for AmbientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AmbientCredentials({})", self.region)
    }
}

impl AmbientCredentials {
    async fn resolve(&self) -> provider::Result {
        let region = self.region.clone();
        let chain = self
            .chain
            .get_or_try_init(|| async move {
                // Spawned so a panicking chain builder becomes an error
                tokio::spawn(DefaultCredentialsChain::builder().region(region).build())
                    .await
                    .map_err(|err| credentials_error("building provider chain", err))
            })
            .await?;

        chain
            .provide_credentials()
            .await
            .map_err(|err| credentials_error("resolving credentials", err))
    }
}

impl ProvideCredentials for AmbientCredentials {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.resolve())
    }
}

fn credentials_error(stage: &str, err: impl fmt::Display) -> CredentialsError {
    CredentialsError::provider_error(format!("{AMBIENT_CREDENTIALS_TAG}: {stage}: {err}"))
}

/// Map an SDK failure: 404 is `NotFound`, credential failures are `Config`,
/// everything else is a (retryable) `S3` error.
fn sdk_error<E>(err: SdkError<E>, what: &str) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    if let SdkError::ServiceError(service) = &err
        && service.raw().status().as_u16() == 404
    {
        return StorageError::NotFound(what.to_string());
    }
    if err.to_string().contains(AMBIENT_CREDENTIALS_TAG) {
        return StorageError::Config(format!(
            "no usable AWS credentials for {what}; set storage.access_key_id and storage.secret_access_key"
        ));
    }
    StorageError::S3(Box::new(err))
}

/// Accept bare `host:port` endpoints such as `minio:9000`.
fn endpoint_url(endpoint: &str) -> String {
    let lower = endpoint.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

/// Read-only S3 access spanning every bucket the credentials can read.
pub struct S3Backend {
    client: Client,
    endpoint: Option<String>,
    region: String,
}

impl fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Backend")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    /// Build a client. Without static `credentials` (key id, secret) the
    /// ambient AWS chain is used; `force_path_style` is needed by MinIO.
    pub fn new(
        endpoint: Option<&str>,
        region: Option<&str>,
        credentials: Option<(String, String)>,
        force_path_style: bool,
    ) -> Self {
        let region = region.unwrap_or(DEFAULT_REGION).to_string();
        let endpoint = endpoint.map(endpoint_url);

        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .force_path_style(force_path_style);

        builder = match credentials {
            Some((key_id, secret)) => builder.credentials_provider(Credentials::new(
                key_id,
                secret,
                None,
                None,
                "indexer-config",
            )),
            None => builder.credentials_provider(AmbientCredentials {
                region: Region::new(region.clone()),
                chain: OnceCell::new(),
            }),
        };

        if let Some(url) = &endpoint {
            builder = builder.endpoint_url(url);
            // Plain-HTTP endpoints need no TLS roots
            if url.to_ascii_lowercase().starts_with("http://") {
                builder = builder.http_client(SmithyHttpClientBuilder::new().build_http());
            }
        }

        Self {
            client: Client::from_conf(builder.build()),
            endpoint,
            region,
        }
    }
}

#[async_trait]
impl BlobStore for S3Backend {
    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        let what = format!("{bucket}/{key}");
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error(e, &what))?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(Box::new(e)))?;
        Ok(body.into_bytes())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get_stream(&self, bucket: &str, key: &str) -> StorageResult<ByteStream> {
        let what = format!("{bucket}/{key}");
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error(e, &what))?;

        let chunks = ReaderStream::new(output.body.into_async_read())
            .map(|chunk| chunk.map_err(StorageError::Io));
        Ok(Box::pin(chunks))
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn bucket_owner(&self, bucket: &str) -> StorageResult<String> {
        let output = self
            .client
            .get_bucket_acl()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| sdk_error(e, bucket))?;

        output
            .owner()
            .and_then(|owner| owner.display_name().or(owner.id()))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| StorageError::NotFound(format!("owner of bucket {bucket}")))
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
