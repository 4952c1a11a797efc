//! In-memory fakes of the index service and the blob store.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use indexer_client::{
    ClientError, ClientResult, CreateBlankRequest, IndexService, RecordRef, UpdateRecordRequest,
    UpdateStatus,
};
use indexer_core::{Hashes, IndexServiceConfig, RetryConfig};
use indexer_storage::{BlobStore, ByteStream, StorageError, StorageResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Config with a zero retry delay so exhaustion tests run instantly.
pub fn test_config() -> IndexServiceConfig {
    let mut config = IndexServiceConfig::new("https://index.test/index");
    config.retry = RetryConfig {
        max_attempts: 10,
        delay_ms: 0,
    };
    config
}

pub fn extramural_config() -> IndexServiceConfig {
    let mut config = test_config();
    config.extramural_bucket = true;
    config
}

#[derive(Clone, Debug, Default)]
pub struct FakeRecord {
    pub rev: String,
    pub size: Option<u64>,
    pub hashes: Option<Hashes>,
    pub urls: Vec<String>,
    pub uploader: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Calls {
    pub search: u32,
    pub fetch_rev: u32,
    pub create: u32,
    pub update: u32,
}

#[derive(Default)]
struct FakeState {
    records: BTreeMap<String, FakeRecord>,
    calls: Calls,
    rev_counter: u32,
    did_counter: u32,
    failing_searches: u32,
    failing_fetches: u32,
    failing_updates: u32,
    concurrent_bumps: u32,
    concurrent_hash_writes: u32,
    lost_create: Option<String>,
}

impl FakeState {
    fn next_rev(&mut self) -> String {
        self.rev_counter += 1;
        format!("rev-{}", self.rev_counter)
    }
}

/// Index service keeping records in memory with real rev compare-and-swap.
#[derive(Default)]
pub struct FakeIndex {
    state: Mutex<FakeState>,
}

impl FakeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record without size or hashes and return its rev.
    pub fn insert_blank(&self, did: &str, url: Option<&str>) -> String {
        let mut state = self.state.lock().unwrap();
        let rev = state.next_rev();
        state.records.insert(
            did.to_string(),
            FakeRecord {
                rev: rev.clone(),
                urls: url.map(|u| vec![u.to_string()]).unwrap_or_default(),
                ..FakeRecord::default()
            },
        );
        rev
    }

    pub fn record(&self, did: &str) -> Option<FakeRecord> {
        self.state.lock().unwrap().records.get(did).cloned()
    }

    pub fn records(&self) -> BTreeMap<String, FakeRecord> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn calls(&self) -> Calls {
        self.state.lock().unwrap().calls
    }

    pub fn fail_next_searches(&self, n: u32) {
        self.state.lock().unwrap().failing_searches = n;
    }

    pub fn fail_next_fetches(&self, n: u32) {
        self.state.lock().unwrap().failing_fetches = n;
    }

    pub fn fail_next_updates(&self, n: u32) {
        self.state.lock().unwrap().failing_updates = n;
    }

    /// Another writer changes the record (new rev, no hashes) right before
    /// each of the next `n` updates arrives.
    pub fn concurrent_bumps(&self, n: u32) {
        self.state.lock().unwrap().concurrent_bumps = n;
    }

    /// The next create commits a record listing `url`, then the response is
    /// lost and the caller sees a decode error.
    pub fn lose_next_create(&self, url: &str) {
        self.state.lock().unwrap().lost_create = Some(url.to_string());
    }

    /// Another reconciler stores hashes right before the next `n` updates arrive.
    pub fn concurrent_hash_writes(&self, n: u32) {
        self.state.lock().unwrap().concurrent_hash_writes = n;
    }
}

fn unavailable() -> ClientError {
    ClientError::Status {
        status: 503,
        body: "service unavailable".to_string(),
    }
}

#[async_trait]
impl IndexService for FakeIndex {
    async fn search_by_url(&self, url: &str) -> ClientResult<Vec<RecordRef>> {
        let mut state = self.state.lock().unwrap();
        state.calls.search += 1;
        if state.failing_searches > 0 {
            state.failing_searches -= 1;
            return Err(unavailable());
        }
        Ok(state
            .records
            .iter()
            .filter(|(_, record)| record.urls.iter().any(|u| u == url))
            .map(|(did, record)| RecordRef {
                did: did.clone(),
                baseid: None,
                rev: record.rev.clone(),
            })
            .collect())
    }

    async fn fetch_rev(&self, did: &str) -> ClientResult<Option<String>> {
        let mut state = self.state.lock().unwrap();
        state.calls.fetch_rev += 1;
        if state.failing_fetches > 0 {
            state.failing_fetches -= 1;
            return Err(unavailable());
        }
        let record = state.records.get(did).ok_or_else(|| ClientError::Status {
            status: 404,
            body: format!("no record found: {did}"),
        })?;
        if record.size.is_some() && record.hashes.is_some() {
            return Ok(None);
        }
        Ok(Some(record.rev.clone()))
    }

    async fn create_blank(&self, request: &CreateBlankRequest) -> ClientResult<RecordRef> {
        let mut state = self.state.lock().unwrap();
        state.calls.create += 1;
        state.did_counter += 1;
        let did = format!("did-{}", state.did_counter);
        let rev = state.next_rev();
        state.records.insert(
            did.clone(),
            FakeRecord {
                rev: rev.clone(),
                uploader: Some(request.uploader.clone()),
                file_name: Some(request.file_name.clone()),
                ..FakeRecord::default()
            },
        );
        if let Some(url) = state.lost_create.take() {
            if let Some(record) = state.records.get_mut(&did) {
                record.urls.push(url);
            }
            return Err(ClientError::Decode("connection closed before body".to_string()));
        }
        Ok(RecordRef {
            did,
            baseid: None,
            rev,
        })
    }

    async fn conditional_update(
        &self,
        did: &str,
        rev: &str,
        request: &UpdateRecordRequest,
    ) -> ClientResult<UpdateStatus> {
        let mut state = self.state.lock().unwrap();
        state.calls.update += 1;
        if state.failing_updates > 0 {
            state.failing_updates -= 1;
            return Ok(UpdateStatus::Rejected {
                status: 500,
                body: "internal error".to_string(),
            });
        }

        if state.concurrent_bumps > 0 {
            state.concurrent_bumps -= 1;
            let bumped = state.next_rev();
            if let Some(record) = state.records.get_mut(did) {
                record.rev = bumped;
            }
        }
        if state.concurrent_hash_writes > 0 {
            state.concurrent_hash_writes -= 1;
            let bumped = state.next_rev();
            if let Some(record) = state.records.get_mut(did) {
                record.rev = bumped;
                record.size = Some(request.size);
                record.hashes = Some(request.hashes.clone());
            }
        }

        let next_rev = state.next_rev();
        let Some(record) = state.records.get_mut(did) else {
            return Ok(UpdateStatus::Rejected {
                status: 404,
                body: format!("no record found: {did}"),
            });
        };
        if record.rev != rev {
            return Ok(UpdateStatus::Conflict {
                body: format!("revision mismatch: {rev} != {}", record.rev),
            });
        }

        record.rev = next_rev;
        record.size = Some(request.size);
        record.hashes = Some(request.hashes.clone());
        for url in &request.urls {
            if !record.urls.contains(url) {
                record.urls.push(url.clone());
            }
        }
        Ok(UpdateStatus::Applied)
    }
}

#[derive(Default)]
struct StoreState {
    objects: HashMap<(String, String), Bytes>,
    owners: HashMap<String, String>,
    failing_reads: u32,
    stream_opens: u32,
    manifest_reads: u32,
}

/// Blob store holding objects in memory. Streams yield small chunks.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert((bucket.to_string(), key.to_string()), data.into());
    }

    pub fn set_owner(&self, bucket: &str, owner: &str) {
        self.state
            .lock()
            .unwrap()
            .owners
            .insert(bucket.to_string(), owner.to_string());
    }

    /// The next `n` streams fail after their first chunk.
    pub fn fail_next_reads(&self, n: u32) {
        self.state.lock().unwrap().failing_reads = n;
    }

    pub fn stream_opens(&self) -> u32 {
        self.state.lock().unwrap().stream_opens
    }

    pub fn manifest_reads(&self) -> u32 {
        self.state.lock().unwrap().manifest_reads
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        let mut state = self.state.lock().unwrap();
        state.manifest_reads += 1;
        state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("{bucket}/{key}")))
    }

    async fn get_stream(&self, bucket: &str, key: &str) -> StorageResult<ByteStream> {
        let mut state = self.state.lock().unwrap();
        state.stream_opens += 1;
        let data = state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("{bucket}/{key}")))?;

        let mut chunks: Vec<StorageResult<Bytes>> = data
            .chunks(4)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            chunks.truncate(1);
            chunks.push(Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ))));
        }
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn bucket_owner(&self, bucket: &str) -> StorageResult<String> {
        self.state
            .lock()
            .unwrap()
            .owners
            .get(bucket)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("owner of {bucket}")))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
