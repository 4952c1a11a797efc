//! Uploader resolution for blank records of extramural objects.

use indexer_core::{IndexServiceConfig, ObjectReference};
use indexer_storage::BlobStore;
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use tracing::{info, warn};

/// Key → uploader lookup, pluggable into the resolver.
pub trait UploaderLookup: Send + Sync {
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Two-column table of `(object_key, uploader)` rows.
#[derive(Clone, Debug, Default)]
pub struct ManifestTable {
    rows: HashMap<String, String>,
}

impl ManifestTable {
    /// Parse a headerless CSV manifest. Later rows win for duplicate keys;
    /// rows with fewer than two columns are ignored.
    pub fn from_csv(reader: impl Read) -> Result<Self, csv::Error> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows = HashMap::new();
        for record in csv.records() {
            let record = record?;
            if let (Some(key), Some(uploader)) = (record.get(0), record.get(1)) {
                rows.insert(key.to_string(), uploader.to_string());
            }
        }
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FromIterator<(String, String)> for ManifestTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

impl UploaderLookup for ManifestTable {
    fn lookup(&self, key: &str) -> Option<String> {
        self.rows.get(key).cloned()
    }
}

/// Picks the uploader of a new blank record by strict priority:
/// configured literal, bucket owner, manifest lookup, empty string.
///
/// Failures never abort reconciliation; they degrade to an empty uploader.
pub(crate) struct UploaderResolver<'a> {
    pub(crate) config: &'a IndexServiceConfig,
    pub(crate) store: &'a dyn BlobStore,
    pub(crate) lookup: Option<&'a Arc<dyn UploaderLookup>>,
}

impl UploaderResolver<'_> {
    pub(crate) async fn resolve(&self, object: &ObjectReference) -> String {
        if let Some(uploader) = &self.config.extramural_uploader {
            return uploader.clone();
        }

        if self.config.extramural_uploader_s3owner {
            return match self.store.bucket_owner(object.bucket()).await {
                Ok(owner) => owner,
                Err(err) => {
                    warn!(bucket = object.bucket(), error = %err, "Could not fetch bucket owner, using empty uploader");
                    String::new()
                }
            };
        }

        if let Some(lookup) = self.lookup {
            return Self::lookup_or_empty(&**lookup, object.key());
        }

        if let Some(manifest_key) = &self.config.extramural_uploader_manifest {
            return match self.load_manifest(object.bucket(), manifest_key).await {
                Some(table) => Self::lookup_or_empty(&table, object.key()),
                None => String::new(),
            };
        }

        String::new()
    }

    fn lookup_or_empty(lookup: &dyn UploaderLookup, key: &str) -> String {
        lookup.lookup(key).unwrap_or_else(|| {
            info!(key, "Object not found in uploader manifest");
            String::new()
        })
    }

    async fn load_manifest(&self, bucket: &str, manifest_key: &str) -> Option<ManifestTable> {
        let data = match self.store.get(bucket, manifest_key).await {
            Ok(data) => data,
            Err(err) => {
                warn!(bucket, manifest_key, error = %err, "Could not read uploader manifest");
                return None;
            }
        };

        match ManifestTable::from_csv(&data[..]) {
            Ok(table) => Some(table),
            Err(err) => {
                warn!(bucket, manifest_key, error = %err, "Could not parse uploader manifest");
                None
            }
        }
    }
}
