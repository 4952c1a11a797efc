//! Object locations and the identity embedded in managed bucket keys.

use crate::error::{Error, Result};
use percent_encoding::percent_decode_str;
use std::fmt;
use url::Url;

/// A parsed object location: bucket, key and the canonical full URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectReference {
    bucket: String,
    key: String,
    full_url: String,
}

impl ObjectReference {
    /// Parse an object location such as `s3://bucket/dir/file.bam`.
    ///
    /// The input may arrive query-escaped (as in bucket event notifications),
    /// so the whole location is unescaped before it is parsed.
    pub fn parse(raw: &str) -> Result<Self> {
        let unescaped = query_unescape(raw.trim())?;
        let url = Url::parse(&unescaped)
            .map_err(|e| Error::InvalidObjectUrl(format!("{raw}: {e}")))?;

        // The parser re-escapes characters such as spaces; undo only that
        let bucket = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| Error::InvalidObjectUrl(format!("{raw}: missing bucket")))?;
        let bucket = percent_decode(bucket)?;

        let key = percent_decode(url.path().trim_start_matches('/'))?;
        if key.is_empty() {
            return Err(Error::InvalidObjectUrl(format!("{raw}: missing object key")));
        }

        let full_url = format!("{}://{}/{}", url.scheme(), bucket, key);
        Ok(Self {
            bucket,
            key,
            full_url,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key, without a leading `/`.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn full_url(&self) -> &str {
        &self.full_url
    }

    /// Last path segment of the key.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    /// Identity embedded in a managed bucket key. See [`identity_from_key`].
    pub fn embedded_identity(&self) -> Result<String> {
        identity_from_key(&self.key)
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_url)
    }
}

/// Derive the record identity from a managed bucket key.
///
/// Keys look like one of:
///
/// ```text
/// <id>/<filename>
/// <guid>/<id>/<filename>
/// ```
///
/// and the identity is everything except the file name. Any other layout
/// means the bucket does not follow the managed convention.
pub fn identity_from_key(key: &str) -> Result<String> {
    let key = key.trim_start_matches('/');
    let segments: Vec<&str> = key.split('/').collect();
    match segments.as_slice() {
        [id, _file] => Ok((*id).to_string()),
        [guid, id, _file] => Ok(format!("{guid}/{id}")),
        _ => Err(Error::UnrecognizedKeyLayout {
            key: key.to_string(),
            segments: segments.len(),
        }),
    }
}

/// Decode `+` as space and `%XX` escapes, matching form/query unescaping.
fn query_unescape(s: &str) -> Result<String> {
    percent_decode(&s.replace('+', " "))
}

fn percent_decode(s: &str) -> Result<String> {
    percent_decode_str(s)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| Error::InvalidObjectUrl(format!("{s}: {e}")))
}
