//! In-memory fakes for the object store (testing only)

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Result, VideoApiError};
use crate::store::{object_url, ObjectStore, ObjectSummary};

/// Buckets held in memory. Presigned URLs are deterministic strings.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    buckets: Mutex<BTreeMap<String, BTreeMap<String, ObjectSummary>>>,
    failure: Mutex<Option<String>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: &str, key: &str, size: u64, last_modified: DateTime<Utc>) {
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default()
            .insert(
                key.to_string(),
                ObjectSummary {
                    key: key.to_string(),
                    size,
                    last_modified,
                },
            );
    }

    /// Make every following call fail with `message`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    fn check(&self) -> Result<()> {
        match self.failure.lock().unwrap().as_ref() {
            Some(message) => Err(VideoApiError::Store(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_objects(&self, bucket: &str, max_keys: usize) -> Result<Vec<ObjectSummary>> {
        self.check()?;
        let buckets = self.buckets.lock().unwrap();
        Ok(buckets
            .get(bucket)
            .map(|objects| objects.values().take(max_keys).cloned().collect())
            .unwrap_or_default())
    }

    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<String> {
        self.check()?;
        Ok(format!(
            "{}?X-Amz-Expires={}&content-type={}",
            object_url(bucket, key),
            expires_in.as_secs(),
            content_type
        ))
    }
}
