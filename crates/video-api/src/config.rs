//! Bucket names from the environment.

pub const STAGING_BUCKET_ENV: &str = "STAGING_BUCKET";
pub const DISTRIBUTION_BUCKET_ENV: &str = "DISTRIBUTION_BUCKET";

/// Buckets used by the handler. Either may be unset; the handler reports a
/// missing bucket only on the routes that need it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketConfig {
    /// Uploads land here
    pub staging_bucket: Option<String>,
    /// Processed videos are listed from here
    pub distribution_bucket: Option<String>,
}

impl BucketConfig {
    pub fn new(staging: impl Into<String>, distribution: impl Into<String>) -> Self {
        Self {
            staging_bucket: Some(staging.into()),
            distribution_bucket: Some(distribution.into()),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            staging_bucket: get(STAGING_BUCKET_ENV),
            distribution_bucket: get(DISTRIBUTION_BUCKET_ENV),
        }
    }
}
