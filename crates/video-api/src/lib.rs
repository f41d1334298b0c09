//! Video-API: list processed videos and issue upload URLs
//!
//! A single request handler routes API-gateway style events to an
//! [`ObjectStore`]. The crate ships no cloud client and no entry point:
//! callers supply their own `ObjectStore` backend and feed events to
//! [`handle`]. `fakes::MemoryObjectStore` backs the tests.
//!
//! ```
//! use std::time::Duration;
//!
//! use async_trait::async_trait;
//! use video_api::{handle, ApiEvent, BucketConfig, ObjectStore, ObjectSummary, Result};
//!
//! struct SignedUrls;
//!
//! #[async_trait]
//! impl ObjectStore for SignedUrls {
//!     async fn list_objects(&self, _bucket: &str, _max_keys: usize) -> Result<Vec<ObjectSummary>> {
//!         Ok(Vec::new())
//!     }
//!
//!     async fn presign_put(
//!         &self,
//!         bucket: &str,
//!         key: &str,
//!         _content_type: &str,
//!         expires_in: Duration,
//!     ) -> Result<String> {
//!         Ok(format!("https://{bucket}.example/{key}?ttl={}", expires_in.as_secs()))
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let config = BucketConfig::new("staging", "distribution");
//! let event = ApiEvent::new("POST", "/videos", Some(r#"{"filename":"clip.mov"}"#));
//! let response = handle(&event, &SignedUrls, &config).await;
//! assert_eq!(response.status_code, 201);
//! # });
//! ```

mod config;
mod error;
pub mod fakes;
pub mod handler;
pub mod store;

pub use config::{BucketConfig, DISTRIBUTION_BUCKET_ENV, STAGING_BUCKET_ENV};
pub use error::{Result, VideoApiError};
pub use handler::{handle, ApiEvent, ApiResponse, MAX_LISTED, UPLOAD_URL_TTL};
pub use store::{object_url, ObjectStore, ObjectSummary};
