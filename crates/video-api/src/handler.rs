//! Request routing for the video API.
//!
//! `handle` never fails: every error becomes a JSON response with CORS
//! headers.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::BucketConfig;
use crate::error::{Result, VideoApiError};
use crate::store::{object_url, ObjectStore};

/// Objects returned by one listing.
pub const MAX_LISTED: usize = 100;
/// Lifetime of an upload URL.
pub const UPLOAD_URL_TTL: Duration = Duration::from_secs(3600);

const DEFAULT_CONTENT_TYPE: &str = "video/mp4";
const DEFAULT_EXTENSION: &str = "mp4";

/// Incoming HTTP event (API gateway proxy shape).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiEvent {
    #[serde(rename = "httpMethod", default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub body: Option<String>,
}

impl ApiEvent {
    pub fn new(method: &str, path: &str, body: Option<&str>) -> Self {
        Self {
            http_method: Some(method.to_string()),
            path: path.to_string(),
            body: body.map(str::to_string),
        }
    }

    /// Method, defaulting to `GET`.
    pub fn method(&self) -> &str {
        self.http_method.as_deref().unwrap_or("GET")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ApiResponse {
    fn json(status_code: u16, body: Value) -> Self {
        Self {
            status_code,
            headers: cors_headers(),
            body: body.to_string(),
        }
    }

    fn error(status_code: u16, error: &str, message: impl Into<String>) -> Self {
        Self::json(
            status_code,
            json!({ "error": error, "message": message.into() }),
        )
    }

    /// Parsed body. Bodies are always written as JSON by this module.
    pub fn body_json(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.body)
    }
}

pub fn cors_headers() -> BTreeMap<String, String> {
    [
        ("Content-Type", "application/json"),
        ("Access-Control-Allow-Origin", "*"),
        (
            "Access-Control-Allow-Headers",
            "Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token",
        ),
        ("Access-Control-Allow-Methods", "OPTIONS,GET,POST,PUT,DELETE"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Route one event.
pub async fn handle(event: &ApiEvent, store: &dyn ObjectStore, config: &BucketConfig) -> ApiResponse {
    let method = event.method();
    info!(method, path = %event.path, "video api request");

    match (method, event.path.as_str()) {
        ("OPTIONS", _) => ApiResponse::json(200, json!({ "message": "CORS preflight successful" })),
        ("GET", "/videos") => list_videos(store, config).await.unwrap_or_else(|e| {
            error!(error = %e, "listing videos failed");
            ApiResponse::error(500, "Failed to retrieve videos", e.to_string())
        }),
        ("POST", "/videos") => create_upload(event.body.as_deref(), store, config).await,
        (method, path) => ApiResponse::error(
            404,
            "Not Found",
            format!("Path {path} with method {method} not found"),
        ),
    }
}

async fn list_videos(store: &dyn ObjectStore, config: &BucketConfig) -> Result<ApiResponse> {
    let (Some(_), Some(bucket)) = (&config.staging_bucket, &config.distribution_bucket) else {
        return Err(VideoApiError::MissingConfig(
            "Required environment variables not set".to_string(),
        ));
    };

    let objects = store.list_objects(bucket, MAX_LISTED).await?;
    let videos: Vec<Value> = objects
        .iter()
        .map(|obj| {
            json!({
                "id": video_id_from_key(&obj.key),
                "filename": obj.key,
                "size": obj.size,
                "last_modified": obj.last_modified.to_rfc3339(),
                "url": object_url(bucket, &obj.key),
            })
        })
        .collect();

    Ok(ApiResponse::json(
        200,
        json!({
            "count": videos.len(),
            "videos": videos,
            "bucket": bucket,
            "timestamp": Utc::now().to_rfc3339(),
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct UploadRequest {
    filename: Option<String>,
    content_type: Option<String>,
}

async fn create_upload(
    body: Option<&str>,
    store: &dyn ObjectStore,
    config: &BucketConfig,
) -> ApiResponse {
    let request: UploadRequest = match serde_json::from_str(body.unwrap_or("{}")) {
        Ok(request) => request,
        Err(_) => return ApiResponse::error(400, "Bad Request", "Invalid JSON in request body"),
    };
    let Some(filename) = request.filename.filter(|f| !f.is_empty()) else {
        return ApiResponse::error(400, "Bad Request", "filename is required");
    };
    let content_type = request
        .content_type
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    let Some(bucket) = config.staging_bucket.as_deref() else {
        return ApiResponse::error(
            500,
            "Failed to create upload URL",
            "STAGING_BUCKET environment variable not set",
        );
    };

    let video_id = Uuid::new_v4().to_string();
    let key = format!("uploads/{video_id}.{}", upload_extension(&filename));

    let upload_url = match store
        .presign_put(bucket, &key, &content_type, UPLOAD_URL_TTL)
        .await
    {
        Ok(url) => url,
        Err(e) => {
            error!(error = %e, key = %key, "presigning upload failed");
            return ApiResponse::error(500, "Failed to create upload URL", e.to_string());
        }
    };
    info!(video_id = %video_id, key = %key, "upload url issued");

    ApiResponse::json(
        201,
        json!({
            "video": {
                "id": video_id,
                "original_filename": filename,
                "s3_key": key,
                "bucket": bucket,
                "content_type": content_type,
                "status": "pending_upload",
                "created_at": Utc::now().to_rfc3339(),
            },
            "upload_url": upload_url,
            "expires_in": UPLOAD_URL_TTL.as_secs(),
            "instructions": {
                "method": "PUT",
                "headers": { "Content-Type": content_type },
                "note": "Use the upload_url to upload your video file directly to S3"
            }
        }),
    )
}

/// Last path segment up to its first dot.
pub fn video_id_from_key(key: &str) -> &str {
    let name = key.rsplit('/').next().unwrap_or(key);
    name.split('.').next().unwrap_or(name)
}

/// Text after the last dot of `filename`, or `mp4`.
pub fn upload_extension(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext,
        _ => DEFAULT_EXTENSION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_from_key() {
        assert_eq!(video_id_from_key("uploads/abc.mp4"), "abc");
        assert_eq!(video_id_from_key("clip.v2.mov"), "clip");
        assert_eq!(video_id_from_key("a/b/c"), "c");
    }

    #[test]
    fn test_upload_extension() {
        assert_eq!(upload_extension("holiday.mov"), "mov");
        assert_eq!(upload_extension("archive.tar.gz"), "gz");
        assert_eq!(upload_extension("raw"), "mp4");
        assert_eq!(upload_extension("trailing."), "mp4");
    }

    #[test]
    fn test_event_defaults_to_get() {
        let event: ApiEvent = serde_json::from_str(r#"{"path":"/videos"}"#).unwrap();
        assert_eq!(event.method(), "GET");
        assert!(event.body.is_none());
    }

    #[test]
    fn test_cors_headers() {
        let headers = cors_headers();
        assert_eq!(headers["Access-Control-Allow-Origin"], "*");
        assert_eq!(headers["Content-Type"], "application/json");
    }
}
