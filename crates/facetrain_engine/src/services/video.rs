use std::sync::Arc;

use facetrain_core::{validate_interval, validate_video_file, StatusResponse};
use serde::Deserialize;
use serde_json::Value;

use super::{decode, expect_success, quick_get};
use crate::{ApiError, ApiRequest, CallTimeout, MultipartField, Transport, UploadFile};

/// Upload limits as advertised by the backend.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VideoApiInfo {
    #[serde(default)]
    pub supported_formats: Vec<String>,
    #[serde(default)]
    pub max_file_size_mb: Option<f64>,
    #[serde(default)]
    pub default_interval_seconds: Option<f64>,
    #[serde(default)]
    pub min_interval_seconds: Option<f64>,
    #[serde(default)]
    pub max_interval_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadAccepted {
    pub video_id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status_endpoint: Option<String>,
}

/// A video plus the parameters of its recognition run.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoUpload {
    pub file: UploadFile,
    pub domain: String,
    pub interval_seconds: f64,
}

impl VideoUpload {
    pub fn new(file: UploadFile, domain: impl Into<String>) -> Self {
        Self {
            file,
            domain: domain.into(),
            interval_seconds: 3.0,
        }
    }

    pub fn interval(mut self, seconds: f64) -> Self {
        self.interval_seconds = seconds;
        self
    }

    /// Check size, extension and interval; nothing is sent when this fails.
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_video_file(&self.file.file_name, self.file.size_bytes)?;
        validate_interval(self.interval_seconds)?;
        Ok(())
    }

    fn into_fields(self) -> Vec<MultipartField> {
        vec![
            MultipartField::File {
                name: "file".to_string(),
                file: self.file,
            },
            MultipartField::Text {
                name: "domain".to_string(),
                value: self.domain,
            },
            MultipartField::Text {
                name: "interval_seconds".to_string(),
                value: self.interval_seconds.to_string(),
            },
        ]
    }
}

/// Video recognition: uploads and per-video processing status.
#[derive(Clone)]
pub struct VideoService {
    transport: Arc<dyn Transport>,
}

impl VideoService {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn info(&self) -> Result<VideoApiInfo, ApiError> {
        let request = quick_get("/api/video/info");
        decode(expect_success(self.transport.send(request).await?)?)
    }

    /// Upload and wait for recognition to finish. Returns the final status body.
    pub async fn upload_sync(&self, upload: VideoUpload) -> Result<StatusResponse, ApiError> {
        upload.validate()?;
        let request = ApiRequest::post("/api/video/upload")
            .multipart(upload.into_fields())
            .timeout(CallTimeout::Custom(std::time::Duration::from_secs(600)));
        decode(expect_success(self.transport.send(request).await?)?)
    }

    /// Upload and return as soon as the backend has queued the video.
    pub async fn upload_async(&self, upload: VideoUpload) -> Result<UploadAccepted, ApiError> {
        upload.validate()?;
        let request = ApiRequest::post("/api/video/upload-async")
            .multipart(upload.into_fields())
            .timeout(CallTimeout::Custom(std::time::Duration::from_secs(300)));
        decode(expect_success(self.transport.send(request).await?)?)
    }

    /// Processing status of a video. A 202 reply means still processing and
    /// a 404 means the id is unknown; both are answers, not errors.
    pub async fn status(&self, video_id: &str) -> Result<StatusResponse, ApiError> {
        let request = quick_get(format!("/api/video/status/{video_id}"));
        match self.transport.send(request).await {
            Ok(response) if response.status == 202 => Ok(with_video_id(
                StatusResponse::processing("Video is still being processed"),
                video_id,
            )),
            Ok(response) => decode(response.body),
            Err(err) if err.is_not_found() => Ok(with_video_id(
                StatusResponse::not_found("Video not found"),
                video_id,
            )),
            Err(err) => Err(err),
        }
    }
}

fn with_video_id(mut response: StatusResponse, video_id: &str) -> StatusResponse {
    response
        .payload
        .insert("video_id".to_string(), Value::String(video_id.to_string()));
    response
}
