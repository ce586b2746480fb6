use std::sync::Arc;

use facetrain_core::StoredVideo;
use serde::Deserialize;
use serde_json::json;

use super::{decode, decode_field, expect_success, quick_get, ActionResponse};
use crate::{ApiError, ApiRequest, Transport};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DiskUsage {
    #[serde(default)]
    pub total_mb: f64,
    #[serde(default)]
    pub videos_mb: f64,
    #[serde(default)]
    pub frames_mb: f64,
    #[serde(default)]
    pub results_mb: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StorageStats {
    #[serde(default)]
    pub total_videos: u64,
    #[serde(default)]
    pub total_size_mb: f64,
    #[serde(default)]
    pub disk_usage: DiskUsage,
}

impl StorageStats {
    /// Total disk usage above which storage is flagged as critical.
    pub const CRITICAL_MB: f64 = 5000.0;
    pub const WARNING_MB: f64 = 2000.0;

    pub fn is_critical(&self) -> bool {
        self.disk_usage.total_mb > Self::CRITICAL_MB
    }

    pub fn is_warning(&self) -> bool {
        !self.is_critical() && self.disk_usage.total_mb > Self::WARNING_MB
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CleanupReport {
    #[serde(default)]
    pub videos_deleted: u64,
    #[serde(default)]
    pub days_threshold: u32,
}

/// Stored videos and their disk footprint on the server.
#[derive(Clone)]
pub struct StorageService {
    transport: Arc<dyn Transport>,
}

impl StorageService {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn stats(&self) -> Result<StorageStats, ApiError> {
        let request = quick_get("/api/storage/stats");
        decode(expect_success(self.transport.send(request).await?)?)
    }

    pub async fn videos(&self) -> Result<Vec<StoredVideo>, ApiError> {
        let request = quick_get("/api/storage/videos");
        let body = expect_success(self.transport.send(request).await?)?;
        decode_field(&body, "videos")
    }

    pub async fn delete_video(&self, video_id: &str) -> Result<ActionResponse, ApiError> {
        let request = ApiRequest::delete(format!("/api/storage/videos/{video_id}"));
        decode(expect_success(self.transport.send(request).await?)?)
    }

    /// Delete videos older than `days` days.
    pub async fn cleanup_old_videos(&self, days: u32) -> Result<CleanupReport, ApiError> {
        let request = ApiRequest::post("/api/storage/cleanup").json(json!({ "days": days }));
        decode(expect_success(self.transport.send(request).await?)?)
    }
}

/// Human-readable size of a value given in megabytes.
pub fn format_size_mb(mb: f64) -> String {
    if mb < 1.0 {
        format!("{:.2} KB", mb * 1024.0)
    } else if mb < 1024.0 {
        format!("{mb:.2} MB")
    } else {
        format!("{:.2} GB", mb / 1024.0)
    }
}

/// `h:mm:ss` or `m:ss`; `N/A` for a missing or zero duration.
pub fn format_duration(seconds: Option<f64>) -> String {
    let total = match seconds {
        Some(seconds) if seconds > 0.0 => seconds as u64,
        _ => return "N/A".to_string(),
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}
