//! Wire models for the remote platform's task queue.
//!
//! These follow the platform's documented request/response shapes: scalar
//! queries resolve synchronously, exports return an opaque task handle whose
//! status is polled until terminal.

use crate::expr::ImageExpr;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Scene-count query
// ---------------------------------------------------------------------------

/// Query counting the scenes that survive the acquisition filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneQuery {
    pub collection: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub max_cloud_percent: f64,
    pub region: geojson::Geometry,
}

// ---------------------------------------------------------------------------
// Export requests
// ---------------------------------------------------------------------------

/// Output container format for an export task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    #[serde(rename = "GeoTIFF")]
    GeoTiff,
    #[serde(rename = "CSV")]
    Csv,
}

/// Parameters of one asynchronous export task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    #[serde(rename = "image_ref")]
    pub image: ImageExpr,
    pub description: String,
    pub destination_folder: String,
    pub file_name_prefix: String,
    pub scale: u32,
    pub region: geojson::Geometry,
    pub file_format: ExportFormat,
    pub max_pixels: f64,
}

// ---------------------------------------------------------------------------
// Task status
// ---------------------------------------------------------------------------

/// Opaque handle to a submitted export task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(String);

impl TaskHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote-side task states as reported by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteTaskState {
    Ready,
    Running,
    Completed,
    Failed,
}

impl RemoteTaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Status query response for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTaskStatus {
    pub state: RemoteTaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ImageExpr;

    fn region() -> geojson::Geometry {
        geojson::Geometry::new(geojson::Value::Polygon(vec![vec![
            vec![-45.0, -19.0],
            vec![-44.9, -19.0],
            vec![-44.9, -18.9],
            vec![-45.0, -18.9],
            vec![-45.0, -19.0],
        ]]))
    }

    #[test]
    fn state_names_are_screaming_case() {
        assert_eq!(
            serde_json::to_value(RemoteTaskState::Ready).unwrap(),
            "READY"
        );
        assert_eq!(
            serde_json::to_value(RemoteTaskState::Completed).unwrap(),
            "COMPLETED"
        );
        let state: RemoteTaskState = serde_json::from_str("\"FAILED\"").unwrap();
        assert_eq!(state, RemoteTaskState::Failed);
    }

    #[test]
    fn terminal_states() {
        assert!(RemoteTaskState::Completed.is_terminal());
        assert!(RemoteTaskState::Failed.is_terminal());
        assert!(!RemoteTaskState::Ready.is_terminal());
        assert!(!RemoteTaskState::Running.is_terminal());
    }

    #[test]
    fn export_request_wire_shape() {
        let request = ExportRequest {
            image: ImageExpr::image("dem").clip(),
            description: "02_bacia_MDE".to_string(),
            destination_folder: "zap-exports".to_string(),
            file_name_prefix: "02_bacia_MDE".to_string(),
            scale: 30,
            region: region(),
            file_format: ExportFormat::GeoTiff,
            max_pixels: 1e13,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["image_ref"]["op"], "clip");
        assert_eq!(json["file_format"], "GeoTIFF");
        assert_eq!(json["scale"], 30);
        assert_eq!(json["destination_folder"], "zap-exports");
        assert_eq!(json["file_name_prefix"], "02_bacia_MDE");
    }

    #[test]
    fn csv_format_name() {
        assert_eq!(serde_json::to_value(ExportFormat::Csv).unwrap(), "CSV");
    }

    #[test]
    fn handle_is_transparent() {
        let handle = TaskHandle::new("task-7");
        assert_eq!(serde_json::to_string(&handle).unwrap(), "\"task-7\"");
        let back: TaskHandle = serde_json::from_str("\"task-7\"").unwrap();
        assert_eq!(back, handle);
    }

    #[test]
    fn status_without_message() {
        let status: RemoteTaskStatus =
            serde_json::from_str(r#"{"state": "RUNNING"}"#).unwrap();
        assert_eq!(status.state, RemoteTaskState::Running);
        assert!(status.error_message.is_none());
    }
}
