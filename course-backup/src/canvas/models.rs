//! Wire models for the LMS content-export endpoints.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/v1/courses/:id/content_exports`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateExportRequest {
    pub export_type: String,
    pub skip_notifications: bool,
}

/// A content export as returned by create and show.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentExport {
    pub id: u64,
    #[serde(default)]
    pub progress_url: Option<String>,
    #[serde(default)]
    pub workflow_state: Option<String>,
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    pub url: String,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Progress object polled while an export runs.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportProgress {
    pub workflow_state: String,
    #[serde(default)]
    pub completion: Option<f64>,
}

impl ExportProgress {
    /// Ready only when the state says completed and completion reached 100%.
    pub fn is_complete(&self) -> bool {
        self.workflow_state == "completed"
            && self.completion.map(|c| c >= 100.0).unwrap_or(false)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.workflow_state.as_str(), "failed" | "error")
    }
}
