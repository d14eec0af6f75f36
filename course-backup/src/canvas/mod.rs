//! Remote LMS export API.
//!
//! [`ExportApi`] is the seam between the export pipeline and the remote
//! service; [`CanvasClient`] is the HTTP implementation used in production.

pub mod client;
pub mod models;

use crate::utils::errors::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;

pub use client::CanvasClient;
pub use models::{Attachment, ContentExport, ExportProgress};

/// Streamed archive body.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Operations the export pipeline needs from the remote service.
#[async_trait]
pub trait ExportApi: Send + Sync {
    /// Start a new export for a course.
    async fn create_export(&self, course_id: &str) -> Result<ContentExport>;

    /// Read the progress object of a running export.
    async fn get_progress(&self, progress_url: &str) -> Result<ExportProgress>;

    /// Resolve the download URL of a finished export.
    async fn get_export_result(&self, course_id: &str, export_id: u64) -> Result<String>;

    /// Open the archive at `url` as a byte stream.
    async fn stream_download(&self, url: &str) -> Result<ByteStream>;
}
