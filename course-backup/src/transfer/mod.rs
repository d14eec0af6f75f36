//! Download streaming helpers and progress accounting.

pub mod progress;
pub mod progress_stream;

pub use progress::{format_bytes, format_duration, ProgressSnapshot, RunProgress};
pub use progress_stream::{ProgressCallback, ProgressStream};
