//! Filesystem side of a backup: artifact naming and version retention.

pub mod naming;
pub mod retention;

pub use naming::NameResolver;
pub use retention::{RetentionManager, RetentionReport};
