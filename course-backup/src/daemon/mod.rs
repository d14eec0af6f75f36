pub mod scheduler;
pub mod shutdown;

pub use scheduler::{BackupScheduler, ScheduledRun};
pub use shutdown::ShutdownCoordinator;
