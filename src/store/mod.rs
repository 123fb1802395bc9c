pub mod files;
pub mod types;

pub use files::TaskStore;
pub use types::{RepeatSpec, TaskRecord, TaskTiming, MIN_INTERVAL_SECS};
