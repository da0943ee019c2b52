pub mod limiter;
pub mod manager;

pub use limiter::{LimiterKind, LimiterState};
pub use manager::{CallUsage, LimiterSnapshot, UsageManager};
