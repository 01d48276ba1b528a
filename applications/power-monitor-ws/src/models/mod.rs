pub mod outlet;
pub mod usage;

pub use outlet::{OutletState, SetEnabledCommand};
pub use usage::{ConnectionState, UsageReading, UsageReport};
