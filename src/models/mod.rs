// Domain models

mod container;
mod proxy;
mod stats;

pub use container::{ContainerState, ContainerSummary, ContainerView};
pub use proxy::{ProxyDescriptor, ProxyLink};
pub use stats::{
    LiveStats, RawCpuStats, RawCpuUsage, RawMemoryDetail, RawMemoryStats, RawStats,
    SessionMode, StatsSnapshot, format_bytes, format_cpu_percent,
};
