// Convert bollard's typed stats response into the engine-neutral payload the reconciler reads.

use crate::models::{RawCpuStats, RawCpuUsage, RawMemoryDetail, RawMemoryStats, RawStats};
use bollard::models::{ContainerCpuStats, ContainerMemoryStats, ContainerStatsResponse};

impl From<&ContainerStatsResponse> for RawStats {
    fn from(s: &ContainerStatsResponse) -> Self {
        RawStats {
            cpu_stats: s.cpu_stats.as_ref().map(cpu_stats),
            precpu_stats: s.precpu_stats.as_ref().map(cpu_stats),
            memory_stats: s.memory_stats.as_ref().map(memory_stats),
        }
    }
}

fn cpu_stats(c: &ContainerCpuStats) -> RawCpuStats {
    RawCpuStats {
        cpu_usage: c.cpu_usage.as_ref().map(|u| RawCpuUsage {
            total_usage: u.total_usage,
            percpu_usage: u.percpu_usage.clone(),
        }),
        system_cpu_usage: c.system_cpu_usage,
        online_cpus: c.online_cpus.map(u64::from),
    }
}

// The engine reports the v1/v2 cache counters inside the free-form `stats` map.
fn memory_stats(m: &ContainerMemoryStats) -> RawMemoryStats {
    let detail = m.stats.as_ref().map(|st| RawMemoryDetail {
        cache: st.get("cache").copied(),
        inactive_file: st.get("inactive_file").copied(),
        total_inactive_file: st.get("total_inactive_file").copied(),
    });
    RawMemoryStats {
        usage: m.usage,
        usage_in_bytes: None,
        limit: m.limit,
        max_usage: m.max_usage,
        stats: detail,
    }
}
