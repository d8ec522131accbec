// Container stats payloads, the normalized snapshot and what a live row displays

use serde::{Deserialize, Serialize};

const BYTE_UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

/// Stats payload as the engine's stats endpoint sends it. Every field is optional:
/// engines differ by cgroup version, and missing fields count as 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawStats {
    pub cpu_stats: Option<RawCpuStats>,
    pub precpu_stats: Option<RawCpuStats>,
    pub memory_stats: Option<RawMemoryStats>,
}

impl RawStats {
    /// False for payloads that parse but carry no stats, such as engine error bodies.
    pub fn has_metrics(&self) -> bool {
        self.cpu_stats.is_some() || self.memory_stats.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCpuStats {
    pub cpu_usage: Option<RawCpuUsage>,
    pub system_cpu_usage: Option<u64>,
    pub online_cpus: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCpuUsage {
    pub total_usage: Option<u64>,
    pub percpu_usage: Option<Vec<u64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMemoryStats {
    pub usage: Option<u64>,
    /// Name used by some engines instead of `usage`.
    pub usage_in_bytes: Option<u64>,
    pub limit: Option<u64>,
    pub max_usage: Option<u64>,
    pub stats: Option<RawMemoryDetail>,
}

/// Reclaimable page cache: `cache` on cgroup v1, `inactive_file` on v2.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMemoryDetail {
    pub cache: Option<u64>,
    pub inactive_file: Option<u64>,
    pub total_inactive_file: Option<u64>,
}

/// One sample with engine field-name variance resolved.
/// Current and previous CPU counters always come from the same payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub cpu_usage_total: u64,
    pub cpu_usage_prev: u64,
    pub system_usage_total: u64,
    pub system_usage_prev: u64,
    pub online_cpu_count: u64,
    pub memory_usage_raw: u64,
    pub memory_cache_like: u64,
    /// 0 means unbounded.
    pub memory_limit: u64,
}

impl From<&RawStats> for StatsSnapshot {
    fn from(raw: &RawStats) -> Self {
        let cpu = raw.cpu_stats.as_ref();
        let precpu = raw.precpu_stats.as_ref();
        let total_usage =
            |c: Option<&RawCpuStats>| c.and_then(|c| c.cpu_usage.as_ref()).and_then(|u| u.total_usage);
        let system_usage = |c: Option<&RawCpuStats>| c.and_then(|c| c.system_cpu_usage);

        let online_cpu_count = cpu
            .and_then(|c| c.online_cpus)
            .filter(|n| *n > 0)
            .or_else(|| {
                cpu.and_then(|c| c.cpu_usage.as_ref())
                    .and_then(|u| u.percpu_usage.as_ref())
                    .map(|p| p.len() as u64)
                    .filter(|n| *n > 0)
            })
            .unwrap_or(1);

        let memory = raw.memory_stats.as_ref();
        let detail = memory.and_then(|m| m.stats.as_ref());
        let memory_cache_like = detail
            .and_then(|d| d.cache.or(d.inactive_file).or(d.total_inactive_file))
            .unwrap_or(0);

        StatsSnapshot {
            cpu_usage_total: total_usage(cpu).unwrap_or(0),
            cpu_usage_prev: total_usage(precpu).unwrap_or(0),
            system_usage_total: system_usage(cpu).unwrap_or(0),
            system_usage_prev: system_usage(precpu).unwrap_or(0),
            online_cpu_count,
            memory_usage_raw: memory
                .and_then(|m| m.usage.or(m.usage_in_bytes))
                .unwrap_or(0),
            memory_cache_like,
            memory_limit: memory.and_then(|m| m.limit.or(m.max_usage)).unwrap_or(0),
        }
    }
}

impl StatsSnapshot {
    /// CPU usage across all online CPUs (100.0 = one full core). Never negative.
    pub fn cpu_percent(&self) -> f64 {
        let cpu_delta = i128::from(self.cpu_usage_total) - i128::from(self.cpu_usage_prev);
        let system_delta = i128::from(self.system_usage_total) - i128::from(self.system_usage_prev);
        if cpu_delta > 0 && system_delta > 0 && self.online_cpu_count > 0 {
            (cpu_delta as f64 / system_delta as f64) * self.online_cpu_count as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Usage minus reclaimable cache, floored at 0.
    pub fn memory_usage(&self) -> u64 {
        self.memory_usage_raw.saturating_sub(self.memory_cache_like)
    }

    /// "usage" or "usage / limit" when a limit is set.
    pub fn memory_display(&self) -> String {
        if self.memory_limit > 0 {
            format!(
                "{} / {}",
                format_bytes(self.memory_usage() as f64),
                format_bytes(self.memory_limit as f64)
            )
        } else {
            format_bytes(self.memory_usage() as f64)
        }
    }
}

/// Binary-unit byte formatting: 2 decimals below 10, 1 below 100, else none.
pub fn format_bytes(bytes: f64) -> String {
    if !bytes.is_finite() || bytes <= 0.0 {
        return "0 B".to_string();
    }
    let mut value = bytes;
    let mut unit = 0;
    while value >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let precision = if value < 10.0 {
        2
    } else if value < 100.0 {
        1
    } else {
        0
    };
    format!("{value:.precision$} {}", BYTE_UNITS[unit])
}

/// Where a reconciler session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionMode {
    /// Container not running (or no id): nothing held.
    #[default]
    Idle,
    AwaitingFirstSample,
    Streaming,
    Polling,
    Stopped,
}

/// The latest displayable values of one live row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStats {
    pub mode: SessionMode,
    pub cpu_percent: Option<f64>,
    /// e.g. "12.50%"; empty until the first value arrives.
    pub cpu_text: String,
    /// e.g. "10.0 MiB / 100 MiB"; empty until the first value arrives.
    pub memory_text: String,
}

impl LiveStats {
    pub const PLACEHOLDER: &'static str = "—";

    pub fn cpu_display(&self) -> &str {
        if self.cpu_text.is_empty() {
            Self::PLACEHOLDER
        } else {
            &self.cpu_text
        }
    }

    pub fn memory_display(&self) -> &str {
        if self.memory_text.is_empty() {
            Self::PLACEHOLDER
        } else {
            &self.memory_text
        }
    }
}

pub fn format_cpu_percent(percent: f64) -> String {
    format!("{percent:.2}%")
}
