// Parsing of stream chunks and CLI poll output

use crate::models::RawStats;
use tracing::debug;

/// Values read from one `docker stats --no-stream` line.
#[derive(Debug, Clone, PartialEq)]
pub struct PolledStats {
    pub cpu_percent: f64,
    /// Shown verbatim, e.g. "10.5MiB / 1.944GiB".
    pub memory_text: String,
}

/// Samples in one stream chunk: a single JSON object or newline-delimited objects.
/// Lines that do not parse, are not objects, or carry neither `cpu_stats` nor
/// `memory_stats` are skipped; the rest of the chunk still counts.
pub fn parse_chunk(chunk: &str) -> Vec<RawStats> {
    chunk
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .filter_map(|line| match serde_json::from_str::<RawStats>(line) {
            Ok(sample) if sample.has_metrics() => Some(sample),
            Ok(_) => {
                debug!("skipping stats line without cpu or memory sections");
                None
            }
            Err(e) => {
                debug!(error = %e, "skipping malformed stats line");
                None
            }
        })
        .collect()
}

/// Parse `CPU%|MemUsage`. `None` when both fields are empty.
pub fn parse_poll_line(line: &str) -> Option<PolledStats> {
    let first = line.trim().lines().next().unwrap_or("");
    let mut fields = first.split('|').map(str::trim);
    let cpu = fields.next().unwrap_or("");
    let memory = fields.next().unwrap_or("");
    if cpu.is_empty() && memory.is_empty() {
        return None;
    }
    let cpu_percent = cpu
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0);
    Some(PolledStats {
        cpu_percent,
        memory_text: memory.to_string(),
    })
}
