// Live CPU/memory values for one running container.
//
// A session opens the engine's push stats stream and arms a watchdog at the same
// time. If the stream has delivered a parseable sample when the watchdog fires,
// the stream keeps driving the display. Otherwise the subscription is released
// and the session polls the engine CLI on a fixed period until it is stopped.
// A stream that ends later also hands over to polling, with its values cleared.
// A failed poll leaves the display as it was and the next tick retries.

mod sample;

pub use sample::{PolledStats, parse_chunk, parse_poll_line};

use crate::config::StatsConfig;
use crate::error::EngineError;
use crate::models::{
    ContainerState, LiveStats, RawStats, SessionMode, StatsSnapshot, format_cpu_percent,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use std::sync::Arc;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Interval, MissedTickBehavior, interval, sleep};
use tracing::{Instrument, debug, info};

pub const DEFAULT_WATCHDOG: Duration = Duration::from_millis(1000);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// One delivery from a push stats subscription.
#[derive(Debug, Clone)]
pub enum StatsChunk {
    /// Raw text: one JSON object or newline-delimited objects.
    Text(String),
    /// An already-decoded payload.
    Sample(RawStats),
}

pub type StatsStream = BoxStream<'static, StatsChunk>;

type OpenFuture<'a> = BoxFuture<'a, Result<StatsStream, EngineError>>;

/// Where samples come from. Implemented by the Docker adapter and by test fakes.
#[async_trait]
pub trait StatsBackend: Send + Sync {
    /// Open a push subscription for one container.
    async fn open_stream(&self, container_id: &str) -> Result<StatsStream, EngineError>;

    /// One non-streaming `CPU%|MemUsage` line for one container.
    async fn poll_once(&self, container_id: &str) -> Result<String, EngineError>;
}

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub watchdog: Duration,
    pub poll_interval: Duration,
    /// Shared cap on polls in flight across sessions; `None` = unlimited.
    pub poll_limiter: Option<Arc<Semaphore>>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            watchdog: DEFAULT_WATCHDOG,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_limiter: None,
        }
    }
}

impl ReconcilerConfig {
    /// Timings from config; `poll_limiter` is shared by every session built from it.
    pub fn from_settings(stats: &StatsConfig, poll_limiter: Option<Arc<Semaphore>>) -> Self {
        Self {
            watchdog: Duration::from_millis(stats.watchdog_ms),
            poll_interval: Duration::from_millis(stats.poll_interval_ms),
            poll_limiter,
        }
    }
}

/// One (container, display) pair. Dropping the session stops it.
pub struct ReconcilerSession {
    container_id: String,
    cancel_tx: watch::Sender<bool>,
    display: Arc<watch::Sender<LiveStats>>,
    task: Option<JoinHandle<()>>,
}

impl ReconcilerSession {
    /// Start reconciling `container_id`. A container that is not running (or has no id)
    /// gives an idle session that holds no stream or timer.
    pub fn start(
        backend: Arc<dyn StatsBackend>,
        container_id: &str,
        state: ContainerState,
        config: ReconcilerConfig,
    ) -> Self {
        let idle = container_id.is_empty() || !state.is_running();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let display = Arc::new(watch::Sender::new(LiveStats {
            mode: if idle {
                SessionMode::Idle
            } else {
                SessionMode::AwaitingFirstSample
            },
            ..Default::default()
        }));

        let task = if idle {
            debug!(container_id, ?state, "stats session idle");
            None
        } else {
            let painter = Painter {
                display: display.clone(),
                cancel: cancel_rx.clone(),
            };
            let span = tracing::debug_span!("stats_session", container_id = %container_id);
            Some(tokio::spawn(
                run(backend, container_id.to_string(), config, cancel_rx, painter).instrument(span),
            ))
        };

        Self {
            container_id: container_id.to_string(),
            cancel_tx,
            display,
            task,
        }
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn latest(&self) -> LiveStats {
        self.display.borrow().clone()
    }

    pub fn mode(&self) -> SessionMode {
        self.display.borrow().mode
    }

    /// Receiver notified on every display change.
    pub fn watch(&self) -> watch::Receiver<LiveStats> {
        self.display.subscribe()
    }

    /// Request teardown. Idempotent; safe before anything was opened.
    pub fn stop(&mut self) {
        let already = self.cancel_tx.send_replace(true);
        self.display.send_modify(|s| s.mode = SessionMode::Stopped);
        if !already {
            debug!(container_id = %self.container_id, "stats session stop requested");
        }
    }

    /// Stop and wait until the stream, watchdog and poll timer are released.
    pub async fn join(mut self) {
        self.stop();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            debug!(error = %e, "stats session task ended abnormally");
        }
    }

    /// True once the background task (if any) has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|t| t.is_finished())
    }
}

impl Drop for ReconcilerSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Writes to the shared display unless the session was cancelled meanwhile.
struct Painter {
    display: Arc<watch::Sender<LiveStats>>,
    cancel: watch::Receiver<bool>,
}

impl Painter {
    fn update(&self, f: impl FnOnce(&mut LiveStats)) {
        if *self.cancel.borrow() {
            return;
        }
        self.display.send_modify(f);
    }

    fn set_mode(&self, mode: SessionMode) {
        self.update(|s| s.mode = mode);
    }

    fn paint_sample(&self, snapshot: &StatsSnapshot) {
        let cpu = snapshot.cpu_percent();
        let memory = snapshot.memory_display();
        self.update(|s| {
            s.cpu_percent = Some(cpu);
            s.cpu_text = format_cpu_percent(cpu);
            s.memory_text = memory;
        });
    }

    fn paint_polled(&self, polled: &PolledStats) {
        self.update(|s| {
            s.cpu_percent = Some(polled.cpu_percent);
            s.cpu_text = format_cpu_percent(polled.cpu_percent);
            s.memory_text = polled.memory_text.clone();
        });
    }

    /// Switch to polling. `clear` drops values painted by a stream that has gone away.
    fn fall_back(&self, clear: bool) {
        self.update(|s| {
            s.mode = SessionMode::Polling;
            if clear {
                clear_live_values(s);
            }
        });
    }

    fn finish(&self) {
        self.display.send_modify(|s| s.mode = SessionMode::Stopped);
    }
}

async fn run(
    backend: Arc<dyn StatsBackend>,
    container_id: String,
    config: ReconcilerConfig,
    mut cancel_rx: watch::Receiver<bool>,
    painter: Painter,
) {
    // The watchdog runs while the subscription is still opening.
    let watchdog = sleep(config.watchdog);
    tokio::pin!(watchdog);
    let mut opening: Option<OpenFuture<'_>> = Some(backend.open_stream(&container_id));

    let mut stream: Option<StatsStream> = None;
    let mut received_sample = false;
    let mut watchdog_armed = true;
    let mut poll_tick: Option<Interval> = None;

    loop {
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel_rx) => break,
            opened = next_open(&mut opening) => {
                opening = None;
                match opened {
                    Ok(opened) => stream = Some(opened),
                    Err(e) => debug!(error = %e, "stats subscription unavailable; waiting for fallback"),
                }
            }
            chunk = next_chunk(&mut stream) => match chunk {
                Some(chunk) => {
                    for raw in samples(chunk) {
                        painter.paint_sample(&StatsSnapshot::from(&raw));
                        received_sample = true;
                    }
                }
                None => {
                    stream = None;
                    if watchdog_armed {
                        debug!("stats stream ended before the watchdog");
                    } else {
                        info!("stats stream ended; falling back to polling");
                        painter.fall_back(true);
                        poll_tick = Some(poll_timer(config.poll_interval));
                    }
                }
            },
            _ = &mut watchdog, if watchdog_armed => {
                watchdog_armed = false;
                if received_sample && stream.is_some() {
                    painter.set_mode(SessionMode::Streaming);
                } else {
                    info!("no live stats stream; falling back to polling");
                    opening = None;
                    stream = None;
                    painter.fall_back(false);
                    poll_tick = Some(poll_timer(config.poll_interval));
                }
            }
            _ = next_tick(&mut poll_tick) => {
                let polled = tokio::select! {
                    biased;
                    _ = cancelled(&mut cancel_rx) => break,
                    polled = poll_stats(backend.as_ref(), &container_id, config.poll_limiter.as_deref()) => polled,
                };
                match polled {
                    Ok(Some(polled)) => painter.paint_polled(&polled),
                    Ok(None) => debug!(operation = "poll_stats", "empty stats output"),
                    Err(e) => debug!(error = %e, operation = "poll_stats", "stats poll failed"),
                }
            }
        }
    }

    drop(opening);
    drop(stream);
    drop(poll_tick);
    painter.finish();
    debug!("stats session stopped");
}

fn clear_live_values(s: &mut LiveStats) {
    s.cpu_percent = None;
    s.cpu_text.clear();
    s.memory_text.clear();
}

/// Resolves once stop was requested or the session handle is gone.
async fn cancelled(cancel_rx: &mut watch::Receiver<bool>) {
    let _ = cancel_rx.wait_for(|c| *c).await;
}

fn samples(chunk: StatsChunk) -> Vec<RawStats> {
    match chunk {
        StatsChunk::Text(text) => parse_chunk(&text),
        StatsChunk::Sample(raw) if raw.has_metrics() => vec![raw],
        StatsChunk::Sample(_) => Vec::new(),
    }
}

async fn next_open(opening: &mut Option<OpenFuture<'_>>) -> Result<StatsStream, EngineError> {
    match opening {
        Some(open) => open.await,
        None => std::future::pending().await,
    }
}

async fn next_chunk(stream: &mut Option<StatsStream>) -> Option<StatsChunk> {
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

fn poll_timer(period: Duration) -> Interval {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tick
}

async fn next_tick(tick: &mut Option<Interval>) {
    match tick {
        Some(tick) => {
            tick.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn poll_stats(
    backend: &dyn StatsBackend,
    container_id: &str,
    limiter: Option<&Semaphore>,
) -> Result<Option<PolledStats>, EngineError> {
    let _permit = match limiter {
        Some(limiter) => Some(limiter.acquire().await.map_err(|_| EngineError::Command {
            status: None,
            stderr: "poll limiter closed".into(),
        })?),
        None => None,
    };
    let line = backend.poll_once(container_id).await?;
    Ok(parse_poll_line(&line))
}
