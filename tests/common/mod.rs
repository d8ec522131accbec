// Shared test helpers: an in-memory container engine

#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use vncp::docker_repo::ContainerEngine;
use vncp::error::EngineError;
use vncp::labels::LabelMap;
use vncp::models::{ContainerState, ContainerSummary};
use vncp::reconciler::{StatsBackend, StatsChunk, StatsStream};

/// A stats payload worth exactly 100.00% CPU and "10.0 MiB / 100 MiB".
pub const SAMPLE_JSON: &str = r#"{"cpu_stats":{"cpu_usage":{"total_usage":100},"system_cpu_usage":1000,"online_cpus":2},"precpu_stats":{"cpu_usage":{"total_usage":50},"system_cpu_usage":900},"memory_stats":{"usage":10485760,"limit":104857600}}"#;

pub fn labels(pairs: &[(&str, &str)]) -> LabelMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn container(id: &str, state: ContainerState, labels: LabelMap) -> ContainerSummary {
    ContainerSummary {
        id: id.into(),
        name: format!("{id}-name"),
        image: format!("{id}-image:latest"),
        state,
        labels,
    }
}

/// Stream that delivers `chunks` and then stays open without sending more.
pub fn stream_then_silence(chunks: Vec<StatsChunk>) -> StatsStream {
    stream::iter(chunks).chain(stream::pending()).boxed()
}

/// Stream that delivers `chunks` and closes once `after` has elapsed,
/// the way the engine ends a stream when the container stops.
pub fn stream_then_end(chunks: Vec<StatsChunk>, after: Duration) -> StatsStream {
    let end = stream::once(tokio::time::sleep(after))
        .filter_map(|()| async { None::<StatsChunk> });
    stream::iter(chunks).chain(end).boxed()
}

#[derive(Default)]
pub struct FakeEngine {
    pub containers: Vec<ContainerSummary>,
    pub images: HashMap<String, LabelMap>,
    pub files: HashMap<(String, String), String>,
    /// Handed out by the next `open_stream`; a silent stream when `None`.
    pub stream: Mutex<Option<StatsStream>>,
    pub fail_open: bool,
    /// `open_stream` never resolves.
    pub hang_open: bool,
    /// Replies for successive polls; `Err` text becomes a command failure.
    pub poll_replies: Mutex<VecDeque<Result<String, String>>>,
    /// Reply once `poll_replies` is drained.
    pub default_poll: Option<String>,
    pub opens: AtomicUsize,
    pub polls: AtomicUsize,
}

impl FakeEngine {
    pub fn with_containers(containers: Vec<ContainerSummary>) -> Self {
        Self {
            containers,
            ..Default::default()
        }
    }

    pub fn with_stream(self, stream: StatsStream) -> Self {
        *self.stream.lock().unwrap() = Some(stream);
        self
    }

    pub fn with_poll_replies(self, replies: Vec<Result<&str, &str>>) -> Self {
        *self.poll_replies.lock().unwrap() = replies
            .into_iter()
            .map(|r| r.map(str::to_string).map_err(str::to_string))
            .collect();
        self
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatsBackend for FakeEngine {
    async fn open_stream(&self, container_id: &str) -> Result<StatsStream, EngineError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.hang_open {
            std::future::pending::<()>().await;
        }
        if self.fail_open {
            return Err(EngineError::SubscriptionUnavailable(container_id.into()));
        }
        Ok(self
            .stream
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| stream::pending().boxed()))
    }

    async fn poll_once(&self, _container_id: &str) -> Result<String, EngineError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let reply = self.poll_replies.lock().unwrap().pop_front();
        match reply {
            Some(Ok(line)) => Ok(line),
            Some(Err(stderr)) => Err(EngineError::Command {
                status: Some(1),
                stderr,
            }),
            None => self.default_poll.clone().ok_or(EngineError::Command {
                status: Some(1),
                stderr: "no more replies".into(),
            }),
        }
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, EngineError> {
        Ok(self
            .containers
            .iter()
            .filter(|c| all || c.state.is_running())
            .cloned()
            .collect())
    }

    async fn container(&self, id: &str) -> Result<ContainerSummary, EngineError> {
        self.containers
            .iter()
            .find(|c| c.id == id || c.name == id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(id.into()))
    }

    async fn image_labels(&self, image: &str) -> Result<LabelMap, EngineError> {
        self.images
            .get(image)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(image.into()))
    }

    async fn read_container_file(&self, id: &str, path: &str) -> Result<String, EngineError> {
        self.files
            .get(&(id.to_string(), path.to_string()))
            .cloned()
            .ok_or(EngineError::Command {
                status: Some(1),
                stderr: format!("cat: {path}: No such file or directory"),
            })
    }
}
