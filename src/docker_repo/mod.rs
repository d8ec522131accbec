// Docker engine access via bollard, plus the CLI for polling and file reads

mod cli;
mod stats;

pub use cli::{DockerCli, POLL_FORMAT};

use crate::error::EngineError;
use crate::labels::{self, LabelMap};
use crate::models::{ContainerState, ContainerSummary, ContainerView, RawStats};
use crate::reconciler::{StatsBackend, StatsChunk, StatsStream};
use async_trait::async_trait;
use bollard::Docker;
use bollard::query_parameters::{InspectContainerOptions, ListContainersOptions, StatsOptions};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::debug;

/// Samples buffered between the engine stream and a slow session.
const STREAM_BUFFER: usize = 4;

/// Everything the console needs from a container engine.
#[async_trait]
pub trait ContainerEngine: StatsBackend {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, EngineError>;

    async fn container(&self, id: &str) -> Result<ContainerSummary, EngineError>;

    async fn image_labels(&self, image: &str) -> Result<LabelMap, EngineError>;

    async fn read_container_file(&self, id: &str, path: &str) -> Result<String, EngineError>;
}

pub struct DockerRepo {
    docker: Docker,
    cli: DockerCli,
}

impl DockerRepo {
    pub fn connect(cli_path: &str) -> anyhow::Result<Self> {
        let docker = Docker::connect_with_unix_defaults()?;
        Ok(Self {
            docker,
            cli: DockerCli::new(cli_path),
        })
    }
}

#[async_trait]
impl ContainerEngine for DockerRepo {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, EngineError> {
        let options = ListContainersOptions {
            all,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(options)).await?;
        Ok(containers
            .into_iter()
            .map(|c| {
                let id = c.id.unwrap_or_default();
                let name = c
                    .names
                    .as_ref()
                    .and_then(|n| n.first())
                    .map(|n| ContainerSummary::display_name(n))
                    .unwrap_or_else(|| id.clone());
                let state = c
                    .state
                    .as_ref()
                    .map(|s| ContainerState::from_docker(&s.to_string()))
                    .unwrap_or_default();
                ContainerSummary {
                    id,
                    name,
                    image: c.image.unwrap_or_default(),
                    state,
                    labels: c.labels.unwrap_or_default(),
                }
            })
            .collect())
    }

    async fn container(&self, id: &str) -> Result<ContainerSummary, EngineError> {
        let info = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await?;
        let state = info
            .state
            .as_ref()
            .and_then(|s| s.status.as_ref())
            .map(|s| ContainerState::from_docker(&s.to_string()))
            .unwrap_or_default();
        let config = info.config.as_ref();
        Ok(ContainerSummary {
            id: info.id.clone().unwrap_or_else(|| id.to_string()),
            name: ContainerSummary::display_name(info.name.as_deref().unwrap_or(id)),
            image: config.and_then(|c| c.image.clone()).unwrap_or_default(),
            state,
            labels: config.and_then(|c| c.labels.clone()).unwrap_or_default(),
        })
    }

    async fn image_labels(&self, image: &str) -> Result<LabelMap, EngineError> {
        let info = self.docker.inspect_image(image).await?;
        Ok(info.config.and_then(|c| c.labels).unwrap_or_default())
    }

    async fn read_container_file(&self, id: &str, path: &str) -> Result<String, EngineError> {
        self.cli.read_file(id, path).await
    }
}

#[async_trait]
impl StatsBackend for DockerRepo {
    async fn open_stream(&self, container_id: &str) -> Result<StatsStream, EngineError> {
        if container_id.is_empty() {
            return Err(EngineError::SubscriptionUnavailable(
                "empty container id".into(),
            ));
        }
        let docker = self.docker.clone();
        let id = container_id.to_string();
        let (tx, rx) = mpsc::channel::<StatsChunk>(STREAM_BUFFER);

        // Forwarder ends when the engine stream ends or the session drops its receiver.
        tokio::spawn(async move {
            let options = StatsOptions {
                stream: true,
                ..Default::default()
            };
            let mut stream = docker.stats(&id, Some(options));
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    item = stream.next() => match item {
                        Some(Ok(s)) => {
                            if tx.send(StatsChunk::Sample(RawStats::from(&s))).await.is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            debug!(container_id = %id, error = %e, "stats stream error");
                            break;
                        }
                        None => break,
                    }
                }
            }
            debug!(container_id = %id, "stats stream closed");
        });

        Ok(futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        })
        .boxed())
    }

    async fn poll_once(&self, container_id: &str) -> Result<String, EngineError> {
        self.cli.stats_line(container_id).await
    }
}

/// Where a README came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadmeSource {
    Label,
    File,
}

/// README for a container: embedded labels first, then the file named by the
/// readme path label (or `default_path`) read from inside the container.
pub async fn load_readme(
    engine: &dyn ContainerEngine,
    container: &ContainerSummary,
    default_path: &str,
) -> Option<(ReadmeSource, String)> {
    if let Some(text) = labels::read_embedded_readme(&container.labels) {
        return Some((ReadmeSource::Label, text));
    }
    if !container.state.is_running() {
        return None;
    }
    let path = labels::readme_path(&container.labels, default_path);
    match engine.read_container_file(&container.id, &path).await {
        Ok(text) if !text.trim().is_empty() => Some((ReadmeSource::File, text)),
        Ok(_) => None,
        Err(e) => {
            debug!(container_id = %container.id, path = %path, error = %e, "readme not readable");
            None
        }
    }
}

/// List row for a container: decoded proxies, their public links, host-network flag.
pub fn container_view(container: ContainerSummary, public_origin: &str) -> ContainerView {
    let proxies = labels::decode(&container.labels);
    let links = labels::dashboard_links(public_origin, &proxies);
    ContainerView {
        host_network: labels::wants_host_network(&container.labels),
        id: container.id,
        name: container.name,
        image: container.image,
        state: container.state,
        proxies,
        links,
    }
}
