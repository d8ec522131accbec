// Docker container models

use super::proxy::{ProxyDescriptor, ProxyLink};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Docker container state; serializes to lowercase JSON (e.g. "running").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ContainerState {
    /// Parse from Docker API state string (e.g. "running", "exited").
    pub fn from_docker(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "created" => ContainerState::Created,
            "running" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            "restarting" => ContainerState::Restarting,
            "removing" => ContainerState::Removing,
            "exited" => ContainerState::Exited,
            "dead" => ContainerState::Dead,
            _ => ContainerState::Unknown,
        }
    }

    pub fn is_running(self) -> bool {
        self == ContainerState::Running
    }
}

/// One container as the console sees it: identity, state and its label map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSummary {
    pub id: String,
    /// Display name without the engine's leading "/".
    pub name: String,
    #[serde(default)]
    pub image: String,
    pub state: ContainerState,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl ContainerSummary {
    /// Strip the leading slashes the engine puts in front of container names.
    pub fn display_name(raw: &str) -> String {
        raw.trim_start_matches('/').to_string()
    }
}

/// Row of the container list: the summary plus what its labels declare.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerView {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    pub proxies: Vec<ProxyDescriptor>,
    pub links: Vec<ProxyLink>,
    pub host_network: bool,
}
