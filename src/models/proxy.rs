// Reverse-proxy mapping declared in a container's labels

use serde::{Deserialize, Serialize};

/// One declared route: `{origin}/{slug}` is proxied to `port` inside the container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyDescriptor {
    pub slug: String,
    /// Container-internal TCP port, kept as text the way the label stores it.
    pub port: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nginx_block_text: Option<String>,
}

impl ProxyDescriptor {
    pub fn new(slug: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            port: port.into(),
            nginx_block_text: None,
        }
    }

    pub fn with_block(mut self, block: impl Into<String>) -> Self {
        self.nginx_block_text = Some(block.into());
        self
    }

    /// Block text trimmed; empty when absent.
    pub fn block(&self) -> &str {
        self.nginx_block_text.as_deref().unwrap_or("").trim()
    }
}

/// Public URL of a declared route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyLink {
    pub slug: String,
    pub url: String,
}
