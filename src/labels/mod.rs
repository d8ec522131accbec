// Structured data stored in container labels under the `io.versanode.vncp` prefix.
// Labels are editable by anyone who builds an image; readers degrade to "no data".

mod proxies;
mod readme;
pub mod validation;

use crate::error::LabelError;
use crate::models::{ProxyDescriptor, ProxyLink};
use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use std::collections::HashMap;

pub use proxies::{BlockPolicy, decode, encode, encode_with_policy, try_decode};
pub use readme::{read_embedded_readme, readme_path, try_read_embedded_readme};

/// A container's (or image's) label map.
pub type LabelMap = HashMap<String, String>;

pub const PREFIX: &str = "io.versanode.vncp";
pub const PROXIES: &str = "io.versanode.vncp.proxies";
pub const README_PATH: &str = "io.versanode.vncp.readme.path";
pub const README_ENCODING: &str = "io.versanode.vncp.readme.encoding";
pub const README_SINGLE: &str = "io.versanode.vncp.readme.single";
pub const README_PARTS: &str = "io.versanode.vncp.readme.parts";
/// Chunk `N` lives at `{README_CHUNK_PREFIX}.{N}`.
pub const README_CHUNK_PREFIX: &str = "io.versanode.vncp.readme";
pub const NETWORK: &str = "io.versanode.vncp.network";
pub const HOST_NETWORK: &str = "io.versanode.vncp.host_network";

/// Default location of the README inside an image when no label says otherwise.
pub const DEFAULT_README_PATH: &str = "/usr/share/versanode/README.md";

/// Whether the labels ask for host networking.
pub fn wants_host_network(labels: &LabelMap) -> bool {
    let normalized = |key: &str| {
        labels
            .get(key)
            .map(|v| v.trim().to_lowercase())
            .unwrap_or_default()
    };
    let network = normalized(NETWORK);
    let host_network = normalized(HOST_NETWORK);
    network == "host" || matches!(host_network.as_str(), "true" | "1" | "yes")
}

/// `{origin}/{slug}`: the reverse proxy maps the path to the container port.
pub fn public_url(origin: &str, slug: &str) -> String {
    let slug = slug.trim_start_matches('/');
    let base = origin.trim_end_matches('/');
    match url::Url::parse(base) {
        Ok(mut url) if !url.cannot_be_a_base() => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().push(slug);
            }
            url.to_string()
        }
        _ => format!("{base}/{slug}"),
    }
}

/// Links for every descriptor that has a slug.
pub fn dashboard_links(origin: &str, descriptors: &[ProxyDescriptor]) -> Vec<ProxyLink> {
    descriptors
        .iter()
        .filter(|d| !d.slug.trim().is_empty())
        .map(|d| ProxyLink {
            slug: d.slug.clone(),
            url: public_url(origin, &d.slug),
        })
        .collect()
}

pub(crate) fn encode_b64(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Base64 to text. Whitespace is ignored, padding is optional and invalid UTF-8
/// is replaced rather than rejected.
pub(crate) fn decode_b64(encoded: &str) -> Result<String, LabelError> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = match STANDARD.decode(&compact) {
        Ok(bytes) => bytes,
        Err(_) => STANDARD_NO_PAD.decode(compact.trim_end_matches('='))?,
    };
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
