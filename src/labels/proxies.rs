// Proxy descriptor codec for the `io.versanode.vncp.proxies` label.
//
// Written form is always a JSON array of {slug, port, nginx_block_b64?}.
// Read form also accepts the legacy object map {slug: port | {port, nginx_block?}}.
// `$` in block text is stored as `$$`; decode reverses it.

use super::{LabelMap, PROXIES, decode_b64, encode_b64};
use crate::error::LabelError;
use crate::models::ProxyDescriptor;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::warn;

/// What to do with a descriptor whose nginx block is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockPolicy {
    /// Blockless descriptors are dropped on encode and flagged by validation.
    #[default]
    Required,
    /// Blockless descriptors are written without `nginx_block_b64`.
    Optional,
}

#[derive(Serialize)]
struct EncodedProxy<'a> {
    slug: &'a str,
    port: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    nginx_block_b64: Option<String>,
}

/// Descriptors declared in `labels`; empty when the label is absent or malformed.
pub fn decode(labels: &LabelMap) -> Vec<ProxyDescriptor> {
    match try_decode(labels) {
        Ok(descriptors) => descriptors,
        Err(e) => {
            warn!(error = %e, label = PROXIES, "ignoring malformed proxies label");
            Vec::new()
        }
    }
}

/// Like [`decode`] but reports why the label could not be read.
pub fn try_decode(labels: &LabelMap) -> Result<Vec<ProxyDescriptor>, LabelError> {
    let Some(raw) = labels.get(PROXIES).map(|v| v.trim()).filter(|v| !v.is_empty()) else {
        return Ok(Vec::new());
    };

    let mut out = Vec::new();
    match serde_json::from_str::<Value>(raw)? {
        Value::Array(items) => {
            for item in &items {
                let Value::Object(entry) = item else {
                    continue;
                };
                let slug = scalar_text(entry.get("slug"));
                let port = scalar_text(entry.get("port"));
                if slug.is_empty() || port.is_empty() {
                    continue;
                }
                out.push(descriptor(slug, port, Some(entry)));
            }
        }
        Value::Object(map) => {
            for (key, spec) in &map {
                let slug = key.trim().to_string();
                if slug.is_empty() {
                    continue;
                }
                match spec {
                    Value::String(_) | Value::Number(_) => {
                        let port = scalar_text(Some(spec));
                        if !port.is_empty() {
                            out.push(descriptor(slug, port, None));
                        }
                    }
                    Value::Object(entry) => {
                        let port = scalar_text(entry.get("port"));
                        if !port.is_empty() {
                            out.push(descriptor(slug, port, Some(entry)));
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => return Err(LabelError::Shape("expected a JSON array or object")),
    }

    let mut seen = HashSet::new();
    out.retain(|d| seen.insert(d.slug.clone()));
    Ok(out)
}

/// Label value for `descriptors` under [`BlockPolicy::Required`];
/// `None` means the label should be omitted.
pub fn encode(descriptors: &[ProxyDescriptor]) -> Option<String> {
    encode_with_policy(descriptors, BlockPolicy::Required)
}

pub fn encode_with_policy(descriptors: &[ProxyDescriptor], policy: BlockPolicy) -> Option<String> {
    let entries: Vec<EncodedProxy<'_>> = descriptors
        .iter()
        .filter_map(|d| {
            let slug = d.slug.trim();
            let port = d.port.trim();
            let block = d.block();
            if slug.is_empty() || port.is_empty() {
                return None;
            }
            if block.is_empty() && policy == BlockPolicy::Required {
                return None;
            }
            Some(EncodedProxy {
                slug,
                port,
                nginx_block_b64: (!block.is_empty()).then(|| encode_b64(&escape_dollars(block))),
            })
        })
        .collect();

    if entries.is_empty() {
        return None;
    }
    match serde_json::to_string(&entries) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(error = %e, "failed to serialize proxies label");
            None
        }
    }
}

fn descriptor(slug: String, port: String, entry: Option<&Map<String, Value>>) -> ProxyDescriptor {
    ProxyDescriptor {
        slug,
        port,
        nginx_block_text: entry.and_then(block_text).map(|text| unescape_dollars(&text)),
    }
}

/// `nginx_block_b64` wins; the plain `nginx_block` of older labels is the fallback.
fn block_text(entry: &Map<String, Value>) -> Option<String> {
    let from_b64 = entry
        .get("nginx_block_b64")
        .and_then(Value::as_str)
        .filter(|b| !b.trim().is_empty())
        .and_then(|b| match decode_b64(b) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "ignoring undecodable nginx_block_b64");
                None
            }
        });
    from_b64.or_else(|| {
        entry
            .get("nginx_block")
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}

fn scalar_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn escape_dollars(text: &str) -> String {
    text.replace('$', "$$")
}

fn unescape_dollars(text: &str) -> String {
    text.replace("$$", "$")
}
