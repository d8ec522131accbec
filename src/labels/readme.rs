// README embedded in labels, base64 encoded, either whole or split into numbered chunks

use super::{
    DEFAULT_README_PATH, LabelMap, README_CHUNK_PREFIX, README_ENCODING, README_PARTS,
    README_PATH, README_SINGLE, decode_b64,
};
use crate::error::LabelError;
use tracing::debug;

/// Embedded README text, or `None` when the labels carry none (or carry a broken one).
pub fn read_embedded_readme(labels: &LabelMap) -> Option<String> {
    match try_read_embedded_readme(labels) {
        Ok(text) => text,
        Err(e) => {
            debug!(error = %e, "ignoring embedded readme");
            None
        }
    }
}

pub fn try_read_embedded_readme(labels: &LabelMap) -> Result<Option<String>, LabelError> {
    let encoding = labels.get(README_ENCODING).map(|e| e.trim()).unwrap_or("");
    if !encoding.starts_with("b64") {
        return Ok(None);
    }

    if let Some(single) = labels.get(README_SINGLE).filter(|s| !s.is_empty()) {
        return decode_b64(single).map(Some);
    }

    let parts: usize = labels
        .get(README_PARTS)
        .and_then(|p| p.trim().parse().ok())
        .unwrap_or(0);
    if parts == 0 {
        return Ok(None);
    }
    let mut joined = String::new();
    for i in 0..parts {
        let chunk = labels
            .get(&format!("{README_CHUNK_PREFIX}.{i}"))
            .ok_or(LabelError::MissingChunk(i))?;
        joined.push_str(chunk);
    }
    decode_b64(&joined).map(Some)
}

/// Path of the README inside the container filesystem.
pub fn readme_path(labels: &LabelMap, default_path: &str) -> String {
    labels
        .get(README_PATH)
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .unwrap_or(if default_path.is_empty() {
            DEFAULT_README_PATH
        } else {
            default_path
        })
        .to_string()
}
