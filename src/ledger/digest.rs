//! BLAKE3 digests of catalog documents and session queues.
//!
//! All digests are `"blake3:{hex}"`.

use crate::core::types::Session;
use std::path::Path;

/// Digest of a session queue's canonical JSON. Equal queues give equal
/// digests; any change in order or content changes it.
pub fn session_digest(sessions: &[Session]) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(sessions)?;
    Ok(format!("blake3:{}", blake3::hash(&json).to_hex()))
}

/// Digest of a catalog directory: `metadata.yaml` plus every
/// `categories/*.yaml`, in file name order.
pub fn catalog_digest(root: &Path) -> Result<String, String> {
    let mut documents = vec![root.join("metadata.yaml")];

    let categories = root.join("categories");
    if categories.is_dir() {
        let entries = std::fs::read_dir(&categories)
            .map_err(|e| format!("cannot read dir {}: {}", categories.display(), e))?;
        let mut partitions: Vec<_> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "yaml"))
            .collect();
        partitions.sort();
        documents.extend(partitions);
    }

    let mut hasher = blake3::Hasher::new();
    for path in &documents {
        let content = std::fs::read(path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        let rel = path.strip_prefix(root).unwrap_or(path);
        hasher.update(rel.to_string_lossy().as_bytes());
        hasher.update(b"\0");
        hasher.update(blake3::hash(&content).to_hex().as_bytes());
        hasher.update(b"\n");
    }
    Ok(format!("blake3:{}", hasher.finalize().to_hex()))
}
