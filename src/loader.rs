//! Protocol Loading
//!
//! Loads one protocol file, or every protocol file under a directory tree,
//! merging their type registries into a single [`ServiceProto`] and computing
//! a bundle digest over the file contents.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::proto::ServiceProto;

/// Configuration for protocol loading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Skip files whose path (relative to the root) starts with one of these
    #[serde(default = "default_skip_prefixes")]
    pub skip_prefixes: Vec<String>,

    /// File extension of protocol files
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_skip_prefixes() -> Vec<String> {
    vec![
        "target/".to_string(),
        ".git/".to_string(),
        "node_modules/".to_string(),
    ]
}

fn default_extension() -> String {
    "json".to_string()
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            skip_prefixes: default_skip_prefixes(),
            extension: default_extension(),
        }
    }
}

/// A merged protocol and where it came from
#[derive(Debug, Clone)]
pub struct LoadedProto {
    pub proto: ServiceProto,
    /// SHA-256 over the contents of every loaded file, in path order
    pub bundle_hash: String,
    pub files: Vec<PathBuf>,
}

/// Load a single protocol file
pub fn load_proto_file(path: &Path) -> anyhow::Result<LoadedProto> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let proto = ServiceProto::from_json(&content)
        .with_context(|| format!("Failed to parse protocol in {}", path.display()))?;

    info!(
        path = %path.display(),
        schemas = proto.types.len(),
        services = proto.services.len(),
        "loaded protocol file"
    );

    Ok(LoadedProto {
        proto,
        bundle_hash: format!("{:x}", Sha256::digest(content.as_bytes())),
        files: vec![path.to_path_buf()],
    })
}

/// Load and merge every protocol file under `root`
///
/// The same schema id may appear in several files only with identical
/// content. Services are concatenated in path order and the highest declared
/// version wins.
pub fn load_from_directory(root: &Path, config: &LoaderConfig) -> anyhow::Result<LoadedProto> {
    let mut merged = ServiceProto::default();
    let mut hasher = Sha256::new();
    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().map(|e| e != config.extension.as_str()).unwrap_or(true) {
            continue;
        }

        let relative = path.strip_prefix(root)?.to_string_lossy().replace('\\', "/");
        if config.skip_prefixes.iter().any(|p| relative.starts_with(p.as_str())) {
            debug!(path = %relative, "skipped");
            continue;
        }

        let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        hasher.update(content.as_bytes());

        let proto = ServiceProto::from_json(&content)
            .with_context(|| format!("Failed to parse protocol in {}", path.display()))?;
        debug!(path = %relative, schemas = proto.types.len(), "parsed protocol file");

        merged.version = match (merged.version, proto.version) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        merged.services.extend(proto.services);
        merged
            .types
            .merge(proto.types)
            .with_context(|| format!("Conflicting schema in {}", path.display()))?;
        files.push(path.to_path_buf());
    }

    let bundle_hash = format!("{:x}", hasher.finalize());
    info!(
        root = %root.display(),
        files = files.len(),
        schemas = merged.types.len(),
        services = merged.services.len(),
        bundle_hash = %bundle_hash,
        "loaded protocol directory"
    );

    Ok(LoadedProto {
        proto: merged,
        bundle_hash,
        files,
    })
}

/// Load `path` as a directory tree or a single file
pub fn load(path: &Path, config: &LoaderConfig) -> anyhow::Result<LoadedProto> {
    if path.is_dir() {
        load_from_directory(path, config)
    } else {
        load_proto_file(path)
    }
}
