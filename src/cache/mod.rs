//! Process-wide cache of parsed report definitions.
//!
//! Entries are keyed by report id (or file path) and carry the fingerprint
//! of the content they were parsed from. A lookup with different content
//! replaces the entry; edits made elsewhere must call [`invalidate`].

mod hash;
pub use hash::compute_hash;

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::debug;

use crate::config::ReportConfig;
use crate::error::{ConfigResult, ConfigurationError};

/// A parsed definition and the fingerprint of its source text.
#[derive(Debug, Clone)]
pub struct CachedReport {
    pub fingerprint: String,
    pub config: Arc<ReportConfig>,
}

static REPORTS: Lazy<DashMap<String, CachedReport>> = Lazy::new(DashMap::new);

fn fingerprint(content: &str) -> ConfigResult<String> {
    compute_hash(content).map_err(|e| ConfigurationError::Parse {
        format: "json",
        message: e.to_string(),
    })
}

/// Cached definition for `key`, parsing `content` with `parse` when the
/// key is new or its content changed.
pub fn get_or_parse(
    key: &str,
    content: &str,
    parse: impl FnOnce(&str) -> ConfigResult<ReportConfig>,
) -> ConfigResult<Arc<ReportConfig>> {
    let fingerprint = fingerprint(content)?;
    if let Some(entry) = REPORTS.get(key) {
        if entry.fingerprint == fingerprint {
            return Ok(Arc::clone(&entry.config));
        }
        debug!(report = key, "cached report definition is stale");
    }

    let config = Arc::new(parse(content)?);
    REPORTS.insert(
        key.to_string(),
        CachedReport {
            fingerprint,
            config: Arc::clone(&config),
        },
    );
    Ok(config)
}

/// Load a definition file through the cache, keyed by its path.
pub fn load_file(path: &Path) -> ConfigResult<Arc<ReportConfig>> {
    let content = std::fs::read_to_string(path)?;
    let key = path.to_string_lossy();
    let is_json = path.extension().and_then(|ext| ext.to_str()) == Some("json");
    get_or_parse(&key, &content, |content| {
        if is_json {
            ReportConfig::from_json_str(content)
        } else {
            ReportConfig::from_toml_str(content)
        }
    })
}

pub fn get(key: &str) -> Option<Arc<ReportConfig>> {
    REPORTS.get(key).map(|entry| Arc::clone(&entry.config))
}

/// Drop one entry. Returns whether it was cached.
pub fn invalidate(key: &str) -> bool {
    REPORTS.remove(key).is_some()
}

pub fn clear() {
    REPORTS.clear();
}
