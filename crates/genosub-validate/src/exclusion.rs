//! Accession exclusion dictionary: externally hosted JSON listing whole
//! projects and per-project analysis ids whose relation misses are
//! grandfathered and must not be reported.
//!
//! The document is refreshed on a bounded TTL (default 10 minutes) rather
//! than fetched per record; hosting is a collaborator concern behind
//! `ExclusionSource`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ValidateError};

pub const DEFAULT_EXCLUSION_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionDictionary {
    #[serde(default)]
    pub excluded_project_keys: Vec<String>,
    #[serde(default)]
    pub excluded_analysis_ids: BTreeMap<String, Vec<String>>,
}

impl ExclusionDictionary {
    /// Whether the (project, analysis id) pair is grandfathered. Consulted
    /// after the join, immediately before an error would be emitted.
    pub fn is_excluded(&self, project_key: &str, analysis_id: &str) -> bool {
        if self
            .excluded_project_keys
            .iter()
            .any(|key| key == project_key)
        {
            return true;
        }
        self.excluded_analysis_ids
            .get(project_key)
            .is_some_and(|ids| ids.iter().any(|id| id == analysis_id))
    }
}

/// Where the exclusion document lives. The core ships a file-backed source;
/// an HTTP-backed one belongs to the hosting collaborator.
pub trait ExclusionSource: Send + Sync {
    fn load(&self) -> Result<ExclusionDictionary>;
}

/// Reads the exclusion document from a local JSON file.
pub struct FileExclusionSource {
    path: PathBuf,
}

impl FileExclusionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ExclusionSource for FileExclusionSource {
    fn load(&self) -> Result<ExclusionDictionary> {
        let contents = std::fs::read_to_string(&self.path).map_err(|error| {
            ValidateError::Exclusions(format!("{}: {error}", self.path.display()))
        })?;
        serde_json::from_str(&contents).map_err(|error| {
            ValidateError::Exclusions(format!("{}: {error}", self.path.display()))
        })
    }
}

/// A source that always yields an empty dictionary (nothing excluded).
pub struct NoExclusions;

impl ExclusionSource for NoExclusions {
    fn load(&self) -> Result<ExclusionDictionary> {
        Ok(ExclusionDictionary::default())
    }
}

struct CacheState {
    loaded_at: Instant,
    dictionary: ExclusionDictionary,
}

/// TTL cache in front of an `ExclusionSource`.
pub struct CachedExclusions {
    source: Box<dyn ExclusionSource>,
    ttl: Duration,
    state: Mutex<Option<CacheState>>,
}

impl CachedExclusions {
    pub fn new(source: Box<dyn ExclusionSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            state: Mutex::new(None),
        }
    }

    pub fn with_default_ttl(source: Box<dyn ExclusionSource>) -> Self {
        Self::new(source, DEFAULT_EXCLUSION_TTL)
    }

    pub fn empty() -> Self {
        Self::with_default_ttl(Box::new(NoExclusions))
    }

    /// The current document, reloading when the cached copy expired.
    pub fn current(&self) -> Result<ExclusionDictionary> {
        let mut state = self.state.lock().expect("exclusion cache lock");
        let expired = state
            .as_ref()
            .is_none_or(|cached| cached.loaded_at.elapsed() >= self.ttl);
        if expired {
            debug!("refreshing exclusion dictionary");
            let dictionary = self.source.load()?;
            *state = Some(CacheState {
                loaded_at: Instant::now(),
                dictionary,
            });
        }
        Ok(state
            .as_ref()
            .map(|cached| cached.dictionary.clone())
            .unwrap_or_default())
    }
}
