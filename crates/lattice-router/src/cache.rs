//! Persistent route-table cache keyed by a source fingerprint.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::discover::scan_units;
use crate::error::{Result, RouterError};
use crate::table::RouteSet;

/// Cache file name inside the configured cache directory.
const CACHE_FILE: &str = "routes.cache";

/// A cached record is valid for one hour, fingerprint permitting.
const TTL_SECS: i64 = 3600;

/// The serialized cache record: the compiled tables plus the validity
/// stamp. Always replaced wholesale, never partially updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// Fingerprint of the source units at creation time.
    pub fingerprint: String,
    /// The compiled route set.
    pub routes: RouteSet,
}

/// The route cache: one record file per configured cache directory.
#[derive(Debug, Clone)]
pub struct RouteCache {
    dir: PathBuf,
}

impl RouteCache {
    /// Creates a cache rooted at the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the cache file path.
    #[must_use]
    pub fn file(&self) -> PathBuf {
        self.dir.join(CACHE_FILE)
    }

    /// Computes the fingerprint of the source tree: a SHA-256 digest over
    /// the sorted mapping of every declaration unit path to its
    /// modification timestamp. Touching any unit changes the fingerprint
    /// even when its content is byte-identical.
    ///
    /// # Errors
    ///
    /// Returns an error when the source root is missing or a unit's
    /// metadata cannot be read.
    pub fn fingerprint(source_root: &Path) -> Result<String> {
        let units = scan_units(source_root)?;
        let mut hasher = Sha256::new();

        for unit in units {
            let metadata = fs::metadata(&unit).map_err(|source| RouterError::Io {
                path: unit.clone(),
                source,
            })?;
            let modified = metadata
                .modified()
                .map_err(|source| RouterError::Io {
                    path: unit.clone(),
                    source,
                })?
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default();

            hasher.update(unit.to_string_lossy().as_bytes());
            hasher.update([0]);
            hasher.update(modified.as_secs().to_le_bytes());
            hasher.update(modified.subsec_nanos().to_le_bytes());
        }

        let digest = hasher.finalize();
        Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Loads the cached route set if it is still valid.
    ///
    /// Returns `None` when the file is absent, unreadable, or corrupt,
    /// when the record is older than the TTL, or when the fingerprint no
    /// longer matches the source tree. Cache failures are never fatal;
    /// they force a rebuild.
    #[must_use]
    pub fn load(&self, source_root: &Path) -> Option<RouteSet> {
        let file = self.file();
        let content = match fs::read_to_string(&file) {
            Ok(content) => content,
            Err(e) => {
                debug!(file = %file.display(), error = %e, "no readable route cache");
                return None;
            }
        };

        let record: CacheRecord = match serde_json::from_str(&content) {
            Ok(record) => record,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "corrupt route cache; rebuilding");
                return None;
            }
        };

        let age = Utc::now().signed_duration_since(record.created_at);
        if age > Duration::seconds(TTL_SECS) {
            debug!(file = %file.display(), "route cache expired");
            return None;
        }

        let current = match Self::fingerprint(source_root) {
            Ok(current) => current,
            Err(e) => {
                warn!(error = %e, "cannot fingerprint source tree; rebuilding");
                return None;
            }
        };
        if current != record.fingerprint {
            debug!(file = %file.display(), "source tree changed; rebuilding");
            return None;
        }

        let mut routes = record.routes;
        if let Err(e) = routes.compile() {
            warn!(error = %e, "cached route table failed to compile; rebuilding");
            return None;
        }

        debug!(file = %file.display(), routes = routes.routes.len(), "route cache hit");
        Some(routes)
    }

    /// Atomically replaces the cache file with a fresh record stamped with
    /// the current time and fingerprint.
    ///
    /// # Errors
    ///
    /// Returns an error when the record cannot be serialized or written.
    pub fn save(&self, source_root: &Path, routes: &RouteSet) -> Result<()> {
        let record = CacheRecord {
            created_at: Utc::now(),
            fingerprint: Self::fingerprint(source_root)?,
            routes: routes.clone(),
        };

        fs::create_dir_all(&self.dir).map_err(|source| RouterError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let content = serde_json::to_vec_pretty(&record)?;
        let tmp = self.dir.join(format!("{CACHE_FILE}.tmp"));
        fs::write(&tmp, content).map_err(|source| RouterError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, self.file()).map_err(|source| RouterError::Io {
            path: self.file(),
            source,
        })?;

        debug!(file = %self.file().display(), "route cache written");
        Ok(())
    }

    /// Removes the cache file; the next load is a forced rebuild.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be removed.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(self.file()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(RouterError::Io {
                path: self.file(),
                source,
            }),
        }
    }
}
