//! Output staleness: decides whether a generated file can be reused and reclaims
//! outputs that outlived the configured TTL.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::SheetConfig;
use crate::pipeline::is_ignored;

/// Files removed (or not) by [`StalenessCache::sweep`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub removed: Vec<PathBuf>,
    /// Path and reason for every deletion that failed.
    pub failed: Vec<(PathBuf, String)>,
}

/// mtime-based cache over generated outputs. Shared by reference between groups;
/// the remembered-path list is the only mutable state.
#[derive(Debug, Default)]
pub struct StalenessCache {
    ttl: Option<Duration>,
    seen: Mutex<Vec<PathBuf>>,
}

impl StalenessCache {
    /// `None` disables caching: every path is stale.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(config: &SheetConfig) -> Self {
        Self::new(config.cache_ttl())
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn needs_creation(&self, path: &Path) -> bool {
        self.needs_creation_at(path, SystemTime::now())
    }

    /// Same as [`needs_creation`](Self::needs_creation) with an explicit clock.
    pub fn needs_creation_at(&self, path: &Path, now: SystemTime) -> bool {
        self.remember(path);
        let Some(ttl) = self.ttl else {
            return true;
        };
        let stale = match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => expired(modified, ttl, now),
            Err(_) => true,
        };
        debug!(?path, stale, "cache check");
        stale
    }

    /// Paths checked so far, in check order.
    pub fn remembered(&self) -> Vec<PathBuf> {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn remember(&self, path: &Path) {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        if !seen.iter().any(|p| p == path) {
            seen.push(path.to_path_buf());
        }
    }

    pub fn sweep(&self, dirs: &[PathBuf]) -> SweepReport {
        self.sweep_at(dirs, SystemTime::now())
    }

    /// Deletes every file under `dirs` (recursively, VCS/OS metadata excluded), plus every
    /// remembered path, whose mtime is older than `now - ttl`. No-op when caching is
    /// disabled, since every output of the current run would otherwise qualify.
    pub fn sweep_at(&self, dirs: &[PathBuf], now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();
        let Some(ttl) = self.ttl else {
            return report;
        };

        let mut candidates: BTreeSet<PathBuf> = self.remembered().into_iter().collect();
        for dir in dirs {
            if !dir.is_dir() {
                debug!(?dir, "skipping missing output directory");
                continue;
            }
            let walker = WalkDir::new(dir)
                .into_iter()
                .filter_entry(|e| !is_ignored(e));
            for entry in walker {
                match entry {
                    Ok(entry) if entry.file_type().is_file() => {
                        candidates.insert(entry.into_path());
                    }
                    Ok(_) => {}
                    Err(e) => debug!(?dir, error = %e, "skipping unreadable output entry"),
                }
            }
        }

        for path in candidates {
            let Ok(meta) = fs::metadata(&path) else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let Ok(modified) = meta.modified() else {
                continue;
            };
            if !expired(modified, ttl, now) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(?path, "removed expired output");
                    report.removed.push(path);
                }
                Err(e) => {
                    warn!(?path, error = %e, "failed to remove expired output");
                    report.failed.push((path, e.to_string()));
                }
            }
        }
        report
    }
}

/// `now - ttl > modified`. Timestamps in the future never expire.
fn expired(modified: SystemTime, ttl: Duration, now: SystemTime) -> bool {
    now.duration_since(modified)
        .map(|age| age > ttl)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_strict() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(10_000);
        let ttl = Duration::from_secs(60);
        assert!(!expired(now - ttl, ttl, now));
        assert!(expired(now - ttl - Duration::from_secs(1), ttl, now));
        assert!(!expired(now + ttl, ttl, now));
    }

    #[test]
    fn checked_paths_are_remembered_once() {
        let cache = StalenessCache::new(None);
        cache.needs_creation(Path::new("a.png"));
        cache.needs_creation(Path::new("b.png"));
        cache.needs_creation(Path::new("a.png"));
        assert_eq!(
            cache.remembered(),
            vec![PathBuf::from("a.png"), PathBuf::from("b.png")]
        );
    }
}
