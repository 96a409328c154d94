//! Plan cache persisted as a small JSON record next to a `.lock` file.
//!
//! Readers take a shared lock and writers an exclusive one, so several runs
//! may share one cache. Locks are polled; if one cannot be had within the
//! timeout the cache is skipped for this run.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use burgers_core::{CacheLookup, PlanCache, PlanEffort, PlanKey, PlanSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const LOCK_TIMEOUT: Duration = Duration::from_secs(10);
const LOCK_POLL: Duration = Duration::from_millis(100);
const FILE_NAME: &str = ".burgers_plans.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PlanRecord {
    nx_dns: usize,
    nx_les: usize,
    noise_exponent: f64,
    planning: String,
    threads: usize,
    lengths: Vec<usize>,
}

impl PlanRecord {
    fn new(key: &PlanKey, plans: &PlanSet) -> PlanRecord {
        PlanRecord {
            nx_dns: key.nx_dns,
            nx_les: key.nx_les,
            noise_exponent: key.noise_exponent,
            planning: key.effort.as_str().to_string(),
            threads: key.threads,
            lengths: plans.lengths.clone(),
        }
    }

    fn key(&self) -> Option<PlanKey> {
        Some(PlanKey {
            nx_dns: self.nx_dns,
            nx_les: self.nx_les,
            noise_exponent: self.noise_exponent,
            effort: PlanEffort::parse(&self.planning)?,
            threads: self.threads,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockKind {
    Shared,
    Exclusive,
}

/// Holds a lock on the sidecar file until dropped.
struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

pub struct PlanCacheFile {
    path: PathBuf,
    lock_path: PathBuf,
    timeout: Duration,
}

impl PlanCacheFile {
    pub fn new(path: impl Into<PathBuf>) -> PlanCacheFile {
        let path = path.into();
        let mut lock_name = OsString::from(path.as_os_str());
        lock_name.push(".lock");
        PlanCacheFile {
            lock_path: PathBuf::from(lock_name),
            path,
            timeout: LOCK_TIMEOUT,
        }
    }

    /// `~/.burgers_plans.json`, or the working directory without a home.
    pub fn default_path() -> PathBuf {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_default()
            .join(FILE_NAME)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> PlanCacheFile {
        self.timeout = timeout;
        self
    }

    fn lock(&self, kind: LockKind) -> Result<LockGuard, String> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| format!("cannot open {}: {e}", self.lock_path.display()))?;

        let deadline = Instant::now() + self.timeout;
        loop {
            let attempt = match kind {
                LockKind::Shared => file.try_lock_shared(),
                LockKind::Exclusive => file.try_lock(),
            };
            match attempt {
                Ok(()) => return Ok(LockGuard { file }),
                Err(fs::TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(format!(
                            "timed out after {:?} waiting for {}",
                            self.timeout,
                            self.lock_path.display()
                        ));
                    }
                    thread::sleep(LOCK_POLL);
                }
                Err(fs::TryLockError::Error(e)) => {
                    return Err(format!("cannot lock {}: {e}", self.lock_path.display()));
                }
            }
        }
    }

    fn read(&self) -> Result<PlanRecord, String> {
        let _guard = self.lock(LockKind::Shared)?;
        let text = fs::read_to_string(&self.path)
            .map_err(|e| format!("cannot read {}: {e}", self.path.display()))?;
        serde_json::from_str(&text).map_err(|e| format!("corrupt plan cache: {e}"))
    }

    fn write(&self, record: &PlanRecord) -> Result<(), String> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| format!("cannot create {}: {e}", dir.display()))?;
        }
        let _guard = self.lock(LockKind::Exclusive)?;

        let text = serde_json::to_string_pretty(record).map_err(|e| e.to_string())?;
        let mut tmp_name = OsString::from(self.path.as_os_str());
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);
        fs::write(&tmp, text).map_err(|e| format!("cannot write {}: {e}", tmp.display()))?;
        fs::rename(&tmp, &self.path).map_err(|e| format!("cannot replace {}: {e}", self.path.display()))
    }
}

impl PlanCache for PlanCacheFile {
    fn try_load(&mut self, key: &PlanKey) -> CacheLookup {
        if !self.path.exists() {
            return CacheLookup::Miss(format!("no plan cache at {}", self.path.display()));
        }
        let record = match self.read() {
            Ok(record) => record,
            Err(reason) => return CacheLookup::Miss(reason),
        };
        let Some(stored) = record.key() else {
            return CacheLookup::Miss(format!("unknown planning level `{}` in cache", record.planning));
        };
        match key.mismatch(&stored) {
            None => {
                debug!(path = %self.path.display(), "loaded transform plans");
                CacheLookup::Hit(PlanSet {
                    lengths: record.lengths,
                })
            }
            Some(reason) => CacheLookup::Miss(reason),
        }
    }

    fn save(&mut self, key: &PlanKey, plans: &PlanSet) -> bool {
        match self.write(&PlanRecord::new(key, plans)) {
            Ok(()) => true,
            Err(reason) => {
                warn!(%reason, "could not store transform plans");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burgers_core::SimulationParams;

    fn scratch_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("burgers-plan-test-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir.join("plans.json")
    }

    #[test]
    fn round_trip_and_mismatch() {
        let path = scratch_path("round-trip");
        let mut cache = PlanCacheFile::new(&path);
        let key = PlanKey::from_params(&SimulationParams::default());
        let plans = PlanSet { lengths: vec![32, 48, 64, 96, 128] };

        assert!(matches!(cache.try_load(&key), CacheLookup::Miss(r) if r.contains("no plan cache")));
        assert!(cache.save(&key, &plans));
        assert_eq!(cache.try_load(&key), CacheLookup::Hit(plans));

        let other = PlanKey { nx_les: 16, threads: 2, ..key };
        match cache.try_load(&other) {
            CacheLookup::Miss(reason) => {
                assert!(reason.contains("nx_les"));
                assert!(reason.contains("threads"));
            }
            hit => panic!("expected a miss, got {hit:?}"),
        }
    }

    #[test]
    fn corrupt_file_is_a_miss() {
        let path = scratch_path("corrupt");
        fs::write(&path, "{ not json").unwrap();
        let mut cache = PlanCacheFile::new(&path);
        let key = PlanKey::from_params(&SimulationParams::default());
        assert!(matches!(cache.try_load(&key), CacheLookup::Miss(r) if r.contains("corrupt")));
    }

    #[test]
    fn held_exclusive_lock_times_out() {
        let path = scratch_path("contended");
        let cache = PlanCacheFile::new(&path).with_timeout(Duration::from_millis(250));
        let holder = cache.lock(LockKind::Exclusive).unwrap();

        // A second handle on the same file conflicts with the held lock.
        let mut waiting = PlanCacheFile::new(&path).with_timeout(Duration::from_millis(250));
        let key = PlanKey::from_params(&SimulationParams::default());
        let started = Instant::now();
        assert!(!waiting.save(&key, &PlanSet::default()));
        assert!(started.elapsed() >= Duration::from_millis(250));

        drop(holder);
        assert!(waiting.save(&key, &PlanSet::default()));
    }

    #[test]
    fn lock_file_sits_beside_the_cache() {
        let cache = PlanCacheFile::new("/tmp/somewhere/plans.json");
        assert_eq!(cache.lock_path, PathBuf::from("/tmp/somewhere/plans.json.lock"));
        assert!(PlanCacheFile::default_path().ends_with(FILE_NAME));
    }
}
