//! Repository lock manager
//!
//! Locks are directory-granular and live in the filesystem, so any number of
//! processes on any number of hosts sharing the repository agree on them:
//!
//! ```text
//! #cvs.lock/                   master lock; mkdir(2) is the atomic test-and-set
//! #cvs.rfl.<host>.<pid>.<seq>  reader sentinel
//! #cvs.wfl.<host>.<pid>.<seq>  writer sentinel
//! #cvs.pfl.<host>.<pid>.<seq>  promotable sentinel (reader that may become a writer)
//! ```
//!
//! `<seq>` is unique per lock taken in the process, so every guard owns its
//! own sentinel. Only sentinels held through the same manager (or a clone
//! of it) count as the caller's own.
//!
//! The master lock is held only while sentinels are inspected or created,
//! except by a writer, who keeps it until release. A writer therefore needs
//! the master lock and the absence of foreign reader and promotable
//! sentinels; readers only need the master lock for a moment.
//!
//! Busy locks are retried after `wait`, logging who holds them. With
//! `fudge_locks` set, master locks and reader sentinels older than
//! `lock_age` are considered abandoned and removed.

use crate::config::{LockSettings, RepositoryConfig};
use crate::error::{AdminError, IoContext, Result};
use crate::hash::List;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub const CVSLCK: &str = "#cvs.lock";
pub const CVSRFL: &str = "#cvs.rfl";
pub const CVSWFL: &str = "#cvs.wfl";
pub const CVSPFL: &str = "#cvs.pfl";

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn next_seq() -> u64 {
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Kind of lock held on a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LockKind {
    Read,
    Write,
    Promotable,
}

impl LockKind {
    fn prefix(&self) -> &'static str {
        match self {
            LockKind::Read => CVSRFL,
            LockKind::Write => CVSWFL,
            LockKind::Promotable => CVSPFL,
        }
    }
}

/// What a held lock left on disk
#[derive(Debug, Clone)]
struct HeldLock {
    lock_dir: PathBuf,
    sentinel: Option<PathBuf>,
    holds_master: bool,
}

impl HeldLock {
    fn remove(&self) -> Result<()> {
        if let Some(sentinel) = &self.sentinel {
            remove_file_if_exists(sentinel)?;
        }
        if self.holds_master {
            remove_dir_if_exists(&self.lock_dir.join(CVSLCK))?;
        }
        Ok(())
    }
}

type Registry = Arc<Mutex<List<HeldLock>>>;

fn registry_lock(registry: &Registry) -> MutexGuard<'_, List<HeldLock>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(AdminError::io_at(path, e)),
        _ => Ok(()),
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(AdminError::io_at(path, e)),
        _ => Ok(()),
    }
}

fn age_of(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(modified.elapsed().unwrap_or_default())
}

/// A lock on one repository directory. Released on drop.
#[derive(Debug)]
pub struct LockGuard {
    kind: LockKind,
    repository: PathBuf,
    key: String,
    held: HeldLock,
    registry: Registry,
    released: bool,
}

impl LockGuard {
    pub fn kind(&self) -> LockKind {
        self.kind
    }

    /// Repository directory this lock protects.
    pub fn repository(&self) -> &Path {
        &self.repository
    }

    /// Directory holding the lock files.
    pub fn lock_dir(&self) -> &Path {
        &self.held.lock_dir
    }

    /// Release now, reporting any error. Dropping the guard does the same
    /// but can only log failures.
    pub fn release(mut self) -> Result<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        registry_lock(&self.registry).remove(&self.key);
        tracing::debug!("releasing {:?} lock in {:?}", self.kind, self.held.lock_dir);
        self.held.remove()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            tracing::warn!("failed to release lock in {:?}: {}", self.held.lock_dir, e);
        }
    }
}

/// Snapshot of the lock files in one directory
#[derive(Debug, Clone, Default, Serialize)]
pub struct LockStatus {
    pub master: bool,
    /// Age of the master lock in seconds
    pub master_age_secs: Option<u64>,
    /// Holders (`host.pid.seq`) of each sentinel kind
    pub readers: Vec<String>,
    pub writers: Vec<String>,
    pub promotable: Vec<String>,
}

impl LockStatus {
    pub fn is_free(&self) -> bool {
        !self.master && self.readers.is_empty() && self.writers.is_empty() && self.promotable.is_empty()
    }
}

/// Takes and releases locks on directories of one repository.
#[derive(Debug, Clone)]
pub struct LockManager {
    root: PathBuf,
    lock_root: Option<PathBuf>,
    settings: LockSettings,
    wait: Duration,
    identity: String,
    held: Registry,
}

impl LockManager {
    /// Manager for the repository rooted at `root`, identified as this
    /// host and process.
    pub fn new(root: impl Into<PathBuf>, settings: LockSettings) -> Self {
        let identity = format!("{}.{}", hostname(), std::process::id());
        Self::with_identity(root, settings, identity)
    }

    /// Manager with an explicit `host.pid` identity.
    pub fn with_identity(root: impl Into<PathBuf>, settings: LockSettings, identity: impl Into<String>) -> Self {
        let wait = settings.wait();
        Self {
            root: root.into(),
            lock_root: None,
            settings,
            wait,
            identity: identity.into(),
            held: Arc::new(Mutex::new(List::new())),
        }
    }

    /// Manager configured from the repository's `CVSROOT/config` and lock
    /// settings.
    pub fn for_repository(root: &Path) -> Result<Self> {
        let config = RepositoryConfig::load(root)?;
        let settings = LockSettings::load(root)?;
        let mut manager = Self::new(root, settings);
        manager.lock_root = config.lock_dir;
        Ok(manager)
    }

    /// Keep lock files under `lock_root` instead of the repository.
    pub fn lock_root(mut self, lock_root: Option<PathBuf>) -> Self {
        self.lock_root = lock_root;
        self
    }

    /// Override the sleep between attempts.
    pub fn wait_interval(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn settings(&self) -> &LockSettings {
        &self.settings
    }

    /// Number of locks this manager currently holds.
    pub fn held_count(&self) -> usize {
        registry_lock(&self.held).len()
    }

    /// Directory holding the lock files of `repository`.
    pub fn lock_dir_for(&self, repository: &Path) -> Result<PathBuf> {
        let Some(lock_root) = &self.lock_root else {
            return Ok(repository.to_path_buf());
        };
        let relative = repository.strip_prefix(&self.root).map_err(|_| AdminError::Config {
            path: repository.to_path_buf(),
            reason: format!("not under repository root {:?}", self.root),
        })?;
        let dir = lock_root.join(relative);
        fs::create_dir_all(&dir).at(&dir)?;
        Ok(dir)
    }

    fn sentinel_name(&self, kind: LockKind) -> String {
        format!("{}.{}.{}", kind.prefix(), self.identity, next_seq())
    }

    /// Whether `path` is a sentinel held through this manager.
    fn holds(&self, path: &Path) -> bool {
        registry_lock(&self.held).contains(&path.display().to_string())
    }

    /// Try the master lock once. `Ok(false)` means someone else holds it.
    fn try_master(&self, lock_dir: &Path) -> Result<bool> {
        let master = lock_dir.join(CVSLCK);
        match fs::create_dir(&master) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if self.settings.fudge_locks {
                    if let Some(age) = age_of(&master) {
                        if age >= self.settings.lock_age() {
                            tracing::warn!("removing abandoned master lock {:?} ({}s old)", master, age.as_secs());
                            remove_dir_if_exists(&master)?;
                            return match fs::create_dir(&master) {
                                Ok(()) => Ok(true),
                                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
                                Err(e) => Err(AdminError::io_at(master, e)),
                            };
                        }
                    }
                }
                Ok(false)
            }
            Err(e) => Err(AdminError::io_at(master, e)),
        }
    }

    fn release_master(&self, lock_dir: &Path) -> Result<()> {
        remove_dir_if_exists(&lock_dir.join(CVSLCK))
    }

    /// Sentinels of `kind` in `lock_dir` not held through this manager.
    /// Abandoned reader sentinels are removed when fudging is on.
    fn foreign_sentinels(&self, lock_dir: &Path, kind: LockKind) -> Result<Vec<String>> {
        let mut found = Vec::new();
        for name in sentinels(lock_dir, kind)? {
            let path = lock_dir.join(&name);
            if self.holds(&path) {
                continue;
            }
            if kind == LockKind::Read && self.settings.fudge_locks {
                if let Some(age) = age_of(&path) {
                    if age >= self.settings.lock_age() {
                        tracing::warn!("removing abandoned read lock {:?}", path);
                        remove_file_if_exists(&path)?;
                        continue;
                    }
                }
            }
            found.push(name);
        }
        Ok(found)
    }

    fn create_sentinel(&self, lock_dir: &Path, kind: LockKind) -> Result<PathBuf> {
        let path = lock_dir.join(self.sentinel_name(kind));
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .at(&path)?;
        Ok(path)
    }

    fn guard(&self, kind: LockKind, repository: &Path, held: HeldLock) -> LockGuard {
        let key = match &held.sentinel {
            Some(s) => s.display().to_string(),
            None => format!("{}#{:?}.{}", held.lock_dir.display(), kind, next_seq()),
        };
        registry_lock(&self.held).replace(key.clone(), held.clone());
        tracing::debug!("obtained {:?} lock in {:?}", kind, held.lock_dir);
        LockGuard {
            kind,
            repository: repository.to_path_buf(),
            key,
            held,
            registry: Arc::clone(&self.held),
            released: false,
        }
    }

    /// One attempt at a read lock.
    pub fn try_read_lock(&self, repository: &Path) -> Result<Option<LockGuard>> {
        let lock_dir = self.lock_dir_for(repository)?;
        if self.settings.readonly_fs {
            let held = HeldLock {
                lock_dir,
                sentinel: None,
                holds_master: false,
            };
            return Ok(Some(self.guard(LockKind::Read, repository, held)));
        }
        if !self.try_master(&lock_dir)? {
            return Ok(None);
        }
        let sentinel = self.create_sentinel(&lock_dir, LockKind::Read);
        self.release_master(&lock_dir)?;
        let held = HeldLock {
            lock_dir,
            sentinel: Some(sentinel?),
            holds_master: false,
        };
        Ok(Some(self.guard(LockKind::Read, repository, held)))
    }

    /// One attempt at a write lock.
    pub fn try_write_lock(&self, repository: &Path) -> Result<Option<LockGuard>> {
        let lock_dir = self.lock_dir_for(repository)?;
        self.try_exclusive(repository, lock_dir, None)
    }

    /// Take the master lock, check for foreign readers and promotable
    /// holders and, if there are none, leave a writer sentinel.
    /// `promoting` is the promotable sentinel being upgraded, if any.
    fn try_exclusive(
        &self,
        repository: &Path,
        lock_dir: PathBuf,
        promoting: Option<&Path>,
    ) -> Result<Option<LockGuard>> {
        if !self.try_master(&lock_dir)? {
            return Ok(None);
        }
        let busy = !self.foreign_sentinels(&lock_dir, LockKind::Read)?.is_empty()
            || !self.foreign_sentinels(&lock_dir, LockKind::Promotable)?.is_empty();
        if busy {
            self.release_master(&lock_dir)?;
            return Ok(None);
        }
        let sentinel = match self.create_sentinel(&lock_dir, LockKind::Write) {
            Ok(s) => s,
            Err(e) => {
                self.release_master(&lock_dir)?;
                return Err(e);
            }
        };
        if let Some(pfl) = promoting {
            remove_file_if_exists(pfl)?;
        }
        let held = HeldLock {
            lock_dir,
            sentinel: Some(sentinel),
            holds_master: true,
        };
        Ok(Some(self.guard(LockKind::Write, repository, held)))
    }

    /// One attempt at a promotable lock. Only one promotable holder may
    /// exist per directory.
    pub fn try_promotable_lock(&self, repository: &Path) -> Result<Option<LockGuard>> {
        let lock_dir = self.lock_dir_for(repository)?;
        if !self.try_master(&lock_dir)? {
            return Ok(None);
        }
        if !self.foreign_sentinels(&lock_dir, LockKind::Promotable)?.is_empty() {
            self.release_master(&lock_dir)?;
            return Ok(None);
        }
        let sentinel = self.create_sentinel(&lock_dir, LockKind::Promotable);
        self.release_master(&lock_dir)?;
        let held = HeldLock {
            lock_dir,
            sentinel: Some(sentinel?),
            holds_master: false,
        };
        Ok(Some(self.guard(LockKind::Promotable, repository, held)))
    }

    /// Read-lock `repository`, waiting while a writer holds it.
    pub async fn read_lock(&self, repository: &Path) -> Result<LockGuard> {
        self.acquire(repository, |m, r| m.try_read_lock(r)).await
    }

    /// Write-lock `repository`, waiting for writers and readers to leave.
    pub async fn write_lock(&self, repository: &Path) -> Result<LockGuard> {
        self.acquire(repository, |m, r| m.try_write_lock(r)).await
    }

    /// Take a promotable lock on `repository`.
    pub async fn promotable_lock(&self, repository: &Path) -> Result<LockGuard> {
        self.acquire(repository, |m, r| m.try_promotable_lock(r)).await
    }

    /// Upgrade a promotable lock to a write lock once the other readers are
    /// gone.
    pub async fn promote(&self, guard: LockGuard) -> Result<LockGuard> {
        if guard.kind != LockKind::Promotable {
            return Err(AdminError::NotPromotable(guard.repository.clone()));
        }
        let repository = guard.repository.clone();
        let lock_dir = guard.held.lock_dir.clone();
        let pfl = guard.held.sentinel.clone();
        let started = Instant::now();
        let mut waited = false;
        loop {
            if let Some(write) = self.try_exclusive(&repository, lock_dir.clone(), pfl.as_deref())? {
                if waited {
                    tracing::info!("obtained lock in {}", lock_dir.display());
                }
                // Promotable sentinel already removed by try_exclusive
                let mut old = guard;
                old.released = true;
                registry_lock(&self.held).remove(&old.key);
                return Ok(write);
            }
            self.wait_for(&lock_dir, started).await?;
            waited = true;
        }
    }

    async fn acquire<F>(&self, repository: &Path, attempt: F) -> Result<LockGuard>
    where
        F: Fn(&Self, &Path) -> Result<Option<LockGuard>>,
    {
        let started = Instant::now();
        let mut waited = false;
        loop {
            if let Some(guard) = attempt(self, repository)? {
                if waited {
                    tracing::info!("obtained lock in {}", guard.lock_dir().display());
                }
                return Ok(guard);
            }
            let lock_dir = self.lock_dir_for(repository)?;
            self.wait_for(&lock_dir, started).await?;
            waited = true;
        }
    }

    async fn wait_for(&self, lock_dir: &Path, started: Instant) -> Result<()> {
        if let Some(timeout) = self.settings.timeout() {
            if started.elapsed() + self.wait > timeout {
                return Err(AdminError::LockTimeout(lock_dir.to_path_buf()));
            }
        }
        let now = chrono::Local::now().format("%H:%M:%S");
        tracing::warn!(
            "[{}] waiting for {}'s lock in {}",
            now,
            lock_owner(lock_dir),
            lock_dir.display()
        );
        tokio::time::sleep(self.wait).await;
        Ok(())
    }

    /// Write-lock every directory in `repositories`, all or nothing.
    ///
    /// Directories are locked in sorted order. When one is busy everything
    /// taken so far is released before waiting, so two processes locking
    /// overlapping sets cannot deadlock.
    pub async fn write_lock_list(&self, repositories: &[PathBuf]) -> Result<Vec<LockGuard>> {
        let mut ordered: List<&Path> = List::new();
        for repo in repositories {
            ordered.replace(repo.display().to_string(), repo.as_path());
        }
        ordered.sort_by_key_name();

        let started = Instant::now();
        loop {
            let mut taken = Vec::with_capacity(ordered.len());
            let mut busy = None;
            for repo in ordered.values() {
                match self.try_write_lock(repo)? {
                    Some(guard) => taken.push(guard),
                    None => {
                        busy = Some(*repo);
                        break;
                    }
                }
            }
            let Some(busy) = busy else {
                return Ok(taken);
            };
            for guard in taken {
                guard.release()?;
            }
            let lock_dir = self.lock_dir_for(busy)?;
            self.wait_for(&lock_dir, started).await?;
        }
    }

    /// Release every lock this manager holds (process cleanup).
    pub fn release_all(&self) -> Result<usize> {
        let held: Vec<(String, HeldLock)> = std::mem::take(&mut *registry_lock(&self.held)).into_pairs().collect();
        let count = held.len();
        // Sentinels first so a writer's master lock goes last.
        for (_, lock) in held.iter().filter(|(_, l)| !l.holds_master) {
            lock.remove()?;
        }
        for (_, lock) in held.iter().filter(|(_, l)| l.holds_master) {
            lock.remove()?;
        }
        if count > 0 {
            tracing::debug!("released {} locks", count);
        }
        Ok(count)
    }

    /// Inspect the lock files of `repository`.
    pub fn lock_status(&self, repository: &Path) -> Result<LockStatus> {
        let lock_dir = match &self.lock_root {
            Some(_) => self.lock_dir_for(repository)?,
            None => repository.to_path_buf(),
        };
        inspect(&lock_dir)
    }

    /// Remove lock files in `repository` older than `max_age`. Returns the
    /// number removed.
    pub fn clear_stale(&self, repository: &Path, max_age: Duration) -> Result<usize> {
        let lock_dir = self.lock_dir_for(repository)?;
        let mut removed = 0;
        for kind in [LockKind::Read, LockKind::Write, LockKind::Promotable] {
            for name in sentinels(&lock_dir, kind)? {
                let path = lock_dir.join(&name);
                if age_of(&path).is_some_and(|age| age >= max_age) {
                    tracing::warn!("removing stale lock file {:?}", path);
                    remove_file_if_exists(&path)?;
                    removed += 1;
                }
            }
        }
        let master = lock_dir.join(CVSLCK);
        if age_of(&master).is_some_and(|age| age >= max_age) {
            tracing::warn!("removing stale master lock {:?}", master);
            remove_dir_if_exists(&master)?;
            removed += 1;
        }
        Ok(removed)
    }
}

/// File names of sentinels of `kind` in `lock_dir`.
fn sentinels(lock_dir: &Path, kind: LockKind) -> Result<Vec<String>> {
    let prefix = format!("{}.", kind.prefix());
    let mut names = Vec::new();
    let dir = match fs::read_dir(lock_dir) {
        Ok(dir) => dir,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(names),
        Err(e) => return Err(AdminError::io_at(lock_dir, e)),
    };
    for entry in dir {
        let entry = entry.at(lock_dir)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn inspect(lock_dir: &Path) -> Result<LockStatus> {
    let holder = |name: &str, kind: LockKind| name[kind.prefix().len() + 1..].to_string();
    let master = lock_dir.join(CVSLCK);
    Ok(LockStatus {
        master: master.is_dir(),
        master_age_secs: age_of(&master).map(|a| a.as_secs()),
        readers: sentinels(lock_dir, LockKind::Read)?
            .iter()
            .map(|n| holder(n, LockKind::Read))
            .collect(),
        writers: sentinels(lock_dir, LockKind::Write)?
            .iter()
            .map(|n| holder(n, LockKind::Write))
            .collect(),
        promotable: sentinels(lock_dir, LockKind::Promotable)?
            .iter()
            .map(|n| holder(n, LockKind::Promotable))
            .collect(),
    })
}

/// Best description of who holds the lock in `lock_dir`, for messages.
fn lock_owner(lock_dir: &Path) -> String {
    if let Ok(status) = inspect(lock_dir) {
        if let Some(w) = status.writers.first() {
            return w.clone();
        }
        if let Some(r) = status.readers.first() {
            return r.clone();
        }
        if let Some(p) = status.promotable.first() {
            return p.clone();
        }
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        if let Ok(meta) = fs::metadata(lock_dir.join(CVSLCK)) {
            return format!("uid{}", meta.uid());
        }
    }
    "unknown".to_string()
}

fn hostname() -> String {
    if let Ok(h) = std::env::var("HOSTNAME") {
        if !h.is_empty() {
            return h;
        }
    }
    fs::read_to_string("/etc/hostname")
        .ok()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings() -> LockSettings {
        LockSettings {
            timeout_secs: Some(0),
            ..LockSettings::default()
        }
    }

    fn manager(root: &Path, who: &str) -> LockManager {
        LockManager::with_identity(root, settings(), who).wait_interval(Duration::from_millis(10))
    }

    /// Holder identities without the per-lock sequence number.
    fn holders(names: &[String]) -> Vec<&str> {
        names.iter().map(|n| n.rsplit_once('.').unwrap().0).collect()
    }

    fn repo() -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("proj");
        fs::create_dir_all(&dir).unwrap();
        (tmp, dir)
    }

    #[tokio::test]
    async fn test_readers_coexist() {
        let (tmp, dir) = repo();
        let a = manager(tmp.path(), "hosta.1");
        let b = manager(tmp.path(), "hostb.2");

        let ra = a.read_lock(&dir).await.unwrap();
        let rb = b.read_lock(&dir).await.unwrap();
        let status = a.lock_status(&dir).unwrap();
        assert!(!status.master);
        assert_eq!(holders(&status.readers), vec!["hosta.1", "hostb.2"]);

        drop(ra);
        rb.release().unwrap();
        assert!(a.lock_status(&dir).unwrap().is_free());
    }

    #[tokio::test]
    async fn test_writer_excludes_readers_and_writers() {
        let (tmp, dir) = repo();
        let a = manager(tmp.path(), "hosta.1");
        let b = manager(tmp.path(), "hostb.2");

        let w = a.write_lock(&dir).await.unwrap();
        let status = a.lock_status(&dir).unwrap();
        assert!(status.master);
        assert_eq!(holders(&status.writers), vec!["hosta.1"]);

        assert!(matches!(b.read_lock(&dir).await, Err(AdminError::LockTimeout(_))));
        assert!(matches!(b.write_lock(&dir).await, Err(AdminError::LockTimeout(_))));

        w.release().unwrap();
        let r = b.read_lock(&dir).await.unwrap();
        assert_eq!(r.kind(), LockKind::Read);
    }

    #[tokio::test]
    async fn test_reader_blocks_writer() {
        let (tmp, dir) = repo();
        let a = manager(tmp.path(), "hosta.1");
        let b = manager(tmp.path(), "hostb.2");

        let r = a.read_lock(&dir).await.unwrap();
        assert!(b.try_write_lock(&dir).unwrap().is_none());
        // A failed attempt leaves no master lock behind
        assert!(!a.lock_status(&dir).unwrap().master);

        // The reader itself may still write
        let w = a.write_lock(&dir).await.unwrap();
        drop(w);
        drop(r);
        assert!(b.try_write_lock(&dir).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_waiter_gets_lock_after_release() {
        let (tmp, dir) = repo();
        let a = manager(tmp.path(), "hosta.1");
        let b = LockManager::with_identity(tmp.path(), LockSettings::default(), "hostb.2")
            .wait_interval(Duration::from_millis(10));

        let w = a.write_lock(&dir).await.unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(w);
        });
        let got = b.write_lock(&dir).await.unwrap();
        assert_eq!(got.kind(), LockKind::Write);
        assert_eq!(holders(&b.lock_status(&dir).unwrap().writers), vec!["hostb.2"]);
    }

    #[tokio::test]
    async fn test_each_guard_owns_its_sentinel() {
        let (tmp, dir) = repo();
        let a = manager(tmp.path(), "hosta.1");

        let r1 = a.read_lock(&dir).await.unwrap();
        let r2 = a.clone().read_lock(&dir).await.unwrap();
        assert_eq!(a.lock_status(&dir).unwrap().readers.len(), 2);
        assert_eq!(a.held_count(), 2);

        drop(r1);
        assert_eq!(holders(&a.lock_status(&dir).unwrap().readers), vec!["hosta.1"]);

        // The remaining reader still keeps writers out
        let b = manager(tmp.path(), "hostb.2");
        assert!(b.try_write_lock(&dir).unwrap().is_none());
        // Including a separate manager of the same process
        let twin = manager(tmp.path(), "hosta.1");
        assert!(twin.try_write_lock(&dir).unwrap().is_none());
        assert!(!a.lock_status(&dir).unwrap().master);

        drop(r2);
        assert!(twin.try_write_lock(&dir).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_waiting_is_reported_at_warn() {
        #[derive(Clone, Default)]
        struct Captured(Arc<Mutex<Vec<u8>>>);

        impl std::io::Write for Captured {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _default = tracing::subscriber::set_default(subscriber);

        let (tmp, dir) = repo();
        let a = manager(tmp.path(), "hosta.1");
        let b = LockManager::with_identity(tmp.path(), LockSettings::default(), "hostb.2")
            .wait_interval(Duration::from_millis(10));

        let w = a.write_lock(&dir).await.unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(w);
        });
        b.write_lock(&dir).await.unwrap();

        let log = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(log.contains("waiting for hosta.1."), "{}", log);
        assert!(log.contains(&dir.display().to_string()), "{}", log);
    }

    #[tokio::test]
    async fn test_promotable_lock() {
        let (tmp, dir) = repo();
        let a = manager(tmp.path(), "hosta.1");
        let b = manager(tmp.path(), "hostb.2");

        let p = a.promotable_lock(&dir).await.unwrap();
        // A second promotable holder is refused, plain readers are not
        assert!(b.try_promotable_lock(&dir).unwrap().is_none());
        let r = b.read_lock(&dir).await.unwrap();
        // Nor can anyone else write while the promotable lock exists
        drop(r);
        assert!(b.try_write_lock(&dir).unwrap().is_none());

        let r = b.read_lock(&dir).await.unwrap();
        // Promotion waits for the foreign reader
        assert!(a.try_exclusive(&dir, dir.clone(), None).unwrap().is_none());
        drop(r);
        let w = a.promote(p).await.unwrap();
        assert_eq!(w.kind(), LockKind::Write);
        let status = a.lock_status(&dir).unwrap();
        assert!(status.promotable.is_empty());
        assert_eq!(holders(&status.writers), vec!["hosta.1"]);
        assert_eq!(a.held_count(), 1);

        drop(w);
        assert!(a.lock_status(&dir).unwrap().is_free());
        assert_eq!(a.held_count(), 0);
    }

    #[tokio::test]
    async fn test_promote_requires_promotable() {
        let (tmp, dir) = repo();
        let a = manager(tmp.path(), "hosta.1");
        let r = a.read_lock(&dir).await.unwrap();
        assert!(matches!(a.promote(r).await, Err(AdminError::NotPromotable(_))));
    }

    #[tokio::test]
    async fn test_fudge_removes_abandoned_locks() {
        let (tmp, dir) = repo();
        fs::create_dir(dir.join(CVSLCK)).unwrap();
        fs::write(dir.join("#cvs.rfl.deadhost.99"), "").unwrap();

        let strict = manager(tmp.path(), "hosta.1");
        assert!(strict.try_write_lock(&dir).unwrap().is_none());

        let fudging = LockManager::with_identity(
            tmp.path(),
            LockSettings {
                fudge_locks: true,
                lock_age_secs: 0,
                timeout_secs: Some(0),
                ..LockSettings::default()
            },
            "hosta.1",
        );
        let w = fudging.try_write_lock(&dir).unwrap().unwrap();
        assert!(!dir.join("#cvs.rfl.deadhost.99").exists());
        drop(w);
    }

    #[tokio::test]
    async fn test_write_lock_list_is_all_or_nothing() {
        let tmp = TempDir::new().unwrap();
        let dirs: Vec<PathBuf> = ["b", "a", "c"].iter().map(|d| tmp.path().join(d)).collect();
        for d in &dirs {
            fs::create_dir_all(d).unwrap();
        }
        let a = manager(tmp.path(), "hosta.1");
        let b = manager(tmp.path(), "hostb.2");

        let blocker = b.write_lock(&dirs[2]).await.unwrap();
        let res = a.write_lock_list(&dirs).await;
        assert!(matches!(res, Err(AdminError::LockTimeout(p)) if p == dirs[2]));
        assert_eq!(a.held_count(), 0);
        for d in &dirs[..2] {
            assert!(a.lock_status(d).unwrap().is_free());
        }

        drop(blocker);
        let guards = a.write_lock_list(&dirs).await.unwrap();
        let order: Vec<_> = guards.iter().map(|g| g.repository().to_path_buf()).collect();
        assert_eq!(order, vec![tmp.path().join("a"), tmp.path().join("b"), tmp.path().join("c")]);
        assert_eq!(a.held_count(), 3);
    }

    #[tokio::test]
    async fn test_release_all() {
        let tmp = TempDir::new().unwrap();
        let d1 = tmp.path().join("one");
        let d2 = tmp.path().join("two");
        fs::create_dir_all(&d1).unwrap();
        fs::create_dir_all(&d2).unwrap();
        let a = manager(tmp.path(), "hosta.1");

        let g1 = a.write_lock(&d1).await.unwrap();
        let g2 = a.read_lock(&d2).await.unwrap();
        assert_eq!(a.release_all().unwrap(), 2);
        assert!(a.lock_status(&d1).unwrap().is_free());
        assert!(a.lock_status(&d2).unwrap().is_free());
        // Dropping guards afterwards is harmless
        drop(g1);
        drop(g2);
        assert_eq!(a.held_count(), 0);
    }

    #[tokio::test]
    async fn test_lock_dir_mirrors_repository() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("cvsroot");
        let locks = tmp.path().join("locks");
        let dir = root.join("proj/src");
        fs::create_dir_all(&dir).unwrap();

        let a = manager(&root, "hosta.1").lock_root(Some(locks.clone()));
        let w = a.write_lock(&dir).await.unwrap();
        assert_eq!(w.lock_dir(), locks.join("proj/src"));
        assert!(locks.join("proj/src").join(CVSLCK).is_dir());
        assert!(!dir.join(CVSLCK).exists());
        assert!(a.lock_status(&dir).unwrap().master);

        let outside = tmp.path().join("elsewhere");
        assert!(a.try_read_lock(&outside).is_err());
    }

    #[tokio::test]
    async fn test_for_repository_reads_config() {
        let tmp = TempDir::new().unwrap();
        let locks = tmp.path().join("locks");
        fs::create_dir_all(tmp.path().join("CVSROOT")).unwrap();
        fs::write(
            tmp.path().join("CVSROOT/config"),
            format!("LockDir={}\n", locks.display()),
        )
        .unwrap();
        let a = LockManager::for_repository(tmp.path()).unwrap();
        let dir = tmp.path().join("proj");
        fs::create_dir_all(&dir).unwrap();
        assert_eq!(a.lock_dir_for(&dir).unwrap(), locks.join("proj"));
    }

    #[tokio::test]
    async fn test_readonly_fs_takes_no_read_locks() {
        let (tmp, dir) = repo();
        let a = LockManager::with_identity(
            tmp.path(),
            LockSettings {
                readonly_fs: true,
                ..LockSettings::default()
            },
            "hosta.1",
        );
        let r = a.read_lock(&dir).await.unwrap();
        assert!(a.lock_status(&dir).unwrap().is_free());
        assert_eq!(a.held_count(), 1);
        drop(r);
        assert_eq!(a.held_count(), 0);
    }

    #[test]
    fn test_clear_stale() {
        let (tmp, dir) = repo();
        fs::create_dir(dir.join(CVSLCK)).unwrap();
        fs::write(dir.join("#cvs.wfl.gone.7"), "").unwrap();
        fs::write(dir.join("#cvs.rfl.gone.8"), "").unwrap();
        let a = manager(tmp.path(), "hosta.1");

        assert_eq!(a.clear_stale(&dir, Duration::from_secs(3600)).unwrap(), 0);
        assert_eq!(a.clear_stale(&dir, Duration::ZERO).unwrap(), 3);
        assert!(a.lock_status(&dir).unwrap().is_free());
    }
}
