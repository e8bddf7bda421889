//! Repository configuration
//!
//! Two sources:
//! - `CVSROOT/config`: `Keyword=value` lines administered in the repository
//! - `CVSROOT/lock-settings.json`: lock timing, JSON, optional

use crate::admin::{CVSROOTADM, CVSROOTADM_CONFIG};
use crate::error::{AdminError, IoContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// When to re-read a log message after the verification script ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RereadLog {
    Always,
    Never,
    Stat,
}

/// Parsed `CVSROOT/config`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryConfig {
    /// Directory tree holding lock files instead of the repository itself
    pub lock_dir: Option<PathBuf>,
    pub top_level_admin: bool,
    /// Record types written to the history file
    pub log_history: String,
    pub system_auth: bool,
    /// Keywords expanded in working files, e.g. `iId,Revision`
    pub keyword_expand: Option<String>,
    /// Local alias of the `$Id$` keyword
    pub local_keyword: Option<String>,
    pub reread_log_after_verify: RereadLog,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            lock_dir: None,
            top_level_admin: false,
            log_history: "TOEFWUPCGMAR".to_string(),
            system_auth: true,
            keyword_expand: None,
            local_keyword: None,
            reread_log_after_verify: RereadLog::Always,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "on" | "1" => Some(true),
        "no" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

impl RepositoryConfig {
    /// Load `CVSROOT/config` under the repository root. A missing file gives
    /// the defaults.
    pub fn load(root_dir: &Path) -> Result<Self> {
        let path = root_dir.join(CVSROOTADM).join(CVSROOTADM_CONFIG);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path).at(&path)?;
        Self::parse(&data, &path)
    }

    /// Parse config text; `path` is only used in messages.
    pub fn parse(data: &str, path: &Path) -> Result<Self> {
        let mut config = Self::default();
        let err = |lineno: usize, reason: String| AdminError::Config {
            path: path.to_path_buf(),
            reason: format!("line {}: {}", lineno, reason),
        };

        for (idx, raw) in data.lines().enumerate() {
            let lineno = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| err(lineno, "syntax error: missing '='".to_string()))?;
            let key = key.trim();
            let value = value.trim();
            let boolean = || {
                parse_bool(value)
                    .ok_or_else(|| err(lineno, format!("expected yes or no for {}, got '{}'", key, value)))
            };

            match key {
                "LockDir" => {
                    let dir = PathBuf::from(value);
                    if !dir.is_absolute() {
                        return Err(err(lineno, format!("LockDir must be absolute: '{}'", value)));
                    }
                    config.lock_dir = Some(dir);
                }
                "TopLevelAdmin" => config.top_level_admin = boolean()?,
                "SystemAuth" => config.system_auth = boolean()?,
                "LogHistory" => {
                    config.log_history = if value.eq_ignore_ascii_case("all") {
                        "TOEFWUPCGMAR".to_string()
                    } else {
                        value.to_string()
                    }
                }
                "KeywordExpand" => config.keyword_expand = Some(value.to_string()),
                "LocalKeyword" => config.local_keyword = Some(value.to_string()),
                "RereadLogAfterVerify" => {
                    config.reread_log_after_verify = match value.to_ascii_lowercase().as_str() {
                        "always" | "yes" => RereadLog::Always,
                        "never" | "no" => RereadLog::Never,
                        "stat" => RereadLog::Stat,
                        _ => {
                            return Err(err(
                                lineno,
                                format!("unrecognized value '{}' for RereadLogAfterVerify", value),
                            ));
                        }
                    }
                }
                _ => tracing::warn!("{:?}: line {}: unrecognized keyword '{}'", path, lineno, key),
            }
        }
        Ok(config)
    }
}

/// Lock timing policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSettings {
    /// Seconds to sleep between attempts on a busy lock
    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,
    /// Age in seconds after which a lock counts as abandoned
    #[serde(default = "default_lock_age_secs")]
    pub lock_age_secs: u64,
    /// Remove abandoned locks instead of waiting on them
    #[serde(default)]
    pub fudge_locks: bool,
    /// Give up waiting after this many seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// The repository is on a read-only filesystem: take no read locks
    #[serde(default)]
    pub readonly_fs: bool,
}

fn default_wait_secs() -> u64 {
    30
}

fn default_lock_age_secs() -> u64 {
    3600
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            wait_secs: default_wait_secs(),
            lock_age_secs: default_lock_age_secs(),
            fudge_locks: false,
            timeout_secs: None,
            readonly_fs: false,
        }
    }
}

impl LockSettings {
    const FILE_NAME: &'static str = "lock-settings.json";

    /// Load settings stored under `CVSROOT/` of the repository root. A
    /// missing file gives the defaults.
    pub fn load(root_dir: &Path) -> Result<Self> {
        let path = Self::settings_path(root_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path).at(&path)?;
        serde_json::from_str(&data).map_err(|e| AdminError::Config {
            path,
            reason: e.to_string(),
        })
    }

    /// Save settings under `CVSROOT/` of the repository root.
    pub fn save(&self, root_dir: &Path) -> Result<()> {
        let path = Self::settings_path(root_dir);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }
        let tmp_path = path.with_extension("tmp");
        let data = serde_json::to_string_pretty(self).map_err(|e| AdminError::Config {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        fs::write(&tmp_path, &data).at(&tmp_path)?;
        fs::rename(&tmp_path, &path).at(&path)?;
        Ok(())
    }

    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }

    pub fn lock_age(&self) -> Duration {
        Duration::from_secs(self.lock_age_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    fn settings_path(root_dir: &Path) -> PathBuf {
        root_dir.join(CVSROOTADM).join(Self::FILE_NAME)
    }
}
