//! DCvs Core Library
//!
//! Working-copy and repository consistency engine:
//! - Named-node lists used for every in-memory table
//! - Entries store with journal replay and crash-safe rewrites
//! - Directory lock manager over the shared repository filesystem
//! - File classification against RCS revisions
//! - Root and repository path resolution

pub mod admin;
pub mod classify;
pub mod config;
pub mod entries;
pub mod error;
pub mod hash;
pub mod lock;
pub mod rcs;
pub mod repos;
pub mod root;
pub mod version;

pub use admin::{create_admin, is_working_dir};
pub use classify::{classify, Classification, ClassifyOptions, Ctype};
pub use config::{LockSettings, RepositoryConfig};
pub use entries::{DirSticky, Entries, Entry, EntryKind};
pub use error::{AdminError, Result};
pub use hash::List;
pub use lock::{LockGuard, LockKind, LockManager, LockStatus};
pub use rcs::{FsRcs, MemoryRcs, RcsFile, RcsSource};
pub use repos::{name_repository, sanitize_repository_name, short_repository};
pub use root::{name_root, resolve_root, CvsRoot, Method, RootAllowList};
pub use version::{classify_entries, classify_file, FileStatus, VersionRequest, Versions};
