//! Administrative directory layout
//!
//! Every working directory carries a `CVS/` subdirectory:
//! ```text
//! CVS/Root            repository root (CVSROOT string)
//! CVS/Repository      repository directory, relative to the root
//! CVS/Entries         tracked files and subdirectories
//! CVS/Entries.Log     journal of Entries changes
//! CVS/Entries.Backup  Entries rewrite in progress
//! CVS/Entries.Static  present when the directory takes no new files
//! CVS/Tag             sticky tag or date for the directory
//! ```

use crate::entries::{write_tag, DirSticky};
use crate::error::{AdminError, IoContext, Result};
use crate::repos::short_repository;
use crate::root::CvsRoot;
use std::fs;
use std::path::{Path, PathBuf};

pub const CVSADM: &str = "CVS";
pub const CVSADM_ENT: &str = "Entries";
pub const CVSADM_ENTBAK: &str = "Entries.Backup";
pub const CVSADM_ENTLOG: &str = "Entries.Log";
pub const CVSADM_ENTSTAT: &str = "Entries.Static";
pub const CVSADM_REP: &str = "Repository";
pub const CVSADM_ROOT: &str = "Root";
pub const CVSADM_TAG: &str = "Tag";

/// Name of the repository's administrative directory.
pub const CVSROOTADM: &str = "CVSROOT";
/// Repository configuration file inside `CVSROOT`.
pub const CVSROOTADM_CONFIG: &str = "config";
/// Subdirectory holding RCS files whose head revision is dead.
pub const CVSATTIC: &str = "Attic";
/// Suffix of RCS files.
pub const RCSEXT: &str = ",v";

pub fn adm_dir(dir: &Path) -> PathBuf {
    dir.join(CVSADM)
}

pub fn adm_file(dir: &Path, name: &str) -> PathBuf {
    dir.join(CVSADM).join(name)
}

/// Whether `dir` is a checked-out working directory.
pub fn is_working_dir(dir: &Path) -> bool {
    adm_dir(dir).is_dir()
}

/// Create the administrative directory for a fresh working directory.
///
/// The repository is recorded relative to the root when it lies inside it.
/// Fails if `dir` already has Entries.
pub fn create_admin(dir: &Path, root: &CvsRoot, repository: &str, sticky: &DirSticky) -> Result<()> {
    let ent_path = adm_file(dir, CVSADM_ENT);
    if ent_path.exists() {
        return Err(AdminError::AlreadyCheckedOut {
            dir: dir.to_path_buf(),
        });
    }
    let adm = adm_dir(dir);
    fs::create_dir_all(&adm).at(&adm)?;

    let rep_path = adm_file(dir, CVSADM_REP);
    let recorded = match short_repository(repository, &root.directory) {
        "" => ".",
        rel => rel,
    };
    fs::write(&rep_path, format!("{}\n", recorded)).at(&rep_path)?;

    let root_path = adm_file(dir, CVSADM_ROOT);
    fs::write(&root_path, format!("{}\n", root)).at(&root_path)?;

    fs::write(&ent_path, "").at(&ent_path)?;
    write_tag(dir, sticky)?;
    tracing::debug!("created administration files in {:?} for {}", dir, repository);
    Ok(())
}
