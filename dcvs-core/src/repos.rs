//! Repository path resolution
//!
//! Maps a working directory to the repository directory it mirrors, using
//! `CVS/Repository` (absolute, or relative to the root directory).

use crate::admin::{self, CVSADM_REP};
use crate::error::{AdminError, Result};
use crate::root::{strip_trailing_slashes, CvsRoot};
use std::fs;
use std::io;
use std::path::Path;

/// Strip trailing slashes and trailing `/.` components.
///
/// `"/cvs/proj/./"` becomes `"/cvs/proj"`; a path that reduces to nothing
/// becomes `"/"`.
pub fn sanitize_repository_name(repository: &str) -> String {
    let mut s = repository;
    loop {
        let stripped = strip_trailing_slashes(s);
        let stripped = match stripped.strip_suffix("/.") {
            Some(rest) => rest,
            None => stripped,
        };
        if stripped == s {
            break;
        }
        s = stripped;
    }
    if s.is_empty() && repository.starts_with('/') {
        "/".to_string()
    } else {
        s.to_string()
    }
}

/// Repository directory mirrored by the working directory `dir`.
///
/// Relative `CVS/Repository` contents are taken relative to the root
/// directory.
pub fn name_repository(dir: &Path, root: &CvsRoot) -> Result<String> {
    if !admin::adm_dir(dir).is_dir() {
        return Err(AdminError::NotCheckedOut {
            dir: dir.to_path_buf(),
        });
    }
    let path = admin::adm_file(dir, CVSADM_REP);
    let data = match fs::read_to_string(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(AdminError::MissingAdminFile {
                dir: dir.to_path_buf(),
                file: CVSADM_REP,
            });
        }
        Err(e) => return Err(AdminError::io_at(path, e)),
    };
    let line = data.lines().next().unwrap_or_default().trim_end();
    if line.is_empty() {
        return Err(AdminError::EmptyRepository {
            dir: dir.to_path_buf(),
        });
    }

    let repository = if line.starts_with('/') {
        line.to_string()
    } else if root.directory == "/" {
        format!("/{}", line)
    } else {
        format!("{}/{}", root.directory, line)
    };
    Ok(sanitize_repository_name(&repository))
}

/// Repository path relative to the root directory, for display and for
/// recording in `CVS/Repository`. Paths outside the root are returned
/// unchanged.
pub fn short_repository<'a>(repository: &'a str, root_dir: &str) -> &'a str {
    let root_dir = strip_trailing_slashes(root_dir);
    if root_dir == "/" {
        return repository.strip_prefix('/').unwrap_or(repository);
    }
    match repository.strip_prefix(root_dir) {
        Some("") => "",
        Some(rest) => match rest.strip_prefix('/') {
            Some(rel) => rel,
            None => repository,
        },
        None => repository,
    }
}
