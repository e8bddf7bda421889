//! `status` command

use anyhow::{Context, Result};
use dcvs_core::admin::{CVSATTIC, RCSEXT};
use dcvs_core::{
    ClassifyOptions, CvsRoot, Entries, FileStatus, FsRcs, LockManager, VersionRequest, classify_entries,
};
use std::fmt::Write;
use std::path::Path;

const SEPARATOR: &str = "===================================================================";

/// Classify every entry of `dir` under a read lock on its repository.
pub async fn run(
    dir: &Path,
    root: &CvsRoot,
    repository: &str,
    request: &VersionRequest,
    opts: &ClassifyOptions,
) -> Result<Vec<FileStatus>> {
    let mut entries =
        Entries::open_readonly(dir).with_context(|| format!("cannot read entries of {}", dir.display()))?;
    let locks = LockManager::for_repository(Path::new(&root.directory))?;
    let guard = locks.read_lock(Path::new(repository)).await?;
    let statuses = classify_entries(&mut entries, repository, request, opts, &FsRcs::new()).await;
    guard.release()?;
    Ok(statuses?)
}

fn or_none(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => "(none)",
    }
}

/// Text report in the layout of `cvs status`.
pub fn render(statuses: &[FileStatus], repository: &str, root: &CvsRoot) -> String {
    let mut out = String::new();
    for status in statuses {
        let vers = &status.versions;
        let _ = writeln!(out, "{}", SEPARATOR);
        let _ = writeln!(
            out,
            "File: {:<17}\tStatus: {}\n",
            status.name, status.classification.ctype
        );

        let working = match vers.vn_user.as_deref() {
            None => format!("No entry for {}", status.name),
            Some("0") => "New file!".to_string(),
            Some(v) => format!("{}\t{}", v, vers.ts_rcs.as_deref().unwrap_or_default()),
        };
        let _ = writeln!(out, "   Working revision:\t{}", working);

        match vers.vn_rcs.as_deref() {
            Some(rev) => {
                let file = format!("{}{}", status.name, RCSEXT);
                let path = if vers.in_attic {
                    format!("{}/{}/{}", repository, CVSATTIC, file)
                } else {
                    format!("{}/{}", repository, file)
                };
                let _ = writeln!(out, "   Repository revision:\t{}\t{}", rev, path);
            }
            None => {
                let _ = writeln!(out, "   Repository revision:\tNo revision control file");
            }
        }
        let _ = writeln!(out, "   Sticky Tag:\t\t{}", or_none(vers.tag.as_deref()));
        let _ = writeln!(out, "   Sticky Date:\t\t{}", or_none(vers.date.as_deref()));
        let _ = writeln!(out, "   Sticky Options:\t{}", or_none(Some(vers.options.as_str())));
        if let Some(notice) = &status.classification.notice {
            let _ = writeln!(out, "   Note:\t\t\t{}", notice);
        }
        out.push('\n');
    }
    if statuses.is_empty() {
        let _ = writeln!(out, "No files tracked in {} ({})", repository, root);
    }
    out
}
