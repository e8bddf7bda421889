//! Version snapshots
//!
//! Gathers everything the classifier needs about one file: its Entries
//! record, the working file's timestamp and the revision the repository
//! selects for the active sticky tag or date.

use crate::classify::{classify, Classification, ClassifyOptions};
use crate::entries::{format_timestamp, Entries};
use crate::error::{AdminError, Result};
use crate::rcs::{parse_rcs_date, RcsFile, RcsSource, TAG_BASE};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;

/// Revision selection requested by the command
#[derive(Debug, Clone, Default)]
pub struct VersionRequest {
    /// `-r` tag or revision
    pub tag: Option<String>,
    /// `-D` date, in RCS date form
    pub date: Option<String>,
    /// `-k` options
    pub options: Option<String>,
    pub force_tag_match: bool,
    /// `-A`: ignore sticky tags, dates and options of the entry and directory
    pub aflag: bool,
}

/// What is known about one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Versions {
    /// Revision in Entries
    pub vn_user: Option<String>,
    /// Revision the repository selects
    pub vn_rcs: Option<String>,
    pub rcs_dead: bool,
    /// The RCS file lives in the Attic
    pub in_attic: bool,
    /// Working file timestamp, if the file exists
    pub ts_user: Option<String>,
    /// Timestamp recorded in Entries
    pub ts_rcs: Option<String>,
    pub ts_conflict: Option<String>,
    /// Effective keyword expansion options
    pub options: String,
    pub entry_options: Option<String>,
    /// Effective sticky tag and date
    pub tag: Option<String>,
    pub date: Option<String>,
    pub entry_tag: Option<String>,
    pub entry_date: Option<String>,
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

/// Timestamp of the working file `path` in Entries form.
pub fn working_timestamp(path: &Path) -> Result<Option<String>> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => {
            let mtime = meta.modified().map_err(|e| AdminError::io_at(path, e))?;
            Ok(Some(format_timestamp(mtime)))
        }
        Ok(_) => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AdminError::io_at(path, e)),
    }
}

impl Versions {
    /// Snapshot of `name` in the working directory of `entries`.
    pub fn compute(entries: &Entries, name: &str, rcs: Option<&RcsFile>, request: &VersionRequest) -> Result<Self> {
        let entry = entries.find(name).filter(|e| !e.is_directory());
        let mut vers = Versions {
            vn_user: entry.map(|e| e.version.clone()),
            ts_rcs: entry.map(|e| e.timestamp.clone()),
            ts_conflict: entry.and_then(|e| e.conflict.clone()),
            entry_options: entry.map(|e| e.options.clone()),
            entry_tag: entry.and_then(|e| e.tag.clone()),
            entry_date: entry.and_then(|e| e.date.clone()),
            ts_user: working_timestamp(&entries.dir().join(name))?,
            ..Default::default()
        };

        // Sticky selection: command line, then the entry, then the directory
        if request.tag.is_some() || request.date.is_some() {
            vers.tag = request.tag.clone();
            vers.date = request.date.clone();
        } else if request.aflag {
            // Reset to the head of the trunk
        } else if vers.entry_tag.is_some() || vers.entry_date.is_some() {
            vers.tag = vers.entry_tag.clone();
            vers.date = vers.entry_date.clone();
        } else if entry.is_none() {
            vers.tag = entries.sticky().tag.clone();
            vers.date = entries.sticky().date.clone();
        }

        vers.options = non_empty(request.options.as_deref())
            .or(entry.filter(|_| !request.aflag).map(|e| e.options.as_str()))
            .unwrap_or_default()
            .to_string();

        let Some(rcs) = rcs else {
            return Ok(vers);
        };
        if vers.options.is_empty() {
            if let Some(expand) = &rcs.expand {
                vers.options = format!("-k{}", expand);
            }
        }
        vers.in_attic = rcs.in_attic;
        vers.vn_rcs = if vers.tag.as_deref() == Some(TAG_BASE) {
            vers.vn_user.clone().filter(|v| rcs.delta(v).is_some())
        } else {
            let date = match vers.date.as_deref() {
                Some(raw) => match parse_rcs_date(raw) {
                    Some(d) => Some(d),
                    None => {
                        tracing::warn!("ignoring malformed sticky date {:?} for {}", raw, name);
                        None
                    }
                },
                None => None,
            };
            rcs.resolve(vers.tag.as_deref(), date.as_ref(), request.force_tag_match)
        };
        vers.rcs_dead = vers.vn_rcs.as_deref().is_some_and(|v| rcs.is_dead(v));
        Ok(vers)
    }

    /// Revision the working file is compared against when timestamps
    /// disagree: the one it was checked out from, else the selected one.
    pub fn base_revision(&self) -> Option<&str> {
        self.vn_user
            .as_deref()
            .filter(|v| *v != "0" && !v.starts_with('-'))
            .or(self.vn_rcs.as_deref())
    }
}

/// Classification of one file together with its snapshot
#[derive(Debug, Clone, Serialize)]
pub struct FileStatus {
    pub name: String,
    pub versions: Versions,
    #[serde(flatten)]
    pub classification: Classification,
}

/// Classify `name` in the working directory of `entries`, whose repository
/// directory is `repository`.
///
/// Working files found identical to their revision get their new timestamp
/// recorded, and changed sticky tags are registered again, as a side effect
/// on `entries`. The working file and the revision text are only read when
/// the classifier asks for a content comparison.
pub async fn classify_file(
    entries: &mut Entries,
    repository: &str,
    name: &str,
    request: &VersionRequest,
    opts: &ClassifyOptions,
    source: &dyn RcsSource,
) -> Result<FileStatus> {
    let opts = &ClassifyOptions {
        aflag: opts.aflag || request.aflag,
        ..*opts
    };
    let rcs = source.lookup(repository, name).await?;
    let vers = Versions::compute(entries, name, rcs.as_ref(), request)?;

    // The classifier is pure: run it once to learn whether it compares
    // contents, and again with the answer if it does.
    let mut asked = false;
    let mut classification = classify(name, &vers, opts, || {
        asked = true;
        true
    });
    if asked {
        let differs = working_differs(entries.dir(), repository, name, &vers, source).await?;
        classification = classify(name, &vers, opts, || differs);
    }

    if let Some(notice) = &classification.notice {
        tracing::warn!("{}", notice);
    }
    if classification.refresh_timestamp {
        if let (Some(rev), Some(ts)) = (vers.vn_user.as_deref().or(vers.vn_rcs.as_deref()), vers.ts_user.as_deref()) {
            entries.register(name, rev, ts, &vers.options, vers.tag.as_deref(), vers.date.as_deref(), None)?;
        }
    } else if classification.reregister {
        if let (Some(rev), Some(ts)) = (vers.vn_user.as_deref(), vers.ts_rcs.as_deref()) {
            entries.register(
                name,
                rev,
                ts,
                &vers.options,
                vers.tag.as_deref(),
                vers.date.as_deref(),
                vers.ts_conflict.as_deref(),
            )?;
        }
    }
    tracing::debug!("{}: {:?}", name, classification.ctype);

    Ok(FileStatus {
        name: name.to_string(),
        versions: vers,
        classification,
    })
}

/// Compare the working file with the revision it is based on. Without
/// revision text there is nothing to compare, so the file counts as changed.
async fn working_differs(
    dir: &Path,
    repository: &str,
    name: &str,
    vers: &Versions,
    source: &dyn RcsSource,
) -> Result<bool> {
    let Some(rev) = vers.base_revision() else {
        return Ok(true);
    };
    let Some(text) = source.revision_text(repository, name, rev).await? else {
        return Ok(true);
    };
    let path = dir.join(name);
    let working = tokio::fs::read(&path).await.map_err(|e| AdminError::io_at(&path, e))?;
    Ok(text != working)
}

/// Classify every file entry of a directory, in Entries order.
pub async fn classify_entries(
    entries: &mut Entries,
    repository: &str,
    request: &VersionRequest,
    opts: &ClassifyOptions,
    source: &dyn RcsSource,
) -> Result<Vec<FileStatus>> {
    let names: Vec<String> = entries.files().map(|e| e.name.clone()).collect();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        out.push(classify_file(entries, repository, &name, request, opts, source).await?);
    }
    Ok(out)
}
