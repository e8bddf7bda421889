//! Per-directory Entries store
//!
//! Each working directory keeps a manifest of the files it tracks in
//! `CVS/Entries`. Changes are first appended to the journal `CVS/Entries.Log`
//! and folded back into `CVS/Entries` the next time the directory is opened
//! for writing, so an interrupted command never loses a registration.
//!
//! Line formats:
//! ```text
//! /name/revision/timestamp[+conflict]/options/tagdate   file entry
//! D/name////                                           subdirectory
//! D                                                    subdirectory list is complete
//! A <entry line>                                       (Entries.Log) add or replace
//! R <entry line>                                       (Entries.Log) remove
//! ```

use crate::admin::{self, CVSADM_ENT, CVSADM_ENTBAK, CVSADM_ENTLOG, CVSADM_ENTSTAT, CVSADM_TAG};
use crate::error::{AdminError, IoContext, Result};
use crate::hash::List;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Timestamp recorded for a file whose contents came from a merge.
pub const RESULT_OF_MERGE: &str = "Result of merge";

/// asctime(3) layout used for every timestamp in the Entries file.
const TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Format a modification time the way it is stored in the Entries file.
pub fn format_timestamp(t: SystemTime) -> String {
    let dt: DateTime<Utc> = t.into();
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Timestamp recorded for a file that was added but never committed.
pub fn initial_timestamp(name: &str) -> String {
    format!("Initial {}", name)
}

/// Kind of record in the Entries file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One record of the Entries file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub kind: EntryKind,
    pub name: String,
    /// Revision the working file is based on. `"0"` for a new file, a leading
    /// `-` for a file scheduled for removal.
    pub version: String,
    /// Working-file timestamp at the time of the last checkout/commit.
    pub timestamp: String,
    /// Keyword expansion options, e.g. `-kb`.
    pub options: String,
    pub tag: Option<String>,
    pub date: Option<String>,
    /// Working-file timestamp right after a merge left conflict markers.
    pub conflict: Option<String>,
}

impl Entry {
    /// A file entry with no options, sticky tag or date.
    pub fn file(name: impl Into<String>, version: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::File,
            name: name.into(),
            version: version.into(),
            timestamp: timestamp.into(),
            options: String::new(),
            tag: None,
            date: None,
            conflict: None,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Directory,
            name: name.into(),
            version: String::new(),
            timestamp: String::new(),
            options: String::new(),
            tag: None,
            date: None,
            conflict: None,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Newly added, not yet committed.
    pub fn is_added(&self) -> bool {
        self.version == "0"
    }

    /// Scheduled for removal.
    pub fn is_removed(&self) -> bool {
        self.version.starts_with('-')
    }

    /// Parse one Entries line (without the trailing newline).
    pub fn parse_line(line: &str) -> Result<Self> {
        let bad = || AdminError::BadEntry(line.to_string());

        let (kind, rest) = match line.strip_prefix('D') {
            Some(rest) => (EntryKind::Directory, rest),
            None => (EntryKind::File, line),
        };
        let rest = rest.strip_prefix('/').ok_or_else(bad)?;
        let fields: Vec<&str> = rest.splitn(5, '/').collect();
        let name = fields.first().copied().unwrap_or_default();
        if name.is_empty() {
            return Err(bad());
        }
        if kind == EntryKind::Directory {
            return Ok(Entry::directory(name));
        }
        if fields.len() < 5 {
            return Err(bad());
        }

        let (timestamp, conflict) = match fields[2].split_once('+') {
            Some((ts, conflict)) => (ts.to_string(), Some(conflict.to_string())),
            None => (fields[2].to_string(), None),
        };
        let tagdate = fields[4];
        let (tag, date) = match tagdate.chars().next() {
            Some('T') => (Some(tagdate[1..].to_string()), None),
            Some('D') => (None, Some(tagdate[1..].to_string())),
            _ => (None, None),
        };

        Ok(Self {
            kind,
            name: name.to_string(),
            version: fields[1].to_string(),
            timestamp,
            options: fields[3].to_string(),
            tag,
            date,
            conflict,
        })
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_directory() {
            return write!(f, "D/{}////", self.name);
        }
        write!(f, "/{}/{}/{}", self.name, self.version, self.timestamp)?;
        if let Some(conflict) = &self.conflict {
            write!(f, "+{}", conflict)?;
        }
        write!(f, "/{}/", self.options)?;
        if let Some(tag) = &self.tag {
            write!(f, "T{}", tag)?;
        } else if let Some(date) = &self.date {
            write!(f, "D{}", date)?;
        }
        Ok(())
    }
}

/// Directory-wide sticky tag or date, from `CVS/Tag`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirSticky {
    pub tag: Option<String>,
    pub date: Option<String>,
    /// The tag names a revision rather than a branch.
    pub nonbranch: bool,
}

impl DirSticky {
    pub fn is_empty(&self) -> bool {
        self.tag.is_none() && self.date.is_none()
    }
}

/// Read `CVS/Tag` in `dir`. A missing file means no sticky tag.
pub fn parse_tag_file(dir: &Path) -> Result<DirSticky> {
    let path = admin::adm_file(dir, CVSADM_TAG);
    let data = match fs::read_to_string(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(DirSticky::default()),
        Err(e) => return Err(AdminError::io_at(path, e)),
    };
    let first = data.lines().next().unwrap_or_default();
    let mut sticky = DirSticky::default();
    match first.chars().next() {
        Some('T') => sticky.tag = Some(first[1..].to_string()),
        Some('N') => {
            sticky.tag = Some(first[1..].to_string());
            sticky.nonbranch = true;
        }
        Some('D') => sticky.date = Some(first[1..].to_string()),
        _ => {}
    }
    Ok(sticky)
}

/// Write `CVS/Tag`, or remove it when there is neither tag nor date.
pub fn write_tag(dir: &Path, sticky: &DirSticky) -> Result<()> {
    let path = admin::adm_file(dir, CVSADM_TAG);
    let line = match (&sticky.tag, &sticky.date) {
        (Some(tag), _) => format!("{}{}\n", if sticky.nonbranch { 'N' } else { 'T' }, tag),
        (None, Some(date)) => format!("D{}\n", date),
        (None, None) => {
            return match fs::remove_file(&path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(AdminError::io_at(path, e)),
                _ => Ok(()),
            };
        }
    };
    fs::write(&path, line).at(&path)
}

/// In-memory view of one directory's Entries, backed by the on-disk files.
#[derive(Debug)]
pub struct Entries {
    dir: PathBuf,
    list: List<Entry>,
    subdirs_known: bool,
    sticky: DirSticky,
    is_static: bool,
    /// Changes have been journaled since the last rewrite.
    dirty: bool,
    readonly: bool,
}

impl Entries {
    /// Open the Entries of `dir`, replaying and compacting the journal.
    pub fn open(dir: &Path) -> Result<Self> {
        Self::open_with(dir, false)
    }

    /// Open the Entries of `dir` without touching anything on disk. Later
    /// changes stay in memory.
    pub fn open_readonly(dir: &Path) -> Result<Self> {
        Self::open_with(dir, true)
    }

    fn open_with(dir: &Path, readonly: bool) -> Result<Self> {
        if !admin::adm_dir(dir).is_dir() {
            return Err(AdminError::NotCheckedOut {
                dir: dir.to_path_buf(),
            });
        }

        let mut entries = Self {
            dir: dir.to_path_buf(),
            list: List::new(),
            subdirs_known: false,
            sticky: parse_tag_file(dir)?,
            is_static: admin::adm_file(dir, CVSADM_ENTSTAT).exists(),
            dirty: false,
            readonly,
        };

        let ent_path = admin::adm_file(dir, CVSADM_ENT);
        let bak_path = admin::adm_file(dir, CVSADM_ENTBAK);
        if !ent_path.exists() && bak_path.exists() {
            tracing::warn!("recovering {:?} from {:?}", ent_path, bak_path);
            if readonly {
                entries.load(&bak_path)?;
            } else {
                fs::rename(&bak_path, &ent_path).at(&ent_path)?;
            }
        }
        if ent_path.exists() {
            entries.load(&ent_path)?;
        }

        let log_path = admin::adm_file(dir, CVSADM_ENTLOG);
        if log_path.exists() {
            let replayed = entries.replay_log(&log_path)?;
            tracing::debug!("replayed {} Entries.Log records in {:?}", replayed, dir);
            if !readonly {
                entries.write()?;
            }
        }

        Ok(entries)
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let data = fs::read_to_string(path).at(path)?;
        for line in data.lines() {
            if line.is_empty() {
                continue;
            }
            if line == "D" {
                self.subdirs_known = true;
                continue;
            }
            match Entry::parse_line(line) {
                Ok(entry) => {
                    if entry.is_directory() {
                        self.subdirs_known = true;
                    }
                    self.list.replace(entry.name.clone(), entry);
                }
                Err(_) => tracing::warn!("{:?}: skipping malformed line {:?}", path, line),
            }
        }
        Ok(())
    }

    fn replay_log(&mut self, path: &Path) -> Result<usize> {
        let data = fs::read_to_string(path).at(path)?;
        let mut replayed = 0;
        for line in data.lines() {
            let (cmd, rest) = match line.split_at_checked(2) {
                Some(parts) => parts,
                None => continue,
            };
            if rest == "D" {
                if cmd == "A " {
                    self.subdirs_known = true;
                }
                continue;
            }
            let entry = match Entry::parse_line(rest) {
                Ok(entry) => entry,
                Err(_) => {
                    tracing::warn!("{:?}: skipping malformed line {:?}", path, line);
                    continue;
                }
            };
            match cmd {
                "A " => {
                    if entry.is_directory() {
                        self.subdirs_known = true;
                    }
                    self.list.replace(entry.name.clone(), entry);
                }
                "R " => {
                    self.list.remove(&entry.name);
                }
                _ => continue,
            }
            replayed += 1;
        }
        self.dirty = true;
        Ok(replayed)
    }

    fn journal(&mut self, cmd: char, line: &str) -> Result<()> {
        self.dirty = true;
        if self.readonly {
            return Ok(());
        }
        let path = admin::adm_file(&self.dir, CVSADM_ENTLOG);
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .at(&path)?;
        writeln!(log, "{} {}", cmd, line).at(&path)
    }

    /// Working directory these entries belong to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&Entry> {
        self.list.find(name)
    }

    pub fn files(&self) -> impl Iterator<Item = &Entry> {
        self.list.values().filter(|e| !e.is_directory())
    }

    pub fn dirs(&self) -> impl Iterator<Item = &Entry> {
        self.list.values().filter(|e| e.is_directory())
    }

    pub fn list(&self) -> &List<Entry> {
        &self.list
    }

    pub fn sticky(&self) -> &DirSticky {
        &self.sticky
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn subdirs_known(&self) -> bool {
        self.subdirs_known
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Record a file, replacing any previous entry of the same name.
    #[allow(clippy::too_many_arguments)]
    pub fn register(
        &mut self,
        name: &str,
        version: &str,
        timestamp: &str,
        options: &str,
        tag: Option<&str>,
        date: Option<&str>,
        conflict: Option<&str>,
    ) -> Result<()> {
        let entry = Entry {
            kind: EntryKind::File,
            name: name.to_string(),
            version: version.to_string(),
            timestamp: timestamp.to_string(),
            options: options.to_string(),
            tag: tag.map(str::to_string),
            date: date.map(str::to_string),
            conflict: conflict.map(str::to_string),
        };
        self.register_entry(entry)
    }

    /// Record a prepared entry, replacing any previous one of the same name.
    pub fn register_entry(&mut self, entry: Entry) -> Result<()> {
        tracing::debug!("Register({:?}): {}", self.dir, entry);
        let line = entry.to_string();
        if entry.is_directory() {
            self.subdirs_known = true;
        }
        self.list.replace(entry.name.clone(), entry);
        self.journal('A', &line)
    }

    /// Record a subdirectory.
    pub fn register_dir(&mut self, name: &str) -> Result<()> {
        self.register_entry(Entry::directory(name))
    }

    /// Forget an entry. Returns the removed record.
    pub fn scratch(&mut self, name: &str) -> Result<Option<Entry>> {
        let removed = self.list.remove(name);
        if let Some(entry) = &removed {
            tracing::debug!("Scratch_Entry({:?}): {}", self.dir, name);
            let line = entry.to_string();
            self.journal('R', &line)?;
        }
        Ok(removed)
    }

    /// Note that the subdirectory list is complete.
    pub fn set_subdirs_known(&mut self) -> Result<()> {
        if self.subdirs_known {
            return Ok(());
        }
        self.subdirs_known = true;
        self.journal('A', "D")
    }

    /// Change the directory-wide sticky tag/date.
    pub fn set_sticky(&mut self, sticky: DirSticky) -> Result<()> {
        if !self.readonly {
            write_tag(&self.dir, &sticky)?;
        }
        self.sticky = sticky;
        Ok(())
    }

    /// Rewrite `CVS/Entries` from memory and discard the journal.
    ///
    /// The new contents go to `Entries.Backup` first and are renamed over
    /// `Entries`, so the old file stays intact until the rename.
    pub fn write(&mut self) -> Result<()> {
        if self.readonly {
            return Ok(());
        }
        let bak_path = admin::adm_file(&self.dir, CVSADM_ENTBAK);
        let ent_path = admin::adm_file(&self.dir, CVSADM_ENT);
        let log_path = admin::adm_file(&self.dir, CVSADM_ENTLOG);

        let mut out = String::new();
        let mut wrote_dir = false;
        for entry in self.list.values() {
            wrote_dir |= entry.is_directory();
            out.push_str(&entry.to_string());
            out.push('\n');
        }
        if self.subdirs_known && !wrote_dir {
            out.push_str("D\n");
        }

        {
            let mut file = fs::File::create(&bak_path).at(&bak_path)?;
            file.write_all(out.as_bytes()).at(&bak_path)?;
            file.sync_all().at(&bak_path)?;
        }
        fs::rename(&bak_path, &ent_path).at(&ent_path)?;
        match fs::remove_file(&log_path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                return Err(AdminError::io_at(log_path, e));
            }
            _ => {}
        }
        self.dirty = false;
        Ok(())
    }

    /// Compact the journal if anything changed.
    pub fn close(mut self) -> Result<()> {
        if self.dirty {
            self.write()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    fn workdir() -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("CVS")).unwrap();
        tmp
    }

    fn read_adm(dir: &Path, name: &str) -> String {
        fs::read_to_string(dir.join("CVS").join(name)).unwrap()
    }

    #[test]
    fn test_parse_file_line() {
        let e = Entry::parse_line("/main.c/1.4/Sun Sep  9 01:46:40 2001/-kb/Trel-1").unwrap();
        assert_eq!(e.kind, EntryKind::File);
        assert_eq!(e.name, "main.c");
        assert_eq!(e.version, "1.4");
        assert_eq!(e.timestamp, "Sun Sep  9 01:46:40 2001");
        assert_eq!(e.options, "-kb");
        assert_eq!(e.tag.as_deref(), Some("rel-1"));
        assert!(e.date.is_none());
        assert!(e.conflict.is_none());
    }

    #[test]
    fn test_parse_conflict_and_date() {
        let e = Entry::parse_line(
            "/util.c/1.2/Result of merge+Sun Sep  9 01:46:40 2001//D2001.09.09.00.00.00",
        )
        .unwrap();
        assert_eq!(e.timestamp, RESULT_OF_MERGE);
        assert_eq!(e.conflict.as_deref(), Some("Sun Sep  9 01:46:40 2001"));
        assert_eq!(e.date.as_deref(), Some("2001.09.09.00.00.00"));
        assert_eq!(
            e.to_string(),
            "/util.c/1.2/Result of merge+Sun Sep  9 01:46:40 2001//D2001.09.09.00.00.00"
        );
    }

    #[test]
    fn test_parse_directory_and_errors() {
        let d = Entry::parse_line("D/src////").unwrap();
        assert!(d.is_directory());
        assert_eq!(d.name, "src");
        assert_eq!(d.to_string(), "D/src////");

        assert!(Entry::parse_line("garbage").is_err());
        assert!(Entry::parse_line("/name/1.1").is_err());
        assert!(Entry::parse_line("//1.1/ts//").is_err());
    }

    #[test]
    fn test_added_and_removed_sentinels() {
        assert!(Entry::file("a", "0", "Initial a").is_added());
        assert!(Entry::file("a", "-1.3", "dummy").is_removed());
        assert!(!Entry::file("a", "1.3", "dummy").is_removed());
    }

    #[test]
    fn test_format_timestamp_matches_asctime() {
        let t = UNIX_EPOCH + Duration::from_secs(1_000_000_000);
        assert_eq!(format_timestamp(t), "Sun Sep  9 01:46:40 2001");
        assert_eq!(initial_timestamp("foo.c"), "Initial foo.c");
    }

    #[test]
    fn test_open_requires_admin_dir() {
        let tmp = TempDir::new().unwrap();
        let err = Entries::open(tmp.path()).unwrap_err();
        assert!(matches!(err, AdminError::NotCheckedOut { .. }));
    }

    #[test]
    fn test_register_journals_and_close_compacts() {
        let tmp = workdir();
        let mut entries = Entries::open(tmp.path()).unwrap();
        assert!(entries.is_empty());

        entries
            .register("a.c", "1.1", "Sun Sep  9 01:46:40 2001", "", None, None, None)
            .unwrap();
        entries.register_dir("sub").unwrap();
        assert_eq!(
            read_adm(tmp.path(), "Entries.Log"),
            "A /a.c/1.1/Sun Sep  9 01:46:40 2001//\nA D/sub////\n"
        );

        entries.close().unwrap();
        assert!(!tmp.path().join("CVS/Entries.Log").exists());
        assert_eq!(
            read_adm(tmp.path(), "Entries"),
            "/a.c/1.1/Sun Sep  9 01:46:40 2001//\nD/sub////\n"
        );
    }

    #[test]
    fn test_log_replay_on_open() {
        let tmp = workdir();
        fs::write(
            tmp.path().join("CVS/Entries"),
            "/a.c/1.1/ts-a//\n/b.c/1.2/ts-b//\n",
        )
        .unwrap();
        fs::write(
            tmp.path().join("CVS/Entries.Log"),
            "A /c.c/0/Initial c.c//\nR /a.c/1.1/ts-a//\nA /b.c/1.3/ts-b2//\nX junk\n",
        )
        .unwrap();

        let entries = Entries::open(tmp.path()).unwrap();
        assert!(entries.find("a.c").is_none());
        assert_eq!(entries.find("b.c").unwrap().version, "1.3");
        assert!(entries.find("c.c").unwrap().is_added());
        // Opening for write folds the journal into Entries
        assert!(!tmp.path().join("CVS/Entries.Log").exists());
        assert_eq!(
            read_adm(tmp.path(), "Entries"),
            "/c.c/0/Initial c.c//\n/b.c/1.3/ts-b2//\n"
        );
    }

    #[test]
    fn test_readonly_open_leaves_disk_alone() {
        let tmp = workdir();
        fs::write(tmp.path().join("CVS/Entries"), "/a.c/1.1/ts//\n").unwrap();
        fs::write(tmp.path().join("CVS/Entries.Log"), "A /b.c/1.1/ts//\n").unwrap();

        let mut entries = Entries::open_readonly(tmp.path()).unwrap();
        assert_eq!(entries.len(), 2);
        entries.scratch("a.c").unwrap();
        entries.close().unwrap();

        assert_eq!(read_adm(tmp.path(), "Entries"), "/a.c/1.1/ts//\n");
        assert_eq!(read_adm(tmp.path(), "Entries.Log"), "A /b.c/1.1/ts//\n");
    }

    #[test]
    fn test_backup_recovery() {
        let tmp = workdir();
        fs::write(tmp.path().join("CVS/Entries.Backup"), "/a.c/1.5/ts//\n").unwrap();

        let entries = Entries::open(tmp.path()).unwrap();
        assert_eq!(entries.find("a.c").unwrap().version, "1.5");
        assert!(tmp.path().join("CVS/Entries").exists());
        assert!(!tmp.path().join("CVS/Entries.Backup").exists());
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let tmp = workdir();
        fs::write(
            tmp.path().join("CVS/Entries"),
            "/ok.c/1.1/ts//\nthis is not an entry\n/short/1.1\n",
        )
        .unwrap();
        let entries = Entries::open_readonly(tmp.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries.find("ok.c").is_some());
    }

    #[test]
    fn test_subdirs_known_marker() {
        let tmp = workdir();
        fs::write(tmp.path().join("CVS/Entries"), "/a.c/1.1/ts//\n").unwrap();

        let mut entries = Entries::open(tmp.path()).unwrap();
        assert!(!entries.subdirs_known());
        entries.set_subdirs_known().unwrap();
        entries.close().unwrap();
        assert_eq!(read_adm(tmp.path(), "Entries"), "/a.c/1.1/ts//\nD\n");

        let entries = Entries::open(tmp.path()).unwrap();
        assert!(entries.subdirs_known());
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_scratch_missing_entry_is_noop() {
        let tmp = workdir();
        let mut entries = Entries::open(tmp.path()).unwrap();
        assert!(entries.scratch("nothing").unwrap().is_none());
        assert!(!entries.is_dirty());
        assert!(!tmp.path().join("CVS/Entries.Log").exists());
    }

    #[test]
    fn test_tag_file() {
        let tmp = workdir();
        assert!(parse_tag_file(tmp.path()).unwrap().is_empty());

        let sticky = DirSticky {
            tag: Some("rel-1".into()),
            date: None,
            nonbranch: true,
        };
        write_tag(tmp.path(), &sticky).unwrap();
        assert_eq!(read_adm(tmp.path(), "Tag"), "Nrel-1\n");
        assert_eq!(parse_tag_file(tmp.path()).unwrap(), sticky);

        let dated = DirSticky {
            tag: None,
            date: Some("2001.09.09.01.46.40".into()),
            nonbranch: false,
        };
        let mut entries = Entries::open(tmp.path()).unwrap();
        entries.set_sticky(dated.clone()).unwrap();
        assert_eq!(parse_tag_file(tmp.path()).unwrap(), dated);

        write_tag(tmp.path(), &DirSticky::default()).unwrap();
        assert!(!tmp.path().join("CVS/Tag").exists());
    }

    #[test]
    fn test_static_flag() {
        let tmp = workdir();
        fs::write(tmp.path().join("CVS/Entries.Static"), "").unwrap();
        let entries = Entries::open(tmp.path()).unwrap();
        assert!(entries.is_static());
    }
}
