//! File classification
//!
//! Decides what a command has to do with one file by reconciling three
//! views of it: the working file (`ts_user`), its Entries record
//! (`vn_user`, `ts_rcs`) and the repository (`vn_rcs`). The function is
//! pure apart from the content comparison, which is only consulted when the
//! timestamps disagree.

use crate::version::Versions;
use serde::Serialize;
use std::fmt;

/// Classification of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ctype {
    Unknown,
    Conflict,
    NeedsMerge,
    Modified,
    Checkout,
    Added,
    Removed,
    RemoveEntry,
    UpToDate,
    Patch,
}

impl Ctype {
    /// Label printed by `cvs status`.
    pub fn status_label(&self) -> &'static str {
        match self {
            Ctype::Unknown => "Unknown",
            Ctype::Conflict => "Unresolved Conflict",
            Ctype::NeedsMerge => "Needs Merge",
            Ctype::Modified => "Locally Modified",
            Ctype::Checkout => "Needs Checkout",
            Ctype::Added => "Locally Added",
            Ctype::Removed => "Locally Removed",
            Ctype::RemoveEntry => "Entry Invalid",
            Ctype::UpToDate => "Up-to-date",
            Ctype::Patch => "Needs Patch",
        }
    }
}

impl fmt::Display for Ctype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status_label())
    }
}

/// How the caller wants files classified
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyOptions {
    /// Contents are going to stdout; the working file does not matter.
    pub pipeout: bool,
    /// A tag or date the file does not carry selects nothing.
    pub force_tag_match: bool,
    /// Sticky tags, dates and options are being reset (`-A`).
    pub aflag: bool,
    /// Report working files that disappeared (update does, status does not).
    pub report_lost: bool,
}

/// Result of classifying one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub ctype: Ctype,
    /// Message for the user, if the situation deserves one
    pub notice: Option<String>,
    /// The entry's sticky tag or date differs from the requested one and
    /// must be registered again.
    pub reregister: bool,
    /// The working file was touched but matches its revision; its new
    /// timestamp should be recorded.
    pub refresh_timestamp: bool,
}

impl Classification {
    fn new(ctype: Ctype) -> Self {
        Self {
            ctype,
            notice: None,
            reregister: false,
            refresh_timestamp: false,
        }
    }

    fn notice(mut self, msg: String) -> Self {
        self.notice = Some(msg);
        self
    }
}

fn sticky_changed(vers: &Versions, aflag: bool) -> bool {
    if !aflag && vers.tag.is_none() && vers.date.is_none() {
        return false;
    }
    vers.entry_tag != vers.tag || vers.entry_date != vers.date
}

/// Classify the file `name` from its version snapshot.
///
/// `differs` reports whether the working file's contents differ from the
/// repository revision. It is called at most once, and only when the
/// working file exists and its timestamp does not settle the question.
pub fn classify<F>(name: &str, vers: &Versions, opts: &ClassifyOptions, mut differs: F) -> Classification
where
    F: FnMut() -> bool,
{
    use Ctype::*;

    let options_changed = vers.entry_options.as_deref().unwrap_or("") != vers.options;
    let rcs_live = vers.vn_rcs.is_some() && !vers.rcs_dead;
    let unmodified = vers.ts_user.is_some() && vers.ts_user == vers.ts_rcs;
    let lost = |c: Classification| {
        if opts.report_lost {
            c.notice(format!("warning: `{}' was lost", name))
        } else {
            c
        }
    };

    let Some(vn_user) = vers.vn_user.as_deref() else {
        // No entry
        if vers.vn_rcs.is_none() {
            let c = Classification::new(Unknown);
            let quiet = opts.force_tag_match && (vers.tag.is_some() || vers.date.is_some());
            return match (&vers.ts_user, quiet) {
                (_, true) => c,
                (None, false) => c.notice(format!("nothing known about `{}'", name)),
                (Some(_), false) => c.notice(format!("use `cvs add' to create an entry for `{}'", name)),
            };
        }
        if vers.rcs_dead {
            return match vers.ts_user {
                None => Classification::new(UpToDate),
                Some(_) => Classification::new(Unknown)
                    .notice(format!("use `cvs add' to create an entry for `{}'", name)),
            };
        }
        if !opts.pipeout && vers.ts_user.is_some() {
            if differs() {
                return Classification::new(Conflict).notice(format!("move away `{}'; it is in the way", name));
            }
            let mut c = Classification::new(Checkout);
            c.refresh_timestamp = true;
            return c;
        }
        return Classification::new(Checkout);
    };

    if vn_user == "0" {
        // Added, not yet committed
        if vers.ts_user.is_none() {
            return Classification::new(RemoveEntry).notice(format!("warning: new-born `{}' has disappeared", name));
        }
        if !rcs_live {
            return Classification::new(Added);
        }
        if opts.pipeout {
            return Classification::new(Checkout);
        }
        let msg = if vers.in_attic {
            format!("conflict: `{}' has been added, but already exists", name)
        } else {
            format!("conflict: `{}' created independently by second party", name)
        };
        return Classification::new(Conflict).notice(msg);
    }

    if let Some(removed_rev) = vn_user.strip_prefix('-') {
        // Scheduled for removal
        if vers.ts_user.is_some() {
            return Classification::new(Removed).notice(format!("`{}' should be removed and is still there", name));
        }
        if !rcs_live {
            return Classification::new(RemoveEntry);
        }
        if vers.vn_rcs.as_deref() == Some(removed_rev) {
            return Classification::new(Removed);
        }
        if opts.pipeout {
            return Classification::new(NeedsMerge);
        }
        return Classification::new(Conflict).notice(format!("conflict: removed `{}' was modified by second party", name));
    }

    // A normal entry
    if !rcs_live {
        if vers.ts_user.is_none() {
            return Classification::new(RemoveEntry).notice(format!("warning: `{}' is not (any longer) pertinent", name));
        }
        if unmodified {
            return Classification::new(RemoveEntry).notice(format!("`{}' is no longer in the repository", name));
        }
        if differs() {
            return Classification::new(Conflict)
                .notice(format!("conflict: `{}' is modified but no longer in the repository", name));
        }
        return Classification::new(RemoveEntry).notice(format!("warning: `{}' is not (any longer) pertinent", name));
    }

    if vers.vn_rcs.as_deref() == Some(vn_user) {
        // Working file is based on the selected revision
        if vers.ts_user.is_none() {
            return lost(Classification::new(Checkout));
        }
        if unmodified {
            if vers.entry_options.is_some() && options_changed {
                return Classification::new(Checkout);
            }
            let mut c = Classification::new(UpToDate);
            c.reregister = sticky_changed(vers, opts.aflag);
            return c;
        }
        if vers.ts_conflict.is_some() && vers.ts_conflict == vers.ts_user {
            return Classification::new(Conflict)
                .notice(format!("file `{}' had a conflict and has not been modified", name));
        }
        if differs() {
            let mut c = Classification::new(Modified);
            c.reregister = sticky_changed(vers, opts.aflag);
            return c;
        }
        if options_changed {
            return Classification::new(Checkout);
        }
        let mut c = Classification::new(UpToDate);
        c.refresh_timestamp = true;
        return c;
    }

    // The repository has moved on
    let fetch = if options_changed || vers.in_attic { Checkout } else { Patch };
    if vers.ts_user.is_none() {
        return lost(Classification::new(Checkout));
    }
    if unmodified {
        return Classification::new(fetch);
    }
    if differs() {
        return Classification::new(NeedsMerge);
    }
    Classification::new(fetch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const TS: &str = "Sat Mar  1 10:00:00 2003";
    const TS_NEW: &str = "Sun Mar  2 11:00:00 2003";

    fn vers(vn_user: Option<&str>, vn_rcs: Option<&str>, ts_user: Option<&str>) -> Versions {
        Versions {
            vn_user: vn_user.map(String::from),
            vn_rcs: vn_rcs.map(String::from),
            ts_user: ts_user.map(String::from),
            ts_rcs: vn_user.map(|_| TS.to_string()),
            ..Versions::default()
        }
    }

    fn run(v: &Versions, opts: ClassifyOptions, differs: bool) -> (Classification, usize) {
        let calls = Cell::new(0);
        let c = classify("foo.c", v, &opts, || {
            calls.set(calls.get() + 1);
            differs
        });
        (c, calls.get())
    }

    fn ctype(v: &Versions, differs: bool) -> Ctype {
        run(v, ClassifyOptions::default(), differs).0.ctype
    }

    #[test]
    fn test_no_entry() {
        let (c, _) = run(&vers(None, None, None), ClassifyOptions::default(), false);
        assert_eq!(c.ctype, Ctype::Unknown);
        assert_eq!(c.notice.as_deref(), Some("nothing known about `foo.c'"));

        let (c, _) = run(&vers(None, None, Some(TS)), ClassifyOptions::default(), false);
        assert_eq!(c.ctype, Ctype::Unknown);
        assert!(c.notice.unwrap().contains("cvs add"));

        // Quiet when a forced tag explains the absence
        let mut v = vers(None, None, None);
        v.tag = Some("rel-1".into());
        let opts = ClassifyOptions {
            force_tag_match: true,
            ..Default::default()
        };
        assert_eq!(run(&v, opts, false).0.notice, None);

        assert_eq!(ctype(&vers(None, Some("1.3"), None), false), Ctype::Checkout);
        assert_eq!(ctype(&vers(None, Some("1.3"), Some(TS)), true), Ctype::Conflict);

        let (c, _) = run(&vers(None, Some("1.3"), Some(TS)), ClassifyOptions::default(), false);
        assert_eq!(c.ctype, Ctype::Checkout);
        assert!(c.refresh_timestamp);

        let pipe = ClassifyOptions {
            pipeout: true,
            ..Default::default()
        };
        let (c, calls) = run(&vers(None, Some("1.3"), Some(TS)), pipe, true);
        assert_eq!((c.ctype, calls), (Ctype::Checkout, 0));
    }

    #[test]
    fn test_no_entry_dead_revision() {
        let mut v = vers(None, Some("1.3"), None);
        v.rcs_dead = true;
        assert_eq!(ctype(&v, false), Ctype::UpToDate);
        v.ts_user = Some(TS.into());
        assert_eq!(ctype(&v, false), Ctype::Unknown);
    }

    #[test]
    fn test_added() {
        assert_eq!(ctype(&vers(Some("0"), None, Some(TS)), false), Ctype::Added);
        let (c, _) = run(&vers(Some("0"), None, None), ClassifyOptions::default(), false);
        assert_eq!(c.ctype, Ctype::RemoveEntry);
        assert!(c.notice.unwrap().contains("new-born"));

        // Someone else added it first
        let (c, _) = run(&vers(Some("0"), Some("1.1"), Some(TS)), ClassifyOptions::default(), false);
        assert_eq!(c.ctype, Ctype::Conflict);
        assert!(c.notice.unwrap().contains("created independently"));

        let mut v = vers(Some("0"), Some("1.1"), Some(TS));
        v.in_attic = true;
        let (c, _) = run(&v, ClassifyOptions::default(), false);
        assert!(c.notice.unwrap().contains("already exists"));

        // Dead in the repository: adding again is fine
        v.rcs_dead = true;
        assert_eq!(ctype(&v, false), Ctype::Added);
    }

    #[test]
    fn test_removed() {
        assert_eq!(ctype(&vers(Some("-1.2"), Some("1.2"), None), false), Ctype::Removed);
        assert_eq!(ctype(&vers(Some("-1.2"), None, None), false), Ctype::RemoveEntry);
        assert_eq!(ctype(&vers(Some("-1.2"), Some("1.3"), None), false), Ctype::Conflict);
        let pipe = ClassifyOptions {
            pipeout: true,
            ..Default::default()
        };
        assert_eq!(run(&vers(Some("-1.2"), Some("1.3"), None), pipe, false).0.ctype, Ctype::NeedsMerge);

        let (c, _) = run(&vers(Some("-1.2"), Some("1.2"), Some(TS)), ClassifyOptions::default(), false);
        assert_eq!(c.ctype, Ctype::Removed);
        assert!(c.notice.unwrap().contains("still there"));
    }

    #[test]
    fn test_gone_from_repository() {
        assert_eq!(ctype(&vers(Some("1.2"), None, None), false), Ctype::RemoveEntry);
        assert_eq!(ctype(&vers(Some("1.2"), None, Some(TS)), true), Ctype::RemoveEntry);
        assert_eq!(ctype(&vers(Some("1.2"), None, Some(TS_NEW)), true), Ctype::Conflict);
        assert_eq!(ctype(&vers(Some("1.2"), None, Some(TS_NEW)), false), Ctype::RemoveEntry);

        let mut v = vers(Some("1.2"), Some("1.3"), Some(TS_NEW));
        v.rcs_dead = true;
        assert_eq!(ctype(&v, true), Ctype::Conflict);
    }

    #[test]
    fn test_same_revision() {
        let (c, calls) = run(&vers(Some("1.2"), Some("1.2"), Some(TS)), ClassifyOptions::default(), true);
        assert_eq!((c.ctype, calls), (Ctype::UpToDate, 0));
        assert!(!c.reregister);

        assert_eq!(ctype(&vers(Some("1.2"), Some("1.2"), Some(TS_NEW)), true), Ctype::Modified);

        let (c, _) = run(&vers(Some("1.2"), Some("1.2"), Some(TS_NEW)), ClassifyOptions::default(), false);
        assert_eq!(c.ctype, Ctype::UpToDate);
        assert!(c.refresh_timestamp);

        let update = ClassifyOptions {
            report_lost: true,
            ..Default::default()
        };
        let (c, _) = run(&vers(Some("1.2"), Some("1.2"), None), update, false);
        assert_eq!(c.ctype, Ctype::Checkout);
        assert_eq!(c.notice.as_deref(), Some("warning: `foo.c' was lost"));
        let (c, _) = run(&vers(Some("1.2"), Some("1.2"), None), ClassifyOptions::default(), false);
        assert_eq!(c.notice, None);
    }

    #[test]
    fn test_same_revision_options_change() {
        let mut v = vers(Some("1.2"), Some("1.2"), Some(TS));
        v.entry_options = Some("-kb".into());
        v.options = "-kkv".into();
        assert_eq!(ctype(&v, false), Ctype::Checkout);

        // Touched but identical, different -k: fetch again
        v.ts_user = Some(TS_NEW.into());
        assert_eq!(ctype(&v, false), Ctype::Checkout);
        assert_eq!(ctype(&v, true), Ctype::Modified);
    }

    #[test]
    fn test_sticky_change_reregisters() {
        let mut v = vers(Some("1.2"), Some("1.2"), Some(TS));
        v.tag = Some("rel-1".into());
        let (c, _) = run(&v, ClassifyOptions::default(), false);
        assert_eq!(c.ctype, Ctype::UpToDate);
        assert!(c.reregister);

        v.entry_tag = Some("rel-1".into());
        assert!(!run(&v, ClassifyOptions::default(), false).0.reregister);

        // -A clears a sticky tag the entry still carries
        let mut v = vers(Some("1.2"), Some("1.2"), Some(TS));
        v.entry_tag = Some("rel-1".into());
        assert!(!run(&v, ClassifyOptions::default(), false).0.reregister);
        let reset = ClassifyOptions {
            aflag: true,
            ..Default::default()
        };
        assert!(run(&v, reset, false).0.reregister);
    }

    #[test]
    fn test_untouched_conflict() {
        let mut v = vers(Some("1.2"), Some("1.2"), Some(TS_NEW));
        v.ts_rcs = Some("Result of merge".into());
        v.ts_conflict = Some(TS_NEW.into());
        let (c, calls) = run(&v, ClassifyOptions::default(), true);
        assert_eq!((c.ctype, calls), (Ctype::Conflict, 0));

        // Edited since the merge
        v.ts_user = Some("Mon Mar  3 12:00:00 2003".into());
        assert_eq!(ctype(&v, true), Ctype::Modified);
    }

    #[test]
    fn test_newer_revision() {
        assert_eq!(ctype(&vers(Some("1.2"), Some("1.3"), Some(TS)), true), Ctype::Patch);
        assert_eq!(ctype(&vers(Some("1.2"), Some("1.3"), Some(TS_NEW)), true), Ctype::NeedsMerge);
        assert_eq!(ctype(&vers(Some("1.2"), Some("1.3"), Some(TS_NEW)), false), Ctype::Patch);
        assert_eq!(ctype(&vers(Some("1.2"), Some("1.3"), None), false), Ctype::Checkout);

        let mut v = vers(Some("1.2"), Some("1.3"), Some(TS));
        v.in_attic = true;
        assert_eq!(ctype(&v, false), Ctype::Checkout);
        let mut v = vers(Some("1.2"), Some("1.3"), Some(TS_NEW));
        v.options = "-kb".into();
        assert_eq!(ctype(&v, false), Ctype::Checkout);
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(Ctype::UpToDate.to_string(), "Up-to-date");
        assert_eq!(Ctype::NeedsMerge.status_label(), "Needs Merge");
        assert_eq!(serde_json::to_string(&Ctype::RemoveEntry).unwrap(), "\"remove-entry\"");
    }
}
