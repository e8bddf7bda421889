//! RCS file metadata
//!
//! Only the admin header and the delta tree are read: `head`, `branch`,
//! `symbols`, `expand` and, per delta, `date`, `state`, `branches` and
//! `next`. Parsing stops at `desc`, so log messages and delta text are never
//! touched.
//!
//! Revisions are resolved from a tag, a date or both, the way checkout and
//! update select what to compare a working file against.

use crate::admin::{CVSATTIC, RCSEXT};
use crate::error::{AdminError, Result};
use crate::hash::List;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

pub const RCS_DEAD: &str = "dead";
pub const TAG_HEAD: &str = "HEAD";
pub const TAG_BASE: &str = "BASE";

// ── Revision numbers ──

/// Number of dots in a revision or branch number.
pub fn numdots(rev: &str) -> usize {
    rev.bytes().filter(|&b| b == b'.').count()
}

/// `1.2.2` is a branch, `1.2` and `1.2.2.1` are revisions.
pub fn is_branch_number(rev: &str) -> bool {
    numdots(rev) % 2 == 0
}

fn is_numeric(tag: &str) -> bool {
    tag.starts_with(|c: char| c.is_ascii_digit()) && tag.bytes().all(|b| b.is_ascii_digit() || b == b'.')
}

/// Branch number for a magic branch tag (`1.2.0.4` is branch `1.2.4`).
pub fn magic_branch(rev: &str) -> Option<String> {
    let parts: Vec<&str> = rev.split('.').collect();
    if parts.len() < 4 || parts.len() % 2 != 0 || parts[parts.len() - 2] != "0" {
        return None;
    }
    let mut branch: Vec<&str> = parts[..parts.len() - 2].to_vec();
    branch.push(parts[parts.len() - 1]);
    Some(branch.join("."))
}

/// Revision a branch sprouts from (`1.2.2` sprouts from `1.2`).
pub fn branch_point(branch: &str) -> Option<&str> {
    branch.rfind('.').map(|i| &branch[..i])
}

/// Parse an RCS date (`2003.01.02.03.04.05`, two-digit years are 19xx).
pub fn parse_rcs_date(s: &str) -> Option<DateTime<Utc>> {
    let parts: Vec<u32> = s.split('.').map(|p| p.parse().ok()).collect::<Option<_>>()?;
    let [year, month, day, hour, min, sec] = parts[..] else {
        return None;
    };
    let year = if year < 100 { year + 1900 } else { year };
    let naive = NaiveDate::from_ymd_opt(year as i32, month, day)?.and_hms_opt(hour, min, sec)?;
    Some(Utc.from_utc_datetime(&naive))
}

pub fn format_rcs_date(date: &DateTime<Utc>) -> String {
    date.format("%Y.%m.%d.%H.%M.%S").to_string()
}

// ── Model ──

/// One node of the delta tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    pub revision: String,
    pub date: DateTime<Utc>,
    pub author: String,
    pub state: Option<String>,
    /// First revision of each branch sprouting here
    pub branches: Vec<String>,
    pub next: Option<String>,
}

impl Delta {
    pub fn is_dead(&self) -> bool {
        self.state.as_deref() == Some(RCS_DEAD)
    }
}

/// Metadata of one `,v` file
#[derive(Debug, Clone)]
pub struct RcsFile {
    pub path: PathBuf,
    pub head: Option<String>,
    /// Default branch, set while a vendor branch is current
    pub branch: Option<String>,
    pub symbols: List<String>,
    pub expand: Option<String>,
    pub deltas: List<Delta>,
    pub in_attic: bool,
}

impl RcsFile {
    /// Parse the admin header and delta tree of an RCS file.
    pub fn parse(data: &[u8], path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut parser = Parser {
            tokens: Tokenizer { data, pos: 0 },
            path: &path,
            peeked: None,
        };
        let mut rcs = RcsFile {
            path: path.clone(),
            head: None,
            branch: None,
            symbols: List::new(),
            expand: None,
            deltas: List::new(),
            in_attic: false,
        };
        parser.admin(&mut rcs)?;
        parser.deltas(&mut rcs)?;
        Ok(rcs)
    }

    pub fn delta(&self, rev: &str) -> Option<&Delta> {
        self.deltas.find(rev)
    }

    pub fn is_dead(&self, rev: &str) -> bool {
        self.delta(rev).is_some_and(Delta::is_dead)
    }

    /// Revision the symbolic `tag` points at, unresolved.
    pub fn symbol(&self, tag: &str) -> Option<&str> {
        self.symbols.find(tag).map(String::as_str)
    }

    /// Whether `tag` names a branch, symbolically or numerically.
    pub fn tag_is_branch(&self, tag: &str) -> bool {
        let rev = if is_numeric(tag) { Some(tag) } else { self.symbol(tag) };
        rev.is_some_and(|r| magic_branch(r).is_some() || is_branch_number(r))
    }

    /// Current revision: the tip of the default branch, or the head.
    pub fn head_revision(&self) -> Option<String> {
        match &self.branch {
            Some(branch) => self.branch_tip(branch).or_else(|| self.head.clone()),
            None => self.head.clone(),
        }
    }

    /// Latest revision on `branch`, or its branch point when nothing was
    /// committed there yet.
    pub fn branch_tip(&self, branch: &str) -> Option<String> {
        if numdots(branch) == 0 {
            return self.trunk_revisions().into_iter().find(|r| r.starts_with(&format!("{}.", branch)));
        }
        let point = branch_point(branch)?;
        let base = self.delta(point)?;
        let prefix = format!("{}.", branch);
        let Some(first) = base.branches.iter().find(|b| b.starts_with(&prefix)) else {
            return Some(point.to_string());
        };
        let mut tip = first.clone();
        while let Some(next) = self.delta(&tip).and_then(|d| d.next.clone()) {
            tip = next;
        }
        Some(tip)
    }

    /// Trunk revisions newest first.
    fn trunk_revisions(&self) -> Vec<String> {
        let mut revs = Vec::new();
        let mut cur = self.head.clone();
        while let Some(rev) = cur {
            cur = self.delta(&rev).and_then(|d| d.next.clone());
            revs.push(rev);
        }
        revs
    }

    /// Revisions of `branch` oldest first.
    fn branch_revisions(&self, branch: &str) -> Vec<String> {
        let mut revs = Vec::new();
        let Some(base) = branch_point(branch).and_then(|p| self.delta(p)) else {
            return revs;
        };
        let prefix = format!("{}.", branch);
        let mut cur = base.branches.iter().find(|b| b.starts_with(&prefix)).cloned();
        while let Some(rev) = cur {
            cur = self.delta(&rev).and_then(|d| d.next.clone());
            revs.push(rev);
        }
        revs
    }

    /// Branch number a tag selects, if it selects a branch at all.
    fn tag_branch(&self, tag: &str) -> Option<String> {
        let rev = if is_numeric(tag) { tag } else { self.symbol(tag)? };
        match magic_branch(rev) {
            Some(branch) => Some(branch),
            None if is_branch_number(rev) => Some(rev.to_string()),
            None => None,
        }
    }

    /// Revision selected by a tag. With `force_tag_match`, a tag the file
    /// does not carry selects nothing; otherwise it falls back to the head.
    pub fn revision_for_tag(&self, tag: &str, force_tag_match: bool) -> Option<String> {
        if tag == TAG_HEAD {
            return self.head_revision();
        }
        let fallback = || if force_tag_match { None } else { self.head_revision() };
        if let Some(branch) = self.tag_branch(tag) {
            return self.branch_tip(&branch).or_else(fallback);
        }
        let rev = if is_numeric(tag) { Some(tag) } else { self.symbol(tag) };
        match rev {
            Some(rev) if self.delta(rev).is_some() => Some(rev.to_string()),
            _ => fallback(),
        }
    }

    /// Latest trunk revision committed no later than `date`.
    pub fn revision_for_date(&self, date: &DateTime<Utc>, force_tag_match: bool) -> Option<String> {
        let found = self
            .trunk_revisions()
            .into_iter()
            .find(|rev| self.delta(rev).is_some_and(|d| d.date <= *date));
        match found {
            Some(rev) => Some(rev),
            None if force_tag_match => None,
            None => self.head_revision(),
        }
    }

    /// Latest revision on the branch `tag` committed no later than `date`,
    /// falling back to the branch point.
    fn revision_for_branch_date(&self, tag: &str, date: &DateTime<Utc>) -> Option<String> {
        let branch = self.tag_branch(tag)?;
        let on_branch = self
            .branch_revisions(&branch)
            .into_iter()
            .filter(|rev| self.delta(rev).is_some_and(|d| d.date <= *date))
            .last();
        on_branch.or_else(|| {
            let point = branch_point(&branch)?;
            self.delta(point).filter(|d| d.date <= *date).map(|d| d.revision.clone())
        })
    }

    /// Revision to compare a working file against.
    pub fn resolve(&self, tag: Option<&str>, date: Option<&DateTime<Utc>>, force_tag_match: bool) -> Option<String> {
        match (tag, date) {
            (Some(tag), Some(date)) if tag != TAG_HEAD => {
                // A date only narrows branch tags
                if self.tag_is_branch(tag) {
                    self.revision_for_branch_date(tag, date)
                } else {
                    None
                }
            }
            (Some(tag), None) => self.revision_for_tag(tag, force_tag_match),
            (_, Some(date)) => self.revision_for_date(date, force_tag_match),
            (None, None) => self.head_revision(),
        }
    }
}

// ── Parser ──

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Str(Vec<u8>),
    Semi,
    Colon,
}

struct Tokenizer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Tokenizer<'_> {
    fn next(&mut self) -> Option<Token> {
        while self.pos < self.data.len() && self.data[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        let c = *self.data.get(self.pos)?;
        self.pos += 1;
        match c {
            b';' => Some(Token::Semi),
            b':' => Some(Token::Colon),
            b'@' => {
                let mut s = Vec::new();
                while let Some(&b) = self.data.get(self.pos) {
                    self.pos += 1;
                    if b == b'@' {
                        if self.data.get(self.pos) == Some(&b'@') {
                            self.pos += 1;
                        } else {
                            return Some(Token::Str(s));
                        }
                    }
                    s.push(b);
                }
                Some(Token::Str(s))
            }
            _ => {
                let start = self.pos - 1;
                while let Some(&b) = self.data.get(self.pos) {
                    if b.is_ascii_whitespace() || matches!(b, b';' | b':' | b'@') {
                        break;
                    }
                    self.pos += 1;
                }
                Some(Token::Word(String::from_utf8_lossy(&self.data[start..self.pos]).into_owned()))
            }
        }
    }
}

struct Parser<'a> {
    tokens: Tokenizer<'a>,
    path: &'a Path,
    peeked: Option<Token>,
}

impl Parser<'_> {
    fn bad(&self, reason: impl Into<String>) -> AdminError {
        AdminError::BadRcs {
            path: self.path.to_path_buf(),
            reason: reason.into(),
        }
    }

    fn next(&mut self) -> Option<Token> {
        self.peeked.take().or_else(|| self.tokens.next())
    }

    fn peek(&mut self) -> Option<&Token> {
        if self.peeked.is_none() {
            self.peeked = self.tokens.next();
        }
        self.peeked.as_ref()
    }

    /// Values up to the terminating `;`.
    fn phrase(&mut self, keyword: &str) -> Result<Vec<Token>> {
        let mut values = Vec::new();
        loop {
            match self.next() {
                Some(Token::Semi) => return Ok(values),
                Some(tok) => values.push(tok),
                None => return Err(self.bad(format!("unterminated '{}'", keyword))),
            }
        }
    }

    /// Optional single word value of a phrase.
    fn word(&mut self, keyword: &str) -> Result<Option<String>> {
        let values = self.phrase(keyword)?;
        match values.into_iter().next() {
            None => Ok(None),
            Some(Token::Word(w)) => Ok(Some(w)),
            Some(Token::Str(s)) => Ok(Some(String::from_utf8_lossy(&s).into_owned())),
            Some(_) => Err(self.bad(format!("bad value for '{}'", keyword))),
        }
    }

    fn admin(&mut self, rcs: &mut RcsFile) -> Result<()> {
        match self.next() {
            Some(Token::Word(w)) if w == "head" => rcs.head = self.word("head")?,
            _ => return Err(self.bad("missing 'head'")),
        }
        loop {
            let keyword = match self.peek() {
                Some(Token::Word(w)) if is_numeric(w) || w == "desc" => return Ok(()),
                Some(Token::Word(w)) => w.clone(),
                Some(_) => return Err(self.bad("unexpected token in admin section")),
                None => return Ok(()),
            };
            self.next();
            match keyword.as_str() {
                "branch" => rcs.branch = self.word("branch")?,
                "expand" => rcs.expand = self.word("expand")?,
                "symbols" => {
                    let values = self.phrase("symbols")?;
                    for pair in values.split(|t| *t == Token::Colon).collect::<Vec<_>>().windows(2) {
                        // Each window is [.., name] [rev, .., next name]
                        let (Some(Token::Word(name)), Some(Token::Word(rev))) = (pair[0].last(), pair[1].first())
                        else {
                            return Err(self.bad("malformed symbols"));
                        };
                        if rcs.symbols.add(name.clone(), rev.clone()).is_err() {
                            tracing::warn!("{:?}: duplicate symbol {}", self.path, name);
                        }
                    }
                }
                // access, locks, strict, comment and newphrases
                other => {
                    self.phrase(other)?;
                }
            }
        }
    }

    fn deltas(&mut self, rcs: &mut RcsFile) -> Result<()> {
        loop {
            let revision = match self.next() {
                Some(Token::Word(w)) if w == "desc" => return Ok(()),
                Some(Token::Word(w)) if is_numeric(&w) => w,
                None => return Ok(()),
                Some(tok) => return Err(self.bad(format!("unexpected {:?} in delta tree", tok))),
            };
            let mut date = None;
            let mut author = String::new();
            let mut state = None;
            let mut branches = Vec::new();
            let mut next = None;
            loop {
                let keyword = match self.peek() {
                    Some(Token::Word(w)) if is_numeric(w) || w == "desc" => break,
                    Some(Token::Word(w)) => w.clone(),
                    None => break,
                    Some(_) => return Err(self.bad(format!("unexpected token in delta {}", revision))),
                };
                self.next();
                match keyword.as_str() {
                    "date" => {
                        let raw = self.word("date")?.unwrap_or_default();
                        date = Some(
                            parse_rcs_date(&raw)
                                .ok_or_else(|| self.bad(format!("bad date '{}' in delta {}", raw, revision)))?,
                        );
                    }
                    "author" => author = self.word("author")?.unwrap_or_default(),
                    "state" => state = self.word("state")?,
                    "next" => next = self.word("next")?,
                    "branches" => {
                        for tok in self.phrase("branches")? {
                            if let Token::Word(b) = tok {
                                branches.push(b);
                            }
                        }
                    }
                    other => {
                        self.phrase(other)?;
                    }
                }
            }
            let date = date.ok_or_else(|| self.bad(format!("delta {} has no date", revision)))?;
            let delta = Delta {
                revision: revision.clone(),
                date,
                author,
                state,
                branches,
                next,
            };
            if rcs.deltas.add(revision.clone(), delta).is_err() {
                return Err(self.bad(format!("duplicate delta {}", revision)));
            }
        }
    }
}

// ── Sources ──

/// Where RCS metadata comes from
#[async_trait]
pub trait RcsSource: Send + Sync {
    /// Metadata of `file` in the repository directory `repository`, or
    /// `None` when the repository has no such file.
    async fn lookup(&self, repository: &str, file: &str) -> Result<Option<RcsFile>>;

    /// Contents of one revision, when the source can produce them.
    async fn revision_text(&self, _repository: &str, _file: &str, _revision: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// RCS files on the local filesystem
#[derive(Debug, Clone, Default)]
pub struct FsRcs;

impl FsRcs {
    pub fn new() -> Self {
        Self
    }

    async fn read(path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AdminError::io_at(path, e)),
        }
    }
}

#[async_trait]
impl RcsSource for FsRcs {
    async fn lookup(&self, repository: &str, file: &str) -> Result<Option<RcsFile>> {
        let name = format!("{}{}", file, RCSEXT);
        let live = Path::new(repository).join(&name);
        if let Some(data) = Self::read(&live).await? {
            return RcsFile::parse(&data, live).map(Some);
        }
        let attic = Path::new(repository).join(CVSATTIC).join(&name);
        match Self::read(&attic).await? {
            Some(data) => {
                let mut rcs = RcsFile::parse(&data, attic)?;
                rcs.in_attic = true;
                Ok(Some(rcs))
            }
            None => Ok(None),
        }
    }
}

/// In-memory RCS metadata, keyed by repository directory and file name
#[derive(Debug, Default)]
pub struct MemoryRcs {
    files: RwLock<HashMap<(String, String), RcsFile>>,
    texts: RwLock<HashMap<(String, String, String), Vec<u8>>>,
}

impl MemoryRcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, repository: &str, file: &str, rcs: RcsFile) {
        self.files
            .write()
            .await
            .insert((repository.to_string(), file.to_string()), rcs);
    }

    pub async fn insert_text(&self, repository: &str, file: &str, revision: &str, text: impl Into<Vec<u8>>) {
        self.texts.write().await.insert(
            (repository.to_string(), file.to_string(), revision.to_string()),
            text.into(),
        );
    }
}

#[async_trait]
impl RcsSource for MemoryRcs {
    async fn lookup(&self, repository: &str, file: &str) -> Result<Option<RcsFile>> {
        Ok(self
            .files
            .read()
            .await
            .get(&(repository.to_string(), file.to_string()))
            .cloned())
    }

    async fn revision_text(&self, repository: &str, file: &str, revision: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .texts
            .read()
            .await
            .get(&(repository.to_string(), file.to_string(), revision.to_string()))
            .cloned())
    }
}
