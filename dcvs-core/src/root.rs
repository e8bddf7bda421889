//! CVSROOT parsing and selection
//!
//! A root names the repository a working copy belongs to:
//!
//! ```text
//! /usr/local/cvsroot                              local
//! :local:/usr/local/cvsroot                       local, explicit
//! :pserver:anonymous:secret@cvs.example.org:2401/cvsroot
//! :ext;CVS_RSH=ssh:alice@cvs.example.org:/cvsroot
//! alice@cvs.example.org:/cvsroot                  ext, implied by the colon
//! ```

use crate::admin::{self, CVSADM_ROOT};
use crate::error::{AdminError, Result};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// Default port of the password server.
pub const CVS_AUTH_PORT: u16 = 2401;

/// Access method of a root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Local,
    Fork,
    Ext,
    Server,
    Pserver,
    Gserver,
    Kserver,
}

impl Method {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "local" => Some(Method::Local),
            "fork" => Some(Method::Fork),
            "ext" => Some(Method::Ext),
            "server" => Some(Method::Server),
            "pserver" => Some(Method::Pserver),
            "gserver" => Some(Method::Gserver),
            "kserver" => Some(Method::Kserver),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Local => "local",
            Method::Fork => "fork",
            Method::Ext => "ext",
            Method::Server => "server",
            Method::Pserver => "pserver",
            Method::Gserver => "gserver",
            Method::Kserver => "kserver",
        }
    }

    /// Whether the repository is reached through a server connection.
    pub fn is_remote(&self) -> bool {
        !matches!(self, Method::Local | Method::Fork)
    }

    fn accepts_port(&self) -> bool {
        matches!(self, Method::Pserver | Method::Gserver | Method::Kserver)
    }
}

/// A parsed CVSROOT
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CvsRoot {
    /// The string as given
    pub original: String,
    pub method: Method,
    pub username: Option<String>,
    #[serde(skip)]
    pub password: Option<String>,
    pub hostname: Option<String>,
    pub port: Option<u16>,
    /// Absolute repository directory, without trailing slashes
    pub directory: String,
    pub cvs_rsh: Option<String>,
    pub cvs_server: Option<String>,
    pub proxy: Option<String>,
    pub proxy_port: Option<u16>,
}

impl CvsRoot {
    /// Parse a root string.
    pub fn parse(input: &str) -> Result<Self> {
        let bad = |reason: &str| AdminError::BadRoot {
            root: input.to_string(),
            reason: reason.to_string(),
        };

        let mut root = CvsRoot {
            original: input.to_string(),
            method: Method::Local,
            username: None,
            password: None,
            hostname: None,
            port: None,
            directory: String::new(),
            cvs_rsh: None,
            cvs_server: None,
            proxy: None,
            proxy_port: None,
        };

        let rest = if let Some(spec) = input.strip_prefix(':') {
            let (method_spec, rest) = spec
                .split_once(':')
                .ok_or_else(|| bad("missing ':' after method"))?;
            let mut parts = method_spec.split(';');
            let name = parts.next().unwrap_or_default();
            if name.is_empty() {
                return Err(bad("no access method specified"));
            }
            root.method = Method::from_name(name)
                .ok_or_else(|| bad(&format!("unknown access method '{}'", name)))?;
            for opt in parts {
                let (key, value) = opt
                    .split_once('=')
                    .ok_or_else(|| bad(&format!("option '{}' has no value", opt)))?;
                match key.to_ascii_lowercase().as_str() {
                    "cvs_rsh" => root.cvs_rsh = Some(value.to_string()),
                    "cvs_server" => root.cvs_server = Some(value.to_string()),
                    "proxy" => root.proxy = Some(value.to_string()),
                    "proxyport" => {
                        root.proxy_port = Some(
                            value
                                .parse()
                                .map_err(|_| bad(&format!("bad proxy port '{}'", value)))?,
                        )
                    }
                    _ => return Err(bad(&format!("unknown method option '{}'", key))),
                }
            }
            rest
        } else {
            let before_path = input.split('/').next().unwrap_or_default();
            if before_path.contains(':') {
                root.method = Method::Ext;
            }
            input
        };

        if !root.method.is_remote() {
            if !rest.starts_with('/') {
                return Err(bad("CVSROOT must be an absolute pathname"));
            }
            root.directory = strip_trailing_slashes(rest).to_string();
            return Ok(root);
        }

        if root.cvs_rsh.is_some() && !matches!(root.method, Method::Ext) {
            return Err(bad("CVS_RSH option is only valid for the ext method"));
        }

        // Everything up to the first '/' is [user[:password]@]host[:[port]]
        let slash = rest.find('/').ok_or_else(|| bad("CVSROOT requires a path spec"))?;
        let (authority, path) = rest.split_at(slash);
        let host_port = match authority.rsplit_once('@') {
            Some((userinfo, host_port)) => {
                let (user, password) = match userinfo.split_once(':') {
                    Some((u, p)) => (u, Some(p)),
                    None => (userinfo, None),
                };
                if !user.is_empty() {
                    root.username = Some(user.to_string());
                }
                if let Some(p) = password {
                    if root.method != Method::Pserver {
                        return Err(bad("password is only allowed with the pserver method"));
                    }
                    root.password = Some(p.to_string());
                }
                host_port
            }
            None => authority,
        };

        let (host, port) = match host_port.split_once(':') {
            Some((h, p)) => (h, p),
            None => (host_port, ""),
        };
        if host.is_empty() {
            return Err(bad("missing hostname"));
        }
        root.hostname = Some(host.to_string());
        if !port.is_empty() {
            if !root.method.accepts_port() {
                return Err(bad(&format!(
                    "port specification is not valid for the {} method",
                    root.method.as_str()
                )));
            }
            root.port = Some(
                port.parse()
                    .map_err(|_| bad("perhaps you entered a relative pathname?"))?,
            );
        }

        root.directory = strip_trailing_slashes(path).to_string();
        Ok(root)
    }

    pub fn is_remote(&self) -> bool {
        self.method.is_remote()
    }

    /// Port to connect to, applying the method default.
    pub fn port_or_default(&self) -> Option<u16> {
        match (self.port, self.method) {
            (Some(p), _) => Some(p),
            (None, Method::Pserver) => Some(CVS_AUTH_PORT),
            _ => None,
        }
    }
}

/// Canonical form, password omitted
impl fmt::Display for CvsRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_remote() {
            if self.method == Method::Fork {
                write!(f, ":fork:")?;
            }
            return write!(f, "{}", self.directory);
        }
        write!(f, ":{}:", self.method.as_str())?;
        if let Some(user) = &self.username {
            write!(f, "{}@", user)?;
        }
        if let Some(host) = &self.hostname {
            write!(f, "{}", host)?;
        }
        match self.port {
            Some(port) => write!(f, ":{}", port)?,
            None => write!(f, ":")?,
        }
        write!(f, "{}", self.directory)
    }
}

/// Remove trailing slashes, keeping a lone "/".
pub(crate) fn strip_trailing_slashes(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// Read the root recorded in `dir/CVS/Root`.
///
/// Returns `None` when the file is absent, does not hold a valid root, or
/// names a local repository that does not exist.
pub fn name_root(dir: &Path) -> Result<Option<CvsRoot>> {
    let path = admin::adm_file(dir, CVSADM_ROOT);
    let data = match fs::read_to_string(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AdminError::io_at(path, e)),
    };
    let line = data.lines().next().unwrap_or_default().trim();
    if line.is_empty() {
        tracing::warn!("ignoring {:?} because it is empty", path);
        return Ok(None);
    }
    let root = match CvsRoot::parse(line) {
        Ok(root) => root,
        Err(e) => {
            tracing::warn!("ignoring {:?} because it does not contain a valid root: {}", path, e);
            return Ok(None);
        }
    };
    if !root.is_remote() && !Path::new(&root.directory).is_dir() {
        tracing::warn!(
            "ignoring {:?} because it specifies a non-existent repository {}",
            path,
            root.directory
        );
        return Ok(None);
    }
    Ok(Some(root))
}

/// Choose the root for a command: the command line wins, then `CVS/Root` in
/// `dir`, then the `CVSROOT` environment value.
pub fn resolve_root(cmdline: Option<&str>, dir: &Path, env: Option<&str>) -> Result<CvsRoot> {
    if let Some(s) = cmdline {
        return CvsRoot::parse(s);
    }
    if let Some(root) = name_root(dir)? {
        return Ok(root);
    }
    match env {
        Some(s) if !s.is_empty() => CvsRoot::parse(s),
        _ => Err(AdminError::NoRoot),
    }
}

/// Repositories a server is willing to serve (`--allow-root`)
#[derive(Debug, Clone, Default)]
pub struct RootAllowList {
    roots: Vec<String>,
}

impl RootAllowList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, dir: &str) {
        let dir = strip_trailing_slashes(dir).to_string();
        if !self.roots.contains(&dir) {
            self.roots.push(dir);
        }
    }

    pub fn is_allowed(&self, dir: &str) -> bool {
        let dir = strip_trailing_slashes(dir);
        self.roots.iter().any(|r| r == dir)
    }

    /// Fail unless `dir` was allowed.
    pub fn check(&self, dir: &str) -> Result<()> {
        if self.is_allowed(dir) {
            Ok(())
        } else {
            Err(AdminError::RootNotAllowed(dir.to_string()))
        }
    }
}
