// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MAC vendor lookup from nmap's `nmap-mac-prefixes` file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, OnceLock};

use regex::Regex;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use mrtooley_core::{MacAddress, MrTooleyError};

/// File name inside an nmap installation.
pub const PREFIX_FILE_NAME: &str = "nmap-mac-prefixes";

pub const LINUX_PREFIX_FILE: &str = "/usr/share/nmap/nmap-mac-prefixes";
pub const WINDOWS_PREFIX_FILE: &str = r"C:\Program Files (x86)\Nmap\nmap-mac-prefixes";

const STEM_LEN: usize = 6;

// 887E25 Extreme Networks
static PREFIX_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-F0-9]+) (.*)$").unwrap());

/// Vendor names keyed by hex prefix.
///
/// Most prefixes are 6 hex digits. IEEE sub-ranges (MA-M, MA-S) use longer
/// prefixes below a 6-digit stem; the stem then records which prefix length
/// to use for every MAC that starts with it.
#[derive(Debug, Default, Clone)]
pub struct OuiDatabase {
    vendors: HashMap<String, String>,
    stems: HashMap<String, usize>,
}

impl OuiDatabase {
    pub fn parse(text: &str) -> Result<Self, MrTooleyError> {
        let mut db = Self::default();
        for line in text.lines() {
            let Some(caps) = PREFIX_LINE.captures(line) else {
                continue;
            };
            let prefix = &caps[1];
            let vendor = &caps[2];
            if prefix.len() > STEM_LEN {
                let stem = &prefix[..STEM_LEN];
                match db.stems.get(stem) {
                    Some(&len) if len != prefix.len() => {
                        return Err(MrTooleyError::Parse(format!(
                            "inconsistent mac stem: {stem}"
                        )));
                    }
                    Some(_) => {}
                    None => {
                        db.stems.insert(stem.to_string(), prefix.len());
                    }
                }
            }
            db.vendors.insert(prefix.to_string(), vendor.to_string());
        }
        Ok(db)
    }

    pub async fn load(path: &Path) -> Result<Self, MrTooleyError> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            MrTooleyError::Network(format!("cannot read {}: {e}", path.display()))
        })?;
        let db = Self::parse(&text)?;
        info!(path = %path.display(), prefixes = db.len(), "loaded OUI database");
        Ok(db)
    }

    pub fn lookup(&self, mac: &MacAddress) -> Option<&str> {
        let hex = mac.as_human("");
        let stem_len = self.stems.get(&hex[..STEM_LEN]).copied().unwrap_or(STEM_LEN);
        self.vendors
            .get(&hex[..stem_len.min(hex.len())])
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vendors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }
}

/// Path of the prefix file.
///
/// `nmap_dir` may name the nmap directory or the file itself. Without it the
/// platform's default install location is used.
pub fn locate(nmap_dir: Option<&Path>) -> Result<PathBuf, MrTooleyError> {
    if let Some(dir) = nmap_dir {
        return Ok(if dir.is_dir() {
            dir.join(PREFIX_FILE_NAME)
        } else {
            dir.to_path_buf()
        });
    }
    match std::env::consts::OS {
        "linux" => Ok(PathBuf::from(LINUX_PREFIX_FILE)),
        "windows" => Ok(PathBuf::from(WINDOWS_PREFIX_FILE)),
        "macos" => Err(MrTooleyError::Network(
            "no default nmap location on macOS; set NMAP_DIR".into(),
        )),
        other => Err(MrTooleyError::Network(format!(
            "no default nmap location on {other}; set NMAP_DIR"
        ))),
    }
}

/// Lazily loaded OUI database.
#[derive(Debug, Default)]
pub struct OuiLookup {
    nmap_dir: Option<PathBuf>,
    db: OnceCell<Arc<OuiDatabase>>,
}

static GLOBAL: OnceLock<OuiLookup> = OnceLock::new();

impl OuiLookup {
    pub fn new(nmap_dir: Option<PathBuf>) -> Self {
        Self {
            nmap_dir,
            db: OnceCell::new(),
        }
    }

    /// Lookup over an already parsed database.
    pub fn with_database(db: OuiDatabase) -> Self {
        Self {
            nmap_dir: None,
            db: OnceCell::new_with(Some(Arc::new(db))),
        }
    }

    /// Process-wide instance. The first caller's `nmap_dir` wins.
    pub fn global(nmap_dir: Option<PathBuf>) -> &'static OuiLookup {
        GLOBAL.get_or_init(|| OuiLookup::new(nmap_dir))
    }

    pub async fn database(&self) -> Result<Arc<OuiDatabase>, MrTooleyError> {
        self.db
            .get_or_try_init(|| async {
                let path = locate(self.nmap_dir.as_deref())?;
                debug!(path = %path.display(), "loading OUI database");
                Ok::<_, MrTooleyError>(Arc::new(OuiDatabase::load(&path).await?))
            })
            .await
            .cloned()
    }

    pub async fn lookup(&self, mac: &MacAddress) -> Result<Option<String>, MrTooleyError> {
        Ok(self.database().await?.lookup(mac).map(str::to_string))
    }
}
