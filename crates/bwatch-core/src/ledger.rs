//! Persisted record of already-processed bulletin hashes.
//!
//! The hash is derived from the bulletin identifier alone, never its
//! content: re-fetching the same identifier dedups even when the text
//! changed. Hashes are append-only; the backing file is rewritten
//! wholesale once per cycle that processed at least one item.

use std::{
    collections::HashSet,
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::{Error, Result};

/// Deduplication hash for one bulletin identifier.
pub fn id_hash(id: &str) -> String {
    let mut h = Sha256::new();
    h.update(id.as_bytes());
    let digest = h.finalize();

    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    sent: Vec<String>,
}

/// Append-only set of processed bulletin hashes.
#[derive(Debug)]
pub struct SeenLedger {
    path: PathBuf,
    hashes: Vec<String>,
    index: HashSet<String>,
}

impl SeenLedger {
    /// Load from `path`. An absent or unparsable backing file yields an
    /// empty ledger: after state loss the first-run seeding path takes
    /// over and re-notifies at most one bulletin.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<LedgerFile>(&raw) {
                Ok(file) => file,
                Err(e) => {
                    warn!(path = %path.display(), "unreadable ledger, starting empty: {e}");
                    LedgerFile::default()
                }
            },
            Err(_) => LedgerFile::default(),
        };

        let mut ledger = Self {
            path,
            hashes: Vec::with_capacity(file.sent.len()),
            index: HashSet::with_capacity(file.sent.len()),
        };
        for hash in file.sent {
            ledger.mark(hash);
        }
        ledger
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.index.contains(hash)
    }

    /// Idempotent; a hash, once added, is never removed.
    pub fn mark(&mut self, hash: String) {
        if self.index.insert(hash.clone()) {
            self.hashes.push(hash);
        }
    }

    /// Rewrite the entire backing file.
    ///
    /// On failure the in-memory set stays authoritative for the rest of
    /// the process; the caller logs and moves on.
    pub fn persist(&self) -> Result<()> {
        let file = LedgerFile {
            sent: self.hashes.clone(),
        };
        let raw = serde_json::to_string_pretty(&file)?;
        fs::write(&self.path, raw)
            .map_err(|e| Error::State(format!("write {}: {e}", self.path.display())))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
