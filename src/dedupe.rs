//! Dedupe store: ids already processed in this run (optionally seeded from disk).
//!
//! The set is append-only for the lifetime of a run. Besides exact ids it
//! remembers normalized titles so syndicated copies of one story (same title,
//! different URL) are caught by `is_near_duplicate`.

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use strsim::normalized_levenshtein;

/// Titles at or above this similarity count as the same story.
pub const NEAR_DUPLICATE_THRESHOLD: f64 = 0.90;

/// Ids kept by the file store.
pub const MAX_PERSISTED_IDS: usize = 5000;

#[derive(Debug, Default, Clone)]
pub struct SeenSet {
    ids: HashSet<String>,
    order: VecDeque<String>,
    titles: Vec<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeded with ids persisted by an earlier run (oldest first).
    pub fn from_ids<I: IntoIterator<Item = String>>(ids: I) -> Self {
        let mut s = Self::new();
        for id in ids {
            s.insert_id(id);
        }
        s
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns `false` if the id was already present.
    pub fn insert_id(&mut self, id: String) -> bool {
        if self.ids.insert(id.clone()) {
            self.order.push_back(id);
            true
        } else {
            false
        }
    }

    /// Mark a candidate consumed: id plus normalized title.
    pub fn mark(&mut self, id: &str, title: &str) -> bool {
        let fresh = self.insert_id(id.to_string());
        let norm = normalize_title(title);
        if !norm.is_empty() && !self.titles.contains(&norm) {
            self.titles.push(norm);
        }
        fresh
    }

    pub fn is_near_duplicate(&self, title: &str) -> bool {
        let norm = normalize_title(title);
        if norm.is_empty() {
            return false;
        }
        self.titles
            .iter()
            .any(|t| normalized_levenshtein(t, &norm) >= NEAR_DUPLICATE_THRESHOLD)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in insertion order, newest last.
    pub fn ids_in_order(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }
}

fn normalize_title(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = true;
    for ch in s.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Cross-run persistence for the seen set.
pub trait SeenSetStore {
    fn load(&self) -> io::Result<SeenSet>;
    fn save(&self, seen: &SeenSet) -> io::Result<()>;
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct SeenFile {
    ids: Vec<String>,
}

/// JSON file `{ "ids": [...] }`, replaced atomically on save, capped at the newest
/// [`MAX_PERSISTED_IDS`] ids.
#[derive(Debug, Clone)]
pub struct JsonFileSeenStore {
    path: PathBuf,
}

impl JsonFileSeenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SeenSetStore for JsonFileSeenStore {
    fn load(&self) -> io::Result<SeenSet> {
        let s = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(SeenSet::new()),
            Err(e) => return Err(e),
        };
        let file: SeenFile =
            serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(SeenSet::from_ids(file.ids))
    }

    fn save(&self, seen: &SeenSet) -> io::Result<()> {
        let skip = seen.len().saturating_sub(MAX_PERSISTED_IDS);
        let file = SeenFile {
            ids: seen.ids_in_order().skip(skip).cloned().collect(),
        };
        let json = serde_json::to_string(&file)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp)?;
        f.write_all(json.as_bytes())?;
        f.sync_all()?;
        fs::rename(tmp, &self.path)?;
        Ok(())
    }
}
