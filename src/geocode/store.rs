//! JSON snapshot store for the resolved/remaining sets.
//!
//! Two files, rewritten wholesale after every mutation. Missing or
//! corrupt snapshots load as empty — persistence is best-effort and
//! never aborts a resolve.

use super::types::LocationRecord;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolved/remaining counts, no mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub resolved: usize,
    pub remaining: usize,
}

/// The cross-run result accumulator, keyed by title.
pub struct ResultStore {
    resolved_path: PathBuf,
    remaining_path: PathBuf,
    resolved: Vec<LocationRecord>,
    remaining: Vec<LocationRecord>,
}

impl ResultStore {
    /// Open a store over the two snapshot paths, loading whatever state
    /// they hold.
    pub fn open(resolved_path: PathBuf, remaining_path: PathBuf) -> Self {
        let resolved = Self::read_records(&resolved_path);
        let remaining = Self::read_records(&remaining_path);
        Self {
            resolved_path,
            remaining_path,
            resolved,
            remaining,
        }
    }

    /// Read a JSON array of records from an arbitrary path. Missing
    /// file, corrupt JSON, and title-less entries all degrade silently.
    pub fn load_records(path: &Path) -> Vec<LocationRecord> {
        Self::read_records(path)
    }

    fn read_records(path: &Path) -> Vec<LocationRecord> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(_) => return Vec::new(),
        };
        parse_records(&data)
    }

    pub fn resolved(&self) -> &[LocationRecord] {
        &self.resolved
    }

    pub fn remaining(&self) -> &[LocationRecord] {
        &self.remaining
    }

    /// Merge a stage run into the accumulated state and persist.
    ///
    /// Resolved entries are keyed by title, last write wins; only
    /// coordinate-bearing records participate. The remaining set is
    /// replaced wholesale, minus any title already resolved.
    pub fn merge(&mut self, stage_resolved: &[LocationRecord], remaining: &[LocationRecord]) {
        let mut merged: Vec<LocationRecord> = self
            .resolved
            .iter()
            .filter(|r| r.is_resolved())
            .cloned()
            .collect();
        for record in stage_resolved.iter().filter(|r| r.is_resolved()) {
            match merged.iter().position(|m| m.title == record.title) {
                Some(pos) => merged[pos] = record.clone(),
                None => merged.push(record.clone()),
            }
        }
        self.resolved = merged;
        self.remaining = remaining
            .iter()
            .filter(|r| !self.resolved.iter().any(|m| m.title == r.title))
            .cloned()
            .collect();
        self.persist();
    }

    /// Clear both sets and persist immediately, discarding history.
    pub fn reset(&mut self) {
        self.resolved.clear();
        self.remaining.clear();
        self.persist();
    }

    pub fn summary(&self) -> Summary {
        Summary {
            resolved: self.resolved.len(),
            remaining: self.remaining.len(),
        }
    }

    fn persist(&self) {
        write_records(&self.resolved_path, &self.resolved);
        write_records(&self.remaining_path, &self.remaining);
    }
}

fn parse_records(data: &str) -> Vec<LocationRecord> {
    let values: Vec<serde_json::Value> = serde_json::from_str(data).unwrap_or_default();
    values
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect()
}

fn write_records(path: &Path, records: &[LocationRecord]) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let _ = fs::create_dir_all(parent);
        }
    }
    match serde_json::to_string_pretty(records) {
        Ok(json) => {
            if let Err(e) = fs::write(path, json) {
                eprintln!("  warning: could not write {}: {}", path.display(), e);
            }
        }
        Err(e) => eprintln!("  warning: could not encode {}: {}", path.display(), e),
    }
}
