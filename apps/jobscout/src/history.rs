//! Run State Store — the set of posting ids seen in any run.
//!
//! Loading never fails: a missing or unreadable file means "nothing seen yet".
//! Writes go to a temp file in the same directory and are renamed into place,
//! so an interrupted write leaves the previous state intact.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::errors::AppError;

/// Directory (under the output root) holding run state.
pub const STATE_DIR: &str = ".jobscout";
/// File name of the processed-id list.
pub const STATE_FILE: &str = "processed_jobs.json";

/// Location of the state file for an output root.
pub fn state_path(output_root: &Path) -> PathBuf {
    output_root.join(STATE_DIR).join(STATE_FILE)
}

#[derive(Debug)]
pub struct RunHistory {
    path: PathBuf,
    prior: BTreeSet<String>,
    /// Ids first seen in this run, in the order they were seen.
    new_ids: Vec<String>,
    /// Same ids as `new_ids`, for constant-time lookup.
    new_set: HashSet<String>,
}

impl RunHistory {
    /// Loads history from `path`. Never fails; problems degrade to an empty set.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let prior = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(ids) => ids.into_iter().collect(),
                Err(e) => {
                    warn!(
                        "State file {} is unreadable ({e}); treating every posting as new",
                        path.display()
                    );
                    BTreeSet::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No state file at {}; starting fresh", path.display());
                BTreeSet::new()
            }
            Err(e) => {
                warn!(
                    "Could not read state file {} ({e}); treating every posting as new",
                    path.display()
                );
                BTreeSet::new()
            }
        };
        info!("Loaded {} previously seen posting ids", prior.len());

        Self {
            path,
            prior,
            new_ids: Vec::new(),
            new_set: HashSet::new(),
        }
    }

    /// True when `id` was recorded by an earlier run.
    pub fn seen_before(&self, id: &str) -> bool {
        self.prior.contains(id)
    }

    /// Records `id` as seen. Returns true if it was unknown to both earlier
    /// runs and this one.
    pub fn record(&mut self, id: &str) -> bool {
        if self.prior.contains(id) || !self.new_set.insert(id.to_string()) {
            return false;
        }
        self.new_ids.push(id.to_string());
        true
    }

    /// Every id known after this run, sorted.
    pub fn all_ids(&self) -> BTreeSet<String> {
        self.prior
            .iter()
            .chain(self.new_ids.iter())
            .cloned()
            .collect()
    }

    /// Atomically writes the union of prior and new ids as a sorted JSON array.
    pub fn flush(&self) -> Result<(), AppError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let ids: Vec<String> = self.all_ids().into_iter().collect();
        let mut tmp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &ids)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| AppError::Io(e.error))?;

        debug!("Wrote {} ids to {}", ids.len(), self.path.display());
        Ok(())
    }
}
