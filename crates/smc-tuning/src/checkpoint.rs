// ─────────────────────────────────────────────────────────────────────
// SMC Kernel — PSO Checkpoint Manager
// ─────────────────────────────────────────────────────────────────────
//! Crash-resistant persistence of optimizer state between iterations.
//!
//! Each save writes `<prefix>_iter_NNNNNN.json.tmp`, fsyncs it and
//! renames it over the final name, so a crash leaves either the
//! previous set of checkpoints or the new one, never a torn file.
//! Re-saving an iteration replaces its file. Loading skips stray
//! temporaries and falls back past corrupt files to the newest
//! readable checkpoint.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use smc_core::ControllerKind;
use smc_types::{SmcError, SmcResult};

/// Swarm state at the end of one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsoCheckpoint {
    pub iteration: usize,
    pub controller: ControllerKind,
    pub positions: Vec<Vec<f64>>,
    pub velocities: Vec<Vec<f64>>,
    pub personal_best_positions: Vec<Vec<f64>>,
    pub personal_best_costs: Vec<f64>,
    pub global_best_position: Vec<f64>,
    pub global_best_cost: f64,
    /// Global best cost after each completed iteration.
    pub cost_history: Vec<f64>,
    /// Seconds since the Unix epoch at save time.
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl PsoCheckpoint {
    /// Every swarm array must agree on particle count and dimension.
    pub fn validate(&self) -> SmcResult<()> {
        let n = self.positions.len();
        let dim = self.controller.n_gains();
        let bad = |what: &str| {
            Err(SmcError::Checkpoint(format!(
                "iteration {}: inconsistent {what}",
                self.iteration
            )))
        };
        if self.velocities.len() != n
            || self.personal_best_positions.len() != n
            || self.personal_best_costs.len() != n
        {
            return bad("particle count");
        }
        let rows = self
            .positions
            .iter()
            .chain(&self.velocities)
            .chain(&self.personal_best_positions)
            .chain(std::iter::once(&self.global_best_position));
        for row in rows {
            // The two-gain super-twisting form is accepted alongside the full one.
            if row.len() != dim && !(self.controller == ControllerKind::SuperTwisting && row.len() == 2) {
                return bad("dimension");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub dir: PathBuf,
    /// Save every `interval` iterations.
    pub interval: usize,
    /// Newest checkpoints kept on disk; older ones are pruned.
    pub max_checkpoints: usize,
    pub prefix: String,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("checkpoints"),
            interval: 10,
            max_checkpoints: 5,
            prefix: "pso_checkpoint".into(),
        }
    }
}

impl CheckpointConfig {
    pub fn validate(&self) -> SmcResult<()> {
        if self.interval == 0 {
            return Err(SmcError::Config("checkpoint interval must be >= 1".into()));
        }
        if self.max_checkpoints == 0 {
            return Err(SmcError::Config("max_checkpoints must be >= 1".into()));
        }
        if self.prefix.is_empty() || self.prefix.contains(['/', '\\']) {
            return Err(SmcError::Config(format!(
                "invalid checkpoint prefix '{}'",
                self.prefix
            )));
        }
        Ok(())
    }
}

/// Thread-safe: saves, pruning and clearing are serialized by a `parking_lot::Mutex`.
pub struct CheckpointManager {
    config: CheckpointConfig,
    write_lock: Mutex<()>,
}

impl CheckpointManager {
    /// Validate the config and create the checkpoint directory.
    pub fn new(config: CheckpointConfig) -> SmcResult<Self> {
        config.validate()?;
        fs::create_dir_all(&config.dir)?;
        Ok(Self {
            config,
            write_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &CheckpointConfig {
        &self.config
    }

    pub fn should_checkpoint(&self, iteration: usize) -> bool {
        iteration > 0 && iteration % self.config.interval == 0
    }

    pub fn path_for(&self, iteration: usize) -> PathBuf {
        self.config
            .dir
            .join(format!("{}_iter_{iteration:06}.json", self.config.prefix))
    }

    /// Durably write one checkpoint and prune old ones. Returns its path.
    pub fn save(&self, checkpoint: &PsoCheckpoint) -> SmcResult<PathBuf> {
        checkpoint.validate()?;
        let mut record = checkpoint.clone();
        record.timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let bytes = serde_json::to_vec_pretty(&record)?;

        let _guard = self.write_lock.lock();
        let path = self.path_for(record.iteration);
        let tmp = temp_path(&path);
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        sync_dir(&self.config.dir);
        log::info!(
            "saved PSO checkpoint iteration {} (best cost {:.6}) to {}",
            record.iteration,
            record.global_best_cost,
            path.display()
        );

        self.prune_locked()?;
        Ok(path)
    }

    /// Durable checkpoints, oldest first.
    pub fn list(&self) -> SmcResult<Vec<(usize, PathBuf)>> {
        let mut found = Vec::new();
        let stem = format!("{}_iter_", self.config.prefix);
        for entry in fs::read_dir(&self.config.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let iteration = name
                .strip_prefix(stem.as_str())
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|digits| digits.parse::<usize>().ok());
            if let Some(iteration) = iteration {
                found.push((iteration, entry.path()));
            }
        }
        found.sort_by_key(|(iteration, _)| *iteration);
        Ok(found)
    }

    pub fn load(&self, path: &Path) -> SmcResult<PsoCheckpoint> {
        let bytes = fs::read(path)?;
        let checkpoint: PsoCheckpoint = serde_json::from_slice(&bytes)?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    /// Newest readable checkpoint, skipping corrupt files.
    pub fn load_latest(&self) -> SmcResult<Option<PsoCheckpoint>> {
        for (_, path) in self.list()?.into_iter().rev() {
            match self.load(&path) {
                Ok(checkpoint) => {
                    log::info!(
                        "resuming from PSO checkpoint iteration {} ({})",
                        checkpoint.iteration,
                        path.display()
                    );
                    return Ok(Some(checkpoint));
                }
                Err(e) => log::warn!("skipping corrupt checkpoint {}: {e}", path.display()),
            }
        }
        Ok(None)
    }

    /// Remove every checkpoint and stray temporary. Returns files removed.
    pub fn clear(&self) -> SmcResult<usize> {
        let _guard = self.write_lock.lock();
        let stem = format!("{}_iter_", self.config.prefix);
        let mut removed = 0;
        for entry in fs::read_dir(&self.config.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let ours = name
                .to_str()
                .is_some_and(|n| n.starts_with(stem.as_str()) && (n.ends_with(".json") || n.ends_with(".tmp")));
            if ours {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn prune_locked(&self) -> SmcResult<()> {
        let all = self.list()?;
        let excess = all.len().saturating_sub(self.config.max_checkpoints);
        for (iteration, path) in all.into_iter().take(excess) {
            fs::remove_file(&path)?;
            log::debug!("pruned PSO checkpoint iteration {iteration}");
        }
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Persist the rename itself. Not all platforms can open a directory.
fn sync_dir(dir: &Path) {
    if let Ok(d) = File::open(dir) {
        let _ = d.sync_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn checkpoint(iteration: usize) -> PsoCheckpoint {
        let particle = vec![18.0, 12.0, 8.0, 6.0];
        PsoCheckpoint {
            iteration,
            controller: ControllerKind::Hybrid,
            positions: vec![particle.clone(); 3],
            velocities: vec![vec![0.0; 4]; 3],
            personal_best_positions: vec![particle.clone(); 3],
            personal_best_costs: vec![1.0, 2.0, 3.0],
            global_best_position: particle,
            global_best_cost: 1.0 / (iteration as f64 + 1.0),
            cost_history: vec![1.0; iteration],
            timestamp: 0,
            metadata: BTreeMap::new(),
        }
    }

    fn manager(dir: &Path, max_checkpoints: usize) -> CheckpointManager {
        CheckpointManager::new(CheckpointConfig {
            dir: dir.to_path_buf(),
            interval: 5,
            max_checkpoints,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_should_checkpoint() {
        let dir = tempdir().unwrap();
        let m = manager(dir.path(), 3);
        assert!(!m.should_checkpoint(0));
        assert!(!m.should_checkpoint(4));
        assert!(m.should_checkpoint(5));
        assert!(m.should_checkpoint(10));
    }

    #[test]
    fn test_save_leaves_no_temp_and_resumes_latest() {
        let dir = tempdir().unwrap();
        let m = manager(dir.path(), 10);
        m.save(&checkpoint(5)).unwrap();
        m.save(&checkpoint(10)).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| !n.ends_with(".tmp")), "{names:?}");

        let latest = m.load_latest().unwrap().unwrap();
        assert_eq!(latest.iteration, 10);
        assert!(latest.timestamp > 0);
        assert_eq!(latest.positions, checkpoint(10).positions);
    }

    #[test]
    fn test_resave_is_idempotent() {
        let dir = tempdir().unwrap();
        let m = manager(dir.path(), 10);
        let first = m.save(&checkpoint(5)).unwrap();
        let second = m.save(&checkpoint(5)).unwrap();
        assert_eq!(first, second);
        assert_eq!(m.list().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_latest_is_skipped() {
        let dir = tempdir().unwrap();
        let m = manager(dir.path(), 10);
        m.save(&checkpoint(5)).unwrap();
        fs::write(m.path_for(10), b"{\"iteration\": 10, truncated").unwrap();
        let latest = m.load_latest().unwrap().unwrap();
        assert_eq!(latest.iteration, 5);
    }

    #[test]
    fn test_stray_temp_is_ignored() {
        let dir = tempdir().unwrap();
        let m = manager(dir.path(), 10);
        m.save(&checkpoint(5)).unwrap();
        fs::write(temp_path(&m.path_for(10)), b"partial").unwrap();
        let listed: Vec<usize> = m.list().unwrap().into_iter().map(|(i, _)| i).collect();
        assert_eq!(listed, vec![5]);
        assert_eq!(m.load_latest().unwrap().unwrap().iteration, 5);
    }

    #[test]
    fn test_prunes_oldest() {
        let dir = tempdir().unwrap();
        let m = manager(dir.path(), 2);
        for it in [5, 10, 15, 20] {
            m.save(&checkpoint(it)).unwrap();
        }
        let listed: Vec<usize> = m.list().unwrap().into_iter().map(|(i, _)| i).collect();
        assert_eq!(listed, vec![15, 20]);
    }

    #[test]
    fn test_clear_and_empty_resume() {
        let dir = tempdir().unwrap();
        let m = manager(dir.path(), 5);
        assert!(m.load_latest().unwrap().is_none());
        m.save(&checkpoint(5)).unwrap();
        fs::write(temp_path(&m.path_for(10)), b"partial").unwrap();
        fs::write(dir.path().join("unrelated.txt"), b"keep").unwrap();
        assert_eq!(m.clear().unwrap(), 2);
        assert!(m.load_latest().unwrap().is_none());
        assert!(dir.path().join("unrelated.txt").exists());
    }

    #[test]
    fn test_inconsistent_checkpoint_rejected() {
        let dir = tempdir().unwrap();
        let m = manager(dir.path(), 5);
        let mut bad = checkpoint(5);
        bad.velocities.pop();
        assert!(matches!(m.save(&bad), Err(SmcError::Checkpoint(_))));
        let mut wrong_dim = checkpoint(5);
        wrong_dim.global_best_position.push(1.0);
        assert!(m.save(&wrong_dim).is_err());
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempdir().unwrap();
        let cfg = CheckpointConfig {
            dir: dir.path().to_path_buf(),
            interval: 0,
            ..Default::default()
        };
        assert!(CheckpointManager::new(cfg).is_err());
    }
}
