// ============================================================
// Layer 6 — Checkpoint Store
// ============================================================
// Saves and restores ensemble snapshots using Burn's
// CompactRecorder, one file per component:
//
//   Fold-01/Saved Networks/
//     1/
//       Net-Base-Shared_Representations.mpk
//       Net-Branch_1.mpk
//     2/
//       Net-Base-Shared_Representations.mpk
//       Net-Branch_1.mpk
//       Net-Branch_2.mpk
//     ...
//
// The stage directory is the ensemble size at the time of the
// save. Saving again into the same stage overwrites the files.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use std::{fs, path::PathBuf};

use crate::domain::error::TrainingError;
use crate::ml::model::{check_shapes, Ensemble, EnsembleConfig, EnsembleSnapshot};

const EXTRACTOR_FILE: &str = "Net-Base-Shared_Representations";

/// Branch files are numbered from 1 in creation order.
pub fn branch_file(branch: usize) -> String {
    format!("Net-Branch_{branch}")
}

/// Persists snapshots under one "Saved Networks" directory.
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn stage_dir(&self, stage_id: usize) -> PathBuf {
        self.dir.join(stage_id.to_string())
    }

    /// Write the extractor and every branch of `snapshot` into the
    /// directory of `stage_id`, creating it if needed.
    pub fn persist<B: Backend>(&self, snapshot: &EnsembleSnapshot<B>, stage_id: usize) -> Result<()> {
        let dir = self.stage_dir(stage_id);
        fs::create_dir_all(&dir).map_err(|e| TrainingError::io(&dir, e))?;

        let recorder = CompactRecorder::new();

        let path = dir.join(EXTRACTOR_FILE);
        recorder
            .record(snapshot.extractor.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save extractor to '{}'", path.display()))?;

        for (i, branch) in snapshot.branches.iter().enumerate() {
            let path = dir.join(branch_file(i + 1));
            recorder
                .record(branch.clone().into_record(), path.clone())
                .with_context(|| format!("Failed to save branch {} to '{}'", i + 1, path.display()))?;
        }

        tracing::info!("Network has been saved at: {}", dir.display());
        Ok(())
    }

    /// Rebuild an ensemble of `stage_id` branches from disk.
    pub fn load<B: Backend>(
        &self,
        config:   &EnsembleConfig,
        stage_id: usize,
        device:   &B::Device,
    ) -> Result<Ensemble<B>> {
        let dir = self.stage_dir(stage_id);
        if !dir.is_dir() {
            return Err(TrainingError::io(
                &dir,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no saved networks for this stage"),
            )
            .into());
        }

        let recorder = CompactRecorder::new();
        let mut ensemble = config.init::<B>(device);

        let path = dir.join(EXTRACTOR_FILE);
        let record = recorder
            .load(path.clone(), device)
            .with_context(|| format!("Cannot load extractor '{}'", path.display()))?;
        let fresh = ensemble.extractor.param_shapes();
        ensemble.extractor = ensemble.extractor.load_record(record);
        check_shapes("extractor", &fresh, &ensemble.extractor.param_shapes())?;

        for branch in 1..=stage_id {
            let path = dir.join(branch_file(branch));
            let record = recorder
                .load(path.clone(), device)
                .map_err(|e| {
                    TrainingError::ShapeMismatch(format!(
                        "stage {stage_id} needs branch {branch} at '{}': {e:?}",
                        path.display()
                    ))
                })?;
            let module = config.init_branch::<B>(device);
            let fresh = module.param_shapes();
            let module = module.load_record(record);
            check_shapes(&format!("branch {branch}"), &fresh, &module.param_shapes())?;
            ensemble.branches.push(module);
        }

        tracing::info!("Loaded {} branches from '{}'", ensemble.size(), dir.display());
        Ok(ensemble)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use std::path::Path;

    type TestBackend = NdArray;

    fn ensemble(branches: usize) -> Ensemble<TestBackend> {
        let device = Default::default();
        let mut e = EnsembleConfig::default().init::<TestBackend>(&device);
        for _ in 0..branches {
            e.add_branch();
        }
        e
    }

    fn saved_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_persist_writes_one_file_per_component() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path().join("Saved Networks"));
        store.persist(&ensemble(3).to_state_snapshot(), 3).unwrap();

        let names = saved_files(&store.stage_dir(3));
        assert_eq!(names.len(), 4);
        assert!(names[0].starts_with("Net-Base-Shared_Representations"));
        assert!(names[1].starts_with("Net-Branch_1"));
        assert!(names[3].starts_with("Net-Branch_3"));
    }

    #[test]
    fn test_persist_twice_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path());
        let model = ensemble(1);
        store.persist(&model.to_state_snapshot(), 1).unwrap();
        store.persist(&model.to_state_snapshot(), 1).unwrap();
        assert_eq!(saved_files(&store.stage_dir(1)).len(), 2);
    }

    #[test]
    fn test_load_restores_branch_count() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path());
        store.persist(&ensemble(2).to_state_snapshot(), 2).unwrap();

        let device = Default::default();
        let loaded: Ensemble<TestBackend> = store.load(&EnsembleConfig::default(), 2, &device).unwrap();
        assert_eq!(loaded.size(), 2);
    }

    #[test]
    fn test_load_missing_branch_is_shape_mismatch() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path());
        // Two branches saved into the directory stage 3 expects three in.
        store.persist(&ensemble(2).to_state_snapshot(), 3).unwrap();

        let device = Default::default();
        let err = store
            .load::<TestBackend>(&EnsembleConfig::default(), 3, &device)
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<TrainingError>(), Some(TrainingError::ShapeMismatch(_))));
    }

    #[test]
    fn test_load_missing_stage_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path());
        let device = Default::default();
        let err = store
            .load::<TestBackend>(&EnsembleConfig::default(), 1, &device)
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<TrainingError>(), Some(TrainingError::Io { .. })));
    }
}
