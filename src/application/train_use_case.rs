// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a full cross-validated experiment:
//
//   Step 1: Validate the configuration
//   Step 2: Save config to the experiment directory (Layer 6)
//   Step 3: Load the face dataset              (Layer 4 - data)
//   Step 4: Run the staged k-fold training   (Layer 5 - ml)
//   Step 5: Write and log the fold summary     (Layer 6 - infra)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::data::loader::{FolderOptions, ImageFolderSource};
use crate::domain::error::TrainingError;
use crate::domain::schedule::{StageBudget, StepDecay};
use crate::infra::history::write_json;
use crate::ml::backend::DeviceChoice;
use crate::ml::model::MIN_INPUT_SIZE;
use crate::ml::trainer::{run_training, FoldSummary};

// ─── Experiment Configuration ────────────────────────────────────────────────
// Every constant of a run, fixed before the first fold starts and
// handed to the scheduler by reference. Saved as JSON next to the
// results so a run can be traced back to its settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub dataset_root:          String,
    pub experiment_root:       String,
    pub experiment_name:       String,
    pub num_folds:             usize,
    pub target_branches:       usize,
    pub first_stage_epochs:    usize,
    pub later_stage_epochs:    usize,
    pub validation_interval:   usize,
    pub batch_size:            usize,
    pub num_workers:           usize,
    pub base_lr:               f64,
    pub momentum:              f64,
    pub lr_step:               usize,
    pub lr_gamma:              f64,
    pub supervised_partitions: usize,
    pub image_size:            usize,
    pub seed:                  u64,
    pub device:                DeviceChoice,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            dataset_root:          "./Cohn-Kanade - Extended/".to_string(),
            experiment_root:       "./experiments/Extended_Cohn_Kanade/".to_string(),
            experiment_name:       "ESR_4_Lvl_3_Frozen_Layers-Extended_Cohn_Kanade".to_string(),
            num_folds:             10,
            target_branches:       4,
            first_stage_epochs:    2000,
            later_stage_epochs:    1000,
            validation_interval:   50,
            batch_size:            32,
            num_workers:           8,
            base_lr:               0.1,
            momentum:              0.9,
            lr_step:               250,
            lr_gamma:              0.5,
            supervised_partitions: 4,
            image_size:            96,
            seed:                  0,
            device:                DeviceChoice::Auto,
        }
    }
}

impl ExperimentConfig {
    pub fn experiment_dir(&self) -> PathBuf {
        PathBuf::from(&self.experiment_root).join(&self.experiment_name)
    }

    /// Directory of 0-based `fold`, e.g. `Fold-01` for fold 0.
    pub fn fold_dir(&self, fold: usize) -> PathBuf {
        self.experiment_dir().join(format!("Fold-{:02}", fold + 1))
    }

    pub fn saved_networks_dir(&self, fold: usize) -> PathBuf {
        self.fold_dir(fold).join("Saved Networks")
    }

    pub fn stage_budget(&self) -> StageBudget {
        StageBudget {
            first_stage_epochs: self.first_stage_epochs,
            later_stage_epochs: self.later_stage_epochs,
        }
    }

    pub fn step_decay(&self) -> StepDecay {
        StepDecay::new(self.lr_step, self.lr_gamma)
    }

    pub fn folder_options(&self) -> FolderOptions {
        FolderOptions {
            image_size: self.image_size,
            num_folds:  self.num_folds,
            partitions: self.supervised_partitions,
            seed:       self.seed,
        }
    }

    /// Reject settings the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), TrainingError> {
        let positive = [
            ("folds", self.num_folds),
            ("branches", self.target_branches),
            ("first-stage epochs", self.first_stage_epochs),
            ("later-stage epochs", self.later_stage_epochs),
            ("validation interval", self.validation_interval),
            ("batch size", self.batch_size),
            ("learning-rate step", self.lr_step),
            ("supervised partitions", self.supervised_partitions),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(TrainingError::InvalidConfig(format!("{name} must be at least 1")));
        }
        if self.image_size < MIN_INPUT_SIZE {
            return Err(TrainingError::InvalidConfig(format!(
                "image size {} is below the minimum of {MIN_INPUT_SIZE}",
                self.image_size
            )));
        }
        if !(self.base_lr > 0.0) {
            return Err(TrainingError::InvalidConfig("learning rate must be positive".to_string()));
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(TrainingError::InvalidConfig("momentum must be in [0, 1)".to_string()));
        }
        Ok(())
    }
}

/// What the experiment writes to `summary.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub experiment_name:         String,
    pub folds:                   Vec<FoldSummary>,
    pub mean_ensemble_accuracy:  f64,
}

impl ExperimentSummary {
    pub fn new(experiment_name: impl Into<String>, folds: Vec<FoldSummary>) -> Self {
        let finals: Vec<f64> = folds.iter().filter_map(FoldSummary::final_accuracy).collect();
        let mean_ensemble_accuracy = if finals.is_empty() {
            0.0
        } else {
            finals.iter().sum::<f64>() / finals.len() as f64
        };
        Self { experiment_name: experiment_name.into(), folds, mean_ensemble_accuracy }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: ExperimentConfig,
}

impl TrainUseCase {
    pub fn new(config: ExperimentConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<ExperimentSummary> {
        let cfg = &self.config;

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.validate()?;

        // ── Step 2: Save config ───────────────────────────────────────────────
        let dir = cfg.experiment_dir();
        fs::create_dir_all(&dir).map_err(|e| TrainingError::io(&dir, e))?;
        write_json(&dir.join("experiment_config.json"), cfg)?;
        tracing::info!("Starting: {}", cfg.experiment_name);

        // ── Step 3: Load the dataset once ─────────────────────────────────────
        let source = ImageFolderSource::open(&cfg.dataset_root, &cfg.folder_options())
            .with_context(|| format!("Cannot load dataset from '{}'", cfg.dataset_root))?;

        // ── Step 4: Staged k-fold training ────────────────────────────────────
        let folds = run_training(cfg, &source)?;

        // ── Step 5: Summary ───────────────────────────────────────────────────
        let summary = ExperimentSummary::new(&cfg.experiment_name, folds);
        write_json(&dir.join("summary.json"), &summary)?;
        tracing::info!(
            "Mean ensemble accuracy over {} folds: {:.4}",
            summary.folds.len(),
            summary.mean_ensemble_accuracy,
        );

        Ok(summary)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ExperimentConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_folds_and_tiny_images() {
        let cfg = ExperimentConfig { num_folds: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(TrainingError::InvalidConfig(_))));

        let cfg = ExperimentConfig { image_size: 32, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(TrainingError::InvalidConfig(_))));

        let cfg = ExperimentConfig { momentum: 1.0, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_fold_layout() {
        let cfg = ExperimentConfig {
            experiment_root: "/tmp/exp".to_string(),
            experiment_name: "run".to_string(),
            ..Default::default()
        };
        assert_eq!(cfg.fold_dir(0), PathBuf::from("/tmp/exp/run/Fold-01"));
        assert_eq!(cfg.saved_networks_dir(9), PathBuf::from("/tmp/exp/run/Fold-10/Saved Networks"));
    }

    #[test]
    fn test_summary_mean_uses_final_stage() {
        let folds = vec![
            FoldSummary { fold: 1, stage_accuracy: vec![0.5, 0.75] },
            FoldSummary { fold: 2, stage_accuracy: vec![0.25, 0.25] },
        ];
        let summary = ExperimentSummary::new("x", folds);
        assert!((summary.mean_ensemble_accuracy - 0.5).abs() < 1e-12);
    }
}
