// ============================================================
// Layer 2 — Evaluate Use Case
// ============================================================
// Reloads the networks saved for one stage of one fold and
// scores them against that fold's validation split:
//   1. Validate the configuration and the requested fold/stage
//   2. Load the dataset with the same fold assignment as training
//   3. Restore the stage and run the evaluator

use anyhow::{Context, Result};

use crate::application::train_use_case::ExperimentConfig;
use crate::data::loader::ImageFolderSource;
use crate::domain::error::TrainingError;
use crate::domain::votes::ValidationReport;
use crate::ml::evaluator::run_evaluation;

pub struct EvaluateUseCase {
    config: ExperimentConfig,
    /// 1-based, as shown in the `Fold-NN` directory name.
    fold:   usize,
    stage:  usize,
}

impl EvaluateUseCase {
    pub fn new(config: ExperimentConfig, fold: usize, stage: usize) -> Self {
        Self { config, fold, stage }
    }

    pub fn execute(&self) -> Result<ValidationReport> {
        let cfg = &self.config;
        cfg.validate()?;
        if self.fold == 0 || self.fold > cfg.num_folds {
            return Err(TrainingError::InvalidConfig(format!(
                "fold {} is outside 1..={}",
                self.fold, cfg.num_folds
            ))
            .into());
        }
        if self.stage == 0 {
            return Err(TrainingError::InvalidConfig("stage must be at least 1".to_string()).into());
        }

        // Same seed and fold count → same validation split as training
        let source = ImageFolderSource::open(&cfg.dataset_root, &cfg.folder_options())
            .with_context(|| format!("Cannot load dataset from '{}'", cfg.dataset_root))?;

        let report = run_evaluation(cfg, &source, self.fold - 1, self.stage)?;
        tracing::info!(
            "Fold {}, stage {}: ensemble accuracy {:.4} on {} samples",
            self.fold,
            self.stage,
            report.ensemble_accuracy(),
            report.samples,
        );
        Ok(report)
    }
}
