// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `evaluate`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, enum)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::train_use_case::ExperimentConfig;
use crate::ml::backend::DeviceChoice;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full k-fold, staged training of the ensemble
    Train(TrainArgs),

    /// Score the networks saved for one stage of one fold
    Evaluate(EvaluateArgs),
}

/// Flags shared by both commands: where the data and results live
/// and how the dataset is cut into folds.
#[derive(Args, Debug, Clone)]
pub struct ExperimentArgs {
    /// Folder with one sub-folder of images per expression class
    #[arg(long, default_value = "./Cohn-Kanade - Extended/")]
    pub dataset_root: String,

    /// Parent directory of all experiments
    #[arg(long, default_value = "./experiments/Extended_Cohn_Kanade/")]
    pub experiment_root: String,

    /// Name of this experiment's directory under --experiment-root
    #[arg(long, default_value = "ESR_4_Lvl_3_Frozen_Layers-Extended_Cohn_Kanade")]
    pub experiment_name: String,

    /// Number of cross-validation folds
    #[arg(long, default_value_t = 10)]
    pub folds: usize,

    /// Labelled partitions added one per stage
    #[arg(long, default_value_t = 4)]
    pub partitions: usize,

    /// Faces are resized to image_size x image_size (at least 42)
    #[arg(long, default_value_t = 96)]
    pub image_size: usize,

    /// Seed of the fold assignment and batch shuffling
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Number of faces per batch
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Background loader threads (0 loads on the training thread)
    #[arg(long, default_value_t = 8)]
    pub workers: usize,

    /// Where tensors live: probe the GPU, force it, or use the CPU
    #[arg(long, value_enum, default_value_t = DeviceChoice::Auto)]
    pub device: DeviceChoice,
}

impl ExperimentArgs {
    /// Overlay these flags on `base`.
    fn apply(self, base: ExperimentConfig) -> ExperimentConfig {
        ExperimentConfig {
            dataset_root:          self.dataset_root,
            experiment_root:       self.experiment_root,
            experiment_name:       self.experiment_name,
            num_folds:             self.folds,
            supervised_partitions: self.partitions,
            image_size:            self.image_size,
            seed:                  self.seed,
            batch_size:            self.batch_size,
            num_workers:           self.workers,
            device:                self.device,
            ..base
        }
    }
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub experiment: ExperimentArgs,

    /// Branches in the final ensemble
    #[arg(long, default_value_t = 4)]
    pub branches: usize,

    /// Epochs of the first stage (extractor and branch 1)
    #[arg(long, default_value_t = 2000)]
    pub first_stage_epochs: usize,

    /// Epochs of every later stage (newest branch only)
    #[arg(long, default_value_t = 1000)]
    pub later_stage_epochs: usize,

    /// Validate every N epochs (and on the last epoch of a stage)
    #[arg(long, default_value_t = 50)]
    pub validation_interval: usize,

    /// Base learning rate of every trainable group
    #[arg(long, default_value_t = 0.1)]
    pub lr: f64,

    /// SGD momentum
    #[arg(long, default_value_t = 0.9)]
    pub momentum: f64,

    /// Multiply learning rates by --lr-gamma every N epochs
    #[arg(long, default_value_t = 250)]
    pub lr_step: usize,

    #[arg(long, default_value_t = 0.5)]
    pub lr_gamma: f64,
}

/// Convert CLI TrainArgs into the application-layer ExperimentConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for ExperimentConfig {
    fn from(a: TrainArgs) -> Self {
        let base = ExperimentConfig {
            target_branches:     a.branches,
            first_stage_epochs:  a.first_stage_epochs,
            later_stage_epochs:  a.later_stage_epochs,
            validation_interval: a.validation_interval,
            base_lr:             a.lr,
            momentum:            a.momentum,
            lr_step:             a.lr_step,
            lr_gamma:            a.lr_gamma,
            ..ExperimentConfig::default()
        };
        a.experiment.apply(base)
    }
}

/// All arguments for the `evaluate` command
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// 1-based fold, as in the `Fold-NN` directory name
    #[arg(long)]
    pub fold: usize,

    /// Stage directory to restore (= number of branches)
    #[arg(long)]
    pub stage: usize,

    #[command(flatten)]
    pub experiment: ExperimentArgs,
}

impl EvaluateArgs {
    pub fn config(&self) -> ExperimentConfig {
        self.experiment.clone().apply(ExperimentConfig::default())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["esr-trainer", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        assert_eq!(ExperimentConfig::from(args), ExperimentConfig::default());
    }

    #[test]
    fn test_train_flags_reach_config() {
        let cli = Cli::try_parse_from([
            "esr-trainer", "train",
            "--folds", "5",
            "--branches", "2",
            "--lr", "0.05",
            "--device", "cpu",
            "--experiment-name", "quick",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = ExperimentConfig::from(args);
        assert_eq!(cfg.num_folds, 5);
        assert_eq!(cfg.target_branches, 2);
        assert_eq!(cfg.base_lr, 0.05);
        assert_eq!(cfg.device, DeviceChoice::Cpu);
        assert_eq!(cfg.experiment_name, "quick");
    }

    #[test]
    fn test_evaluate_requires_fold_and_stage() {
        assert!(Cli::try_parse_from(["esr-trainer", "evaluate", "--fold", "1"]).is_err());

        let cli = Cli::try_parse_from(["esr-trainer", "evaluate", "--fold", "3", "--stage", "2"]).unwrap();
        let Commands::Evaluate(args) = cli.command else { panic!("expected evaluate") };
        assert_eq!((args.fold, args.stage), (3, 2));
        assert_eq!(args.config().num_folds, 10);
    }
}
