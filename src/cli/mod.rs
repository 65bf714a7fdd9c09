// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`    — k-fold staged training of the ensemble
//   2. `evaluate` — reload a saved stage and score it
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, TrainArgs};

/// clap reads the fields and generates the argument parser via
/// the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "esr-trainer",
    version = "0.1.0",
    about = "Train a wide ensemble of CNN branches for facial expression recognition."
)]
pub struct Cli {
    /// The subcommand to run (train or evaluate)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Training on faces in: {}", args.experiment.dataset_root);

    let summary = TrainUseCase::new(args.into()).execute()?;

    println!("Training complete.");
    for fold in &summary.folds {
        println!("  Fold {:02}: {:?}", fold.fold, fold.stage_accuracy);
    }
    println!("Mean ensemble accuracy: {:.2}%", summary.mean_ensemble_accuracy * 100.0);
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let report = EvaluateUseCase::new(args.config(), args.fold, args.stage).execute()?;

    for (i, (loss, acc)) in report.losses.iter().zip(report.accuracies()).enumerate() {
        println!("Branch {}: loss={:.4} acc={:.2}%", i + 1, loss, acc * 100.0);
    }
    println!("Ensemble: acc={:.2}%", report.ensemble_accuracy() * 100.0);
    Ok(())
}
