// ============================================================
// Layer 3 — Stage Schedule
// ============================================================
// The arithmetic that drives the training scheduler:
//
//   StepDecay        — learning rate of a group at a given epoch
//   StageBudget      — epochs allowed for stage 1 vs later stages
//   should_validate  — when the epoch loop hands over to VALIDATE
//   next_after_stage — GROW or DONE_FOLD once a stage is spent
//   BestAccuracy     — whether a validation result replaces the
//                      stage's checkpoint

use serde::{Deserialize, Serialize};

/// Multiply every learning rate by `gamma` each `step` epochs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepDecay {
    pub step:  usize,
    pub gamma: f64,
}

impl StepDecay {
    pub fn new(step: usize, gamma: f64) -> Self {
        Self { step, gamma }
    }

    /// Learning rate for 0-based `epoch` of a stage, given the
    /// group's base rate. A frozen group (base 0) stays at 0.
    pub fn lr_at(&self, base_lr: f64, epoch: usize) -> f64 {
        let decays = epoch / self.step.max(1);
        base_lr * self.gamma.powi(decays as i32)
    }
}

/// Per-stage epoch budgets. Stage 1 trains the extractor too and
/// gets the longer budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageBudget {
    pub first_stage_epochs: usize,
    pub later_stage_epochs: usize,
}

impl StageBudget {
    /// Budget for 1-based `stage`.
    pub fn epochs_for(&self, stage: usize) -> usize {
        if stage <= 1 { self.first_stage_epochs } else { self.later_stage_epochs }
    }
}

/// Validation runs on the first epoch, every `interval` epochs after
/// that, and always on the final epoch of the stage.
pub fn should_validate(epoch: usize, budget: usize, interval: usize) -> bool {
    epoch % interval.max(1) == 0 || epoch + 1 == budget
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Grow,
    DoneFold,
}

pub fn next_after_stage(ensemble_size: usize, target_branches: usize) -> StageOutcome {
    if ensemble_size < target_branches {
        StageOutcome::Grow
    } else {
        StageOutcome::DoneFold
    }
}

/// Best ensemble accuracy seen in the current stage. A result equal
/// to the best still wins, so the latest of tied checkpoints is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BestAccuracy {
    best: Option<f64>,
}

impl BestAccuracy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `accuracy`; true when it becomes the new checkpoint.
    pub fn offer(&mut self, accuracy: f64) -> bool {
        match self.best {
            Some(best) if accuracy < best => false,
            _ => {
                self.best = Some(accuracy);
                true
            }
        }
    }

    /// 0 until the first validation of the stage.
    pub fn value(&self) -> f64 {
        self.best.unwrap_or(0.0)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_decay_halves_every_period() {
        let decay = StepDecay::new(250, 0.5);
        assert_eq!(decay.lr_at(0.1, 0), 0.1);
        assert_eq!(decay.lr_at(0.1, 249), 0.1);
        assert_eq!(decay.lr_at(0.1, 250), 0.05);
        assert_eq!(decay.lr_at(0.1, 999), 0.1 * 0.125);
    }

    #[test]
    fn test_frozen_group_stays_frozen() {
        let decay = StepDecay::new(250, 0.5);
        assert_eq!(decay.lr_at(0.0, 0), 0.0);
        assert_eq!(decay.lr_at(0.0, 1500), 0.0);
    }

    #[test]
    fn test_budget_per_stage() {
        let budget = StageBudget { first_stage_epochs: 2000, later_stage_epochs: 1000 };
        assert_eq!(budget.epochs_for(1), 2000);
        assert_eq!(budget.epochs_for(2), 1000);
        assert_eq!(budget.epochs_for(4), 1000);
    }

    #[test]
    fn test_validation_cadence() {
        let hits: Vec<usize> = (0..120).filter(|&e| should_validate(e, 120, 50)).collect();
        assert_eq!(hits, vec![0, 50, 100, 119]);
    }

    #[test]
    fn test_validation_on_single_epoch_stage() {
        assert!(should_validate(0, 1, 50));
    }

    #[test]
    fn test_stage_outcome() {
        assert_eq!(next_after_stage(1, 4), StageOutcome::Grow);
        assert_eq!(next_after_stage(3, 4), StageOutcome::Grow);
        assert_eq!(next_after_stage(4, 4), StageOutcome::DoneFold);
        assert_eq!(next_after_stage(1, 1), StageOutcome::DoneFold);
    }

    #[test]
    fn test_first_result_always_checkpoints() {
        let mut best = BestAccuracy::new();
        assert_eq!(best.value(), 0.0);
        assert!(best.offer(0.0));
        assert_eq!(best.value(), 0.0);
    }

    #[test]
    fn test_ties_overwrite_and_drops_do_not() {
        let mut best = BestAccuracy::new();
        let kept: Vec<bool> = [0.5, 0.5, 0.25, 0.75, 0.75, 0.5]
            .into_iter()
            .map(|acc| best.offer(acc))
            .collect();
        assert_eq!(kept, vec![true, true, false, true, true, false]);
        assert_eq!(best.value(), 0.75);
    }
}
