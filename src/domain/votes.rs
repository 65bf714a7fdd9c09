// ============================================================
// Layer 3 — Ensemble Vote Tally
// ============================================================
// Accumulates everything the evaluator reports over one pass of
// the validation set:
//
//   per branch:  summed batch loss, batch count, correct top-1
//   ensemble:    majority vote over the active branches
//
// Each branch casts exactly one vote per sample for its top-1
// class. The ensemble picks the class with most votes; ties go
// to the lowest class index, like an arg-max.

use serde::{Deserialize, Serialize};

/// Final numbers of one validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Average loss per branch, length = active branches.
    pub losses:   Vec<f64>,
    /// Correct count per branch plus the ensemble count at the end,
    /// length = active branches + 1.
    pub corrects: Vec<usize>,
    /// Number of validation samples seen.
    pub samples:  usize,
}

impl ValidationReport {
    /// Accuracy for every entry of `corrects`, ensemble last.
    pub fn accuracies(&self) -> Vec<f64> {
        self.corrects
            .iter()
            .map(|&c| ratio(c, self.samples))
            .collect()
    }

    pub fn ensemble_correct(&self) -> usize {
        self.corrects.last().copied().unwrap_or(0)
    }

    pub fn ensemble_accuracy(&self) -> f64 {
        ratio(self.ensemble_correct(), self.samples)
    }
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 { 0.0 } else { count as f64 / total as f64 }
}

#[derive(Debug, Clone)]
pub struct VoteTally {
    num_classes: usize,
    loss_sums:   Vec<f64>,
    steps:       Vec<usize>,
    corrects:    Vec<usize>,
    samples:     usize,
}

impl VoteTally {
    pub fn new(active_branches: usize, num_classes: usize) -> Self {
        Self {
            num_classes,
            loss_sums: vec![0.0; active_branches],
            steps:     vec![0; active_branches],
            corrects:  vec![0; active_branches + 1],
            samples:   0,
        }
    }

    pub fn active_branches(&self) -> usize {
        self.loss_sums.len()
    }

    /// Record one batch.
    ///
    /// `predictions[b][i]` is the top-1 class of branch `b` for
    /// sample `i`; `losses[b]` is that branch's batch loss. Branches
    /// beyond the active count are ignored.
    pub fn record_batch(&mut self, predictions: &[Vec<usize>], losses: &[f64], labels: &[usize]) {
        let mut votes = vec![vec![0u32; self.num_classes]; labels.len()];

        for (b, preds) in predictions.iter().take(self.active_branches()).enumerate() {
            if let Some(loss) = losses.get(b) {
                self.loss_sums[b] += loss;
            }
            self.steps[b] += 1;

            for (i, (&pred, &label)) in preds.iter().zip(labels).enumerate() {
                if pred == label {
                    self.corrects[b] += 1;
                }
                if let Some(slot) = votes[i].get_mut(pred) {
                    *slot += 1;
                }
            }
        }

        let ensemble = self.corrects.len() - 1;
        for (row, &label) in votes.iter().zip(labels) {
            if !predictions.is_empty() && majority(row) == label {
                self.corrects[ensemble] += 1;
            }
        }
        self.samples += labels.len();
    }

    /// Average the losses (divisor of 1 for branches that saw no batch).
    pub fn finish(self) -> ValidationReport {
        let losses = self
            .loss_sums
            .iter()
            .zip(&self.steps)
            .map(|(&sum, &steps)| sum / steps.max(1) as f64)
            .collect();
        ValidationReport {
            losses,
            corrects: self.corrects,
            samples:  self.samples,
        }
    }
}

/// Class with the most votes, lowest index on ties.
pub fn majority(votes: &[u32]) -> usize {
    let mut best = 0;
    for (class, &count) in votes.iter().enumerate() {
        if count > votes[best] {
            best = class;
        }
    }
    best
}
