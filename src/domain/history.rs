// ============================================================
// Layer 3 — Stage History
// ============================================================
// Loss and accuracy series for one stage of one fold, one entry
// per validation checkpoint. Reset at the start of every stage.

use serde::{Deserialize, Serialize};

use crate::domain::votes::ValidationReport;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageHistory {
    /// Mean training loss (sum over branches) per checkpoint.
    pub loss:    Vec<f64>,
    /// Training accuracy, one series per branch.
    pub acc:     Vec<Vec<f64>>,
    /// Validation loss, one series per branch.
    pub val_loss: Vec<Vec<f64>>,
    /// Validation accuracy, one series per branch, ensemble last.
    pub val_acc: Vec<Vec<f64>>,
}

impl StageHistory {
    pub fn new(ensemble_size: usize) -> Self {
        Self {
            loss:     Vec::new(),
            acc:      vec![Vec::new(); ensemble_size],
            val_loss: vec![Vec::new(); ensemble_size],
            val_acc:  vec![Vec::new(); ensemble_size + 1],
        }
    }

    pub fn ensemble_size(&self) -> usize {
        self.acc.len()
    }

    pub fn checkpoints(&self) -> usize {
        self.loss.len()
    }

    /// Append one validation checkpoint.
    pub fn record(&mut self, train_loss: f64, train_acc: &[f64], report: &ValidationReport) {
        self.loss.push(train_loss);
        for (series, &acc) in self.acc.iter_mut().zip(train_acc) {
            series.push(acc);
        }
        for (series, &loss) in self.val_loss.iter_mut().zip(&report.losses) {
            series.push(loss);
        }
        let accuracies = report.accuracies();
        let size = self.ensemble_size();
        for (series, &acc) in self.val_acc[..size].iter_mut().zip(&accuracies) {
            series.push(acc);
        }
        if let Some(ensemble) = self.val_acc.last_mut() {
            ensemble.push(report.ensemble_accuracy());
        }
    }

    /// Ensemble validation accuracy series.
    pub fn ensemble_val_acc(&self) -> &[f64] {
        self.val_acc.last().map(Vec::as_slice).unwrap_or(&[])
    }
}
