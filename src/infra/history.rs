// ============================================================
// Layer 6 — History Recorder
// ============================================================
// Writes the loss/accuracy series of a stage next to the fold's
// saved networks, after every validation checkpoint:
//
//   Fold-01/
//     Loss_Branch_2.json       training loss
//     Acc_Branch_2.json        training accuracy per branch
//     Loss_Val_Branch_2.json   validation loss per branch
//     Acc_Val_Branch_2.json    validation accuracy per branch + ensemble
//     History_Branch_2.csv     one row per validation checkpoint
//
// Curves are not rendered here; any plotting tool can read the
// JSON arrays or the CSV.

use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::error::TrainingError;
use crate::domain::history::StageHistory;

pub struct HistoryRecorder {
    dir: PathBuf,
}

impl HistoryRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Overwrite the history files of `stage_id` with `history`.
    pub fn write(&self, history: &StageHistory, stage_id: usize) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| TrainingError::io(&self.dir, e))?;

        write_json(&self.dir.join(format!("Loss_Branch_{stage_id}.json")), &history.loss)?;
        write_json(&self.dir.join(format!("Acc_Branch_{stage_id}.json")), &history.acc)?;
        write_json(&self.dir.join(format!("Loss_Val_Branch_{stage_id}.json")), &history.val_loss)?;
        write_json(&self.dir.join(format!("Acc_Val_Branch_{stage_id}.json")), &history.val_acc)?;
        self.write_csv(history, stage_id)?;

        tracing::debug!(
            "History of stage {} written to '{}' ({} checkpoints)",
            stage_id,
            self.dir.display(),
            history.checkpoints(),
        );
        Ok(())
    }

    fn write_csv(&self, history: &StageHistory, stage_id: usize) -> Result<()> {
        let path = self.dir.join(format!("History_Branch_{stage_id}.csv"));
        let mut f = fs::File::create(&path).map_err(|e| TrainingError::io(&path, e))?;

        let size = history.ensemble_size();
        let mut header = vec!["checkpoint".to_string(), "train_loss".to_string()];
        header.extend((1..=size).map(|b| format!("train_acc_{b}")));
        header.extend((1..=size).map(|b| format!("val_loss_{b}")));
        header.extend((1..=size).map(|b| format!("val_acc_{b}")));
        header.push("val_acc_ensemble".to_string());
        writeln!(f, "{}", header.join(",")).map_err(|e| TrainingError::io(&path, e))?;

        for row in 0..history.checkpoints() {
            let mut cells = vec![row.to_string(), format!("{:.6}", history.loss[row])];
            let series = history.acc.iter().chain(&history.val_loss).chain(&history.val_acc);
            cells.extend(series.map(|s| s.get(row).map(|v| format!("{v:.6}")).unwrap_or_default()));
            writeln!(f, "{}", cells.join(",")).map_err(|e| TrainingError::io(&path, e))?;
        }
        Ok(())
    }
}

/// Pretty-printed JSON, replacing any previous file.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Cannot serialise '{}'", path.display()))?;
    fs::write(path, json).map_err(|e| TrainingError::io(path, e))?;
    Ok(())
}
