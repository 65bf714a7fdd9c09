// ============================================================
// Layer 5 — Training Scheduler
// ============================================================
// Cross-validated, staged growth of the ensemble:
//
//   INIT_FOLD    fresh ensemble with one branch, validation split
//                loaded once for the whole fold
//   TRAIN_STAGE  reload the labelled partitions of this stage,
//                epoch loop over shuffled batches
//   VALIDATE     every `validation_interval` epochs and on the
//                last one: evaluate, record, checkpoint on >= best
//   GROW         restore the best snapshot, add a branch, train
//                only the newest branch at the base rate
//   DONE_FOLD    target size reached, move to the next fold
//
// Key Burn 0.20 insight:
//   - Training runs on B (Autodiff<..>) for gradients
//   - ensemble.valid() returns the ensemble on B::InnerBackend with
//     running batch-norm statistics, validation batches live there too
//   - argmax(1) returns [batch,1] so we flatten before comparing
//
// Reference: Burn Book §5 (Training)

use anyhow::Result;
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::application::train_use_case::ExperimentConfig;
use crate::data::{
    batcher::{FaceBatch, FaceBatcher},
    dataset::FaceDataset,
};
use crate::domain::expression::{FaceSample, Split};
use crate::domain::history::StageHistory;
use crate::domain::param_groups::GroupPlan;
use crate::domain::schedule::{next_after_stage, should_validate, BestAccuracy, StageOutcome};
use crate::domain::traits::FoldSource;
use crate::infra::{checkpoint::CheckpointStore, history::HistoryRecorder};
use crate::ml::backend::{select_device, CpuBackend, GpuBackend, SelectedDevice};
use crate::ml::evaluator::{evaluate, to_classes};
use crate::ml::model::{Ensemble, EnsembleConfig, EnsembleSnapshot};
use crate::ml::optim::StageOptimizer;

type Loader<B> = Arc<dyn DataLoader<B, FaceBatch<B>>>;

/// Best ensemble validation accuracy of every stage of one fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldSummary {
    /// 1-based, as in the `Fold-NN` directory name.
    pub fold:           usize,
    pub stage_accuracy: Vec<f64>,
}

impl FoldSummary {
    pub fn final_accuracy(&self) -> Option<f64> {
        self.stage_accuracy.last().copied()
    }
}

/// Pick the backend from `cfg.device` and train every fold on it.
pub fn run_training<S: FoldSource>(cfg: &ExperimentConfig, source: &S) -> Result<Vec<FoldSummary>> {
    match select_device(cfg.device)? {
        SelectedDevice::Gpu(device) => {
            tracing::info!("Using WGPU device: {:?}", device);
            Scheduler::<GpuBackend, S>::new(cfg, source, device).run()
        }
        SelectedDevice::Cpu(device) => {
            tracing::info!("Using NdArray device: {:?}", device);
            Scheduler::<CpuBackend, S>::new(cfg, source, device).run()
        }
    }
}

pub struct Scheduler<'a, B: AutodiffBackend, S: FoldSource> {
    cfg:         &'a ExperimentConfig,
    source:      &'a S,
    device:      B::Device,
    loss_fn:     CrossEntropyLoss<B>,
    val_loss_fn: CrossEntropyLoss<B::InnerBackend>,
}

impl<'a, B: AutodiffBackend, S: FoldSource> Scheduler<'a, B, S> {
    pub fn new(cfg: &'a ExperimentConfig, source: &'a S, device: B::Device) -> Self {
        Self {
            cfg,
            source,
            loss_fn:     CrossEntropyLossConfig::new().init(&device),
            val_loss_fn: CrossEntropyLossConfig::new().init(&device),
            device,
        }
    }

    pub fn run(&self) -> Result<Vec<FoldSummary>> {
        let folds = self.source.num_folds();
        let mut summaries = Vec::with_capacity(folds);
        for fold in 0..folds {
            let summary = self.run_fold(fold)?;
            tracing::info!(
                "Fold {}/{} done: best ensemble accuracy per stage {:?}",
                fold + 1,
                folds,
                summary.stage_accuracy,
            );
            summaries.push(summary);
        }
        tracing::info!("Training complete!");
        Ok(summaries)
    }

    fn run_fold(&self, fold: usize) -> Result<FoldSummary> {
        // ── INIT_FOLD ─────────────────────────────────────────────────────────
        let store    = CheckpointStore::new(self.cfg.saved_networks_dir(fold));
        let recorder = HistoryRecorder::new(self.cfg.fold_dir(fold));

        let val_samples = self.source.load(fold, Split::Validation, 1)?;
        tracing::info!("Fold {}: {} validation samples", fold + 1, val_samples.len());
        let val_loader = build_loader::<B::InnerBackend>(
            val_samples,
            self.cfg.batch_size,
            self.cfg.num_workers,
            self.device.clone(),
            None,
        );

        let mut ensemble = EnsembleConfig::default().init::<B>(&self.device);
        ensemble.add_branch();

        let mut stage_accuracy = Vec::with_capacity(self.cfg.target_branches);
        loop {
            let (trained, best_acc) = self.train_stage(fold, ensemble, &val_loader, &store, &recorder)?;
            ensemble = trained;
            stage_accuracy.push(best_acc);

            match next_after_stage(ensemble.size(), self.cfg.target_branches) {
                // ── GROW ──────────────────────────────────────────────────────
                StageOutcome::Grow => {
                    ensemble.add_branch();
                    tracing::info!("Fold {}: ensemble grown to {} branches", fold + 1, ensemble.size());
                }
                // ── DONE_FOLD ─────────────────────────────────────────────────
                StageOutcome::DoneFold => break,
            }
        }

        Ok(FoldSummary { fold: fold + 1, stage_accuracy })
    }

    /// Train the newest stage of `ensemble` for its full budget and
    /// return it restored to the best validated snapshot.
    fn train_stage(
        &self,
        fold:       usize,
        ensemble:   Ensemble<B>,
        val_loader: &Loader<B::InnerBackend>,
        store:      &CheckpointStore,
        recorder:   &HistoryRecorder,
    ) -> Result<(Ensemble<B>, f64)> {
        // ── TRAIN_STAGE ───────────────────────────────────────────────────────
        let stage  = ensemble.size();
        let budget = self.cfg.stage_budget().epochs_for(stage);
        let plan   = GroupPlan::for_stage(self.cfg.base_lr, stage);
        tracing::info!(
            "Fold {}, stage {}: {} epochs, {} trainable groups",
            fold + 1,
            stage,
            budget,
            plan.trainable_count(),
        );
        let mut optim = StageOptimizer::<B>::new(plan, self.cfg.momentum, self.cfg.step_decay(), stage);

        let train_samples = self.source.load(fold, Split::TrainingLabeled, stage)?;
        tracing::info!("Fold {}, stage {}: {} training samples", fold + 1, stage, train_samples.len());
        let shuffle_seed = self.cfg.seed.wrapping_add((fold * 1000 + stage) as u64);
        let train_loader = build_loader::<B>(
            train_samples,
            self.cfg.batch_size,
            self.cfg.num_workers,
            self.device.clone(),
            Some(shuffle_seed),
        );

        let mut ensemble = ensemble;
        let mut history  = StageHistory::new(stage);
        let mut best_acc = BestAccuracy::new();
        let mut best: Option<EnsembleSnapshot<B>> = None;

        for epoch in 0..budget {
            optim.begin_epoch(epoch);

            let mut loss_sum = 0.0f64;
            let mut steps    = 0usize;
            let mut seen     = 0usize;
            let mut corrects = vec![0usize; stage];

            for batch in train_loader.iter() {
                let labels  = to_classes(batch.labels.clone())?;
                let outputs = ensemble.forward(batch.images);

                let mut total: Option<Tensor<B, 1>> = None;
                for (branch, logits) in outputs.into_iter().enumerate() {
                    let predicted = to_classes(logits.clone().argmax(1).flatten::<1>(0, 1))?;
                    corrects[branch] += predicted.iter().zip(&labels).filter(|(p, l)| p == l).count();

                    let loss = self.loss_fn.forward(logits, batch.labels.clone());
                    total = Some(match total {
                        Some(sum) => sum + loss,
                        None      => loss,
                    });
                }
                let Some(loss) = total else { continue };

                loss_sum += loss.clone().into_scalar().elem::<f64>();
                steps    += 1;
                seen     += labels.len();

                // One backward pass, every trainable group stepped
                ensemble = optim.step(ensemble, loss.backward());
            }

            let train_loss = loss_sum / steps.max(1) as f64;
            let train_acc: Vec<f64> = corrects
                .iter()
                .map(|&c| if seen == 0 { 0.0 } else { c as f64 / seen as f64 })
                .collect();
            tracing::info!(
                "[Fold {}, Branch {}, Epochs {}--{}] Loss: {:.4} Acc: {}",
                fold + 1,
                stage,
                epoch + 1,
                budget,
                train_loss,
                format_series(&train_acc),
            );

            if !should_validate(epoch, budget, self.cfg.validation_interval) {
                continue;
            }

            // ── VALIDATE ──────────────────────────────────────────────────────
            let report = evaluate(&ensemble.valid(), val_loader.iter(), &self.val_loss_fn, stage)?;
            history.record(train_loss, &train_acc, &report);

            let val_acc = report.ensemble_accuracy();
            tracing::info!(
                "Validation - Loss: {} Acc: {} Ensemble: {:.4}",
                format_series(&report.losses),
                format_series(&report.accuracies()),
                val_acc,
            );

            if best_acc.offer(val_acc) {
                let snapshot = ensemble.to_state_snapshot();
                store.persist(&snapshot, stage)?;
                best = Some(snapshot);
            }

            recorder.write(&history, stage)?;
        }

        // The next stage (or the caller) starts from the best weights.
        if let Some(snapshot) = &best {
            ensemble.restore(snapshot)?;
        }
        tracing::info!(
            "Fold {}, stage {} finished: best ensemble accuracy {:.4}",
            fold + 1,
            stage,
            best_acc.value(),
        );

        Ok((ensemble, best_acc.value()))
    }
}

pub(crate) fn build_loader<LB: Backend>(
    samples:     Vec<FaceSample>,
    batch_size:  usize,
    num_workers: usize,
    device:      LB::Device,
    shuffle:     Option<u64>,
) -> Loader<LB> {
    let mut builder = DataLoaderBuilder::<LB, FaceSample, FaceBatch<LB>>::new(FaceBatcher::new())
        .batch_size(batch_size)
        .set_device(device);
    if let Some(seed) = shuffle {
        builder = builder.shuffle(seed);
    }
    if num_workers > 0 {
        builder = builder.num_workers(num_workers);
    }
    builder.build(FaceDataset::new(samples))
}

fn format_series(values: &[f64]) -> String {
    let cells: Vec<String> = values.iter().map(|v| format!("{v:.4}")).collect();
    format!("[{}]", cells.join(", "))
}
