// ============================================================
// Layer 5 — Evaluator
// ============================================================
// One pass over the validation batches with the inference copy
// of the ensemble (no autodiff, running batch-norm statistics).
// Per branch: mean cross-entropy and top-1 hits. Ensemble:
// majority vote of the active branches, via VoteTally.
//
// run_evaluation reloads a persisted stage on the inference
// backend of the selected device and scores it against the
// validation split of its fold.

use anyhow::{anyhow, Context, Result};
use burn::{
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    prelude::*,
};

use crate::application::train_use_case::ExperimentConfig;
use crate::data::batcher::FaceBatch;
use crate::domain::expression::Split;
use crate::domain::traits::FoldSource;
use crate::domain::votes::{ValidationReport, VoteTally};
use crate::infra::checkpoint::CheckpointStore;
use crate::ml::backend::{select_device, CpuInferBackend, GpuInferBackend, SelectedDevice};
use crate::ml::model::{Ensemble, EnsembleConfig};
use crate::ml::trainer::build_loader;

pub fn evaluate<B: Backend>(
    model:           &Ensemble<B>,
    batches:         impl IntoIterator<Item = FaceBatch<B>>,
    loss_fn:         &CrossEntropyLoss<B>,
    active_branches: usize,
) -> Result<ValidationReport> {
    let active = active_branches.min(model.size());
    let mut tally = VoteTally::new(active, model.num_classes);

    for batch in batches {
        let labels = to_classes(batch.labels.clone())?;
        let outputs = model.forward(batch.images);

        let mut predictions = Vec::with_capacity(active);
        let mut losses      = Vec::with_capacity(active);
        for logits in outputs.into_iter().take(active) {
            predictions.push(to_classes(logits.clone().argmax(1).flatten::<1>(0, 1))?);
            let loss = loss_fn.forward(logits, batch.labels.clone());
            losses.push(loss.into_scalar().elem::<f64>());
        }

        tally.record_batch(&predictions, &losses, &labels);
    }

    Ok(tally.finish())
}

/// Int tensor → class indices on the host.
pub fn to_classes<B: Backend>(t: Tensor<B, 1, Int>) -> Result<Vec<usize>> {
    t.into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map(|v| v.into_iter().map(|c| c as usize).collect())
        .map_err(|e| anyhow!("Cannot read class indices: {e:?}"))
}

/// Score the networks saved for `stage` of 0-based `fold`.
pub fn run_evaluation<S: FoldSource>(
    cfg:    &ExperimentConfig,
    source: &S,
    fold:   usize,
    stage:  usize,
) -> Result<ValidationReport> {
    match select_device(cfg.device)? {
        SelectedDevice::Gpu(device) => evaluate_saved::<GpuInferBackend, S>(cfg, source, fold, stage, device),
        SelectedDevice::Cpu(device) => evaluate_saved::<CpuInferBackend, S>(cfg, source, fold, stage, device),
    }
}

fn evaluate_saved<B: Backend, S: FoldSource>(
    cfg:    &ExperimentConfig,
    source: &S,
    fold:   usize,
    stage:  usize,
    device: B::Device,
) -> Result<ValidationReport> {
    let store = CheckpointStore::new(cfg.saved_networks_dir(fold));
    let model = store
        .load::<B>(&EnsembleConfig::default(), stage, &device)
        .with_context(|| format!("Cannot restore stage {stage} of fold {}", fold + 1))?;

    let samples = source.load(fold, Split::Validation, stage)?;
    tracing::info!("Evaluating {} branches on {} validation samples", model.size(), samples.len());

    let loader  = build_loader::<B>(samples, cfg.batch_size, cfg.num_workers, device.clone(), None);
    let loss_fn = CrossEntropyLossConfig::new().init(&device);
    evaluate(&model, loader.iter(), &loss_fn, stage)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::nn::loss::CrossEntropyLossConfig;
    use burn::tensor::Distribution;

    use crate::ml::model::EnsembleConfig;

    type TestBackend = NdArray;

    fn batch(n: usize, labels: &[i64]) -> FaceBatch<TestBackend> {
        let device = Default::default();
        FaceBatch {
            images: Tensor::random([n, 1, 48, 48], Distribution::Uniform(0.0, 1.0), &device),
            labels: Tensor::from_ints(labels, &device),
        }
    }

    fn ensemble(branches: usize) -> Ensemble<TestBackend> {
        let device = Default::default();
        let mut e = EnsembleConfig::default().init::<TestBackend>(&device);
        for _ in 0..branches {
            e.add_branch();
        }
        e
    }

    #[test]
    fn test_report_lengths() {
        let device = Default::default();
        let model = ensemble(3);
        let loss_fn = CrossEntropyLossConfig::new().init(&device);

        let report = evaluate(&model, vec![batch(2, &[0, 1]), batch(2, &[2, 3])], &loss_fn, 3).unwrap();
        assert_eq!(report.losses.len(), 3);
        assert_eq!(report.corrects.len(), 4);
        assert_eq!(report.samples, 4);
        assert!(report.losses.iter().all(|l| l.is_finite() && *l > 0.0));
    }

    #[test]
    fn test_single_branch_ensemble_equals_branch() {
        let device = Default::default();
        let model = ensemble(1);
        let loss_fn = CrossEntropyLossConfig::new().init(&device);

        let report = evaluate(&model, vec![batch(4, &[0, 0, 1, 2])], &loss_fn, 1).unwrap();
        assert_eq!(report.corrects[0], report.corrects[1]);
    }

    #[test]
    fn test_active_branch_count_limits_voters() {
        let device = Default::default();
        let model = ensemble(3);
        let loss_fn = CrossEntropyLossConfig::new().init(&device);

        let report = evaluate(&model, vec![batch(2, &[5, 6])], &loss_fn, 2).unwrap();
        assert_eq!(report.losses.len(), 2);
        assert_eq!(report.corrects.len(), 3);
    }

    #[test]
    fn test_empty_validation_split() {
        let device = Default::default();
        let model = ensemble(2);
        let loss_fn = CrossEntropyLossConfig::new().init(&device);

        let report = evaluate(&model, Vec::new(), &loss_fn, 2).unwrap();
        assert_eq!(report.losses, vec![0.0, 0.0]);
        assert_eq!(report.corrects, vec![0, 0, 0]);
    }

    #[test]
    fn test_run_evaluation_scores_a_saved_stage() {
        use crate::data::loader::ImageFolderSource;
        use crate::domain::expression::FaceSample;
        use crate::ml::backend::DeviceChoice;

        let tmp = tempfile::tempdir().unwrap();
        let cfg = ExperimentConfig {
            experiment_root: tmp.path().to_string_lossy().into_owned(),
            experiment_name: "eval".to_string(),
            num_folds:       2,
            batch_size:      4,
            num_workers:     0,
            image_size:      48,
            device:          DeviceChoice::Cpu,
            ..Default::default()
        };
        let faces = (0..8).map(|i| FaceSample::new(vec![0.5; 48 * 48], 48, 48, i % 8)).collect();
        let source = ImageFolderSource::from_samples(faces, &cfg.folder_options());

        CheckpointStore::new(cfg.saved_networks_dir(0))
            .persist(&ensemble(2).to_state_snapshot(), 2)
            .unwrap();

        let report = run_evaluation(&cfg, &source, 0, 2).unwrap();
        assert_eq!(report.losses.len(), 2);
        assert_eq!(report.samples, 4);

        assert!(run_evaluation(&cfg, &source, 1, 2).is_err());
    }
}
