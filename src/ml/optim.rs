// ============================================================
// Layer 5 — Stage Optimizer
// ============================================================
// SGD with momentum, one optimizer per component so every group
// carries its own learning rate. A single backward pass is split
// across the groups with GradientsParams::from_module.
//
//   lr(group, epoch) = base_lr(group) · gamma^(epoch / step)
//
// Groups whose base rate is 0 are frozen and never stepped. The
// whole thing is rebuilt from a GroupPlan at every stage, so no
// momentum state leaks from one stage into the next.

use burn::{
    optim::{
        adaptor::OptimizerAdaptor,
        momentum::MomentumConfig,
        GradientsParams, Optimizer, Sgd, SgdConfig,
    },
    tensor::backend::AutodiffBackend,
};

use crate::domain::param_groups::{Component, GroupPlan};
use crate::domain::schedule::StepDecay;
use crate::ml::model::{BranchPredictor, Ensemble, FeatureExtractor};

type ComponentOptimizer<B, M> = OptimizerAdaptor<Sgd<<B as AutodiffBackend>::InnerBackend>, M, B>;

pub struct StageOptimizer<B: AutodiffBackend> {
    plan:      GroupPlan,
    decay:     StepDecay,
    epoch:     usize,
    extractor: ComponentOptimizer<B, FeatureExtractor<B>>,
    branches:  Vec<ComponentOptimizer<B, BranchPredictor<B>>>,
}

impl<B: AutodiffBackend> StageOptimizer<B> {
    pub fn new(plan: GroupPlan, momentum: f64, decay: StepDecay, ensemble_size: usize) -> Self {
        let sgd = sgd_config(momentum);
        Self {
            plan,
            decay,
            epoch:     0,
            extractor: sgd.init(),
            branches:  (0..ensemble_size).map(|_| sgd.init()).collect(),
        }
    }

    pub fn plan(&self) -> &GroupPlan {
        &self.plan
    }

    /// Move the step-decay schedule to 0-based `epoch` of the stage.
    pub fn begin_epoch(&mut self, epoch: usize) {
        self.epoch = epoch;
    }

    pub fn lr_of(&self, component: Component) -> f64 {
        self.decay.lr_at(self.plan.base_lr_of(component), self.epoch)
    }

    /// Apply one optimizer step to every trainable group.
    pub fn step(&mut self, mut ensemble: Ensemble<B>, mut grads: B::Gradients) -> Ensemble<B> {
        let lr = self.lr_of(Component::Extractor);
        if lr > 0.0 {
            let g = GradientsParams::from_module(&mut grads, &ensemble.extractor);
            ensemble.extractor = self.extractor.step(lr, ensemble.extractor, g);
        }

        let branches = std::mem::take(&mut ensemble.branches);
        let mut stepped = Vec::with_capacity(branches.len());
        for (i, branch) in branches.into_iter().enumerate() {
            let lr = self.lr_of(Component::Branch(i));
            let branch = match self.branches.get_mut(i) {
                Some(optim) if lr > 0.0 => {
                    let g = GradientsParams::from_module(&mut grads, &branch);
                    optim.step(lr, branch, g)
                }
                _ => branch,
            };
            stepped.push(branch);
        }
        ensemble.branches = stepped;

        ensemble
    }
}

fn sgd_config(momentum: f64) -> SgdConfig {
    SgdConfig::new().with_momentum(Some(
        MomentumConfig::new()
            .with_momentum(momentum)
            .with_dampening(0.0)
            .with_nesterov(false),
    ))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::nn::loss::CrossEntropyLossConfig;
    use burn::prelude::*;
    use burn::tensor::Distribution;

    use crate::ml::model::EnsembleConfig;

    type TrainBackend = Autodiff<NdArray>;

    fn weights(conv: &burn::nn::conv::Conv2d<TrainBackend>) -> Vec<f32> {
        conv.weight.val().into_data().to_vec::<f32>().unwrap()
    }

    fn train_step(plan: GroupPlan, branches: usize) -> (Ensemble<TrainBackend>, Ensemble<TrainBackend>) {
        let device = Default::default();
        let mut model = EnsembleConfig::default().init::<TrainBackend>(&device);
        for _ in 0..branches {
            model.add_branch();
        }
        let before = model.clone();

        let images = Tensor::<TrainBackend, 4>::random([4, 1, 48, 48], Distribution::Uniform(0.0, 1.0), &device);
        let labels = Tensor::<TrainBackend, 1, Int>::from_ints([0, 1, 2, 3], &device);
        let ce = CrossEntropyLossConfig::new().init(&device);

        let loss = model
            .forward(images)
            .into_iter()
            .map(|logits| ce.forward(logits, labels.clone()))
            .reduce(|a, b| a + b)
            .unwrap();

        let mut optim = StageOptimizer::new(plan, 0.9, StepDecay::new(250, 0.5), branches);
        optim.begin_epoch(0);
        let after = optim.step(model, loss.backward());
        (before, after)
    }

    #[test]
    fn test_joint_stage_updates_extractor_and_branch() {
        let (before, after) = train_step(GroupPlan::joint(0.1), 1);
        assert_ne!(weights(&before.extractor.conv1), weights(&after.extractor.conv1));
        assert_ne!(weights(&before.branches[0].conv1), weights(&after.branches[0].conv1));
    }

    #[test]
    fn test_frozen_groups_do_not_move() {
        let (before, after) = train_step(GroupPlan::newest_only(0.1, 2), 2);

        assert_eq!(weights(&before.extractor.conv1), weights(&after.extractor.conv1));
        assert_eq!(weights(&before.extractor.conv3), weights(&after.extractor.conv3));
        assert_eq!(weights(&before.branches[0].conv2), weights(&after.branches[0].conv2));
        assert_ne!(weights(&before.branches[1].conv2), weights(&after.branches[1].conv2));
        assert_eq!(after.size(), 2);
    }

    #[test]
    fn test_learning_rates_follow_plan_and_decay() {
        let mut optim = StageOptimizer::<TrainBackend>::new(
            GroupPlan::newest_only(0.1, 3),
            0.9,
            StepDecay::new(250, 0.5),
            3,
        );
        optim.begin_epoch(500);
        assert_eq!(optim.lr_of(Component::Branch(2)), 0.025);
        assert_eq!(optim.lr_of(Component::Branch(0)), 0.0);
        assert_eq!(optim.lr_of(Component::Extractor), 0.0);
        assert_eq!(optim.plan().trainable_count(), 1);
    }
}
