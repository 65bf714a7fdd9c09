use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::domain::error::TrainingError;
use crate::domain::expression::NUM_CLASSES;

/// Channels of the shared feature map handed to every branch.
pub const SHARED_CHANNELS: usize = 64;

/// Smallest square input the layer stack accepts.
pub const MIN_INPUT_SIZE: usize = 42;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally, do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct EnsembleConfig {
    #[config(default = 1)]
    pub in_channels: usize,
    #[config(default = 8)]
    pub num_classes: usize,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self::new().with_num_classes(NUM_CLASSES)
    }
}

impl EnsembleConfig {
    /// A fresh ensemble with no branches yet.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Ensemble<B> {
        Ensemble {
            extractor:   self.init_extractor(device),
            branches:    Vec::new(),
            num_classes: self.num_classes,
        }
    }

    pub fn init_extractor<B: Backend>(&self, device: &B::Device) -> FeatureExtractor<B> {
        FeatureExtractor {
            conv1: Conv2dConfig::new([self.in_channels, 32], [5, 5]).init(device),
            conv2: Conv2dConfig::new([32, SHARED_CHANNELS], [3, 3]).init(device),
            conv3: Conv2dConfig::new([SHARED_CHANNELS, SHARED_CHANNELS], [3, 3]).init(device),
            bn1:   BatchNormConfig::new(32).init(device),
            bn2:   BatchNormConfig::new(SHARED_CHANNELS).init(device),
            bn3:   BatchNormConfig::new(SHARED_CHANNELS).init(device),
            pool:  max_pool(),
        }
    }

    pub fn init_branch<B: Backend>(&self, device: &B::Device) -> BranchPredictor<B> {
        branch_with_classes(self.num_classes, device)
    }
}

fn branch_with_classes<B: Backend>(num_classes: usize, device: &B::Device) -> BranchPredictor<B> {
    BranchPredictor {
        conv1:       Conv2dConfig::new([SHARED_CHANNELS, SHARED_CHANNELS], [3, 3]).init(device),
        conv2:       Conv2dConfig::new([SHARED_CHANNELS, SHARED_CHANNELS], [3, 3]).init(device),
        bn1:         BatchNormConfig::new(SHARED_CHANNELS).init(device),
        bn2:         BatchNormConfig::new(SHARED_CHANNELS).init(device),
        fc:          LinearConfig::new(SHARED_CHANNELS, num_classes).init(device),
        pool:        max_pool(),
        global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
    }
}

fn max_pool() -> MaxPool2d {
    MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init()
}

// ─── Shared Feature Extractor ─────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct FeatureExtractor<B: Backend> {
    pub conv1: Conv2d<B>,
    pub conv2: Conv2d<B>,
    pub conv3: Conv2d<B>,
    pub bn1:   BatchNorm<B>,
    pub bn2:   BatchNorm<B>,
    pub bn3:   BatchNorm<B>,
    pub pool:  MaxPool2d,
}

impl<B: Backend> FeatureExtractor<B> {
    /// [batch, 1, H, W] → [batch, 64, H', W']
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.bn1.forward(self.conv1.forward(x)));
        let x = self.pool.forward(relu(self.bn2.forward(self.conv2.forward(x))));
        self.pool.forward(relu(self.bn3.forward(self.conv3.forward(x))))
    }

    /// Shapes of every learnable tensor, in declaration order.
    pub fn param_shapes(&self) -> Vec<Vec<usize>> {
        let mut shapes = Vec::new();
        for conv in [&self.conv1, &self.conv2, &self.conv3] {
            push_conv(&mut shapes, conv);
        }
        for bn in [&self.bn1, &self.bn2, &self.bn3] {
            push_norm(&mut shapes, bn);
        }
        shapes
    }
}

// ─── Branch Predictor ─────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct BranchPredictor<B: Backend> {
    pub conv1:       Conv2d<B>,
    pub conv2:       Conv2d<B>,
    pub bn1:         BatchNorm<B>,
    pub bn2:         BatchNorm<B>,
    pub fc:          Linear<B>,
    pub pool:        MaxPool2d,
    pub global_pool: AdaptiveAvgPool2d,
}

impl<B: Backend> BranchPredictor<B> {
    /// Shared features [batch, 64, H', W'] → logits [batch, num_classes]
    pub fn forward(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(relu(self.bn1.forward(self.conv1.forward(features))));
        let x = self.global_pool.forward(relu(self.bn2.forward(self.conv2.forward(x))));
        let [batch, channels, _, _] = x.dims();
        self.fc.forward(x.reshape([batch, channels]))
    }

    pub fn param_shapes(&self) -> Vec<Vec<usize>> {
        let mut shapes = Vec::new();
        push_conv(&mut shapes, &self.conv1);
        push_conv(&mut shapes, &self.conv2);
        push_norm(&mut shapes, &self.bn1);
        push_norm(&mut shapes, &self.bn2);
        shapes.push(self.fc.weight.val().dims().to_vec());
        if let Some(bias) = &self.fc.bias {
            shapes.push(bias.val().dims().to_vec());
        }
        shapes
    }
}

fn push_conv<B: Backend>(shapes: &mut Vec<Vec<usize>>, conv: &Conv2d<B>) {
    shapes.push(conv.weight.val().dims().to_vec());
    if let Some(bias) = &conv.bias {
        shapes.push(bias.val().dims().to_vec());
    }
}

fn push_norm<B: Backend>(shapes: &mut Vec<Vec<usize>>, bn: &BatchNorm<B>) {
    shapes.push(bn.gamma.val().dims().to_vec());
    shapes.push(bn.beta.val().dims().to_vec());
}

// ─── Ensemble ─────────────────────────────────────────────────────────────────
/// Whether a forward pass updates batch-norm statistics.
/// Carried by the backend type: autodiff backends train, and
/// `valid()` yields the inference copy on the inner backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Training,
    Inference,
}

#[derive(Module, Debug)]
pub struct Ensemble<B: Backend> {
    pub extractor:   FeatureExtractor<B>,
    pub branches:    Vec<BranchPredictor<B>>,
    pub num_classes: usize,
}

impl<B: Backend> Ensemble<B> {
    pub fn size(&self) -> usize {
        self.branches.len()
    }

    pub fn mode(&self) -> ExecutionMode {
        if B::ad_enabled() { ExecutionMode::Training } else { ExecutionMode::Inference }
    }

    /// Append a freshly initialised branch on the extractor's device.
    pub fn add_branch(&mut self) {
        let device = self.extractor.conv1.weight.val().device();
        self.branches.push(branch_with_classes(self.num_classes, &device));
    }

    /// Extractor once, then every branch on the same feature map,
    /// in creation order.
    pub fn forward(&self, x: Tensor<B, 4>) -> Vec<Tensor<B, 2>> {
        let features = self.extractor.forward(x);
        self.branches
            .iter()
            .map(|branch| branch.forward(features.clone()))
            .collect()
    }

    pub fn to_state_snapshot(&self) -> EnsembleSnapshot<B> {
        EnsembleSnapshot {
            extractor: fork_extractor(&self.extractor),
            branches:  self.branches.iter().map(fork_branch).collect(),
        }
    }

    /// Replace every parameter with the snapshot's.
    /// Fails without touching the ensemble if the structure differs.
    pub fn restore(&mut self, snapshot: &EnsembleSnapshot<B>) -> Result<(), TrainingError> {
        if snapshot.branches.len() != self.size() {
            return Err(TrainingError::ShapeMismatch(format!(
                "snapshot has {} branches, ensemble has {}",
                snapshot.branches.len(),
                self.size(),
            )));
        }
        check_shapes("extractor", &self.extractor.param_shapes(), &snapshot.extractor.param_shapes())?;
        for (i, (current, saved)) in self.branches.iter().zip(&snapshot.branches).enumerate() {
            check_shapes(&format!("branch {}", i + 1), &current.param_shapes(), &saved.param_shapes())?;
        }

        self.extractor = fork_extractor(&snapshot.extractor);
        self.branches  = snapshot.branches.iter().map(fork_branch).collect();
        Ok(())
    }
}

pub(crate) fn check_shapes(
    what:     &str,
    expected: &[Vec<usize>],
    actual:   &[Vec<usize>],
) -> Result<(), TrainingError> {
    if expected != actual {
        return Err(TrainingError::ShapeMismatch(format!(
            "{what}: expected parameter shapes {expected:?}, found {actual:?}"
        )));
    }
    Ok(())
}

// Clones of a BatchNorm share one RunningState, so a copy is loaded
// into freshly initialised layers that own their own statistics.
fn fork_extractor<B: Backend>(extractor: &FeatureExtractor<B>) -> FeatureExtractor<B> {
    let weight = extractor.conv1.weight.val();
    let [_, in_channels, _, _] = weight.dims();
    EnsembleConfig::new()
        .with_in_channels(in_channels)
        .init_extractor::<B>(&weight.device())
        .load_record(extractor.clone().into_record())
}

fn fork_branch<B: Backend>(branch: &BranchPredictor<B>) -> BranchPredictor<B> {
    // Linear weights are [d_input, d_output]
    let weight = branch.fc.weight.val();
    let [_, num_classes] = weight.dims();
    branch_with_classes::<B>(num_classes, &weight.device()).load_record(branch.clone().into_record())
}

// ─── Snapshot ─────────────────────────────────────────────────────────────────
/// [extractor, branch 1, ..., branch N] at one point in training.
#[derive(Debug, Clone)]
pub struct EnsembleSnapshot<B: Backend> {
    pub extractor: FeatureExtractor<B>,
    pub branches:  Vec<BranchPredictor<B>>,
}

impl<B: Backend> EnsembleSnapshot<B> {
    /// Number of saved components (extractor included).
    pub fn len(&self) -> usize {
        self.branches.len() + 1
    }

    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }
}
