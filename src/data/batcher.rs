// ============================================================
// Layer 4 — Face Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<FaceSample>
// into the tensors the ensemble consumes.
//
//   Input:  N samples, each H*W grayscale pixels
//   Output: images [N, 1, H, W] (float), labels [N] (int)
//
// All samples of a split share the same size (the loader resizes
// them), so the pixels are flattened into one Vec and reshaped.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::expression::FaceSample;

#[derive(Debug, Clone)]
pub struct FaceBatch<B: Backend> {
    /// Grayscale faces, shape: [batch_size, 1, height, width]
    pub images: Tensor<B, 4>,

    /// Ground truth class per face, shape: [batch_size]
    pub labels: Tensor<B, 1, Int>,
}

#[derive(Clone, Debug, Default)]
pub struct FaceBatcher;

impl FaceBatcher {
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> Batcher<B, FaceSample, FaceBatch<B>> for FaceBatcher {
    fn batch(&self, items: Vec<FaceSample>, device: &B::Device) -> FaceBatch<B> {
        let batch_size = items.len();
        let (height, width) = items
            .first()
            .map(|s| (s.height, s.width))
            .unwrap_or((0, 0));

        let pixels: Vec<f32> = items
            .iter()
            .flat_map(|s| s.pixels.iter().copied())
            .collect();

        let labels: Vec<i64> = items
            .iter()
            .map(|s| s.label as i64)
            .collect();

        let images = Tensor::<B, 1>::from_floats(pixels.as_slice(), device)
            .reshape([batch_size, 1, height, width]);

        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), device);

        FaceBatch { images, labels }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_batch_shapes_and_labels() {
        let device = Default::default();
        let items = vec![
            FaceSample::new(vec![0.0; 6], 2, 3, 4),
            FaceSample::new(vec![1.0; 6], 2, 3, 1),
        ];
        let batch: FaceBatch<TestBackend> = FaceBatcher::new().batch(items, &device);

        assert_eq!(batch.images.dims(), [2, 1, 2, 3]);
        let labels = batch.labels.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(labels, vec![4, 1]);

        let second: f32 = batch.images.slice([1..2, 0..1, 0..1, 0..1]).into_scalar().elem();
        assert_eq!(second, 1.0);
    }
}
