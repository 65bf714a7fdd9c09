use burn::data::dataset::Dataset;

use crate::domain::expression::FaceSample;

/// In-memory split of labelled faces, indexable by burn's DataLoader.
pub struct FaceDataset {
    samples: Vec<FaceSample>,
}

impl FaceDataset {
    pub fn new(samples: Vec<FaceSample>) -> Self { Self { samples } }
}

impl Dataset<FaceSample> for FaceDataset {
    fn get(&self, index: usize) -> Option<FaceSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
