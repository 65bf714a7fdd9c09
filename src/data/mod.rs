// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From a folder of face images to tensor batches:
//
//   class folders
//       │
//       ▼
//   ImageFolderSource → decodes, grayscales, resizes once
//       │
//       ▼
//   KFoldSplitter     → fold / stage membership of each sample
//       │
//       ▼
//   FaceDataset       → implements Burn's Dataset trait
//       │
//       ▼
//   FaceBatcher       → stacks samples into [N, 1, H, W] batches
//       │
//       ▼
//   DataLoader        → worker pool prefetching batches
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads class folders of face images into memory
pub mod loader;

/// Implements Burn's Dataset trait for face samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded k-fold and labelled-partition assignment
pub mod splitter;
