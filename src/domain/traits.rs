// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The scheduler only ever asks for "the samples of this split of
// this fold for this stage". Where they come from is somebody
// else's business:
//   - ImageFolderSource → CK+ style directory of class folders
//   - tests              → small in-memory sets

use anyhow::Result;

use crate::domain::expression::{FaceSample, Split};

// ─── FoldSource ───────────────────────────────────────────────────────────────
/// Any component that can hand out k-fold splits.
pub trait FoldSource {
    /// Samples of `split` for 0-based `fold` and 1-based `stage`.
    /// The validation split must not depend on `stage`.
    fn load(&self, fold: usize, split: Split, stage: usize) -> Result<Vec<FaceSample>>;

    /// Number of folds this source was partitioned into.
    fn num_folds(&self) -> usize;
}
