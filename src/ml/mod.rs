// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that builds, trains or scores the ensemble.
//
// Why isolate Burn code here?
//   - If Burn's API changes, we mostly update this layer
//   - The domain layer stays testable without tensors
//   - The network is clearly separated from data loading and
//     application logic
//
// What's in this layer:
//
//   model.rs     — Shared feature extractor + growing list of
//                  branch predictors, snapshot / restore
//
//   evaluator.rs — Per-branch loss and accuracy plus the
//                  majority-vote ensemble on the validation split
//
//   optim.rs     — SGD with momentum, one optimizer per component,
//                  frozen groups skipped
//
//   trainer.rs   — The fold / stage / epoch scheduler
//
//   backend.rs   — Wgpu or NdArray, chosen at start-up
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Ensemble architecture (extractor + branches)
pub mod model;

/// Validation pass and vote counting
pub mod evaluator;

/// Per-component learning rates
pub mod optim;

/// Staged k-fold training loop with checkpointing
pub mod trainer;

/// Device selection with CPU fallback
pub mod backend;
