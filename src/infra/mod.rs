// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the experiment directory:
//
//   checkpoint.rs — Saving and loading ensemble snapshots
//                   Uses Burn's CompactRecorder, one file for
//                   the shared extractor and one per branch,
//                   grouped by stage.
//
//   history.rs    — Loss/accuracy series of each stage as JSON
//                   arrays and a CSV table, plus the JSON helper
//                   used for the experiment config and summary.
//
// Reference: Burn Book §5 (Checkpointing)

/// Ensemble snapshot persistence
pub mod checkpoint;

/// Stage history arrays and JSON helpers
pub mod history;
