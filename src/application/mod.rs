// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (running an experiment or scoring a saved stage).
//
// Rules for this layer:
//   - No tensor code here (that's Layer 5)
//   - No argument parsing or printing (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The k-fold training workflow and its configuration
pub mod train_use_case;

// Re-scoring of persisted networks
pub mod evaluate_use_case;
