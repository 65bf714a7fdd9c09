// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust types that describe the experiment: what a labelled
// face is, how folds are split, how branches vote, how the
// learning rate decays and which parameter groups train.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, traits and arithmetic
//
// Everything in here is unit tested without a GPU.

// Expression classes, labelled samples and dataset splits
pub mod expression;

// Error taxonomy shared by every layer
pub mod error;

// Majority-vote bookkeeping for the evaluator
pub mod votes;

// Step decay, validation cadence and stage transitions
pub mod schedule;

// Optimizer parameter-group plans
pub mod param_groups;

// Per-stage loss/accuracy series
pub mod history;

// Core abstractions (traits) that other layers implement
pub mod traits;
