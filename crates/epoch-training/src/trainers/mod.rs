//! Built-in training backends.
//!
//! These are minimal local backends that exercise the full orchestration
//! protocol end to end. Heavier numerical backends plug in through the same
//! `Trainer` trait.

pub mod ensemble;
pub mod iterative;
pub mod reinforcement;

pub use ensemble::EnsembleTrainer;
pub use iterative::IterativeTrainer;
pub use reinforcement::ReinforcementTrainer;
