// Draft order computation.

pub mod order;
pub mod pick;

pub use order::{DraftOrderCalculator, ResolutionResult};
pub use pick::{DraftPick, PickReason};
