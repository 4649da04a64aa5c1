// Use cases layer: round orchestration and the augmentation pipeline.

pub mod augmentation;
pub mod countdown;
pub mod results;
pub mod round;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use augmentation::{AugmentationJobRunner, JobError};
pub use results::ResultsAggregator;
pub use round::RoundSequencer;
pub use types::{AugmentSettings, RoundEvent, RoundSettings};
