//! Background tasks owned by the broker process

pub mod sweeper;

pub use sweeper::{SweepConfig, SweepScheduler};
