#![forbid(unsafe_code)]

pub mod common;
pub mod evaluation;
pub mod message;
pub mod orientee;
pub mod profile;
pub mod progress;
pub mod task;
pub mod training;

pub use common::{
    ContractViolation, MonotonicTimeNs, Rating, ReasonCodeId, SchemaVersion, Validate,
};
