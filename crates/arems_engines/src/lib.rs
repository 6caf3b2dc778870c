#![forbid(unsafe_code)]

pub mod feedback;
pub mod notify;
pub mod progress;
