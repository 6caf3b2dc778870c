#![forbid(unsafe_code)]

pub mod access;
pub mod config;
pub mod dashboard;
pub mod service;
