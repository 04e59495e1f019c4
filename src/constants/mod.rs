//! Constants used throughout the categorizer

pub mod minidump;
pub mod tuning;
