//! Utility functions and helpers

pub mod hexdump;
