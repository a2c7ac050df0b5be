//! # Misc Utilities
pub mod probability;
