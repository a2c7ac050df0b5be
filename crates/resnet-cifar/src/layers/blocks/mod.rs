//! # Miscellaneous Blocks
pub mod norm_act;
