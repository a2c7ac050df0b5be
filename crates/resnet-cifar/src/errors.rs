//! # Configuration Errors
//!
//! Every error a network configuration can raise before any layer is built.
//! Construction is all-or-nothing: an `Err` here means no module was created.

use thiserror::Error;

/// Result alias for configuration checks.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A configuration that cannot be turned into a network.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The depth does not decompose as ``per_block * n + fixed`` for some ``n >= 1``.
    #[error(
        "{family}: depth {depth} is not {per_block}*n + {fixed} for any n >= 1 \
         (nearest valid depths: {below:?}, {above:?})"
    )]
    InvalidDepth {
        /// The model family being configured.
        family: &'static str,
        /// The requested depth.
        depth: usize,
        /// Layers contributed by each block.
        per_block: usize,
        /// Layers outside the blocks (stem, head).
        fixed: usize,
        /// The largest valid depth below the request, if any.
        below: Option<usize>,
        /// The smallest valid depth above the request, if it fits in `usize`.
        above: Option<usize>,
    },

    /// A stage with no blocks.
    #[error("stage must contain at least one block")]
    EmptyStage,

    /// A block type name that is neither `basic` nor `bottleneck`.
    #[error("unknown block type {0:?}; expected \"basic\" or \"bottleneck\"")]
    UnknownBlockType(String),

    /// An init mode name with no initializer behind it.
    #[error(
        "unknown init mode {0:?}; expected \"kaiming_fan_in\", \"kaiming_fan_out\" or \"xavier\""
    )]
    UnknownInitMode(String),

    /// A probability outside ``[0, 1)``.
    #[error("{name} must be in [0, 1), got {value}")]
    InvalidProbability {
        /// The offending field.
        name: &'static str,
        /// The offending value.
        value: f64,
    },

    /// Dropout requested on a block kind without a dropout slot.
    #[error("{0} blocks do not support dropout")]
    UnsupportedDropout(&'static str),

    /// A zero or non-divisible channel count.
    #[error("invalid channel count: {0}")]
    InvalidChannels(String),

    /// A zero block stride.
    #[error("{0} block stride must be > 0")]
    InvalidStride(&'static str),

    /// Two consecutive blocks whose planes do not chain.
    #[error("block[{prev}].out_planes({prev_out}) != block[{next}].in_planes({next_in})")]
    StageChannelMismatch {
        /// Index of the earlier block.
        prev: usize,
        /// Its output planes.
        prev_out: usize,
        /// Index of the later block.
        next: usize,
        /// Its input planes.
        next_in: usize,
    },

    /// A zero input resolution; every positive size reaches at least ``1x1``.
    #[error("image size must be > 0")]
    EmptyInput,

    /// The probed feature size disagrees with the last stage's width.
    #[error("probed feature size {probed} != expected feature size {expected}")]
    FeatureSizeMismatch {
        /// Size measured by the dummy forward pass.
        probed: usize,
        /// Size implied by the stage configuration.
        expected: usize,
    },

    /// A prefab name with no registered configuration.
    #[error("unknown prefab {name:?}; available: {available:?}")]
    UnknownPrefab {
        /// The requested name.
        name: String,
        /// Every registered name.
        available: Vec<&'static str>,
    },
}
