//! # Depth Arithmetic
//!
//! A family's depth counts weight layers: ``depth = per_block * n + fixed``,
//! where ``n >= 1`` is the number of blocks per stage.

use crate::errors::{ConfigError, ConfigResult};

/// Blocks per stage for a requested depth.
///
/// # Arguments
///
/// - `family`: family name, for the error.
/// - `depth`: requested depth.
/// - `per_block`: layers added by one more block in every stage.
/// - `fixed`: layers outside the blocks.
///
/// # Returns
///
/// ``(depth - fixed) / per_block``, or [`ConfigError::InvalidDepth`] naming the
/// nearest valid depths.
pub fn blocks_per_stage(
    family: &'static str,
    depth: usize,
    per_block: usize,
    fixed: usize,
) -> ConfigResult<usize> {
    let smallest = depth_for_blocks(1, per_block, fixed);
    if depth >= smallest && (depth - fixed) % per_block == 0 {
        return Ok((depth - fixed) / per_block);
    }

    // `below <= depth` cannot overflow; `above` can, for depths near `usize::MAX`.
    let (below, above) = if depth < smallest {
        (None, Some(smallest))
    } else {
        let n = (depth - fixed) / per_block;
        (
            Some(per_block * n + fixed),
            checked_depth_for_blocks(n + 1, per_block, fixed),
        )
    };
    Err(ConfigError::InvalidDepth {
        family,
        depth,
        per_block,
        fixed,
        below,
        above,
    })
}

/// Depth of a network with `num_blocks` blocks per stage.
///
/// Saturates at `usize::MAX`, which is never a valid depth for ``per_block > 1``.
pub fn depth_for_blocks(
    num_blocks: usize,
    per_block: usize,
    fixed: usize,
) -> usize {
    checked_depth_for_blocks(num_blocks, per_block, fixed).unwrap_or(usize::MAX)
}

/// Depth of a network with `num_blocks` blocks per stage, or `None` on overflow.
pub fn checked_depth_for_blocks(
    num_blocks: usize,
    per_block: usize,
    fixed: usize,
) -> Option<usize> {
    per_block.checked_mul(num_blocks)?.checked_add(fixed)
}
