//! Tensor parallelism for GPTQ layers
//!
//! Turns the partition sets from [`crate::partition`] into one concrete
//! decision per tensor, and maps that decision onto the stored (possibly
//! transposed, possibly packed) tensor a weight loader actually slices.

use serde::Serialize;
use tracing::debug;

use crate::config::GptqConfig;
use crate::partition;
use crate::tensor::GptqTensor;
use crate::{Error, Result};

/// Describes this GPU's position in a tensor-parallel group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardConfig {
    /// This GPU's rank (`0..world_size`)
    pub rank: usize,
    /// Total number of GPUs in the tensor-parallel group
    pub world_size: usize,
}

impl ShardConfig {
    /// Compute the shard range for a dimension of size `dim`.
    ///
    /// Returns `(start, shard_size)` where the shard covers
    /// `[start .. start + shard_size)`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidShape`] if `dim` is not evenly divisible by
    /// `world_size`, or the rank is outside the group.
    pub fn shard_range(&self, dim: usize) -> Result<(usize, usize)> {
        if self.world_size == 0 || self.rank >= self.world_size {
            return Err(Error::InvalidShape(format!(
                "rank {} is outside a group of world_size {}",
                self.rank, self.world_size
            )));
        }
        if dim % self.world_size != 0 {
            return Err(Error::InvalidShape(format!(
                "Dimension {dim} is not evenly divisible by world_size {}",
                self.world_size
            )));
        }
        let shard_size = dim / self.world_size;
        Ok((self.rank * shard_size, shard_size))
    }
}

/// Which kind of parallel linear layer a tensor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParallelStyle {
    /// Output features are split; no all-reduce after matmul.
    /// Used for: `q_proj`, `k_proj`, `v_proj`, `gate_proj`, `up_proj`.
    Column,
    /// Input features are split; requires all-reduce after matmul.
    /// Used for: `o_proj`, `down_proj`.
    Row,
}

/// How a specific tensor should be sliced during loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardStrategy {
    /// Keep the full tensor on every rank.
    Replicate,
    /// Split along the output (column) dimension.
    Column,
    /// Split along the input (row) dimension.
    Row,
}

/// Resolve the single shard outcome for a tensor of a parallel layer.
///
/// Row-parallel layers split what [`partition::row_partitionable`] allows
/// and keep everything else whole, including ignored tensors. For
/// per-channel configs `g_idx` is both row-partitionable and ignored; the
/// row split wins so it stays aligned with `qweight` rows.
///
/// # Errors
/// Returns [`Error::UnclassifiedTensor`] if `name` is not a GPTQ layer tensor.
pub fn shard_strategy(
    config: &GptqConfig,
    style: ParallelStyle,
    name: &str,
) -> Result<ShardStrategy> {
    let tensor: GptqTensor = name.parse()?;
    let strategy = resolve(config, style, tensor);
    debug!(name, ?style, ?strategy, "Resolved GPTQ shard strategy");
    Ok(strategy)
}

fn resolve(config: &GptqConfig, style: ParallelStyle, tensor: GptqTensor) -> ShardStrategy {
    match style {
        ParallelStyle::Column if partition::column_partitionable(config).contains(&tensor) => {
            ShardStrategy::Column
        }
        ParallelStyle::Row if partition::row_partitionable(config).contains(&tensor) => {
            ShardStrategy::Row
        }
        ParallelStyle::Column | ParallelStyle::Row => ShardStrategy::Replicate,
    }
}

/// A slice of a stored tensor owned by one rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TensorShard {
    /// Axis of the stored tensor to slice.
    pub axis: usize,
    /// First stored index along `axis`.
    pub start: usize,
    /// Number of stored indices along `axis`.
    pub len: usize,
}

/// Stored axis a strategy slices.
///
/// The logical orientation is `[out_features, in_features]`: rows split the
/// input axis, columns the output axis. Transposed tensors swap the two.
fn stored_axis(tensor: GptqTensor, strategy: ShardStrategy, ndim: usize) -> Result<usize> {
    match ndim {
        1 => Ok(0),
        2 => {
            let logical = usize::from(strategy == ShardStrategy::Row);
            Ok(if tensor.is_transposed() {
                1 - logical
            } else {
                logical
            })
        }
        _ => Err(Error::InvalidShape(format!(
            "{tensor}: expected a 1D or 2D tensor, got {ndim}D"
        ))),
    }
}

/// Compute the slice of a stored tensor that `shard` should load.
///
/// Returns `None` when the tensor is replicated. A column split of a packed
/// tensor is computed over the unpacked length and must fall on
/// storage-word boundaries.
///
/// # Errors
/// Returns an error if `name` is unclassified, the shape has an unsupported
/// rank, or the sliced dimension does not divide across the group.
pub fn plan_tensor_shard(
    config: &GptqConfig,
    style: ParallelStyle,
    name: &str,
    stored_shape: &[usize],
    shard: &ShardConfig,
) -> Result<Option<TensorShard>> {
    let tensor: GptqTensor = name.parse()?;
    let strategy = resolve(config, style, tensor);
    if strategy == ShardStrategy::Replicate {
        return Ok(None);
    }

    let axis = stored_axis(tensor, strategy, stored_shape.len())?;
    let stored_len = stored_shape[axis];

    // Packed words run along the output axis, so only a column split
    // cuts through them.
    if !tensor.is_packed() || strategy != ShardStrategy::Column {
        let (start, len) = shard.shard_range(stored_len)?;
        return Ok(Some(TensorShard { axis, start, len }));
    }

    let pack_factor = config.pack_factor() as usize;
    let unpacked_len = stored_len.checked_mul(pack_factor).ok_or_else(|| {
        Error::InvalidShape(format!(
            "{name}: {stored_len} packed words overflow when unpacked"
        ))
    })?;
    let (start, len) = shard.shard_range(unpacked_len)?;
    if start % pack_factor != 0 || len % pack_factor != 0 {
        return Err(Error::InvalidShape(format!(
            "{name}: shard [{start}, {}) splits a packed {}-value word",
            start + len,
            pack_factor
        )));
    }
    Ok(Some(TensorShard {
        axis,
        start: start / pack_factor,
        len: len / pack_factor,
    }))
}
