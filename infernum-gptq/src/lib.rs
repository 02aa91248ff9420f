//! GPTQ quantization config resolution for Infernum
//!
//! Validates a GPTQ `quant_config.json`, describes how each tensor of a
//! quantized linear layer is stored, and decides how those tensors may be
//! split across tensor-parallel ranks.

pub mod config;
pub mod dtype;
pub mod error;
pub mod loader;
pub mod partition;
pub mod shard;
pub mod tensor;

pub use config::{GptqConfig, PER_CHANNEL_GROUP_SIZE, SUPPORTED_WEIGHT_BITS};
pub use dtype::DType;
pub use error::{Error, Result};
pub use loader::{ConfigSource, RawGptqParams};
pub use partition::{column_partitionable, ignored, overlapping, row_partitionable, TensorSet};
pub use shard::{
    plan_tensor_shard, shard_strategy, ParallelStyle, ShardConfig, ShardStrategy, TensorShard,
};
pub use tensor::{is_packed, is_transposed, GptqTensor};
