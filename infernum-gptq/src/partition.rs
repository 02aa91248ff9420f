//! Tensor-parallel partition policy for GPTQ layers
//!
//! Decides which tensors of a GPTQ linear layer may be split along rows
//! (input channels) or columns (output channels), and which the loader should
//! not expect a partition decision for.
//!
//! The row policy hinges on the combination of `desc_act` and grouping. With
//! activation reordering and sub-row groups, `g_idx` scatters input channels
//! across groups, so a contiguous row range on one rank maps to groups that
//! other ranks also need. There is no consistent row split in that case and
//! every row set is empty.
//!
//! All functions are total over a validated [`GptqConfig`] and deterministic.

use std::collections::BTreeSet;

use crate::config::GptqConfig;
use crate::tensor::GptqTensor;

/// A set of layer tensors, iterated in [`GptqTensor`] declaration order.
pub type TensorSet = BTreeSet<GptqTensor>;

/// Tensors that may be split along the input (row) dimension.
#[must_use]
pub fn row_partitionable(config: &GptqConfig) -> TensorSet {
    if config.has_act_order_groups() {
        return TensorSet::new();
    }
    if config.is_per_channel() {
        // One group per row: the permutation index shards with the rows.
        return TensorSet::from([GptqTensor::QWeight, GptqTensor::GIdx]);
    }
    TensorSet::from([GptqTensor::QWeight, GptqTensor::QZeros, GptqTensor::Scales])
}

/// Tensors that may be split along the output (column) dimension.
///
/// Output columns carry their own scales and zero-points, so this never
/// depends on grouping or activation order.
#[must_use]
pub fn column_partitionable(_config: &GptqConfig) -> TensorSet {
    TensorSet::from([
        GptqTensor::QWeight,
        GptqTensor::QZeros,
        GptqTensor::Scales,
        GptqTensor::Bias,
    ])
}

/// Tensors the loader should not expect a partition decision for.
///
/// Empty when activation order meets grouping: `g_idx` is then a mandatory,
/// fully replicated tensor rather than an ignorable one.
#[must_use]
pub fn ignored(config: &GptqConfig) -> TensorSet {
    if config.has_act_order_groups() {
        return TensorSet::new();
    }
    TensorSet::from([GptqTensor::GIdx])
}

/// Tensors reported as both row-partitionable and ignored.
///
/// Non-empty only for per-channel configs, where `g_idx` is in both sets.
/// The sets are kept as-is; callers decide which claim wins.
#[must_use]
pub fn overlapping(config: &GptqConfig) -> TensorSet {
    row_partitionable(config)
        .intersection(&ignored(config))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(group_size: i64, desc_act: bool) -> GptqConfig {
        GptqConfig::new(4, group_size, desc_act).unwrap()
    }

    #[test]
    fn test_act_order_with_groups_disables_row_split() {
        let c = config(128, true);
        assert!(row_partitionable(&c).is_empty());
        assert!(ignored(&c).is_empty());
        assert!(overlapping(&c).is_empty());
    }

    #[test]
    fn test_per_channel_rows() {
        for desc_act in [false, true] {
            let c = config(-1, desc_act);
            assert_eq!(
                row_partitionable(&c),
                TensorSet::from([GptqTensor::QWeight, GptqTensor::GIdx])
            );
            assert_eq!(ignored(&c), TensorSet::from([GptqTensor::GIdx]));
            assert_eq!(overlapping(&c), TensorSet::from([GptqTensor::GIdx]));
        }
    }

    #[test]
    fn test_grouped_without_act_order() {
        let c = config(32, false);
        assert_eq!(
            row_partitionable(&c),
            TensorSet::from([GptqTensor::QWeight, GptqTensor::QZeros, GptqTensor::Scales])
        );
        assert_eq!(ignored(&c), TensorSet::from([GptqTensor::GIdx]));
        assert!(overlapping(&c).is_empty());
    }

    #[test]
    fn test_row_set_order() {
        let names: Vec<_> = row_partitionable(&config(128, false))
            .into_iter()
            .map(GptqTensor::as_str)
            .collect();
        assert_eq!(names, ["qweight", "qzeros", "scales"]);
    }
}
