//! Tensor names of a GPTQ linear layer and their storage roles
//!
//! A GPTQ-quantized linear layer is stored as up to five tensors under a
//! common prefix (e.g. `model.layers.0.mlp.down_proj.qweight`). Which of
//! them are bit-packed and which are stored transposed is a property of the
//! checkpoint format, independent of `group_size` and `desc_act`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::dtype::DType;
use crate::Error;

/// A tensor belonging to a GPTQ linear layer.
///
/// Ordering follows the declaration order, so sets of tensors iterate
/// deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GptqTensor {
    /// Packed int4 weights, `[in_features / 8, out_features]` as int32
    QWeight,
    /// Packed int4 zero-points, `[num_groups, out_features / 8]` as int32
    QZeros,
    /// Per-group scales, `[num_groups, out_features]`
    Scales,
    /// Input-channel to group index, `[in_features]`
    #[serde(rename = "g_idx")]
    GIdx,
    /// Optional bias, `[out_features]`
    Bias,
}

/// Tensors whose elements hold `pack_factor` sub-word values.
const PACKED: &[GptqTensor] = &[GptqTensor::QZeros];

/// Tensors stored with input/output dimensions swapped.
const TRANSPOSED: &[GptqTensor] = &[GptqTensor::QWeight, GptqTensor::QZeros, GptqTensor::Scales];

impl GptqTensor {
    /// All tensor kinds, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::QWeight,
        Self::QZeros,
        Self::Scales,
        Self::GIdx,
        Self::Bias,
    ];

    /// Checkpoint name suffix of this tensor.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QWeight => "qweight",
            Self::QZeros => "qzeros",
            Self::Scales => "scales",
            Self::GIdx => "g_idx",
            Self::Bias => "bias",
        }
    }

    /// Classify a bare or fully qualified weight name by its last component.
    ///
    /// `"model.layers.3.self_attn.o_proj.qzeros"` and `"qzeros"` both map to
    /// [`GptqTensor::QZeros`]. Returns `None` for names outside a GPTQ layer.
    #[must_use]
    pub fn from_weight_name(name: &str) -> Option<Self> {
        let suffix = name.rsplit('.').next().unwrap_or(name);
        Self::ALL.into_iter().find(|t| t.as_str() == suffix)
    }

    /// Whether the stored tensor bit-packs `pack_factor` values per element.
    #[must_use]
    pub fn is_packed(self) -> bool {
        PACKED.contains(&self)
    }

    /// Whether the stored tensor has its two dimensions swapped.
    #[must_use]
    pub fn is_transposed(self) -> bool {
        TRANSPOSED.contains(&self)
    }

    /// Element dtype of the tensor in a GPTQ checkpoint.
    #[must_use]
    pub const fn storage_dtype(self) -> DType {
        match self {
            Self::QWeight | Self::QZeros | Self::GIdx => DType::I32,
            Self::Scales | Self::Bias => DType::F16,
        }
    }
}

impl fmt::Display for GptqTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for GptqTensor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_weight_name(s).ok_or_else(|| Error::UnclassifiedTensor(s.to_string()))
    }
}

/// Whether the named tensor is bit-packed. Unknown names are not.
#[must_use]
pub fn is_packed(name: &str) -> bool {
    GptqTensor::from_weight_name(name).is_some_and(GptqTensor::is_packed)
}

/// Whether the named tensor is stored transposed. Unknown names are not.
#[must_use]
pub fn is_transposed(name: &str) -> bool {
    GptqTensor::from_weight_name(name).is_some_and(GptqTensor::is_transposed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_qzeros_is_packed() {
        for t in GptqTensor::ALL {
            assert_eq!(is_packed(t.as_str()), t == GptqTensor::QZeros, "{t}");
        }
    }

    #[test]
    fn test_transposed_tensors() {
        let transposed: Vec<_> = GptqTensor::ALL
            .into_iter()
            .filter(|t| is_transposed(t.as_str()))
            .collect();
        assert_eq!(
            transposed,
            vec![GptqTensor::QWeight, GptqTensor::QZeros, GptqTensor::Scales]
        );
    }

    #[test]
    fn test_qualified_names() {
        assert!(is_packed("model.layers.0.self_attn.q_proj.qzeros"));
        assert!(is_transposed("model.layers.31.mlp.down_proj.scales"));
        assert!(!is_transposed("model.layers.31.mlp.down_proj.g_idx"));
        assert_eq!(
            GptqTensor::from_weight_name("model.layers.0.mlp.up_proj.bias"),
            Some(GptqTensor::Bias)
        );
    }

    #[test]
    fn test_unknown_names() {
        assert!(!is_packed("model.norm.weight"));
        assert!(!is_transposed("lm_head.weight"));
        assert!(!is_packed(""));
        assert_eq!(GptqTensor::from_weight_name("qzeros_extra"), None);
        assert!(matches!(
            "model.embed_tokens.weight".parse::<GptqTensor>(),
            Err(Error::UnclassifiedTensor(_))
        ));
    }

    #[test]
    fn test_storage_dtype() {
        let dtypes: Vec<_> = GptqTensor::ALL.map(GptqTensor::storage_dtype).into();
        assert_eq!(
            dtypes,
            [DType::I32, DType::I32, DType::F16, DType::I32, DType::F16]
        );
    }

    #[test]
    fn test_serializes_as_checkpoint_name() {
        for t in GptqTensor::ALL {
            assert_eq!(serde_json::to_value(t).unwrap(), t.as_str());
        }
    }
}
