//! GPTQ quantization configuration

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::dtype::DType;
use crate::loader::{self, ConfigSource};
use crate::{partition, Error, Result};

/// Bit widths the int4 unpacking kernel can consume.
pub const SUPPORTED_WEIGHT_BITS: &[u32] = &[4];

/// `group_size` sentinel: one quantization group spans the whole row.
pub const PER_CHANNEL_GROUP_SIZE: i64 = -1;

/// Validated GPTQ quantization parameters.
///
/// Built once at model-load time and shared by reference with every
/// tensor-loading operation afterwards. All fields are read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GptqConfig {
    weight_bits: u32,
    group_size: i64,
    desc_act: bool,
    pack_factor: u32,
}

impl GptqConfig {
    /// File names a GPTQ checkpoint ships its quantization parameters in.
    pub const CONFIG_FILENAMES: &'static [&'static str] = &["quant_config.json"];

    /// Validate raw parameters.
    ///
    /// `group_size` is taken as-is; `-1` is the per-channel sentinel.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedBitWidth`] unless `weight_bits` is 4.
    pub fn new(weight_bits: i64, group_size: i64, desc_act: bool) -> Result<Self> {
        let bits = u32::try_from(weight_bits)
            .ok()
            .filter(|b| SUPPORTED_WEIGHT_BITS.contains(b))
            .ok_or(Error::UnsupportedBitWidth {
                got: weight_bits,
                supported: SUPPORTED_WEIGHT_BITS,
            })?;

        let config = Self {
            weight_bits: bits,
            group_size,
            desc_act,
            pack_factor: 32 / bits,
        };

        let overlap = partition::overlapping(&config);
        debug!(
            %config,
            pack_factor = config.pack_factor,
            ?overlap,
            "Resolved GPTQ config"
        );
        Ok(config)
    }

    /// Load and validate from a key/value source (e.g. a parsed
    /// `quant_config.json` object).
    ///
    /// # Errors
    /// Returns an error if a key is missing, has the wrong type, or the
    /// bit width is unsupported.
    pub fn from_config(source: &impl ConfigSource) -> Result<Self> {
        let raw = loader::load(source)?;
        Self::new(raw.weight_bits, raw.group_size, raw.desc_act)
    }

    /// Parse a JSON document and validate it.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed, not an object, or fails
    /// validation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let object = value.as_object().ok_or_else(|| Error::InvalidConfigValue {
            key: "<root>".to_string(),
            expected: "a JSON object",
        })?;
        Self::from_config(object)
    }

    /// Load configuration from a JSON file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or validated
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Short name of the quantization method.
    #[must_use]
    pub const fn name() -> &'static str {
        "gptq"
    }

    /// Activation dtypes the GPTQ kernels accept.
    #[must_use]
    pub const fn supported_act_dtypes() -> &'static [DType] {
        &[DType::F16]
    }

    #[must_use]
    pub const fn weight_bits(&self) -> u32 {
        self.weight_bits
    }

    #[must_use]
    pub const fn group_size(&self) -> i64 {
        self.group_size
    }

    #[must_use]
    pub const fn desc_act(&self) -> bool {
        self.desc_act
    }

    /// Number of quantized values packed into one 32-bit storage word.
    #[must_use]
    pub const fn pack_factor(&self) -> u32 {
        self.pack_factor
    }

    /// Whether one quantization group spans the entire row.
    #[must_use]
    pub const fn is_per_channel(&self) -> bool {
        self.group_size == PER_CHANNEL_GROUP_SIZE
    }

    /// Activation reordering combined with sub-row grouping. Rows of a
    /// shard no longer map to a contiguous range of groups.
    #[must_use]
    pub const fn has_act_order_groups(&self) -> bool {
        self.desc_act && !self.is_per_channel()
    }
}

impl fmt::Display for GptqConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GptqConfig(weight_bits={}, group_size={}, desc_act={})",
            self.weight_bits, self.group_size, self.desc_act
        )
    }
}
