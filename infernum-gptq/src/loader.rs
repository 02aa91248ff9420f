//! Extract raw GPTQ parameters from a key/value config source

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::{Error, Result};

/// Accepted keys for `weight_bits`, in lookup order.
pub const WEIGHT_BITS_KEYS: &[&str] = &["bits"];
/// Accepted keys for `group_size`, in lookup order.
pub const GROUP_SIZE_KEYS: &[&str] = &["group_size"];
/// Accepted keys for `desc_act`, in lookup order.
pub const DESC_ACT_KEYS: &[&str] = &["desc_act"];

/// A string-keyed source of config values.
pub trait ConfigSource {
    /// Look up a single key.
    fn get_value(&self, key: &str) -> Option<&Value>;
}

impl ConfigSource for Map<String, Value> {
    fn get_value(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }
}

impl ConfigSource for HashMap<String, Value> {
    fn get_value(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }
}

/// Non-object values have no keys.
impl ConfigSource for Value {
    fn get_value(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|m| m.get(key))
    }
}

/// Unvalidated parameters, as found in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawGptqParams {
    pub weight_bits: i64,
    pub group_size: i64,
    pub desc_act: bool,
}

/// Return the value of the first alias present in `source`.
///
/// # Errors
/// Returns [`Error::MissingConfigKey`] if none of `aliases` is present.
pub fn get_from_keys<'a>(
    source: &'a impl ConfigSource,
    parameter: &'static str,
    aliases: &'static [&'static str],
) -> Result<(&'static str, &'a Value)> {
    aliases
        .iter()
        .find_map(|&key| source.get_value(key).map(|v| (key, v)))
        .ok_or(Error::MissingConfigKey { parameter, aliases })
}

fn get_i64(
    source: &impl ConfigSource,
    parameter: &'static str,
    aliases: &'static [&'static str],
) -> Result<i64> {
    let (key, value) = get_from_keys(source, parameter, aliases)?;
    value
        .as_i64()
        .or_else(|| value.as_f64().and_then(integral_f64))
        .ok_or_else(|| Error::InvalidConfigValue {
            key: key.to_string(),
            expected: "an integer",
        })
}

/// `4.0` is accepted as `4`; fractional or out-of-range floats are not.
#[allow(clippy::cast_possible_truncation)]
fn integral_f64(f: f64) -> Option<i64> {
    #[allow(clippy::cast_precision_loss)]
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.fract() == 0.0 && in_range).then_some(f as i64)
}

fn get_bool(
    source: &impl ConfigSource,
    parameter: &'static str,
    aliases: &'static [&'static str],
) -> Result<bool> {
    let (key, value) = get_from_keys(source, parameter, aliases)?;
    value.as_bool().ok_or_else(|| Error::InvalidConfigValue {
        key: key.to_string(),
        expected: "a boolean",
    })
}

/// Read `weight_bits`, `group_size` and `desc_act` from `source`.
///
/// Values are only type-checked here; [`GptqConfig::new`](crate::GptqConfig::new)
/// validates them.
///
/// # Errors
/// Returns [`Error::MissingConfigKey`] or [`Error::InvalidConfigValue`].
pub fn load(source: &impl ConfigSource) -> Result<RawGptqParams> {
    let raw = RawGptqParams {
        weight_bits: get_i64(source, "weight_bits", WEIGHT_BITS_KEYS)?,
        group_size: get_i64(source, "group_size", GROUP_SIZE_KEYS)?,
        desc_act: get_bool(source, "desc_act", DESC_ACT_KEYS)?,
    };
    debug!(?raw, "Loaded GPTQ parameters");
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_load() {
        let source = json!({"bits": 4, "group_size": 128, "desc_act": true, "sym": false});
        let raw = load(&source).unwrap();
        assert_eq!(
            raw,
            RawGptqParams {
                weight_bits: 4,
                group_size: 128,
                desc_act: true,
            }
        );
    }

    #[test]
    fn test_load_does_not_validate() {
        let source = json!({"bits": 3, "group_size": -1, "desc_act": false});
        let raw = load(&source).unwrap();
        assert_eq!(raw.weight_bits, 3);
        assert_eq!(raw.group_size, -1);
    }

    #[test]
    fn test_load_from_hashmap() {
        let source: HashMap<String, Value> = [
            ("bits".to_string(), json!(4)),
            ("group_size".to_string(), json!(32)),
            ("desc_act".to_string(), json!(false)),
        ]
        .into_iter()
        .collect();
        assert_eq!(load(&source).unwrap().group_size, 32);
    }

    #[test]
    fn test_missing_keys() {
        let cases = [
            (json!({"group_size": 128, "desc_act": true}), "weight_bits"),
            (json!({"bits": 4, "desc_act": true}), "group_size"),
            (json!({"bits": 4, "group_size": 128}), "desc_act"),
        ];
        for (source, expected) in cases {
            match load(&source) {
                Err(Error::MissingConfigKey { parameter, .. }) => assert_eq!(parameter, expected),
                other => panic!("expected MissingConfigKey({expected}), got {other:?}"),
            }
        }
    }

    #[test]
    fn test_non_object_source_has_no_keys() {
        let source = json!([4, 128, true]);
        assert!(matches!(
            load(&source),
            Err(Error::MissingConfigKey {
                parameter: "weight_bits",
                ..
            })
        ));
    }

    #[test]
    fn test_wrong_types() {
        let source = json!({"bits": "4", "group_size": 128, "desc_act": true});
        assert!(matches!(
            load(&source),
            Err(Error::InvalidConfigValue { ref key, .. }) if key == "bits"
        ));

        let source = json!({"bits": 4, "group_size": 128.5, "desc_act": true});
        assert!(matches!(
            load(&source),
            Err(Error::InvalidConfigValue { ref key, .. }) if key == "group_size"
        ));

        let source = json!({"bits": 4, "group_size": 128, "desc_act": 1});
        assert!(matches!(
            load(&source),
            Err(Error::InvalidConfigValue { ref key, expected: "a boolean" }) if key == "desc_act"
        ));
    }

    #[test]
    fn test_integral_floats_coerce() {
        let source = json!({"bits": 4.0, "group_size": -1.0, "desc_act": false});
        let raw = load(&source).unwrap();
        assert_eq!(raw.weight_bits, 4);
        assert_eq!(raw.group_size, -1);

        let source = json!({"bits": 4, "group_size": 1e300, "desc_act": false});
        assert!(matches!(
            load(&source),
            Err(Error::InvalidConfigValue { ref key, .. }) if key == "group_size"
        ));
    }

    #[test]
    fn test_first_alias_wins() {
        static ALIASES: &[&str] = &["w_bit", "bits"];
        let source = json!({"bits": 8, "w_bit": 4});
        let (key, value) = get_from_keys(&source, "weight_bits", ALIASES).unwrap();
        assert_eq!(key, "w_bit");
        assert_eq!(value, &json!(4));

        let source = json!({"bits": 8});
        let (key, _) = get_from_keys(&source, "weight_bits", ALIASES).unwrap();
        assert_eq!(key, "bits");
    }
}
