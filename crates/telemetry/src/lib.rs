#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tracing::debug;

use types::{NormalizedReading, RawReading, RawValue};

/// Decimal digits kept on scaled field values. Keeps floating-point noise
/// out of persisted output; the exact count is a tuning knob, not a
/// correctness requirement.
const FIELD_DECIMALS: i32 = 8;

/// Decimal digits on the AC/DC ratio before it becomes a percentage.
const EFFICIENCY_DECIMALS: i32 = 4;

/// Decimal digits on `retrieval_time` (microsecond resolution).
const RETRIEVAL_TIME_DECIMALS: i32 = 6;

const SCALE_SUFFIX: &str = "_scale";

pub fn round_decimals(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Applies SunSpec-style scale factors to a raw reading.
///
/// Each numeric point `X` is multiplied by `10^s` where `s` comes from the
/// companion register named after `X`'s last underscore token
/// (`l1_voltage` -> `voltage_scale`), or failing that from an exact
/// `X_scale` key, or defaults to 0. The field-to-scale-key association is
/// computed once per observed key layout and reused across polls.
#[derive(Debug, Default)]
pub struct ScaledValueDecoder {
    layout: Option<ScaleLayout>,
}

#[derive(Debug)]
struct ScaleLayout {
    keys: BTreeSet<String>,
    scale_key: BTreeMap<String, Option<String>>,
}

impl ScaleLayout {
    fn build(raw: &RawReading) -> Self {
        let keys: BTreeSet<String> = raw.keys().cloned().collect();
        let mut scale_key = BTreeMap::new();

        for (name, value) in raw {
            if !value.is_numeric() || name.contains(SCALE_SUFFIX) {
                continue;
            }

            let suffix = name.rsplit('_').next().unwrap_or(name.as_str());
            let by_suffix = format!("{suffix}{SCALE_SUFFIX}");
            let exact = format!("{name}{SCALE_SUFFIX}");

            let resolved = if raw.contains_key(&by_suffix) {
                Some(by_suffix)
            } else if raw.contains_key(&exact) {
                Some(exact)
            } else {
                None
            };
            scale_key.insert(name.clone(), resolved);
        }

        Self { keys, scale_key }
    }

    fn matches(&self, raw: &RawReading) -> bool {
        raw.len() == self.keys.len() && raw.keys().all(|key| self.keys.contains(key))
    }
}

impl ScaledValueDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, raw: &RawReading) -> NormalizedReading {
        if !self.layout.as_ref().is_some_and(|layout| layout.matches(raw)) {
            debug!(points = raw.len(), "rebuilding scale-factor layout");
            self.layout = Some(ScaleLayout::build(raw));
        }
        let layout = self.layout.as_ref().expect("layout built above");

        let mut normalized = NormalizedReading::default();
        for (name, value) in raw {
            match value {
                RawValue::Text(text) => {
                    normalized.tags.insert(name.clone(), text.clone());
                }
                _ if name.contains(SCALE_SUFFIX) => {}
                _ => {
                    let scale = layout
                        .scale_key
                        .get(name)
                        .and_then(|key| key.as_ref())
                        .and_then(|key| raw.get(key))
                        .and_then(RawValue::as_i64)
                        .unwrap_or(0);
                    let value = value.as_f64().unwrap_or(0.0);
                    let physical = value * 10f64.powi(scale as i32);
                    normalized
                        .fields
                        .insert(name.clone(), round_decimals(physical, FIELD_DECIMALS));
                }
            }
        }

        normalized
    }
}

/// Upper bound of the status range treated as off/sleeping/starting.
const STARTUP_STATUS_MAX: i64 = 2;

/// An empty reading or one whose model identifier is absent or blank
/// carries no usable identity. An unpowered block decodes all-NUL
/// strings, so presence of the key alone proves nothing.
pub fn has_model(raw: &RawReading) -> bool {
    !raw.is_empty()
        && raw
            .get("c_model")
            .and_then(RawValue::as_text)
            .is_some_and(|model| !model.is_empty())
}

/// Best-effort reboot-transient suppression, not a protocol guarantee.
///
/// A device reporting an off/sleeping/starting status while its
/// temperature or line-1 voltage reads exactly zero looks like a sample
/// captured mid-reboot and is dropped.
pub fn is_plausible(raw: &RawReading) -> bool {
    if !has_model(raw) {
        return false;
    }

    let status = raw.get("status").and_then(RawValue::as_i64);
    if let Some(status) = status {
        if (0..=STARTUP_STATUS_MAX).contains(&status)
            && (truncates_to_zero(raw, "temperature") || truncates_to_zero(raw, "l1_voltage"))
        {
            return false;
        }
    }

    true
}

fn truncates_to_zero(raw: &RawReading, name: &str) -> bool {
    raw.get(name)
        .and_then(RawValue::as_f64)
        .is_some_and(|value| value.trunc() == 0.0)
}

/// Adds synthetic fields to the primary inverter reading.
///
/// `retrieval_time` is the wall-clock duration of the poll. `efficiency`
/// is the AC/DC power ratio as a percentage; a non-positive `power_dc`
/// yields 0.0 by policy, which guards the division rather than stating a
/// physical truth.
pub fn augment(normalized: &mut NormalizedReading, elapsed: Duration) {
    normalized.fields.insert(
        "retrieval_time".to_string(),
        round_decimals(elapsed.as_secs_f64(), RETRIEVAL_TIME_DECIMALS),
    );

    let power_ac = normalized.fields.get("power_ac").copied();
    let power_dc = normalized.fields.get("power_dc").copied();
    let efficiency = match (power_ac, power_dc) {
        (Some(ac), Some(dc)) if dc > 0.0 => {
            100.0 * round_decimals(ac / dc, EFFICIENCY_DECIMALS)
        }
        _ => 0.0,
    };
    normalized.fields.insert("efficiency".to_string(), efficiency);
}
