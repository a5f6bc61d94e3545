use std::time::Duration;

use telemetry::{augment, has_model, is_plausible, round_decimals, ScaledValueDecoder};
use types::{RawReading, RawValue};

fn inverter_reading() -> RawReading {
    let mut raw = RawReading::new();
    raw.insert("c_manufacturer".into(), "SolarEdge".into());
    raw.insert("c_model".into(), "SE8K".into());
    raw.insert("c_serialnumber".into(), "7E123456".into());
    raw.insert("status".into(), RawValue::Integer(4));
    raw.insert("l1_voltage".into(), RawValue::Integer(2371));
    raw.insert("l2_voltage".into(), RawValue::Integer(2355));
    raw.insert("voltage_scale".into(), RawValue::Integer(-1));
    raw.insert("power_ac".into(), RawValue::Integer(3000));
    raw.insert("power_ac_scale".into(), RawValue::Integer(0));
    raw.insert("temperature".into(), RawValue::Integer(412));
    raw.insert("temperature_scale".into(), RawValue::Integer(-1));
    raw
}

#[test]
fn decode_applies_suffix_scale() {
    let mut decoder = ScaledValueDecoder::new();
    let normalized = decoder.decode(&inverter_reading());

    assert_eq!(normalized.fields["l1_voltage"], 237.1);
    assert_eq!(normalized.fields["l2_voltage"], 235.5);
    assert_eq!(normalized.fields["temperature"], 41.2);
    assert_eq!(normalized.fields["power_ac"], 3000.0);
}

#[test]
fn decode_prefers_suffix_over_exact_match() {
    let mut raw = RawReading::new();
    raw.insert("power_dc".into(), RawValue::Integer(500));
    raw.insert("dc_scale".into(), RawValue::Integer(1));
    raw.insert("power_dc_scale".into(), RawValue::Integer(2));

    let mut decoder = ScaledValueDecoder::new();
    let normalized = decoder.decode(&raw);
    assert_eq!(normalized.fields["power_dc"], 5000.0);
}

#[test]
fn decode_falls_back_to_exact_match() {
    let mut raw = RawReading::new();
    raw.insert("frequency".into(), RawValue::Integer(4999));
    raw.insert("frequency_scale".into(), RawValue::Integer(-2));

    let mut decoder = ScaledValueDecoder::new();
    let normalized = decoder.decode(&raw);
    assert_eq!(normalized.fields["frequency"], 49.99);
}

#[test]
fn decode_defaults_to_zero_scale() {
    let mut raw = RawReading::new();
    raw.insert("current".into(), RawValue::Integer(17));

    let mut decoder = ScaledValueDecoder::new();
    let normalized = decoder.decode(&raw);
    assert_eq!(normalized.fields["current"], 17.0);
}

#[test]
fn decode_excludes_scale_fields_and_passes_text_through() {
    let mut decoder = ScaledValueDecoder::new();
    let normalized = decoder.decode(&inverter_reading());

    assert!(!normalized.fields.contains_key("voltage_scale"));
    assert!(!normalized.fields.contains_key("temperature_scale"));
    assert_eq!(normalized.tags["c_model"], "SE8K");
    assert_eq!(normalized.tags["c_serialnumber"], "7E123456");
}

#[test]
fn redecoding_without_scale_keys_does_not_double_scale() {
    let mut decoder = ScaledValueDecoder::new();
    let first = decoder.decode(&inverter_reading());

    let mut as_raw = RawReading::new();
    for (name, value) in &first.fields {
        as_raw.insert(name.clone(), RawValue::Float(*value));
    }
    let second = decoder.decode(&as_raw);
    assert_eq!(second.fields["l1_voltage"], first.fields["l1_voltage"]);
    assert_eq!(second.fields["temperature"], first.fields["temperature"]);
}

#[test]
fn layout_is_rebuilt_when_key_set_changes() {
    let mut decoder = ScaledValueDecoder::new();
    let _ = decoder.decode(&inverter_reading());

    let mut raw = RawReading::new();
    raw.insert("power".into(), RawValue::Integer(42));
    raw.insert("power_scale".into(), RawValue::Integer(1));
    let normalized = decoder.decode(&raw);
    assert_eq!(normalized.fields["power"], 420.0);
}

#[test]
fn reboot_heuristic_rejects_zero_temperature_while_starting() {
    let mut raw = inverter_reading();
    raw.insert("status".into(), RawValue::Integer(1));
    raw.insert("temperature".into(), RawValue::Integer(0));
    assert!(!is_plausible(&raw));
}

#[test]
fn reboot_heuristic_accepts_nonzero_temperature_while_starting() {
    let mut raw = inverter_reading();
    raw.insert("status".into(), RawValue::Integer(1));
    assert!(is_plausible(&raw));
}

#[test]
fn reboot_heuristic_rejects_zero_l1_voltage_while_sleeping() {
    let mut raw = inverter_reading();
    raw.insert("status".into(), RawValue::Integer(0));
    raw.insert("l1_voltage".into(), RawValue::Integer(0));
    assert!(!is_plausible(&raw));
}

#[test]
fn running_status_is_accepted_even_with_zero_voltage() {
    let mut raw = inverter_reading();
    raw.insert("status".into(), RawValue::Integer(4));
    raw.insert("l1_voltage".into(), RawValue::Integer(0));
    assert!(is_plausible(&raw));
}

#[test]
fn empty_or_model_less_readings_are_rejected() {
    assert!(!is_plausible(&RawReading::new()));

    let mut raw = inverter_reading();
    raw.remove("c_model");
    assert!(!is_plausible(&raw));

    let mut raw = inverter_reading();
    raw.insert("c_model".into(), "".into());
    assert!(!is_plausible(&raw));
}

#[test]
fn model_gate_distinguishes_blank_from_present() {
    assert!(has_model(&inverter_reading()));
    assert!(!has_model(&RawReading::new()));

    let mut raw = inverter_reading();
    raw.insert("c_model".into(), "".into());
    assert!(!has_model(&raw));
}

#[test]
fn augment_adds_efficiency_and_retrieval_time() {
    let mut decoder = ScaledValueDecoder::new();
    let mut raw = inverter_reading();
    raw.insert("power_dc".into(), RawValue::Integer(3200));
    raw.insert("power_dc_scale".into(), RawValue::Integer(0));
    let mut normalized = decoder.decode(&raw);

    augment(&mut normalized, Duration::from_micros(123_456));
    assert_eq!(normalized.fields["retrieval_time"], 0.123456);
    assert_eq!(normalized.fields["efficiency"], 100.0 * 0.9375);
}

#[test]
fn augment_guards_zero_dc_power() {
    let mut decoder = ScaledValueDecoder::new();
    let mut raw = inverter_reading();
    raw.insert("power_dc".into(), RawValue::Integer(0));
    let mut normalized = decoder.decode(&raw);

    augment(&mut normalized, Duration::from_millis(5));
    assert_eq!(normalized.fields["efficiency"], 0.0);
}

#[test]
fn rounding_trims_float_noise() {
    assert_eq!(round_decimals(0.1 + 0.2, 8), 0.3);
    assert_eq!(round_decimals(237.10000000000002, 8), 237.1);
}
