use ha_discovery::DiscoveryMapper;

#[test]
fn classify_common_fields() {
    let mapper = DiscoveryMapper::default();

    assert_eq!(mapper.classify("l1_voltage"), (Some("voltage"), "V"));
    assert_eq!(mapper.classify("l1_current"), (Some("current"), "A"));
    assert_eq!(mapper.classify("frequency"), (Some("frequency"), "Hz"));
    assert_eq!(mapper.classify("temperature"), (Some("temperature"), "°C"));
    assert_eq!(mapper.classify("power_ac"), (Some("power"), "W"));
    assert_eq!(mapper.classify("retrieval_time"), (Some("duration"), "s"));
}

#[test]
fn reactive_matches_before_generic_power() {
    let mapper = DiscoveryMapper::default();

    assert_eq!(
        mapper.classify("power_reactive"),
        (Some("reactive_power"), "var")
    );
    assert_eq!(
        mapper.classify("power_apparent"),
        (Some("apparent_power"), "VA")
    );
    assert_eq!(mapper.classify("power_factor"), (Some("power_factor"), "%"));
}

#[test]
fn efficiency_has_unit_but_no_class() {
    let mapper = DiscoveryMapper::default();
    assert_eq!(mapper.classify("efficiency"), (None, "%"));
}

#[test]
fn unknown_fields_are_unclassified() {
    let mapper = DiscoveryMapper::default();
    assert_eq!(mapper.classify("totally_unknown_field"), (None, ""));
}

#[test]
fn entry_synthesizes_stable_identifiers() {
    let mapper = DiscoveryMapper::default();
    let entry = mapper.entry("l1_voltage", "7E123456", "solaredge/7E123456");

    assert_eq!(entry.unique_id, "solaredge_7E123456_l1_voltage");
    assert_eq!(entry.state_topic, "solaredge/7E123456");
    assert_eq!(entry.state_class, "measurement");
    assert_eq!(entry.device.identifiers, "solaredge_7E123456");
    assert_eq!(entry.value_template, "{{ value_json.l1_voltage }}");
}

#[test]
fn entry_serializes_without_null_class() {
    let mapper = DiscoveryMapper::default();

    let classified = serde_json::to_value(mapper.entry("power_ac", "7E1", "t")).unwrap();
    assert_eq!(classified["device_class"], "power");
    assert_eq!(classified["unit_of_measurement"], "W");

    let unclassified = serde_json::to_value(mapper.entry("efficiency", "7E1", "t")).unwrap();
    assert!(unclassified.get("device_class").is_none());
    assert_eq!(unclassified["unit_of_measurement"], "%");
}

#[test]
fn config_topic_layout() {
    let mapper = DiscoveryMapper::default();
    assert_eq!(
        mapper.config_topic("7E123456", "power_ac"),
        "homeassistant/sensor/solaredge_7E123456/power_ac/config"
    );
}
