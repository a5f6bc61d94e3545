use std::collections::BTreeMap;

use influx_sink::InfluxSink;
use poller::MetricsSink;
use types::MeasurementRecord;

fn record(measurement: &str, serial: &str) -> MeasurementRecord {
    let mut tags = BTreeMap::new();
    tags.insert("c_serialnumber".to_string(), serial.to_string());
    let mut fields = BTreeMap::new();
    fields.insert("power_ac".to_string(), 3000.0);
    MeasurementRecord {
        measurement: measurement.to_string(),
        tags,
        timestamp_ms: 1_700_000_000_000,
        fields,
    }
}

#[tokio::test]
async fn mock_sink_captures_batches_in_order() {
    let sink = InfluxSink::new_mock();

    sink.write(&[record("inverter", "7E1"), record("meter", "M1")])
        .await
        .expect("write");
    sink.write(&[record("inverter", "7E1")]).await.expect("write");

    let captured = sink.captured();
    assert_eq!(captured.len(), 3);
    assert_eq!(captured[0].measurement, "inverter");
    assert_eq!(captured[1].measurement, "meter");
    assert_eq!(captured[1].tags["c_serialnumber"], "M1");
    assert_eq!(captured[2].fields["power_ac"], 3000.0);
}

#[tokio::test]
async fn mock_sink_ping_is_always_reachable() {
    let sink = InfluxSink::new_mock();
    sink.ping().await.expect("ping");
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
    let sink = InfluxSink::new_mock();
    sink.write(&[]).await.expect("write");
    assert!(sink.captured().is_empty());
}
