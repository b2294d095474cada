#![allow(clippy::unwrap_used)]
// End-to-end tests for compiled attributes: read, write and notify paths.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{Value, json};

use blesim_core::{
    AttError, AttributeEngine, AttributeSet, CodecError, CoreError, DeviceConfig, NotifySink,
    StateStore,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn config(raw: Value) -> DeviceConfig {
    DeviceConfig::from_value(raw).unwrap()
}

fn compile(raw: Value, state: &StateStore) -> AttributeSet {
    AttributeEngine::default()
        .compile(&config(raw), state)
        .unwrap()
}

fn single(service: &str, characteristic: Value) -> Value {
    json!({
        "device": { "name": "TestDevice" },
        "services": [{ "uuid": service, "characteristics": [characteristic] }]
    })
}

fn collector() -> (NotifySink, Arc<Mutex<Vec<Bytes>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    let sink: NotifySink = Arc::new(move |payload| sink_seen.lock().push(payload));
    (sink, seen)
}

fn i16_at(payload: &Bytes) -> i16 {
    i16::from_le_bytes([payload[0], payload[1]])
}

// ── Read ────────────────────────────────────────────────────────────

#[test]
fn test_read_encodes_state_with_fixed_point_codec() {
    let state = StateStore::new();
    state.set("temperature", json!(12.34));
    let set = compile(
        single(
            "1234",
            json!({
                "uuid": "ABCD",
                "name": "Temperature",
                "properties": ["read"],
                "value": { "source": "state", "key": "temperature" },
                "codec": { "format": "fixedPointInt16", "scale": 0.01 }
            }),
        ),
        &state,
    );

    assert_eq!(set.len(), 1);
    let attribute = set.find("1234", "abcd").unwrap();
    assert_eq!(attribute.uuid(), "abcd");

    let payload = attribute.read(0).unwrap();
    assert_eq!(i16_at(&payload), 1234);

    assert_eq!(attribute.read(1).unwrap_err(), AttError::AttributeNotLong);
}

#[test]
fn test_read_uses_default_when_key_missing() {
    let state = StateStore::new();
    let set = compile(
        single(
            "1234",
            json!({
                "uuid": "abcd",
                "properties": ["read"],
                "value": { "source": "state", "key": "humidity", "default": 45 },
                "codec": { "format": "fixedPointInt16" }
            }),
        ),
        &state,
    );

    let payload = set.find("1234", "abcd").unwrap().read(0).unwrap();
    assert_eq!(i16_at(&payload), 45);
}

#[test]
fn test_read_literal_without_codec_passes_raw() {
    let set = compile(
        single(
            "180a",
            json!({
                "uuid": "2a29",
                "properties": ["read"],
                "value": { "source": "literal", "value": "Acme" }
            }),
        ),
        &StateStore::new(),
    );

    let payload = set.find("180A", "2A29").unwrap().read(0).unwrap();
    assert_eq!(payload.as_ref(), b"Acme");
}

#[test]
fn test_read_encode_failure_reports_unlikely_error() {
    let state = StateStore::new();
    state.set("temperature", json!("hot"));
    let set = compile(
        single(
            "1234",
            json!({
                "uuid": "abcd",
                "properties": ["read"],
                "value": { "source": "state", "key": "temperature" },
                "codec": { "format": "fixedPointInt16" }
            }),
        ),
        &state,
    );

    let err = set.find("1234", "abcd").unwrap().read(0).unwrap_err();
    assert_eq!(err, AttError::UnlikelyError);
}

#[test]
fn test_read_without_read_property_not_permitted() {
    let set = compile(
        single("1234", json!({ "uuid": "abcd", "properties": ["write"] })),
        &StateStore::new(),
    );
    assert_eq!(
        set.find("1234", "abcd").unwrap().read(0).unwrap_err(),
        AttError::ReadNotPermitted
    );
}

// ── Write ───────────────────────────────────────────────────────────

#[test]
fn test_write_decodes_and_runs_parse_to_state() {
    let state = StateStore::new();
    state.set("temperature", json!(0));
    let set = compile(
        single(
            "9999",
            json!({
                "uuid": "eeee",
                "name": "Command",
                "properties": ["write"],
                "codec": { "format": "utf8" },
                "onWrite": [{
                    "action": "parse", "type": "float",
                    "clamp": { "min": -10, "max": 10 },
                    "target": "state", "key": "temperature"
                }]
            }),
        ),
        &state,
    );

    set.find("9999", "eeee")
        .unwrap()
        .write(b"12.5", 0, false)
        .unwrap();
    assert_eq!(state.get("temperature"), Some(json!(10)));
}

#[test]
fn test_write_failures_are_contained() {
    let state = StateStore::new();
    let set = compile(
        single(
            "9999",
            json!({
                "uuid": "eeee",
                "properties": ["writeWithoutResponse"],
                "codec": { "format": "utf8" },
                "onWrite": [{ "action": "parse", "type": "int", "target": "state", "key": "level" }]
            }),
        ),
        &state,
    );
    let attribute = set.find("9999", "eeee").unwrap();

    assert_eq!(
        attribute.write(b"abc", 0, true).unwrap_err(),
        AttError::UnlikelyError
    );
    assert_eq!(
        attribute.write(b"1", 2, true).unwrap_err(),
        AttError::AttributeNotLong
    );
    assert!(state.is_empty());
}

#[test]
fn test_write_without_codec_passes_text_to_pipeline() {
    let state = StateStore::new();
    let set = compile(
        single(
            "9999",
            json!({
                "uuid": "eeee",
                "properties": ["write"],
                "onWrite": [{ "action": "parse", "type": "int", "target": "state", "key": "mode" }]
            }),
        ),
        &state,
    );

    set.find("9999", "eeee").unwrap().write(b"3", 0, false).unwrap();
    assert_eq!(state.get("mode"), Some(json!(3)));
}

// ── Notify ──────────────────────────────────────────────────────────

fn notify_on_change(state: &StateStore) -> AttributeSet {
    compile(
        single(
            "1234",
            json!({
                "uuid": "abcd",
                "properties": ["read", "notify"],
                "value": { "source": "state", "key": "temperature" },
                "codec": { "format": "fixedPointInt16", "scale": 0.1 },
                "notify": { "triggers": ["onChange"] }
            }),
        ),
        state,
    )
}

#[test]
fn test_notify_on_change_delivers_until_unsubscribed() {
    let state = StateStore::new();
    state.set("temperature", json!(20));
    let set = notify_on_change(&state);
    let attribute = set.find("1234", "abcd").unwrap();
    let (sink, seen) = collector();

    attribute.subscribe(sink).unwrap();
    assert_eq!(seen.lock().len(), 1);
    assert_eq!(i16_at(&seen.lock()[0]), 200);

    state.set("temperature", json!(21.5));
    state.set("temperature", json!(21.5));
    state.set("other", json!(1));
    assert_eq!(seen.lock().len(), 2);
    assert_eq!(i16_at(&seen.lock()[1]), 215);

    attribute.unsubscribe();
    state.set("temperature", json!(30));
    assert_eq!(seen.lock().len(), 2);
    assert!(!attribute.is_subscribed());
}

#[test]
fn test_notify_defaults_to_on_change_for_state_source() {
    let state = StateStore::new();
    state.set("level", json!(1));
    let set = compile(
        single(
            "1234",
            json!({
                "uuid": "abcd",
                "properties": ["notify"],
                "value": { "source": "state", "key": "level" },
                "codec": { "format": "fixedPointInt16" }
            }),
        ),
        &state,
    );
    let (sink, seen) = collector();
    set.find("1234", "abcd").unwrap().subscribe(sink).unwrap();

    state.set("level", json!(2));
    assert_eq!(seen.lock().len(), 2);
}

#[test]
fn test_shutdown_releases_store_listeners() {
    let state = StateStore::new();
    state.set("temperature", json!(20));
    let set = notify_on_change(&state);
    let (sink, _seen) = collector();
    set.find("1234", "abcd").unwrap().subscribe(sink).unwrap();
    assert_eq!(set.active_subscriptions(), 1);
    assert_eq!(state.listener_count(), 1);

    set.shutdown();
    assert_eq!(set.active_subscriptions(), 0);
    assert_eq!(state.listener_count(), 0);
}

#[test]
fn test_subscribe_requires_notify_property() {
    let set = compile(
        single("1234", json!({ "uuid": "abcd", "properties": ["read"] })),
        &StateStore::new(),
    );
    let (sink, _) = collector();
    assert_eq!(
        set.find("1234", "abcd").unwrap().subscribe(sink).unwrap_err(),
        AttError::RequestNotSupported
    );
}

#[tokio::test(start_paused = true)]
async fn test_timer_trigger_delivers_repeatedly() {
    let set = compile(
        single(
            "1234",
            json!({
                "uuid": "abcd",
                "properties": ["notify"],
                "value": { "source": "literal", "value": "tick" },
                "codec": { "format": "utf8" },
                "notify": { "triggers": ["timer"], "intervalMs": 15 }
            }),
        ),
        &StateStore::new(),
    );
    let attribute = set.find("1234", "abcd").unwrap();
    let (sink, seen) = collector();

    attribute.subscribe(sink).unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    let delivered = seen.lock().len();
    assert!(delivered >= 3, "only {delivered} notifications");

    attribute.unsubscribe();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(seen.lock().len(), delivered);
}

// ── Compile-time validation ─────────────────────────────────────────

#[test]
fn test_unknown_codec_rejected_at_compile_time() {
    let err = AttributeEngine::default()
        .compile(
            &config(single(
                "1234",
                json!({ "uuid": "abcd", "properties": ["read"], "codec": { "format": "bcd" } }),
            )),
            &StateStore::new(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Codec(CodecError::UnsupportedFormat(_))
    ));
    assert!(err.is_config());
}

#[test]
fn test_unknown_action_rejected_at_compile_time() {
    let err = AttributeEngine::default()
        .compile(
            &config(single(
                "1234",
                json!({ "uuid": "abcd", "properties": ["write"], "onWrite": [{ "action": "exec" }] }),
            )),
            &StateStore::new(),
        )
        .unwrap_err();
    assert!(err.is_config());
    assert!(err.to_string().contains("exec"), "{err}");
}

#[test]
fn test_timer_without_interval_rejected() {
    let err = AttributeEngine::default()
        .compile(
            &config(single(
                "1234",
                json!({
                    "uuid": "abcd",
                    "properties": ["notify"],
                    "value": { "source": "literal", "value": 1 },
                    "notify": { "triggers": ["timer"] }
                }),
            )),
            &StateStore::new(),
        )
        .unwrap_err();
    assert!(err.to_string().contains("intervalMs"), "{err}");
}

#[test]
fn test_on_change_requires_state_source() {
    let err = AttributeEngine::default()
        .compile(
            &config(single(
                "1234",
                json!({
                    "uuid": "abcd",
                    "properties": ["notify"],
                    "value": { "source": "literal", "value": 1 },
                    "notify": { "triggers": ["onChange"] }
                }),
            )),
            &StateStore::new(),
        )
        .unwrap_err();
    assert!(err.is_config());
}

#[test]
fn test_zero_scale_rejected_at_compile_time() {
    let err = AttributeEngine::default()
        .compile(
            &config(single(
                "1234",
                json!({
                    "uuid": "abcd",
                    "properties": ["read"],
                    "codec": { "format": "fixedPointInt16", "scale": 0 }
                }),
            )),
            &StateStore::new(),
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::Codec(CodecError::InvalidConfig(_))));
}

#[test]
fn test_descriptors_compiled_with_characteristic() {
    let set = compile(
        single(
            "1234",
            json!({
                "uuid": "abcd",
                "properties": ["read"],
                "descriptors": [
                    { "uuid": "2904", "value": { "format": "sint16", "exponent": -2, "unit": "celsius" } },
                    { "uuid": "2901", "value": "Temperature" }
                ]
            }),
        ),
        &StateStore::new(),
    );
    let attribute = set.find("1234", "abcd").unwrap();
    let descriptors = attribute.descriptors();
    assert_eq!(descriptors.len(), 2);
    assert_eq!(descriptors[0].value.len(), 7);
    assert_eq!(descriptors[1].value.as_ref(), b"Temperature");
}
