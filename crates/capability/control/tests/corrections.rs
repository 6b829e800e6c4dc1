use async_trait::async_trait;
use homepoll_control::{
    BridgeError, LightBridge, LightRules, LightState, apply_corrections, compute_corrections,
};
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::sync::Mutex;

fn rules() -> LightRules {
    LightRules::from_json_str(include_str!("../../../../config/settings.json")).expect("rules")
}

fn light(id: &str, name: &str, state: Value) -> LightState {
    let attributes = match state {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    LightState::from_attributes(id, name, attributes)
}

#[derive(Default)]
struct FakeBridge {
    lights: Vec<LightState>,
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, Map<String, Value>)>>,
    unavailable: bool,
}

impl FakeBridge {
    fn calls(&self) -> Vec<(String, Map<String, Value>)> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LightBridge for FakeBridge {
    async fn lights(&self) -> Result<Vec<LightState>, BridgeError> {
        if self.unavailable {
            return Err(BridgeError::Request("connection refused".to_string()));
        }
        Ok(self.lights.clone())
    }

    async fn set_state(&self, light_id: &str, attributes: &Map<String, Value>) -> Result<(), BridgeError> {
        self.calls
            .lock()
            .expect("lock")
            .push((light_id.to_string(), attributes.clone()));
        if self.failing.contains(light_id) {
            return Err(BridgeError::Rejected("device is off".to_string()));
        }
        Ok(())
    }
}

#[test]
fn unwanted_values_map_to_room_defaults() {
    let lights = vec![light(
        "1",
        "bedroom ceiling",
        json!({"on": true, "reachable": true, "ct": 366, "bri": 254}),
    )];
    let corrections = compute_corrections(&lights, &rules());
    assert_eq!(corrections.len(), 1);
    assert_eq!(corrections[0].light_id, "1");
    assert_eq!(corrections[0].room, "bedroom");
    assert_eq!(corrections[0].attributes.get("ct"), Some(&json!(447)));
    assert_eq!(corrections[0].attributes.get("bri"), Some(&json!(120)));
}

#[test]
fn only_matching_attributes_are_corrected() {
    let lights = vec![light(
        "1",
        "bedroom ceiling",
        json!({"on": true, "reachable": true, "ct": 366, "bri": 80}),
    )];
    let corrections = compute_corrections(&lights, &rules());
    assert_eq!(corrections.len(), 1);
    assert_eq!(corrections[0].attributes.len(), 1);
    assert!(corrections[0].attributes.contains_key("ct"));
}

#[test]
fn off_unreachable_or_unrelated_lights_are_left_alone() {
    let lights = vec![
        light("1", "bedroom ceiling", json!({"on": false, "reachable": true, "ct": 366})),
        light("2", "bedroom lamp", json!({"on": true, "reachable": false, "ct": 366})),
        light("3", "hallway", json!({"on": true, "reachable": true, "ct": 366})),
        light("4", "living corner", json!({"on": true, "reachable": true, "ct": 447})),
    ];
    assert!(compute_corrections(&lights, &rules()).is_empty());
}

#[tokio::test]
async fn one_call_per_corrected_light() {
    let bridge = FakeBridge {
        lights: vec![
            light("1", "bedroom ceiling", json!({"on": true, "reachable": true, "ct": 366})),
            light("2", "living corner", json!({"on": true, "reachable": true, "ct": 366})),
            light("3", "living floor", json!({"on": true, "reachable": true, "ct": 400})),
        ],
        ..FakeBridge::default()
    };
    let report = apply_corrections(&bridge, &rules()).await.expect("applied");
    assert_eq!(report.applied, 2);
    assert_eq!(report.failed, 0);

    let calls = bridge.calls();
    let ids: Vec<_> = calls.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2"]);
    assert_eq!(calls[1].1.get("ct"), Some(&json!(400)));
}

#[tokio::test]
async fn failing_light_does_not_block_others() {
    let bridge = FakeBridge {
        lights: vec![
            light("1", "bedroom ceiling", json!({"on": true, "reachable": true, "ct": 366})),
            light("2", "living corner", json!({"on": true, "reachable": true, "ct": 366})),
        ],
        failing: HashSet::from(["1".to_string()]),
        ..FakeBridge::default()
    };
    let report = apply_corrections(&bridge, &rules()).await.expect("applied");
    assert_eq!(report.applied, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(bridge.calls().len(), 2);
}

#[tokio::test]
async fn unavailable_bridge_is_reported() {
    let bridge = FakeBridge {
        unavailable: true,
        ..FakeBridge::default()
    };
    let err = apply_corrections(&bridge, &rules())
        .await
        .expect_err("bridge down");
    assert!(matches!(err, BridgeError::Request(_)));
    assert!(bridge.calls().is_empty());
}
