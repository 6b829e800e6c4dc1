use domain::{DecodeProfile, DeviceEntry, SensorMapping};
use homepoll_registry::{DeviceRegistry, RegistryError};

const SAMPLE: &str = include_str!("../../../../config/devices.json");

fn eep(func: u8, type_code: u8) -> DecodeProfile {
    DecodeProfile::Eep {
        rorg: 0xA5,
        func,
        type_code,
    }
}

#[test]
fn sample_registry_loads() {
    let registry = DeviceRegistry::from_json_str(SAMPLE).expect("sample registry");
    assert_eq!(registry.len(), 6);

    let entry = registry.lookup("05:87:1B:CA").expect("balcony sensor");
    assert_eq!(entry.profile, eep(0x04, 0x02));
    let names: Vec<_> = entry
        .sensors
        .iter()
        .map(|sensor| sensor.output_name.as_str())
        .collect();
    assert_eq!(names, vec!["balcony_temperature", "balcony_humidity"]);

    let weather = registry.lookup("openweather:2950159").expect("weather");
    assert_eq!(weather.profile, DecodeProfile::Passthrough);
}

#[test]
fn unknown_identity_is_not_found() {
    let registry = DeviceRegistry::from_json_str(SAMPLE).expect("sample registry");
    assert!(registry.lookup("FF:FF:FF:FF").is_none());
}

#[test]
fn duplicate_identity_is_rejected() {
    let err = DeviceRegistry::from_entries(vec![
        DeviceEntry::new(
            "01:80:F5:BC",
            eep(0x02, 0x05),
            vec![SensorMapping::numeric("TMP", "main_bedroom_temperature")],
        ),
        DeviceEntry::new(
            "01:80:F5:BC",
            eep(0x02, 0x05),
            vec![SensorMapping::numeric("TMP", "guest_temperature")],
        ),
    ])
    .expect_err("duplicate");
    assert!(matches!(err, RegistryError::DuplicateIdentity(id) if id == "01:80:F5:BC"));
}

#[test]
fn duplicate_output_name_is_rejected() {
    let err = DeviceRegistry::from_entries(vec![
        DeviceEntry::new(
            "01:80:F5:BC",
            eep(0x02, 0x05),
            vec![SensorMapping::numeric("TMP", "bedroom_temperature")],
        ),
        DeviceEntry::new(
            "05:8E:53:CB",
            eep(0x04, 0x01),
            vec![SensorMapping::numeric("TMP", "bedroom_temperature")],
        ),
    ])
    .expect_err("duplicate output");
    assert_eq!(err.to_string(), "duplicate output name: bedroom_temperature");
}

#[test]
fn device_without_sensors_is_rejected() {
    let err = DeviceRegistry::from_entries(vec![DeviceEntry::new(
        "01:80:F5:BC",
        eep(0x02, 0x05),
        Vec::new(),
    )])
    .expect_err("no sensors");
    assert!(matches!(err, RegistryError::NoSensors(_)));
}

#[test]
fn empty_output_name_is_rejected() {
    let err = DeviceRegistry::from_entries(vec![DeviceEntry::new(
        "01:80:F5:BC",
        eep(0x02, 0x05),
        vec![SensorMapping::numeric("TMP", "")],
    )])
    .expect_err("empty output");
    assert!(matches!(err, RegistryError::EmptyField(_, "output_name")));
}

#[test]
fn malformed_json_is_config_error() {
    let err = DeviceRegistry::from_json_str(r#"{ "devices": 3 }"#).expect_err("malformed");
    assert!(matches!(err, RegistryError::Config(_)));
}

#[test]
fn load_missing_file_fails() {
    let err = DeviceRegistry::load(std::path::Path::new("/nonexistent/devices.json"))
        .expect_err("missing");
    assert!(matches!(err, RegistryError::Config(_)));
}
