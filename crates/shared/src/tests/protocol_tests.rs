use super::*;
use chrono::TimeZone;

#[test]
fn angle_command_frame_matches_wire_shape() {
    let issued_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
    let command = AngleCommand::new(45.0, issued_at).expect("command");
    let frame = command.to_frame().expect("frame");

    let value: Value = serde_json::from_str(&frame).expect("json");
    assert_eq!(value["type"], "setAngle");
    assert_eq!(value["angle"].as_f64(), Some(45.0));
    assert_eq!(value["timestamp"], "2024-05-01T12:30:00.000Z");
    assert_eq!(value.as_object().map(|fields| fields.len()), Some(3));
}

#[test]
fn whole_degrees_are_written_as_integers() {
    let issued_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();

    let whole = AngleCommand::new(45.0, issued_at).expect("command");
    assert_eq!(
        whole.to_frame().expect("frame"),
        r#"{"type":"setAngle","angle":45,"timestamp":"2024-05-01T12:30:00.000Z"}"#
    );

    let zero = AngleCommand::new(0.0, issued_at).expect("command");
    assert!(zero.to_frame().expect("frame").contains(r#""angle":0,"#));

    let fractional = AngleCommand::new(22.5, issued_at).expect("command");
    assert!(fractional
        .to_frame()
        .expect("frame")
        .contains(r#""angle":22.5,"#));
}

#[test]
fn angle_command_rejects_out_of_range() {
    let err = AngleCommand::now(91.0).expect_err("out of range");
    assert_eq!(err.angle, 91.0);
    assert!(AngleCommand::now(f64::NAN).is_err());
}

#[test]
fn device_command_round_trips_through_serde() {
    let command = AngleCommand::now(15.0).expect("command");
    let frame = command.to_frame().expect("frame");
    let decoded: DeviceCommand = serde_json::from_str(&frame).expect("decode");
    assert_eq!(decoded, DeviceCommand::SetAngle(command));
}

#[test]
fn telemetry_reads_angle_from_superset() {
    let frame = TelemetryFrame::decode(r#"{"angle": 37.5, "battery": 88}"#).expect("telemetry");
    assert_eq!(frame.angle, 37.5);

    let frame = TelemetryFrame::decode(r#"{"angle": 12}"#).expect("telemetry");
    assert_eq!(frame.angle, 12.0);
}

#[test]
fn telemetry_without_angle_is_rejected() {
    assert!(matches!(
        TelemetryFrame::decode(r#"{"foo": 1}"#),
        Err(TelemetryDecodeError::MissingAngle)
    ));
    assert!(matches!(
        TelemetryFrame::decode(r#"{"angle": null}"#),
        Err(TelemetryDecodeError::MissingAngle)
    ));
    assert!(matches!(
        TelemetryFrame::decode(r#"{"angle": "12"}"#),
        Err(TelemetryDecodeError::NonNumericAngle)
    ));
    assert!(matches!(
        TelemetryFrame::decode("[37.5]"),
        Err(TelemetryDecodeError::NotAnObject)
    ));
    assert!(matches!(
        TelemetryFrame::decode("hello device"),
        Err(TelemetryDecodeError::Json(_))
    ));
}
