use lamco_input_driver::device::{probe, ClickMethod, ScrollMethod, SendEventsMode};
use lamco_input_driver::options::{apply, resolve, CalibrationMatrix, OptionKind};
use lamco_input_driver::{InputDevice, OptionMap, VirtualDevice, VirtualDeviceSpec};

fn device(spec: VirtualDeviceSpec) -> VirtualDevice {
    VirtualDevice::new(1, spec)
}

#[test]
fn test_calibration_override_parsed() {
    let screen = device(VirtualDeviceSpec::touchscreen("/dev/input/event7"));
    let caps = probe(&screen);

    let options = resolve(
        &screen,
        &caps,
        &OptionMap::new().with("CalibrationMatrix", "0.5 0 0 0 1 0 0 0 1"),
    );

    assert_eq!(
        options.calibration,
        CalibrationMatrix([0.5, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    );
    assert_eq!(screen.config_calibration_matrix(), [0.5, 0.0, 0.0, 0.0, 1.0, 0.0]);
}

#[test]
fn test_calibration_bottom_row_fixed() {
    let screen = device(VirtualDeviceSpec::touchscreen("/dev/input/event7"));
    let caps = probe(&screen);

    let options = resolve(
        &screen,
        &caps,
        &OptionMap::new().with("CalibrationMatrix", "2 0 0 0 2 0 5 5 5"),
    );
    assert_eq!(&options.calibration.0[6..], &[0.0, 0.0, 1.0]);
}

#[test]
fn test_short_calibration_keeps_default() {
    let screen = device(VirtualDeviceSpec::touchscreen("/dev/input/event7"));
    let caps = probe(&screen);

    let options = resolve(
        &screen,
        &caps,
        &OptionMap::new().with("CalibrationMatrix", "0.5 0 0 0 1"),
    );
    assert_eq!(options.calibration, CalibrationMatrix::IDENTITY);
}

#[test]
fn test_unsupported_scroll_method_keeps_current() {
    let touchpad = device(VirtualDeviceSpec::touchpad("/dev/input/event5"));
    let caps = probe(&touchpad);

    let options = resolve(
        &touchpad,
        &caps,
        &OptionMap::new().with("ScrollMethod", "button"),
    );

    assert_eq!(options.scroll_method, Some(ScrollMethod::TwoFinger));
    assert_eq!(
        touchpad.config_scroll_method(),
        Some(ScrollMethod::TwoFinger)
    );
}

#[test]
fn test_unrecognized_scroll_method_keeps_current() {
    let touchpad = device(VirtualDeviceSpec::touchpad("/dev/input/event5"));
    let caps = probe(&touchpad);

    let options = resolve(
        &touchpad,
        &caps,
        &OptionMap::new().with("ScrollMethod", "diagonal"),
    );
    assert_eq!(options.scroll_method, Some(ScrollMethod::TwoFinger));
}

#[test]
fn test_scroll_method_text_is_case_insensitive() {
    let touchpad = device(VirtualDeviceSpec::touchpad("/dev/input/event5"));
    let caps = probe(&touchpad);

    let options = resolve(
        &touchpad,
        &caps,
        &OptionMap::new()
            .with("ScrollMethod", "Edge")
            .with("ClickMethod", "CLICKFINGER"),
    );
    assert_eq!(options.scroll_method, Some(ScrollMethod::Edge));
    assert_eq!(options.click_method, Some(ClickMethod::Clickfinger));
}

#[test]
fn test_unsupported_options_forced_off() {
    let screen = device(VirtualDeviceSpec::touchscreen("/dev/input/event7"));
    let caps = probe(&screen);

    let options = resolve(
        &screen,
        &caps,
        &OptionMap::new()
            .with("Tapping", "on")
            .with("LeftHanded", "on")
            .with("NaturalScrolling", "on")
            .with("MiddleEmulation", "on")
            .with("AccelSpeed", "0.8")
            .with("ScrollMethod", "edge"),
    );

    assert!(!options.tapping);
    assert!(!options.left_handed);
    assert!(!options.natural_scrolling);
    assert!(!options.middle_emulation);
    assert_eq!(options.accel_speed, 0.0);
    assert_eq!(options.scroll_method, None);
}

#[test]
fn test_device_rejection_reads_back() {
    let mut spec = VirtualDeviceSpec::touchpad("/dev/input/event5");
    spec.reject = vec![OptionKind::LeftHanded];
    let touchpad = device(spec);
    let caps = probe(&touchpad);

    let options = resolve(
        &touchpad,
        &caps,
        &OptionMap::new()
            .with("LeftHanded", "on")
            .with("Tapping", "on"),
    );

    assert!(!options.left_handed);
    assert!(options.tapping);
}

#[test]
fn test_send_events_mode_text() {
    let touchpad = device(VirtualDeviceSpec::touchpad("/dev/input/event5"));
    let caps = probe(&touchpad);

    let options = resolve(
        &touchpad,
        &caps,
        &OptionMap::new().with("SendEventsMode", "disabled-on-external-mouse"),
    );
    assert_eq!(
        options.send_events,
        enumflags2::BitFlags::<SendEventsMode>::from(SendEventsMode::DisabledOnExternalMouse)
    );
}

#[test]
fn test_malformed_button_map_resets_to_identity() {
    let mouse = device(VirtualDeviceSpec::mouse("/dev/input/event4"));
    let caps = probe(&mouse);

    let options = resolve(
        &mouse,
        &caps,
        &OptionMap::new().with("ButtonMapping", "1 2 x"),
    );
    assert!(options.button_map.is_identity());

    let options = resolve(
        &mouse,
        &caps,
        &OptionMap::new().with("ButtonMapping", "1,33"),
    );
    assert!(options.button_map.is_identity());

    let options = resolve(
        &mouse,
        &caps,
        &OptionMap::new().with("ButtonMapping", "3, 2, 1"),
    );
    assert_eq!(options.button_map.entries(), &[3, 2, 1]);
}

#[test]
fn test_apply_twice_is_idempotent() {
    let touchpad = device(VirtualDeviceSpec::touchpad("/dev/input/event5"));
    let caps = probe(&touchpad);
    let options = resolve(
        &touchpad,
        &caps,
        &OptionMap::new()
            .with("Tapping", "on")
            .with("AccelSpeed", "-0.25"),
    );

    let first = apply(&touchpad, &caps, &options);
    let after_first = touchpad.config();
    let second = apply(&touchpad, &caps, &options);

    assert_eq!(first, second);
    assert!(first.is_clean());
    assert_eq!(touchpad.config(), after_first);
}
