//! Option Resolver
//!
//! Produces the authoritative [`OptionSet`] of a device from its capability
//! snapshot and the user's option text. Each supported option starts from
//! the device's current value, adopts the user override when one parses, and
//! is applied to the device immediately. When the device refuses the value
//! the resolver reads back what the device actually holds, so the option set
//! never diverges from the device.
//!
//! Unsupported options are forced to their fixed disabled value whatever the
//! user asked for.

use std::fmt::Debug;
use tracing::{debug, error, info, warn};

use super::parse::{
    parse_bool, parse_button_map, parse_calibration, parse_click_method, parse_float,
    parse_scroll_method, parse_send_events_mode, parse_u32,
};
use super::{ButtonMap, CalibrationMatrix, OptionKind, OptionMap, OptionSet};
use crate::device::{ConfigStatus, DeviceCapabilities, DeviceCapability, InputDevice};
use crate::input::buttons::{consumer_to_linux, linux_to_consumer};

/// Resolve every option of `device`
pub fn resolve<D: InputDevice>(
    device: &D,
    caps: &DeviceCapabilities,
    overrides: &OptionMap,
) -> OptionSet {
    let mut options = OptionSet::default();

    for kind in OptionKind::ALL {
        let supported = is_supported(caps, kind);
        let text = overrides.option(kind);

        if !supported {
            if let Some(text) = text {
                info!(
                    "{}: option {}={} not supported by device, ignoring",
                    caps.name, kind, text
                );
            }
            continue;
        }

        resolve_option(device, caps, kind, text, &mut options);
    }

    debug!("{}: resolved options {:?}", caps.name, options);
    options
}

/// Whether `kind` is configurable on a device with `caps`
pub fn is_supported(caps: &DeviceCapabilities, kind: OptionKind) -> bool {
    match kind {
        OptionKind::Tapping | OptionKind::TappingDragLock => caps.supports_tap(),
        OptionKind::AccelSpeed => caps.accel,
        OptionKind::NaturalScrolling => caps.natural_scroll,
        OptionKind::SendEventsMode => !caps.send_events_modes.is_empty(),
        OptionKind::LeftHanded => caps.left_handed,
        OptionKind::ScrollMethod => !caps.scroll_methods.is_empty(),
        OptionKind::ScrollButton => caps.supports_button_scroll(),
        OptionKind::ClickMethod => !caps.click_methods.is_empty(),
        OptionKind::MiddleEmulation => caps.middle_emulation,
        OptionKind::AccessibilityKeyRepeat => caps.accessibility_key_repeat,
        OptionKind::CalibrationMatrix => caps.calibration,
        OptionKind::ButtonMapping => caps.has(DeviceCapability::Pointer),
    }
}

/// Adopt `wanted` if the device takes it, otherwise the device's current value
fn settle<T: Copy + Debug>(
    name: &str,
    kind: OptionKind,
    wanted: T,
    status: ConfigStatus,
    current: impl FnOnce() -> T,
) -> T {
    if status.is_success() {
        return wanted;
    }
    let actual = current();
    warn!(
        "{}: failed to set {} to {:?} ({:?}), using {:?}",
        name, kind, wanted, status, actual
    );
    actual
}

/// Parse `text` with `parse`, logging and falling back to `fallback`
fn parsed<T>(
    name: &str,
    kind: OptionKind,
    text: Option<&str>,
    fallback: T,
    parse: impl FnOnce(&str) -> Option<T>,
) -> T {
    match text {
        None => fallback,
        Some(text) => parse(text).unwrap_or_else(|| {
            error!("{}: invalid {} value '{}', keeping current", name, kind, text);
            fallback
        }),
    }
}

fn resolve_option<D: InputDevice>(
    device: &D,
    caps: &DeviceCapabilities,
    kind: OptionKind,
    text: Option<&str>,
    options: &mut OptionSet,
) {
    let name = caps.name.as_str();

    match kind {
        OptionKind::Tapping => {
            let wanted = parsed(name, kind, text, device.config_tap_enabled(), parse_bool);
            let status = device.config_tap_set_enabled(wanted);
            options.tapping = settle(name, kind, wanted, status, || device.config_tap_enabled());
        }
        OptionKind::TappingDragLock => {
            let current = device.config_tap_drag_lock_enabled();
            let wanted = parsed(name, kind, text, current, parse_bool);
            let status = device.config_tap_set_drag_lock_enabled(wanted);
            options.tap_drag_lock = settle(name, kind, wanted, status, || {
                device.config_tap_drag_lock_enabled()
            });
        }
        OptionKind::AccelSpeed => {
            let wanted = parsed(name, kind, text, device.config_accel_speed(), parse_float);
            let status = device.config_accel_set_speed(wanted);
            let speed = settle(name, kind, wanted, status, || device.config_accel_speed());
            options.accel_speed = speed as f32;
        }
        OptionKind::NaturalScrolling => {
            let current = device.config_scroll_natural_scroll_enabled();
            let wanted = parsed(name, kind, text, current, parse_bool);
            let status = device.config_scroll_set_natural_scroll_enabled(wanted);
            options.natural_scrolling = settle(name, kind, wanted, status, || {
                device.config_scroll_natural_scroll_enabled()
            });
        }
        OptionKind::SendEventsMode => {
            let current = device.config_send_events_mode();
            let wanted = parsed(name, kind, text, current, parse_send_events_mode);
            let status = device.config_send_events_set_mode(wanted);
            options.send_events = settle(name, kind, wanted, status, || {
                device.config_send_events_mode()
            });
        }
        OptionKind::LeftHanded => {
            let wanted = parsed(name, kind, text, device.config_left_handed(), parse_bool);
            let status = device.config_left_handed_set(wanted);
            options.left_handed = settle(name, kind, wanted, status, || device.config_left_handed());
        }
        OptionKind::ScrollMethod => {
            let current = device.config_scroll_method();
            let mut wanted = parsed(name, kind, text, current, parse_scroll_method);
            if let Some(method) = wanted.filter(|m| !caps.scroll_methods.contains(*m)) {
                error!(
                    "{}: scroll method {:?} not supported by device, keeping current",
                    name, method
                );
                wanted = current;
            }
            let status = device.config_scroll_set_method(wanted);
            options.scroll_method = settle(name, kind, wanted, status, || {
                device.config_scroll_method()
            });
        }
        OptionKind::ScrollButton => {
            let current_code = device.config_scroll_button();
            let current = linux_to_consumer(current_code);
            let wanted = parsed(name, kind, text, current, parse_u32);
            let code = consumer_to_linux(wanted).unwrap_or_else(|| {
                error!(
                    "{}: scroll button {} out of range, keeping current",
                    name, wanted
                );
                current_code
            });
            let status = device.config_scroll_set_button(code);
            options.scroll_button = settle(name, kind, linux_to_consumer(code), status, || {
                linux_to_consumer(device.config_scroll_button())
            });
        }
        OptionKind::ClickMethod => {
            let current = device.config_click_method();
            let mut wanted = parsed(name, kind, text, current, parse_click_method);
            if let Some(method) = wanted.filter(|m| !caps.click_methods.contains(*m)) {
                error!(
                    "{}: click method {:?} not supported by device, keeping current",
                    name, method
                );
                wanted = current;
            }
            let status = device.config_click_set_method(wanted);
            options.click_method = settle(name, kind, wanted, status, || {
                device.config_click_method()
            });
        }
        OptionKind::MiddleEmulation => {
            let current = device.config_middle_emulation_enabled();
            let wanted = parsed(name, kind, text, current, parse_bool);
            let status = device.config_middle_emulation_set_enabled(wanted);
            options.middle_emulation = settle(name, kind, wanted, status, || {
                device.config_middle_emulation_enabled()
            });
        }
        OptionKind::AccessibilityKeyRepeat => {
            let current = device.config_key_repeat_enabled();
            let wanted = parsed(name, kind, text, current, parse_bool);
            let status = device.config_key_repeat_set_enabled(wanted);
            options.accessibility_key_repeat = settle(name, kind, wanted, status, || {
                device.config_key_repeat_enabled()
            });
        }
        OptionKind::CalibrationMatrix => {
            let current = CalibrationMatrix::from_affine(device.config_calibration_matrix());
            let wanted = match text {
                None => current,
                Some(text) => parse_calibration(text).unwrap_or_else(|| {
                    error!("{}: invalid calibration matrix '{}', using default", name, text);
                    current
                }),
            };
            let status = device.config_calibration_set_matrix(wanted.affine());
            options.calibration = settle(name, kind, wanted, status, || {
                CalibrationMatrix::from_affine(device.config_calibration_matrix())
            });
        }
        OptionKind::ButtonMapping => {
            options.button_map = match text {
                None => ButtonMap::identity(),
                Some(text) => parse_button_map(text).unwrap_or_else(|| {
                    error!("{}: invalid button mapping '{}', using identity", name, text);
                    ButtonMap::identity()
                }),
            };
        }
    }
}

/// Replace the given options in `options` with the device's current values
///
/// Used after a live apply in which the device refused some options.
pub fn read_back<D: InputDevice>(device: &D, kinds: &[OptionKind], options: &mut OptionSet) {
    for kind in kinds {
        match kind {
            OptionKind::Tapping => options.tapping = device.config_tap_enabled(),
            OptionKind::TappingDragLock => {
                options.tap_drag_lock = device.config_tap_drag_lock_enabled()
            }
            OptionKind::AccelSpeed => options.accel_speed = device.config_accel_speed() as f32,
            OptionKind::NaturalScrolling => {
                options.natural_scrolling = device.config_scroll_natural_scroll_enabled()
            }
            OptionKind::SendEventsMode => options.send_events = device.config_send_events_mode(),
            OptionKind::LeftHanded => options.left_handed = device.config_left_handed(),
            OptionKind::ScrollMethod => options.scroll_method = device.config_scroll_method(),
            OptionKind::ScrollButton => {
                options.scroll_button = linux_to_consumer(device.config_scroll_button())
            }
            OptionKind::ClickMethod => options.click_method = device.config_click_method(),
            OptionKind::MiddleEmulation => {
                options.middle_emulation = device.config_middle_emulation_enabled()
            }
            OptionKind::AccessibilityKeyRepeat => {
                options.accessibility_key_repeat = device.config_key_repeat_enabled()
            }
            OptionKind::CalibrationMatrix => {
                options.calibration =
                    CalibrationMatrix::from_affine(device.config_calibration_matrix())
            }
            OptionKind::ButtonMapping => {}
        }
    }
}
