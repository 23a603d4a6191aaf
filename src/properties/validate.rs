//! Property write validation
//!
//! [`validate`] is a pure function of the write and the device's capability
//! snapshot. It never touches the device or the option set, so check-only
//! writes can be repeated freely and commit can re-run it before mutating.

use enumflags2::{BitFlag, BitFlags};

use super::{
    wire_to_flags, PropertyDescriptor, PropertyName, PropertyValue, CLICK_METHOD_ORDER,
    SCROLL_METHOD_ORDER, SEND_EVENTS_ORDER,
};
use crate::device::{ClickMethod, DeviceCapabilities, ScrollMethod, SendEventsMode};
use crate::error::{PropertyError, PropertyStatus};
use crate::input::buttons::consumer_to_linux;
use crate::options::{CalibrationMatrix, OptionKind, OptionSet};

/// A validated change to one option
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionUpdate {
    /// Tap-to-click
    Tapping(bool),
    /// Tap drag-lock
    TapDragLock(bool),
    /// Calibration matrix
    Calibration(CalibrationMatrix),
    /// Acceleration speed
    AccelSpeed(f32),
    /// Natural scrolling
    NaturalScrolling(bool),
    /// Send-events mode
    SendEvents(BitFlags<SendEventsMode>),
    /// Left-handed mode
    LeftHanded(bool),
    /// Scroll method
    ScrollMethod(Option<ScrollMethod>),
    /// Scroll button, consumer numbering
    ScrollButton(u32),
    /// Click method
    ClickMethod(Option<ClickMethod>),
    /// Middle-button emulation
    MiddleEmulation(bool),
    /// Accessibility key-repeat
    AccessibilityKeyRepeat(bool),
}

impl OptionUpdate {
    /// Option this update changes
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionUpdate::Tapping(_) => OptionKind::Tapping,
            OptionUpdate::TapDragLock(_) => OptionKind::TappingDragLock,
            OptionUpdate::Calibration(_) => OptionKind::CalibrationMatrix,
            OptionUpdate::AccelSpeed(_) => OptionKind::AccelSpeed,
            OptionUpdate::NaturalScrolling(_) => OptionKind::NaturalScrolling,
            OptionUpdate::SendEvents(_) => OptionKind::SendEventsMode,
            OptionUpdate::LeftHanded(_) => OptionKind::LeftHanded,
            OptionUpdate::ScrollMethod(_) => OptionKind::ScrollMethod,
            OptionUpdate::ScrollButton(_) => OptionKind::ScrollButton,
            OptionUpdate::ClickMethod(_) => OptionKind::ClickMethod,
            OptionUpdate::MiddleEmulation(_) => OptionKind::MiddleEmulation,
            OptionUpdate::AccessibilityKeyRepeat(_) => OptionKind::AccessibilityKeyRepeat,
        }
    }

    /// Write the update into `options`
    pub fn apply_to(&self, options: &mut OptionSet) {
        match *self {
            OptionUpdate::Tapping(value) => options.tapping = value,
            OptionUpdate::TapDragLock(value) => options.tap_drag_lock = value,
            OptionUpdate::Calibration(matrix) => options.calibration = matrix,
            OptionUpdate::AccelSpeed(speed) => options.accel_speed = speed,
            OptionUpdate::NaturalScrolling(value) => options.natural_scrolling = value,
            OptionUpdate::SendEvents(mode) => options.send_events = mode,
            OptionUpdate::LeftHanded(value) => options.left_handed = value,
            OptionUpdate::ScrollMethod(method) => options.scroll_method = method,
            OptionUpdate::ScrollButton(button) => options.scroll_button = button,
            OptionUpdate::ClickMethod(method) => options.click_method = method,
            OptionUpdate::MiddleEmulation(value) => options.middle_emulation = value,
            OptionUpdate::AccessibilityKeyRepeat(value) => {
                options.accessibility_key_repeat = value
            }
        }
    }
}

fn value_error(name: PropertyName, detail: impl Into<String>) -> PropertyError {
    PropertyError::Value {
        name: name.to_string(),
        detail: detail.into(),
    }
}

/// Boolean elements must be exactly 0 or 1
fn booleans(name: PropertyName, values: &[u8]) -> Result<(), PropertyError> {
    match values.iter().find(|value| **value > 1) {
        Some(value) => Err(value_error(name, format!("{} is not a boolean", value))),
        None => Ok(()),
    }
}

/// Decode a single-selection method array
fn single_method<T: BitFlag + std::fmt::Debug>(
    name: PropertyName,
    values: &[u8],
    order: &[T],
    supported: BitFlags<T>,
) -> Result<Option<T>, PropertyError> {
    booleans(name, values)?;
    let selected = wire_to_flags(values, order);
    if selected.len() > 1 {
        return Err(value_error(name, "more than one method selected"));
    }
    if !supported.contains(selected) {
        return Err(PropertyError::CapabilityMismatch {
            name: name.to_string(),
            detail: format!("{:?} not supported", selected),
            status: PropertyStatus::BadValue,
        });
    }
    Ok(selected.iter().next())
}

/// Validate a write of `value` to `name` on a device with `caps`
pub fn validate(
    name: PropertyName,
    value: &PropertyValue,
    caps: &DeviceCapabilities,
) -> Result<OptionUpdate, PropertyError> {
    if name.is_read_only() {
        return Err(PropertyError::ReadOnly(name.to_string()));
    }

    if !name.is_registered(caps) {
        return Err(PropertyError::CapabilityMismatch {
            name: name.to_string(),
            detail: format!("{} not supported by {}", name, caps.name),
            status: PropertyStatus::BadMatch,
        });
    }

    let descriptor = PropertyDescriptor::new(name);
    if value.ty() != descriptor.ty || value.len() != descriptor.cardinality {
        return Err(PropertyError::Format {
            name: name.to_string(),
            expected: descriptor.shape(),
            actual: value.shape(),
        });
    }

    match (name, value) {
        (PropertyName::Calibration, PropertyValue::Float32(values)) => {
            if values[6..] != [0.0, 0.0, 1.0] {
                return Err(value_error(name, "bottom row must be 0 0 1"));
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(value_error(name, "non-finite element"));
            }
            let mut matrix = [0.0; 9];
            matrix.copy_from_slice(values);
            Ok(OptionUpdate::Calibration(CalibrationMatrix(matrix)))
        }
        (PropertyName::AccelSpeed, PropertyValue::Float32(values)) => {
            let speed = values[0];
            if !(-1.0..=1.0).contains(&speed) {
                return Err(value_error(name, format!("{} outside [-1, 1]", speed)));
            }
            Ok(OptionUpdate::AccelSpeed(speed))
        }
        (PropertyName::SendEventsEnabled, PropertyValue::Bool8(values)) => {
            booleans(name, values)?;
            let mode = wire_to_flags(values, &SEND_EVENTS_ORDER);
            if !caps.send_events_modes.contains(mode) {
                return Err(PropertyError::CapabilityMismatch {
                    name: name.to_string(),
                    detail: format!("{:?} not supported", mode),
                    status: PropertyStatus::BadValue,
                });
            }
            Ok(OptionUpdate::SendEvents(mode))
        }
        (PropertyName::ScrollMethodEnabled, PropertyValue::Bool8(values)) => single_method(
            name,
            values,
            &SCROLL_METHOD_ORDER,
            caps.scroll_methods,
        )
        .map(OptionUpdate::ScrollMethod),
        (PropertyName::ClickMethodEnabled, PropertyValue::Bool8(values)) => {
            single_method(name, values, &CLICK_METHOD_ORDER, caps.click_methods)
                .map(OptionUpdate::ClickMethod)
        }
        (PropertyName::ScrollButton, PropertyValue::Card32(values)) => {
            let button = values[0];
            let code = consumer_to_linux(button).unwrap_or(0);
            if button != 0 && (code == 0 || !caps.has_button(code)) {
                return Err(value_error(name, format!("device has no button {}", button)));
            }
            Ok(OptionUpdate::ScrollButton(button))
        }
        (_, PropertyValue::Bool8(values)) => {
            booleans(name, values)?;
            let enabled = values[0] == 1;
            let update = match name {
                PropertyName::Tapping => OptionUpdate::Tapping(enabled),
                PropertyName::TappingDragLock => OptionUpdate::TapDragLock(enabled),
                PropertyName::NaturalScrolling => OptionUpdate::NaturalScrolling(enabled),
                PropertyName::LeftHanded => OptionUpdate::LeftHanded(enabled),
                PropertyName::MiddleEmulation => OptionUpdate::MiddleEmulation(enabled),
                PropertyName::AccessibilityKeyRepeat => {
                    OptionUpdate::AccessibilityKeyRepeat(enabled)
                }
                _ => {
                    return Err(PropertyError::ReadOnly(name.to_string()));
                }
            };
            Ok(update)
        }
        _ => Err(PropertyError::Format {
            name: name.to_string(),
            expected: descriptor.shape(),
            actual: value.shape(),
        }),
    }
}
