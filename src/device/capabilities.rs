//! Capability Prober
//!
//! Reads what a device supports and what its factory defaults are. The
//! result is computed once when the device is first attached and is treated
//! as immutable by the option resolver and the property bridge.

use enumflags2::BitFlags;
use serde::Serialize;

use super::{ClickMethod, DeviceCapability, InputDevice, ScrollMethod, SendEventsMode};
use crate::input::buttons::{BTN_JOYSTICK, BTN_LEFT, BTN_SIDE};

/// Base pointer button count (left, middle, right and four scroll buttons)
const BASE_BUTTON_COUNT: u32 = 7;

/// Classification of a device by its strongest capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Tap-capable touch surface
    Touchpad,
    /// Direct touch device
    Touchscreen,
    /// Relative or absolute pointer
    Mouse,
    /// Anything else
    Keyboard,
}

/// Factory defaults of every configurable option
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceDefaults {
    /// Tap-to-click
    pub tapping: bool,
    /// Tap drag-lock
    pub tap_drag_lock: bool,
    /// Acceleration speed
    pub accel_speed: f64,
    /// Natural scrolling
    pub natural_scrolling: bool,
    /// Send-events mode
    pub send_events: BitFlags<SendEventsMode>,
    /// Left-handed mode
    pub left_handed: bool,
    /// Scroll method
    pub scroll_method: Option<ScrollMethod>,
    /// Scroll button, kernel code
    pub scroll_button: u32,
    /// Click method
    pub click_method: Option<ClickMethod>,
    /// Calibration (first two rows)
    pub calibration: [f32; 6],
    /// Middle-button emulation
    pub middle_emulation: bool,
    /// Accessibility key-repeat
    pub accessibility_key_repeat: bool,
}

/// Immutable capability snapshot of one device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceCapabilities {
    /// Device name
    pub name: String,
    /// Vendor id
    pub vendor: u32,
    /// Product id
    pub product: u32,
    /// Reported modalities
    pub kinds: BitFlags<DeviceCapability>,
    /// Fingers usable for tapping, 0 when tapping is unsupported
    pub tap_finger_count: u32,
    /// Supported scroll methods
    pub scroll_methods: BitFlags<ScrollMethod>,
    /// Supported click methods
    pub click_methods: BitFlags<ClickMethod>,
    /// Supported send-events modes
    pub send_events_modes: BitFlags<SendEventsMode>,
    /// Acceleration is configurable
    pub accel: bool,
    /// Calibration matrix is configurable
    pub calibration: bool,
    /// Left-handed mode is configurable
    pub left_handed: bool,
    /// Natural scrolling is configurable
    pub natural_scroll: bool,
    /// Middle-button emulation is configurable
    pub middle_emulation: bool,
    /// Accessibility key-repeat is configurable
    pub accessibility_key_repeat: bool,
    /// Kernel button codes the device reports, ascending
    pub buttons: Vec<u32>,
    /// Factory defaults
    pub defaults: DeviceDefaults,
}

/// Probe a device. Pure queries; may be called repeatedly.
pub fn probe<D: InputDevice>(device: &D) -> DeviceCapabilities {
    let kinds = [
        DeviceCapability::Keyboard,
        DeviceCapability::Pointer,
        DeviceCapability::Touch,
    ]
    .into_iter()
    .filter(|kind| device.has_capability(*kind))
    .collect();

    let buttons = if device.has_capability(DeviceCapability::Pointer) {
        (BTN_LEFT..BTN_JOYSTICK)
            .filter(|code| device.pointer_has_button(*code))
            .collect()
    } else {
        Vec::new()
    };

    DeviceCapabilities {
        name: device.name(),
        vendor: device.id_vendor(),
        product: device.id_product(),
        kinds,
        tap_finger_count: device.config_tap_finger_count(),
        scroll_methods: device.config_scroll_methods(),
        click_methods: device.config_click_methods(),
        send_events_modes: device.config_send_events_modes(),
        accel: device.config_accel_is_available(),
        calibration: device.config_calibration_has_matrix(),
        left_handed: device.config_left_handed_is_available(),
        natural_scroll: device.config_scroll_has_natural_scroll(),
        middle_emulation: device.config_middle_emulation_is_available(),
        accessibility_key_repeat: device.config_key_repeat_is_available(),
        buttons,
        defaults: DeviceDefaults {
            tapping: device.config_tap_default_enabled(),
            tap_drag_lock: device.config_tap_default_drag_lock_enabled(),
            accel_speed: device.config_accel_default_speed(),
            natural_scrolling: device.config_scroll_default_natural_scroll_enabled(),
            send_events: device.config_send_events_default_mode(),
            left_handed: device.config_left_handed_default(),
            scroll_method: device.config_scroll_default_method(),
            scroll_button: device.config_scroll_default_button(),
            click_method: device.config_click_default_method(),
            calibration: device.config_calibration_default_matrix(),
            middle_emulation: device.config_middle_emulation_default_enabled(),
            accessibility_key_repeat: device.config_key_repeat_default_enabled(),
        },
    }
}

impl DeviceCapabilities {
    /// Whether the device reports the given modality
    pub fn has(&self, kind: DeviceCapability) -> bool {
        self.kinds.contains(kind)
    }

    /// Tapping is supported
    pub fn supports_tap(&self) -> bool {
        self.tap_finger_count > 0
    }

    /// Button scrolling is supported
    pub fn supports_button_scroll(&self) -> bool {
        self.scroll_methods.contains(ScrollMethod::OnButtonDown)
    }

    /// Whether the device has the given kernel button
    pub fn has_button(&self, code: u32) -> bool {
        self.buttons.binary_search(&code).is_ok()
    }

    /// Positional axes are absolute: a calibratable pointer without acceleration
    pub fn is_absolute_pointer(&self) -> bool {
        self.has(DeviceCapability::Pointer) && self.calibration && !self.accel
    }

    /// Classify the device
    pub fn device_type(&self) -> DeviceType {
        if self.supports_tap() {
            DeviceType::Touchpad
        } else if self.has(DeviceCapability::Touch) {
            DeviceType::Touchscreen
        } else if self.has(DeviceCapability::Pointer) {
            DeviceType::Mouse
        } else {
            DeviceType::Keyboard
        }
    }

    /// Pointer buttons exposed to the consumer
    pub fn button_count(&self) -> u32 {
        let side = self
            .buttons
            .iter()
            .filter(|code| **code >= BTN_SIDE)
            .map(|code| code - BTN_SIDE + 1)
            .max()
            .unwrap_or(0);
        BASE_BUTTON_COUNT + side
    }
}
