//! Device Abstraction
//!
//! The driver talks to physical devices through two traits:
//!
//! - [`InputDevice`]: capability queries and live configuration of one device
//! - [`EventSource`]: the shared context devices are attached to, exposing a
//!   single pollable descriptor and a queue of raw events
//!
//! The trait surface follows the libinput device configuration API. Setters
//! take `&self` because device handles are reference-counted and shared
//! between the event source and the driver.
//!
//! [`virtual_device`] provides an in-memory implementation used by the replay
//! tool and the test suite.

use enumflags2::{bitflags, BitFlags};
use serde::{Deserialize, Serialize};
use std::io;
use std::os::fd::RawFd;
use std::path::Path;
use tracing::{debug, error, info};

use crate::registry::OpenRestricted;

pub mod capabilities;
pub mod virtual_device;

pub use capabilities::{probe, DeviceCapabilities, DeviceDefaults, DeviceType};
pub use virtual_device::{VirtualBackend, VirtualDevice, VirtualDeviceSpec, VIRTUAL_EVENT_FD};

/// Input modalities a device can report
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceCapability {
    /// Key events
    Keyboard = 0b001,
    /// Relative/absolute motion, buttons and scrolling
    Pointer = 0b010,
    /// Multi-touch contacts
    Touch = 0b100,
}

/// Scroll methods a device may offer
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScrollMethod {
    /// Two-finger scrolling on a touchpad
    TwoFinger = 0b001,
    /// Scrolling along the touchpad edge
    Edge = 0b010,
    /// Motion converted to scrolling while a button is held
    OnButtonDown = 0b100,
}

/// Click methods a clickpad may offer
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClickMethod {
    /// Button determined by the location of the click
    ButtonAreas = 0b01,
    /// Button determined by the number of fingers
    Clickfinger = 0b10,
}

/// Send-events modes. An empty set means events are always sent.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SendEventsMode {
    /// Device sends no events
    Disabled = 0b01,
    /// Device is disabled while an external pointer is connected
    DisabledOnExternalMouse = 0b10,
}

/// Keyboard LEDs
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Led {
    /// Num Lock
    NumLock = 0b001,
    /// Caps Lock
    CapsLock = 0b010,
    /// Scroll Lock
    ScrollLock = 0b100,
}

/// Result of a device configuration setter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConfigStatus {
    /// Value applied
    Success,
    /// Option not supported by the device
    Unsupported,
    /// Value rejected by the device
    Invalid,
}

impl ConfigStatus {
    /// True when the setter succeeded
    pub fn is_success(self) -> bool {
        self == ConfigStatus::Success
    }
}

/// Identity of a device inside the shared event source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceKey(pub u64);

/// Capability queries and live configuration of one physical device
pub trait InputDevice {
    /// Identity of this device inside its event source
    fn key(&self) -> DeviceKey;
    /// Human-readable device name
    fn name(&self) -> String;
    /// USB/Bluetooth vendor id
    fn id_vendor(&self) -> u32;
    /// USB/Bluetooth product id
    fn id_product(&self) -> u32;
    /// Whether the device reports the given modality
    fn has_capability(&self, capability: DeviceCapability) -> bool;
    /// Whether the device has the given kernel button code
    fn pointer_has_button(&self, button: u32) -> bool;
    /// Update keyboard LEDs
    fn led_update(&self, leds: BitFlags<Led>);

    /// Number of fingers usable for tapping, 0 when tapping is unsupported
    fn config_tap_finger_count(&self) -> u32;
    /// Current tap-to-click state
    fn config_tap_enabled(&self) -> bool;
    /// Factory tap-to-click state
    fn config_tap_default_enabled(&self) -> bool;
    /// Enable or disable tap-to-click
    fn config_tap_set_enabled(&self, enabled: bool) -> ConfigStatus;
    /// Current tap drag-lock state
    fn config_tap_drag_lock_enabled(&self) -> bool;
    /// Factory tap drag-lock state
    fn config_tap_default_drag_lock_enabled(&self) -> bool;
    /// Enable or disable tap drag-lock
    fn config_tap_set_drag_lock_enabled(&self, enabled: bool) -> ConfigStatus;

    /// Whether pointer acceleration is configurable
    fn config_accel_is_available(&self) -> bool;
    /// Current acceleration speed in [-1, 1]
    fn config_accel_speed(&self) -> f64;
    /// Factory acceleration speed
    fn config_accel_default_speed(&self) -> f64;
    /// Set acceleration speed
    fn config_accel_set_speed(&self, speed: f64) -> ConfigStatus;

    /// Whether natural scrolling is configurable
    fn config_scroll_has_natural_scroll(&self) -> bool;
    /// Current natural scrolling state
    fn config_scroll_natural_scroll_enabled(&self) -> bool;
    /// Factory natural scrolling state
    fn config_scroll_default_natural_scroll_enabled(&self) -> bool;
    /// Enable or disable natural scrolling
    fn config_scroll_set_natural_scroll_enabled(&self, enabled: bool) -> ConfigStatus;

    /// Supported send-events modes
    fn config_send_events_modes(&self) -> BitFlags<SendEventsMode>;
    /// Current send-events mode
    fn config_send_events_mode(&self) -> BitFlags<SendEventsMode>;
    /// Factory send-events mode
    fn config_send_events_default_mode(&self) -> BitFlags<SendEventsMode>;
    /// Set send-events mode
    fn config_send_events_set_mode(&self, mode: BitFlags<SendEventsMode>) -> ConfigStatus;

    /// Whether left-handed button swapping is configurable
    fn config_left_handed_is_available(&self) -> bool;
    /// Current left-handed state
    fn config_left_handed(&self) -> bool;
    /// Factory left-handed state
    fn config_left_handed_default(&self) -> bool;
    /// Enable or disable left-handed mode
    fn config_left_handed_set(&self, enabled: bool) -> ConfigStatus;

    /// Supported scroll methods
    fn config_scroll_methods(&self) -> BitFlags<ScrollMethod>;
    /// Current scroll method, `None` for no scrolling
    fn config_scroll_method(&self) -> Option<ScrollMethod>;
    /// Factory scroll method
    fn config_scroll_default_method(&self) -> Option<ScrollMethod>;
    /// Set scroll method
    fn config_scroll_set_method(&self, method: Option<ScrollMethod>) -> ConfigStatus;
    /// Kernel button code used for button scrolling
    fn config_scroll_button(&self) -> u32;
    /// Factory scroll button
    fn config_scroll_default_button(&self) -> u32;
    /// Set the scroll button (kernel code, 0 disables)
    fn config_scroll_set_button(&self, button: u32) -> ConfigStatus;

    /// Supported click methods
    fn config_click_methods(&self) -> BitFlags<ClickMethod>;
    /// Current click method
    fn config_click_method(&self) -> Option<ClickMethod>;
    /// Factory click method
    fn config_click_default_method(&self) -> Option<ClickMethod>;
    /// Set click method
    fn config_click_set_method(&self, method: Option<ClickMethod>) -> ConfigStatus;

    /// Whether a calibration matrix can be applied
    fn config_calibration_has_matrix(&self) -> bool;
    /// Current affine calibration (first two rows, row-major)
    fn config_calibration_matrix(&self) -> [f32; 6];
    /// Factory calibration
    fn config_calibration_default_matrix(&self) -> [f32; 6];
    /// Set calibration
    fn config_calibration_set_matrix(&self, matrix: [f32; 6]) -> ConfigStatus;

    /// Whether middle-button emulation is configurable
    fn config_middle_emulation_is_available(&self) -> bool;
    /// Current middle-button emulation state
    fn config_middle_emulation_enabled(&self) -> bool;
    /// Factory middle-button emulation state
    fn config_middle_emulation_default_enabled(&self) -> bool;
    /// Enable or disable middle-button emulation
    fn config_middle_emulation_set_enabled(&self, enabled: bool) -> ConfigStatus;

    /// Whether the accessibility key-repeat (halfkey) mode is configurable
    fn config_key_repeat_is_available(&self) -> bool;
    /// Current accessibility key-repeat state
    fn config_key_repeat_enabled(&self) -> bool;
    /// Factory accessibility key-repeat state
    fn config_key_repeat_default_enabled(&self) -> bool;
    /// Enable or disable accessibility key-repeat
    fn config_key_repeat_set_enabled(&self, enabled: bool) -> ConfigStatus;
}

/// Shared context that devices are attached to
///
/// One instance is shared by every configured device. Its descriptor becomes
/// readable whenever any attached device has pending input.
pub trait EventSource {
    /// Handle type for attached devices
    type Device: InputDevice + Clone;

    /// Attach the device node at `path`, opening it through `opener`
    fn add_device(
        &mut self,
        path: &Path,
        opener: &mut dyn OpenRestricted,
    ) -> io::Result<Self::Device>;

    /// Detach a device, releasing its node through `opener`. The handle
    /// stays usable for configuration queries.
    fn remove_device(&mut self, device: &Self::Device, opener: &mut dyn OpenRestricted);

    /// Descriptor to poll for readiness
    fn fd(&self) -> RawFd;

    /// Read pending kernel events into the queue. Must not block;
    /// `ErrorKind::WouldBlock` means nothing was pending.
    fn dispatch(&mut self) -> io::Result<()>;

    /// Pop the next queued event
    fn next_event(&mut self) -> Option<RawEvent>;
}

/// Button or key transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ButtonState {
    /// Pressed
    Pressed,
    /// Released
    Released,
}

impl ButtonState {
    /// True for a press
    pub fn is_pressed(self) -> bool {
        self == ButtonState::Pressed
    }
}

/// Origin of a scroll event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AxisSource {
    /// Mouse wheel with discrete steps
    Wheel,
    /// Finger on a touch surface
    Finger,
    /// Continuous source such as button scrolling
    Continuous,
    /// Tilting wheel
    WheelTilt,
}

/// One scroll axis of an axis event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisValue {
    /// Linear scroll distance
    pub value: f64,
    /// Discrete wheel steps, meaningful for wheel sources only
    #[serde(default)]
    pub discrete: f64,
}

/// Device-native range of one absolute axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    /// Minimum reported value
    pub minimum: f64,
    /// Maximum reported value
    pub maximum: f64,
}

impl AxisRange {
    /// Rescale `value` from this range into `0..=max`
    pub fn transform(&self, value: f64, max: f64) -> f64 {
        let span = self.maximum - self.minimum;
        if span <= 0.0 {
            return 0.0;
        }
        ((value - self.minimum) / span * max).clamp(0.0, max)
    }
}

/// Absolute position in device units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbsolutePoint {
    /// X in device units
    pub x: f64,
    /// Y in device units
    pub y: f64,
    /// Device range of the X axis
    pub x_range: AxisRange,
    /// Device range of the Y axis
    pub y_range: AxisRange,
}

impl AbsolutePoint {
    /// X rescaled into `0..=max`
    pub fn x_transformed(&self, max: f64) -> f64 {
        self.x_range.transform(self.x, max)
    }

    /// Y rescaled into `0..=max`
    pub fn y_transformed(&self, max: f64) -> f64 {
        self.y_range.transform(self.y, max)
    }
}

/// Event read from the shared event source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Device that produced the event
    pub device: DeviceKey,
    /// Event payload
    pub kind: RawEventKind,
}

/// Raw event payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RawEventKind {
    /// Device attached to the event source
    DeviceAdded,
    /// Device detached from the event source
    DeviceRemoved,
    /// Relative pointer motion
    PointerMotion {
        /// Accelerated X delta
        dx: f64,
        /// Accelerated Y delta
        dy: f64,
        /// Unaccelerated deltas, when the source distinguishes them
        #[serde(default)]
        unaccelerated: Option<(f64, f64)>,
    },
    /// Absolute pointer motion
    PointerMotionAbsolute {
        /// Position in device units
        point: AbsolutePoint,
    },
    /// Pointer button
    PointerButton {
        /// Kernel button code
        button: u32,
        /// Transition
        state: ButtonState,
    },
    /// Scroll on one or both axes
    PointerAxis {
        /// Scroll source
        source: AxisSource,
        /// Horizontal axis, if present
        #[serde(default)]
        horizontal: Option<AxisValue>,
        /// Vertical axis, if present
        #[serde(default)]
        vertical: Option<AxisValue>,
    },
    /// Keyboard key
    KeyboardKey {
        /// Kernel key code
        key: u32,
        /// Transition
        state: ButtonState,
    },
    /// New touch contact
    TouchDown {
        /// Device slot
        slot: u32,
        /// Contact position
        point: AbsolutePoint,
    },
    /// Touch contact moved
    TouchMotion {
        /// Device slot
        slot: u32,
        /// Contact position
        point: AbsolutePoint,
    },
    /// Touch contact lifted
    TouchUp {
        /// Device slot
        slot: u32,
    },
    /// Touch contact cancelled by the device
    TouchCancel {
        /// Device slot
        slot: u32,
    },
    /// End of one hardware sample of touch events
    TouchFrame,
}

/// Log priority used by event-source backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogPriority {
    /// Debug detail
    Debug,
    /// Informational
    Info,
    /// Error
    Error,
}

/// Forward a backend log line into tracing
pub fn log_backend_message(priority: LogPriority, message: &str) {
    match priority {
        LogPriority::Debug => debug!(target: "lamco_input_driver::backend", "{}", message),
        LogPriority::Info => info!(target: "lamco_input_driver::backend", "{}", message),
        LogPriority::Error => error!(target: "lamco_input_driver::backend", "{}", message),
    }
}
