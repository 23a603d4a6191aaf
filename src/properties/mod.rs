//! Device Properties
//!
//! Every resolved option is exposed to the host as a named, typed property,
//! together with read-only companions for its factory default and, for
//! multi-valued options, the set the device supports.
//!
//! # Wire layout
//!
//! Multi-choice options travel as boolean arrays, one element per method:
//!
//! | Property                | Elements                                   |
//! |-------------------------|--------------------------------------------|
//! | Scroll Method(s)        | two-finger, edge, button                   |
//! | Click Method(s)         | button areas, clickfinger                  |
//! | Send Events Mode(s)     | disabled, disabled on external mouse       |
//!
//! Internally these are enums with an explicit "at most one selected" rule
//! enforced by [`validate`]; conversion happens only here.

use enumflags2::BitFlags;
use serde::Serialize;
use std::fmt;

use crate::device::{ClickMethod, DeviceCapabilities, ScrollMethod, SendEventsMode};
use crate::options::resolver::is_supported;
use crate::options::OptionKind;

pub mod bridge;
pub mod validate;

pub use bridge::{PropertyBridge, WriteStatus};
pub use validate::{validate, OptionUpdate};

/// Scroll methods in wire order
pub const SCROLL_METHOD_ORDER: [ScrollMethod; 3] = [
    ScrollMethod::TwoFinger,
    ScrollMethod::Edge,
    ScrollMethod::OnButtonDown,
];

/// Click methods in wire order
pub const CLICK_METHOD_ORDER: [ClickMethod; 2] = [ClickMethod::ButtonAreas, ClickMethod::Clickfinger];

/// Send-events modes in wire order
pub const SEND_EVENTS_ORDER: [SendEventsMode; 2] = [
    SendEventsMode::Disabled,
    SendEventsMode::DisabledOnExternalMouse,
];

/// Properties owned by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PropertyName {
    /// Tap-to-click
    Tapping,
    /// Tap-to-click factory default
    TappingDefault,
    /// Tap drag-lock
    TappingDragLock,
    /// Tap drag-lock factory default
    TappingDragLockDefault,
    /// Calibration matrix
    Calibration,
    /// Calibration factory default
    CalibrationDefault,
    /// Acceleration speed
    AccelSpeed,
    /// Acceleration factory default
    AccelSpeedDefault,
    /// Natural scrolling
    NaturalScrolling,
    /// Natural scrolling factory default
    NaturalScrollingDefault,
    /// Supported send-events modes
    SendEventsAvailable,
    /// Send-events mode
    SendEventsEnabled,
    /// Send-events factory default
    SendEventsEnabledDefault,
    /// Left-handed mode
    LeftHanded,
    /// Left-handed factory default
    LeftHandedDefault,
    /// Supported scroll methods
    ScrollMethodsAvailable,
    /// Scroll method
    ScrollMethodEnabled,
    /// Scroll method factory default
    ScrollMethodEnabledDefault,
    /// Scroll button
    ScrollButton,
    /// Scroll button factory default
    ScrollButtonDefault,
    /// Supported click methods
    ClickMethodsAvailable,
    /// Click method
    ClickMethodEnabled,
    /// Click method factory default
    ClickMethodEnabledDefault,
    /// Middle-button emulation
    MiddleEmulation,
    /// Middle-button emulation factory default
    MiddleEmulationDefault,
    /// Accessibility key-repeat
    AccessibilityKeyRepeat,
    /// Accessibility key-repeat factory default
    AccessibilityKeyRepeatDefault,
    /// Device node path
    DeviceNode,
    /// Vendor and product id
    ProductId,
}

impl PropertyName {
    /// Every property in registration order
    pub const ALL: [PropertyName; 29] = [
        PropertyName::Tapping,
        PropertyName::TappingDefault,
        PropertyName::TappingDragLock,
        PropertyName::TappingDragLockDefault,
        PropertyName::Calibration,
        PropertyName::CalibrationDefault,
        PropertyName::AccelSpeed,
        PropertyName::AccelSpeedDefault,
        PropertyName::NaturalScrolling,
        PropertyName::NaturalScrollingDefault,
        PropertyName::SendEventsAvailable,
        PropertyName::SendEventsEnabled,
        PropertyName::SendEventsEnabledDefault,
        PropertyName::LeftHanded,
        PropertyName::LeftHandedDefault,
        PropertyName::ScrollMethodsAvailable,
        PropertyName::ScrollMethodEnabled,
        PropertyName::ScrollMethodEnabledDefault,
        PropertyName::ScrollButton,
        PropertyName::ScrollButtonDefault,
        PropertyName::ClickMethodsAvailable,
        PropertyName::ClickMethodEnabled,
        PropertyName::ClickMethodEnabledDefault,
        PropertyName::MiddleEmulation,
        PropertyName::MiddleEmulationDefault,
        PropertyName::AccessibilityKeyRepeat,
        PropertyName::AccessibilityKeyRepeatDefault,
        PropertyName::DeviceNode,
        PropertyName::ProductId,
    ];

    /// Name the host sees
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyName::Tapping => "libinput Tapping Enabled",
            PropertyName::TappingDefault => "libinput Tapping Enabled Default",
            PropertyName::TappingDragLock => "libinput Tapping Drag Lock Enabled",
            PropertyName::TappingDragLockDefault => "libinput Tapping Drag Lock Enabled Default",
            PropertyName::Calibration => "libinput Calibration Matrix",
            PropertyName::CalibrationDefault => "libinput Calibration Matrix Default",
            PropertyName::AccelSpeed => "libinput Accel Speed",
            PropertyName::AccelSpeedDefault => "libinput Accel Speed Default",
            PropertyName::NaturalScrolling => "libinput Natural Scrolling Enabled",
            PropertyName::NaturalScrollingDefault => "libinput Natural Scrolling Enabled Default",
            PropertyName::SendEventsAvailable => "libinput Send Events Modes Available",
            PropertyName::SendEventsEnabled => "libinput Send Events Mode Enabled",
            PropertyName::SendEventsEnabledDefault => "libinput Send Events Mode Enabled Default",
            PropertyName::LeftHanded => "libinput Left Handed Enabled",
            PropertyName::LeftHandedDefault => "libinput Left Handed Enabled Default",
            PropertyName::ScrollMethodsAvailable => "libinput Scroll Methods Available",
            PropertyName::ScrollMethodEnabled => "libinput Scroll Method Enabled",
            PropertyName::ScrollMethodEnabledDefault => "libinput Scroll Method Enabled Default",
            PropertyName::ScrollButton => "libinput Button Scrolling Button",
            PropertyName::ScrollButtonDefault => "libinput Button Scrolling Button Default",
            PropertyName::ClickMethodsAvailable => "libinput Click Methods Available",
            PropertyName::ClickMethodEnabled => "libinput Click Method Enabled",
            PropertyName::ClickMethodEnabledDefault => "libinput Click Method Enabled Default",
            PropertyName::MiddleEmulation => "libinput Middle Emulation Enabled",
            PropertyName::MiddleEmulationDefault => "libinput Middle Emulation Enabled Default",
            PropertyName::AccessibilityKeyRepeat => "libinput Halfkey Accessibility Enabled",
            PropertyName::AccessibilityKeyRepeatDefault => {
                "libinput Halfkey Accessibility Enabled Default"
            }
            PropertyName::DeviceNode => "Device Node",
            PropertyName::ProductId => "Device Product ID",
        }
    }

    /// Look up a property by the name the host uses
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|property| property.as_str() == name)
    }

    /// Option a property reflects, `None` for identity properties
    pub fn option(self) -> Option<OptionKind> {
        let kind = match self {
            PropertyName::Tapping | PropertyName::TappingDefault => OptionKind::Tapping,
            PropertyName::TappingDragLock | PropertyName::TappingDragLockDefault => {
                OptionKind::TappingDragLock
            }
            PropertyName::Calibration | PropertyName::CalibrationDefault => {
                OptionKind::CalibrationMatrix
            }
            PropertyName::AccelSpeed | PropertyName::AccelSpeedDefault => OptionKind::AccelSpeed,
            PropertyName::NaturalScrolling | PropertyName::NaturalScrollingDefault => {
                OptionKind::NaturalScrolling
            }
            PropertyName::SendEventsAvailable
            | PropertyName::SendEventsEnabled
            | PropertyName::SendEventsEnabledDefault => OptionKind::SendEventsMode,
            PropertyName::LeftHanded | PropertyName::LeftHandedDefault => OptionKind::LeftHanded,
            PropertyName::ScrollMethodsAvailable
            | PropertyName::ScrollMethodEnabled
            | PropertyName::ScrollMethodEnabledDefault => OptionKind::ScrollMethod,
            PropertyName::ScrollButton | PropertyName::ScrollButtonDefault => {
                OptionKind::ScrollButton
            }
            PropertyName::ClickMethodsAvailable
            | PropertyName::ClickMethodEnabled
            | PropertyName::ClickMethodEnabledDefault => OptionKind::ClickMethod,
            PropertyName::MiddleEmulation | PropertyName::MiddleEmulationDefault => {
                OptionKind::MiddleEmulation
            }
            PropertyName::AccessibilityKeyRepeat | PropertyName::AccessibilityKeyRepeatDefault => {
                OptionKind::AccessibilityKeyRepeat
            }
            PropertyName::DeviceNode | PropertyName::ProductId => return None,
        };
        Some(kind)
    }

    /// Availability sets, defaults and identity properties are read-only
    pub fn is_read_only(self) -> bool {
        !matches!(
            self,
            PropertyName::Tapping
                | PropertyName::TappingDragLock
                | PropertyName::Calibration
                | PropertyName::AccelSpeed
                | PropertyName::NaturalScrolling
                | PropertyName::SendEventsEnabled
                | PropertyName::LeftHanded
                | PropertyName::ScrollMethodEnabled
                | PropertyName::ScrollButton
                | PropertyName::ClickMethodEnabled
                | PropertyName::MiddleEmulation
                | PropertyName::AccessibilityKeyRepeat
        )
    }

    /// Element type and count
    pub fn shape(self) -> (PropertyType, usize) {
        match self {
            PropertyName::Calibration | PropertyName::CalibrationDefault => {
                (PropertyType::Float32, 9)
            }
            PropertyName::AccelSpeed | PropertyName::AccelSpeedDefault => (PropertyType::Float32, 1),
            PropertyName::SendEventsAvailable
            | PropertyName::SendEventsEnabled
            | PropertyName::SendEventsEnabledDefault => (PropertyType::Bool8, 2),
            PropertyName::ScrollMethodsAvailable
            | PropertyName::ScrollMethodEnabled
            | PropertyName::ScrollMethodEnabledDefault => (PropertyType::Bool8, 3),
            PropertyName::ClickMethodsAvailable
            | PropertyName::ClickMethodEnabled
            | PropertyName::ClickMethodEnabledDefault => (PropertyType::Bool8, 2),
            PropertyName::ScrollButton | PropertyName::ScrollButtonDefault => {
                (PropertyType::Card32, 1)
            }
            PropertyName::ProductId => (PropertyType::Card32, 2),
            PropertyName::DeviceNode => (PropertyType::Str8, 0),
            _ => (PropertyType::Bool8, 1),
        }
    }

    /// Whether a device with `caps` exposes this property
    pub fn is_registered(self, caps: &DeviceCapabilities) -> bool {
        match self.option() {
            None => true,
            Some(kind) => is_supported(caps, kind),
        }
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Element type of a property value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PropertyType {
    /// 8-bit integers restricted to 0 and 1
    Bool8,
    /// 32-bit unsigned integers
    Card32,
    /// 32-bit floats
    Float32,
    /// 8-bit string
    Str8,
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyType::Bool8 => "INTEGER/8",
            PropertyType::Card32 => "CARDINAL/32",
            PropertyType::Float32 => "FLOAT/32",
            PropertyType::Str8 => "STRING/8",
        };
        f.write_str(name)
    }
}

/// Typed property payload
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PropertyValue {
    /// Boolean array
    Bool8(Vec<u8>),
    /// Unsigned integer array
    Card32(Vec<u32>),
    /// Float array
    Float32(Vec<f32>),
    /// String
    Str8(String),
}

impl PropertyValue {
    /// Single boolean
    pub fn bool(value: bool) -> Self {
        PropertyValue::Bool8(vec![u8::from(value)])
    }

    /// Element type
    pub fn ty(&self) -> PropertyType {
        match self {
            PropertyValue::Bool8(_) => PropertyType::Bool8,
            PropertyValue::Card32(_) => PropertyType::Card32,
            PropertyValue::Float32(_) => PropertyType::Float32,
            PropertyValue::Str8(_) => PropertyType::Str8,
        }
    }

    /// Element count; strings count as one element
    pub fn len(&self) -> usize {
        match self {
            PropertyValue::Bool8(values) => values.len(),
            PropertyValue::Card32(values) => values.len(),
            PropertyValue::Float32(values) => values.len(),
            PropertyValue::Str8(_) => 0,
        }
    }

    /// True for an empty array
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shape description for error messages
    pub fn shape(&self) -> String {
        format!("{} x{}", self.ty(), self.len())
    }
}

/// Host-visible description of one property
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyDescriptor {
    /// Property
    pub name: PropertyName,
    /// Element type
    pub ty: PropertyType,
    /// Element count, 0 for strings
    pub cardinality: usize,
    /// Writes are refused
    pub read_only: bool,
}

impl PropertyDescriptor {
    /// Descriptor of `name`
    pub fn new(name: PropertyName) -> Self {
        let (ty, cardinality) = name.shape();
        Self {
            name,
            ty,
            cardinality,
            read_only: name.is_read_only(),
        }
    }

    /// Shape description for error messages
    pub fn shape(&self) -> String {
        format!("{} x{}", self.ty, self.cardinality)
    }
}

/// Descriptors of every property a device with `caps` exposes
pub fn descriptors(caps: &DeviceCapabilities) -> Vec<PropertyDescriptor> {
    PropertyName::ALL
        .into_iter()
        .filter(|name| name.is_registered(caps))
        .map(PropertyDescriptor::new)
        .collect()
}

/// Encode a flag set as a wire boolean array in `order`
pub fn flags_to_wire<T>(flags: BitFlags<T>, order: &[T]) -> Vec<u8>
where
    T: enumflags2::BitFlag,
{
    order
        .iter()
        .map(|flag| u8::from(flags.contains(*flag)))
        .collect()
}

/// Decode a wire boolean array in `order` into a flag set
pub fn wire_to_flags<T>(values: &[u8], order: &[T]) -> BitFlags<T>
where
    T: enumflags2::BitFlag,
{
    order
        .iter()
        .zip(values)
        .filter(|(_, value)| **value != 0)
        .map(|(flag, _)| *flag)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{probe, VirtualDevice, VirtualDeviceSpec};

    #[test]
    fn test_names_round_trip() {
        for name in PropertyName::ALL {
            assert_eq!(PropertyName::from_name(name.as_str()), Some(name));
        }
        assert_eq!(PropertyName::from_name("Coordinate Transformation Matrix"), None);
    }

    #[test]
    fn test_read_only_companions() {
        assert!(!PropertyName::Tapping.is_read_only());
        assert!(PropertyName::TappingDefault.is_read_only());
        assert!(PropertyName::ScrollMethodsAvailable.is_read_only());
        assert!(PropertyName::DeviceNode.is_read_only());
        assert!(PropertyName::ProductId.is_read_only());
    }

    #[test]
    fn test_touchpad_descriptors() {
        let device = VirtualDevice::new(1, VirtualDeviceSpec::touchpad("/dev/input/event5"));
        let names: Vec<PropertyName> = descriptors(&probe(&device))
            .into_iter()
            .map(|d| d.name)
            .collect();

        assert!(names.contains(&PropertyName::Tapping));
        assert!(names.contains(&PropertyName::ScrollMethodEnabled));
        assert!(names.contains(&PropertyName::ClickMethodsAvailable));
        assert!(!names.contains(&PropertyName::ScrollButton));
        assert!(!names.contains(&PropertyName::Calibration));
        assert!(names.contains(&PropertyName::DeviceNode));
    }

    #[test]
    fn test_keyboard_descriptors() {
        let device = VirtualDevice::new(1, VirtualDeviceSpec::keyboard("/dev/input/event2"));
        let descriptors = descriptors(&probe(&device));

        let halfkey = descriptors
            .iter()
            .find(|d| d.name == PropertyName::AccessibilityKeyRepeat)
            .unwrap();
        assert_eq!(halfkey.ty, PropertyType::Bool8);
        assert_eq!(halfkey.cardinality, 1);
        assert!(!halfkey.read_only);
        assert!(!descriptors.iter().any(|d| d.name == PropertyName::Tapping));
    }

    #[test]
    fn test_wire_flags() {
        let flags = ScrollMethod::Edge | ScrollMethod::OnButtonDown;
        assert_eq!(flags_to_wire(flags, &SCROLL_METHOD_ORDER), vec![0, 1, 1]);
        assert_eq!(wire_to_flags(&[0, 1, 1], &SCROLL_METHOD_ORDER), flags);
        assert!(wire_to_flags(&[0, 0], &CLICK_METHOD_ORDER).is_empty());
    }
}
