//! Property Bridge
//!
//! Per-device view of the option set as host properties. Reads are computed
//! from the option set and the capability snapshot. Writes follow the
//! host's two-phase protocol: a check-only pass that validates without side
//! effects, then a commit that re-validates, updates the option set and
//! live-applies the whole set in one step.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{
    descriptors, flags_to_wire, validate, PropertyDescriptor, PropertyName, PropertyValue,
    CLICK_METHOD_ORDER, SCROLL_METHOD_ORDER, SEND_EVENTS_ORDER,
};
use crate::device::{DeviceCapabilities, InputDevice};
use crate::error::PropertyError;
use crate::input::buttons::linux_to_consumer;
use crate::options::{apply, read_back, CalibrationMatrix, OptionSet};

/// Outcome of an accepted property write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// Check-only write accepted, nothing changed
    Checked,
    /// Value committed and applied to the device
    Committed,
    /// Property is not one of ours; the host handles it
    NotOwned,
}

/// Property surface of one device
#[derive(Debug, Clone)]
pub struct PropertyBridge {
    device_node: PathBuf,
    descriptors: Vec<PropertyDescriptor>,
}

impl PropertyBridge {
    /// Register the properties a device with `caps` exposes
    pub fn new(caps: &DeviceCapabilities, device_node: impl Into<PathBuf>) -> Self {
        Self {
            device_node: device_node.into(),
            descriptors: descriptors(caps),
        }
    }

    /// Registered properties
    pub fn descriptors(&self) -> &[PropertyDescriptor] {
        &self.descriptors
    }

    /// Descriptor of a registered property
    pub fn descriptor(&self, name: PropertyName) -> Option<&PropertyDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// Device node the bridge reports
    pub fn device_node(&self) -> &Path {
        &self.device_node
    }

    /// Current value of a registered property
    pub fn get(
        &self,
        caps: &DeviceCapabilities,
        options: &OptionSet,
        name: PropertyName,
    ) -> Option<PropertyValue> {
        self.descriptor(name)?;
        let defaults = &caps.defaults;

        let value = match name {
            PropertyName::Tapping => PropertyValue::bool(options.tapping),
            PropertyName::TappingDefault => PropertyValue::bool(defaults.tapping),
            PropertyName::TappingDragLock => PropertyValue::bool(options.tap_drag_lock),
            PropertyName::TappingDragLockDefault => PropertyValue::bool(defaults.tap_drag_lock),
            PropertyName::Calibration => PropertyValue::Float32(options.calibration.0.to_vec()),
            PropertyName::CalibrationDefault => PropertyValue::Float32(
                CalibrationMatrix::from_affine(defaults.calibration).0.to_vec(),
            ),
            PropertyName::AccelSpeed => PropertyValue::Float32(vec![options.accel_speed]),
            PropertyName::AccelSpeedDefault => {
                PropertyValue::Float32(vec![defaults.accel_speed as f32])
            }
            PropertyName::NaturalScrolling => PropertyValue::bool(options.natural_scrolling),
            PropertyName::NaturalScrollingDefault => {
                PropertyValue::bool(defaults.natural_scrolling)
            }
            PropertyName::SendEventsAvailable => {
                PropertyValue::Bool8(flags_to_wire(caps.send_events_modes, &SEND_EVENTS_ORDER))
            }
            PropertyName::SendEventsEnabled => {
                PropertyValue::Bool8(flags_to_wire(options.send_events, &SEND_EVENTS_ORDER))
            }
            PropertyName::SendEventsEnabledDefault => {
                PropertyValue::Bool8(flags_to_wire(defaults.send_events, &SEND_EVENTS_ORDER))
            }
            PropertyName::LeftHanded => PropertyValue::bool(options.left_handed),
            PropertyName::LeftHandedDefault => PropertyValue::bool(defaults.left_handed),
            PropertyName::ScrollMethodsAvailable => {
                PropertyValue::Bool8(flags_to_wire(caps.scroll_methods, &SCROLL_METHOD_ORDER))
            }
            PropertyName::ScrollMethodEnabled => PropertyValue::Bool8(flags_to_wire(
                options.scroll_method.into_iter().collect(),
                &SCROLL_METHOD_ORDER,
            )),
            PropertyName::ScrollMethodEnabledDefault => PropertyValue::Bool8(flags_to_wire(
                defaults.scroll_method.into_iter().collect(),
                &SCROLL_METHOD_ORDER,
            )),
            PropertyName::ScrollButton => PropertyValue::Card32(vec![options.scroll_button]),
            PropertyName::ScrollButtonDefault => {
                PropertyValue::Card32(vec![linux_to_consumer(defaults.scroll_button)])
            }
            PropertyName::ClickMethodsAvailable => {
                PropertyValue::Bool8(flags_to_wire(caps.click_methods, &CLICK_METHOD_ORDER))
            }
            PropertyName::ClickMethodEnabled => PropertyValue::Bool8(flags_to_wire(
                options.click_method.into_iter().collect(),
                &CLICK_METHOD_ORDER,
            )),
            PropertyName::ClickMethodEnabledDefault => PropertyValue::Bool8(flags_to_wire(
                defaults.click_method.into_iter().collect(),
                &CLICK_METHOD_ORDER,
            )),
            PropertyName::MiddleEmulation => PropertyValue::bool(options.middle_emulation),
            PropertyName::MiddleEmulationDefault => {
                PropertyValue::bool(defaults.middle_emulation)
            }
            PropertyName::AccessibilityKeyRepeat => {
                PropertyValue::bool(options.accessibility_key_repeat)
            }
            PropertyName::AccessibilityKeyRepeatDefault => {
                PropertyValue::bool(defaults.accessibility_key_repeat)
            }
            PropertyName::DeviceNode => {
                PropertyValue::Str8(self.device_node.to_string_lossy().into_owned())
            }
            PropertyName::ProductId => PropertyValue::Card32(vec![caps.vendor, caps.product]),
        };
        Some(value)
    }

    /// Handle a host write to the property called `name`
    ///
    /// `device` is `None` while the device is disabled, in which case every
    /// write to an owned property is refused. A committed write updates
    /// `options` and applies the full set to the device; options the device
    /// then refuses are read back so `options` matches the device.
    pub fn set<D: InputDevice>(
        &self,
        device: Option<&D>,
        caps: &DeviceCapabilities,
        options: &mut OptionSet,
        name: &str,
        value: &PropertyValue,
        check_only: bool,
    ) -> Result<WriteStatus, PropertyError> {
        let Some(property) = PropertyName::from_name(name) else {
            return Ok(WriteStatus::NotOwned);
        };

        let update = validate(property, value, caps)?;
        let Some(device) = device else {
            return Err(PropertyError::DeviceDisabled(property.to_string()));
        };

        if check_only {
            return Ok(WriteStatus::Checked);
        }

        debug!("{}: committing {} = {:?}", caps.name, property, update);
        update.apply_to(options);

        let report = apply(device, caps, options);
        let failed = report.failed_options();
        if !failed.is_empty() {
            warn!(
                "{}: device refused {:?} after writing {}, reading back",
                caps.name, failed, property
            );
            read_back(device, &failed, options);
        }

        Ok(WriteStatus::Committed)
    }
}
