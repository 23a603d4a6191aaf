//! Configuration Applier
//!
//! Pushes a resolved [`OptionSet`] into the device's live configuration.
//! Every supported option is applied on its own: a refusal is logged and
//! reported, and never stops the remaining options. Applying the same set
//! twice leaves the device in the same state.

use tracing::{debug, error};

use super::resolver::is_supported;
use super::{OptionKind, OptionSet};
use crate::device::{ConfigStatus, DeviceCapabilities, InputDevice};
use crate::error::ApplyFailure;
use crate::input::buttons::consumer_to_linux;

/// Per-option outcome of one apply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    results: Vec<(OptionKind, ConfigStatus)>,
}

impl ApplyReport {
    /// Status of every option that was applied
    pub fn results(&self) -> &[(OptionKind, ConfigStatus)] {
        &self.results
    }

    /// Status of one option, `None` when it was skipped
    pub fn status(&self, kind: OptionKind) -> Option<ConfigStatus> {
        self.results
            .iter()
            .find(|(option, _)| *option == kind)
            .map(|(_, status)| *status)
    }

    /// Options the device refused
    pub fn failures(&self) -> Vec<ApplyFailure> {
        self.results
            .iter()
            .filter(|(_, status)| !status.is_success())
            .map(|(option, status)| ApplyFailure {
                option: *option,
                status: *status,
            })
            .collect()
    }

    /// Options the device refused, by kind
    pub fn failed_options(&self) -> Vec<OptionKind> {
        self.failures().into_iter().map(|f| f.option).collect()
    }

    /// True when every applied option succeeded
    pub fn is_clean(&self) -> bool {
        self.results.iter().all(|(_, status)| status.is_success())
    }
}

/// Apply `options` to `device`
pub fn apply<D: InputDevice>(
    device: &D,
    caps: &DeviceCapabilities,
    options: &OptionSet,
) -> ApplyReport {
    let mut report = ApplyReport::default();

    for kind in OptionKind::ALL {
        if !is_supported(caps, kind) {
            continue;
        }

        let status = match kind {
            OptionKind::Tapping => device.config_tap_set_enabled(options.tapping),
            OptionKind::TappingDragLock => {
                device.config_tap_set_drag_lock_enabled(options.tap_drag_lock)
            }
            OptionKind::AccelSpeed => device.config_accel_set_speed(f64::from(options.accel_speed)),
            OptionKind::NaturalScrolling => {
                device.config_scroll_set_natural_scroll_enabled(options.natural_scrolling)
            }
            OptionKind::SendEventsMode => device.config_send_events_set_mode(options.send_events),
            OptionKind::LeftHanded => device.config_left_handed_set(options.left_handed),
            OptionKind::ScrollMethod => device.config_scroll_set_method(options.scroll_method),
            OptionKind::ScrollButton => {
                let code = consumer_to_linux(options.scroll_button).unwrap_or(0);
                device.config_scroll_set_button(code)
            }
            OptionKind::ClickMethod => device.config_click_set_method(options.click_method),
            OptionKind::MiddleEmulation => {
                device.config_middle_emulation_set_enabled(options.middle_emulation)
            }
            OptionKind::AccessibilityKeyRepeat => {
                device.config_key_repeat_set_enabled(options.accessibility_key_repeat)
            }
            OptionKind::CalibrationMatrix => {
                device.config_calibration_set_matrix(options.calibration.affine())
            }
            // Consumed by the event translator, nothing to push to the device
            OptionKind::ButtonMapping => continue,
        };

        if !status.is_success() {
            error!("{}: failed to apply {} ({:?})", caps.name, kind, status);
        }
        report.results.push((kind, status));
    }

    debug!(
        "{}: applied {} options, {} refused",
        caps.name,
        report.results.len(),
        report.failures().len()
    );
    report
}
