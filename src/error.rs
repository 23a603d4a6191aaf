//! Driver Error Types
//!
//! Error handling for device lifecycle, option resolution and property writes.

use std::path::PathBuf;
use thiserror::Error;

use crate::device::ConfigStatus;
use crate::options::OptionKind;

/// Result type for driver operations
pub type Result<T> = std::result::Result<T, DriverError>;

/// Identifier handed to the host for one configured device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct DeviceId(pub u32);

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "device#{}", self.0)
    }
}

/// Driver error types
#[derive(Error, Debug)]
pub enum DriverError {
    /// The required `Device` option was not supplied
    #[error("No device path configured")]
    MissingDevicePath,

    /// The shared event-source context could not be created
    #[error("Failed to create event source context: {0}")]
    ContextCreation(String),

    /// The event source refused to attach a device
    #[error("Failed to create a device for {path}: {reason}")]
    DeviceOpen {
        /// Device node path
        path: PathBuf,
        /// Reason reported by the backend
        reason: String,
    },

    /// No device with this id is known
    #[error("Unknown device: {0}")]
    UnknownDevice(DeviceId),

    /// A lifecycle transition was requested from the wrong state
    #[error("Invalid state for {device}: {detail}")]
    InvalidState {
        /// Device the transition was requested for
        device: DeviceId,
        /// What was attempted
        detail: String,
    },

    /// Dispatching the shared event source failed
    #[error("Error reading events: {0}")]
    Dispatch(#[source] std::io::Error),

    /// Configuration text could not be used
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Why a property write was refused
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PropertyError {
    /// Type, format or element count does not match the descriptor
    #[error("Property {name}: expected {expected}, got {actual}")]
    Format {
        /// Property name
        name: String,
        /// Descriptor shape
        expected: String,
        /// Shape of the written value
        actual: String,
    },

    /// Value outside the accepted domain
    #[error("Property {name}: invalid value ({detail})")]
    Value {
        /// Property name
        name: String,
        /// What was wrong
        detail: String,
    },

    /// The device does not support what the write asks for
    #[error("Property {name}: not supported by device ({detail})")]
    CapabilityMismatch {
        /// Property name
        name: String,
        /// Missing capability
        detail: String,
        /// Host status the mismatch is reported as
        status: PropertyStatus,
    },

    /// Availability sets, defaults and identity properties are read-only
    #[error("Property {0} is read-only")]
    ReadOnly(String),

    /// Properties cannot be changed while the device is detached
    #[error("Property {0}: device is disabled")]
    DeviceDisabled(String),
}

/// Status codes the host protocol understands for a refused write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum PropertyStatus {
    /// Shape mismatch or unusable device
    BadMatch,
    /// Value out of range
    BadValue,
    /// Write to a read-only property
    BadAccess,
}

impl PropertyError {
    /// Host status code for this rejection
    pub fn status(&self) -> PropertyStatus {
        match self {
            PropertyError::Format { .. } | PropertyError::DeviceDisabled(_) => {
                PropertyStatus::BadMatch
            }
            PropertyError::Value { .. } => PropertyStatus::BadValue,
            PropertyError::CapabilityMismatch { status, .. } => *status,
            PropertyError::ReadOnly(_) => PropertyStatus::BadAccess,
        }
    }
}

/// Error classification following the driver's failure taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Requested option unsupported by the device
    CapabilityMismatch,
    /// Malformed property write or configuration text
    Format,
    /// Device refused a locally valid value
    DeviceRejected,
    /// Device-open or allocation failure
    ResourceExhausted,
    /// Invariant violation inside the event stream
    Defect,
    /// Lifecycle misuse by the host
    State,
}

/// Classify a driver error
pub fn classify_error(error: &DriverError) -> ErrorClass {
    match error {
        DriverError::MissingDevicePath | DriverError::Config(_) => ErrorClass::Format,

        DriverError::ContextCreation(_) | DriverError::DeviceOpen { .. } => {
            ErrorClass::ResourceExhausted
        }

        DriverError::Dispatch(_) => ErrorClass::Defect,

        DriverError::UnknownDevice(_) | DriverError::InvalidState { .. } => ErrorClass::State,
    }
}

/// Classify a property write rejection
pub fn classify_property_error(error: &PropertyError) -> ErrorClass {
    match error {
        PropertyError::CapabilityMismatch { .. } => ErrorClass::CapabilityMismatch,
        PropertyError::Format { .. } | PropertyError::Value { .. } => ErrorClass::Format,
        PropertyError::ReadOnly(_) | PropertyError::DeviceDisabled(_) => ErrorClass::State,
    }
}

/// A device setter that returned something other than success
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyFailure {
    /// Option that was refused
    pub option: OptionKind,
    /// Status returned by the device
    pub status: ConfigStatus,
}

impl ApplyFailure {
    /// Classification of an apply failure
    pub fn class(&self) -> ErrorClass {
        match self.status {
            ConfigStatus::Unsupported => ErrorClass::CapabilityMismatch,
            _ => ErrorClass::DeviceRejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert_eq!(
            classify_error(&DriverError::MissingDevicePath),
            ErrorClass::Format
        );

        let error = DriverError::DeviceOpen {
            path: PathBuf::from("/dev/input/event3"),
            reason: "no such device".to_string(),
        };
        assert_eq!(classify_error(&error), ErrorClass::ResourceExhausted);

        let error = DriverError::ContextCreation("no udev".to_string());
        assert_eq!(classify_error(&error), ErrorClass::ResourceExhausted);

        let error = DriverError::Dispatch(std::io::Error::from(std::io::ErrorKind::InvalidData));
        assert_eq!(classify_error(&error), ErrorClass::Defect);

        let error = DriverError::InvalidState {
            device: DeviceId(1),
            detail: "enable before init".to_string(),
        };
        assert_eq!(classify_error(&error), ErrorClass::State);
    }

    #[test]
    fn test_property_status_mapping() {
        let error = PropertyError::Format {
            name: "libinput Tapping Enabled".to_string(),
            expected: "INTEGER/8 x1".to_string(),
            actual: "FLOAT/32 x1".to_string(),
        };
        assert_eq!(error.status(), PropertyStatus::BadMatch);
        assert_eq!(classify_property_error(&error), ErrorClass::Format);

        let error = PropertyError::ReadOnly("libinput Tapping Enabled Default".to_string());
        assert_eq!(error.status(), PropertyStatus::BadAccess);

        let error = PropertyError::CapabilityMismatch {
            name: "libinput Scroll Method Enabled".to_string(),
            detail: "button scrolling".to_string(),
            status: PropertyStatus::BadValue,
        };
        assert_eq!(error.status(), PropertyStatus::BadValue);
        assert_eq!(
            classify_property_error(&error),
            ErrorClass::CapabilityMismatch
        );
    }

    #[test]
    fn test_apply_failure_class() {
        let failure = ApplyFailure {
            option: OptionKind::AccelSpeed,
            status: ConfigStatus::Invalid,
        };
        assert_eq!(failure.class(), ErrorClass::DeviceRejected);

        let failure = ApplyFailure {
            option: OptionKind::Tapping,
            status: ConfigStatus::Unsupported,
        };
        assert_eq!(failure.class(), ErrorClass::CapabilityMismatch);
    }
}
