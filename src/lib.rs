//! # lamco-input-driver
//!
//! Input driver core that bridges a kernel input library to a display
//! server's input subsystem.
//!
//! The host opens one driver instance per configured device. The driver:
//! - resolves per-device options from the host's string option map against
//!   what each device supports
//! - pushes the resolved configuration to the device and reads back anything
//!   the device refuses
//! - exposes every option as a typed runtime property with validation
//! - translates raw device events into the consumer's event model
//! - multiplexes every enabled device behind one shared event descriptor
//!
//! # Architecture
//!
//! ```text
//!                 host (options, lifecycle, property writes, readiness)
//!                                      │
//!                              ┌───────▼────────┐
//!                              │     Driver     │ ← shared context refcount,
//!                              └───────┬────────┘   enabled count
//!        ┌───────────────┬─────────────┼──────────────┬─────────────────┐
//!        ▼               ▼             ▼              ▼                 ▼
//!   registry        device::probe   options::     properties::     input::
//!   (host fds)      (capabilities)  resolve/apply PropertyBridge   EventTranslator
//!        │               │             │              │                 │
//!        └───────────────┴─────────────┴──────────────┘                 │
//!                          EventSource / InputDevice                    ▼
//!                                                                  EventSink
//! ```
//!
//! # Data Flow
//!
//! **Configuration Path:** OptionMap → resolve → OptionSet → apply → device
//!
//! **Property Path:** host write → validate → OptionSet → apply → read back
//!
//! **Event Path:** shared fd readable → dispatch → EventTranslator → EventSink

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Driver-wide configuration
pub mod config;

/// Device abstraction, capability probing and the virtual backend
///
/// The [`device::InputDevice`] and [`device::EventSource`] traits are the
/// seam to the kernel input library. [`device::VirtualBackend`] implements
/// both in memory.
pub mod device;

/// Lifecycle controller
pub mod driver;

/// Error types
pub mod error;

/// Raw event translation
pub mod input;

/// Option resolution and configuration application
pub mod options;

/// Runtime property bridge
///
/// Every option is mirrored as a named, typed property with a read-only
/// default companion. Writes are validated against the device's
/// capabilities before anything changes.
pub mod properties;

/// Host-provided device descriptors
pub mod registry;

pub use config::DriverConfig;
pub use device::{EventSource, InputDevice, VirtualBackend, VirtualDevice, VirtualDeviceSpec};
pub use driver::{DeviceControl, DeviceInfo, DeviceState, Driver, ReadinessHost};
pub use error::{DeviceId, DriverError, PropertyError, Result};
pub use input::{ConsumerEvent, EventSink};
pub use options::{OptionMap, OptionSet};
pub use properties::{PropertyValue, WriteStatus};
