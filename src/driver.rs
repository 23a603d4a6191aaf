//! Lifecycle Controller
//!
//! [`Driver`] is the explicit process-wide context the host threads through
//! every entry point. It owns:
//!
//! - the shared event source, created on first attach and dropped when the
//!   last device detaches
//! - the registry of host-provided descriptors
//! - the touch identity counter (inside the [`EventTranslator`])
//! - every configured device with its option set, properties and
//!   translation state
//!
//! # Device lifecycle
//!
//! ```text
//! pre_init ──▶ Uninitialized ──init──▶ Disabled ◀──disable── Enabled
//!                    ▲                     │                     ▲
//!                    └──────close──────────┴───────enable────────┘
//! ```
//!
//! Pre-init attaches the device once to probe capabilities and resolve
//! options against the live device, then detaches it again. Enable
//! re-attaches, registers the shared descriptor with the host when it is
//! the first enabled device, and applies the option set. Disable reverses
//! that order.

use enumflags2::BitFlags;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::config::{DriverConfig, ScrollConfig};
use crate::device::{
    probe, DeviceCapabilities, DeviceKey, DeviceType, EventSource, InputDevice, Led,
};
use crate::error::{
    classify_error, classify_property_error, DeviceId, DriverError, PropertyError, Result,
};
use crate::input::{EventSink, EventTranslator, TranslationState};
use crate::options::{apply, read_back, resolve, OptionMap, OptionSet};
use crate::properties::{
    PropertyBridge, PropertyDescriptor, PropertyName, PropertyValue, WriteStatus,
};
use crate::registry::{DeviceRegistry, RegistryOpener};

/// Host readiness mechanism the shared descriptor is multiplexed into
#[cfg_attr(test, mockall::automock)]
pub trait ReadinessHost {
    /// Start watching `fd` for readability
    fn add_enabled_device(&mut self, fd: RawFd);

    /// Stop watching `fd`
    fn remove_enabled_device(&mut self, fd: RawFd);
}

/// Lifecycle requests the host issues for a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceControl {
    /// Register the device with the host
    Init,
    /// Start delivering events
    On,
    /// Stop delivering events
    Off,
    /// Release host-side state
    Close,
}

/// Lifecycle state of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    /// Probed and configured, not yet registered with the host
    Uninitialized,
    /// Registered, not delivering events
    Disabled,
    /// Attached and delivering events
    Enabled,
}

/// Summary of one configured device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    /// Driver-assigned id
    pub id: DeviceId,
    /// Device node path
    pub path: PathBuf,
    /// Device name
    pub name: String,
    /// Classification
    pub device_type: DeviceType,
    /// Pointer buttons exposed to the consumer
    pub button_count: u32,
    /// Positional axes are absolute
    pub absolute: bool,
    /// Lifecycle state
    pub state: DeviceState,
}

/// Per-device driver state
struct DeviceInstance<D> {
    path: PathBuf,
    server_fd: Option<RawFd>,
    handle: D,
    attached: bool,
    caps: DeviceCapabilities,
    options: OptionSet,
    bridge: PropertyBridge,
    translation: TranslationState,
    state: DeviceState,
}

/// The shared event source and the number of devices attached to it
struct SharedContext<B> {
    source: B,
    refs: usize,
}

/// Factory for the shared event source
pub type SourceFactory<B> = Box<dyn FnMut() -> io::Result<B>>;

/// Driver core: lifecycle, configuration and event dispatch for all devices
pub struct Driver<B: EventSource, H: ReadinessHost> {
    factory: SourceFactory<B>,
    context: Option<SharedContext<B>>,
    registry: DeviceRegistry,
    host: H,
    translator: EventTranslator,
    devices: BTreeMap<DeviceId, DeviceInstance<B::Device>>,
    keys: HashMap<DeviceKey, DeviceId>,
    next_id: u32,
    enabled_count: usize,
    scroll: ScrollConfig,
}

impl<B: EventSource, H: ReadinessHost> Driver<B, H> {
    /// Create a driver; `factory` creates the shared event source on demand
    pub fn new(factory: impl FnMut() -> io::Result<B> + 'static, host: H) -> Self {
        Self {
            factory: Box::new(factory),
            context: None,
            registry: DeviceRegistry::new(),
            host,
            translator: EventTranslator::new(),
            devices: BTreeMap::new(),
            keys: HashMap::new(),
            next_id: 1,
            enabled_count: 0,
            scroll: ScrollConfig::default(),
        }
    }

    /// Create a driver with driver-wide settings from `config`
    pub fn with_config(
        factory: impl FnMut() -> io::Result<B> + 'static,
        host: H,
        config: &DriverConfig,
    ) -> Self {
        let mut driver = Self::new(factory, host);
        driver.scroll = config.scroll.clone();
        driver
    }

    /// The readiness host
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The readiness host, mutably
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Whether the shared event source currently exists
    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    /// Number of devices attached to the shared event source
    pub fn context_refs(&self) -> usize {
        self.context.as_ref().map_or(0, |ctx| ctx.refs)
    }

    /// Number of enabled devices
    pub fn enabled_count(&self) -> usize {
        self.enabled_count
    }

    /// Ids of every configured device
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.keys().copied().collect()
    }

    /// Translation statistics: (events seen, events dropped)
    pub fn event_stats(&self) -> (u64, u64) {
        (
            self.translator.events_processed(),
            self.translator.events_dropped(),
        )
    }

    /// Attach the device node at `path` to the shared event source
    fn attach(&mut self, path: &Path, server_fd: Option<RawFd>) -> Result<B::Device> {
        if self.context.is_none() {
            let source =
                (self.factory)().map_err(|e| DriverError::ContextCreation(e.to_string()))?;
            info!("Created shared event source");
            self.context = Some(SharedContext { source, refs: 0 });
        }

        if let Some(fd) = server_fd {
            self.registry.bind(path, fd);
        }

        let result = match self.context.as_mut() {
            Some(ctx) => ctx
                .source
                .add_device(path, &mut RegistryOpener::new(&self.registry)),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "no event source")),
        };

        match result {
            Ok(handle) => {
                if let Some(ctx) = self.context.as_mut() {
                    ctx.refs += 1;
                }
                Ok(handle)
            }
            Err(e) => {
                if let Some(fd) = server_fd {
                    self.registry.unbind(fd);
                }
                self.release_context();
                Err(DriverError::DeviceOpen {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Detach a device, dropping the shared event source with the last one
    fn detach(&mut self, handle: &B::Device, server_fd: Option<RawFd>) {
        if let Some(ctx) = self.context.as_mut() {
            ctx.source
                .remove_device(handle, &mut RegistryOpener::new(&self.registry));
            ctx.refs = ctx.refs.saturating_sub(1);
        }
        if let Some(fd) = server_fd {
            self.registry.unbind(fd);
        }
        self.release_context();
    }

    fn release_context(&mut self) {
        if self.context.as_ref().is_some_and(|ctx| ctx.refs == 0) {
            self.context = None;
            info!("Released shared event source");
        }
    }

    fn instance(&self, id: DeviceId) -> Result<&DeviceInstance<B::Device>> {
        self.devices.get(&id).ok_or(DriverError::UnknownDevice(id))
    }

    fn instance_mut(&mut self, id: DeviceId) -> Result<&mut DeviceInstance<B::Device>> {
        self.devices.get_mut(&id).ok_or(DriverError::UnknownDevice(id))
    }

    /// Open a device from its option map and resolve its configuration
    ///
    /// `server_fd` is a descriptor the host already opened for the device
    /// node; it is used instead of opening the node while attached.
    pub fn pre_init(&mut self, options: &OptionMap, server_fd: Option<RawFd>) -> Result<DeviceId> {
        let path = PathBuf::from(options.device_path().ok_or(DriverError::MissingDevicePath)?);

        let handle = self.attach(&path, server_fd)?;
        let caps = probe(&handle);
        let resolved = resolve(&handle, &caps, options);
        self.detach(&handle, server_fd);

        let id = DeviceId(self.next_id);
        self.next_id += 1;

        info!(
            "{}: {} ({:?}) at {}",
            id,
            caps.name,
            caps.device_type(),
            path.display()
        );

        let mut translation =
            TranslationState::new(self.scroll.horizontal_distance, self.scroll.vertical_distance);
        translation.set_absolute(caps.is_absolute_pointer());

        self.devices.insert(
            id,
            DeviceInstance {
                bridge: PropertyBridge::new(&caps, &path),
                path,
                server_fd,
                handle,
                attached: false,
                caps,
                options: resolved,
                translation,
                state: DeviceState::Uninitialized,
            },
        );
        Ok(id)
    }

    /// Register a device with the host
    pub fn init(&mut self, id: DeviceId) -> Result<()> {
        let instance = self.instance_mut(id)?;
        if instance.state != DeviceState::Uninitialized {
            return Err(DriverError::InvalidState {
                device: id,
                detail: format!("init from {:?}", instance.state),
            });
        }
        instance.state = DeviceState::Disabled;
        debug!(
            "{}: initialized with {} properties",
            id,
            instance.bridge.descriptors().len()
        );
        Ok(())
    }

    /// Attach a device and start delivering its events
    pub fn enable(&mut self, id: DeviceId) -> Result<()> {
        let (path, server_fd) = {
            let instance = self.instance(id)?;
            match instance.state {
                DeviceState::Enabled => return Ok(()),
                DeviceState::Uninitialized => {
                    return Err(DriverError::InvalidState {
                        device: id,
                        detail: "enable before init".to_string(),
                    })
                }
                DeviceState::Disabled => (instance.path.clone(), instance.server_fd),
            }
        };

        let handle = self.attach(&path, server_fd)?;
        self.keys.insert(handle.key(), id);

        if self.enabled_count == 0 {
            if let Some(ctx) = self.context.as_ref() {
                self.host.add_enabled_device(ctx.source.fd());
            }
        }
        self.enabled_count += 1;

        let instance = self.instance_mut(id)?;
        instance.translation.set_absolute(instance.caps.is_absolute_pointer());
        instance.handle = handle;
        instance.attached = true;
        instance.state = DeviceState::Enabled;

        let report = apply(&instance.handle, &instance.caps, &instance.options);
        if !report.is_clean() {
            for failure in report.failures() {
                warn!(
                    "{}: device refused {} on enable ({:?}), reading back",
                    id,
                    failure.option,
                    failure.class()
                );
            }
            read_back(&instance.handle, &report.failed_options(), &mut instance.options);
        }

        info!("{}: enabled", id);
        Ok(())
    }

    /// Stop delivering a device's events and detach it
    pub fn disable(&mut self, id: DeviceId) -> Result<()> {
        let (handle, server_fd) = {
            let instance = self.instance(id)?;
            if instance.state != DeviceState::Enabled {
                return Ok(());
            }
            (instance.handle.clone(), instance.server_fd)
        };

        self.enabled_count = self.enabled_count.saturating_sub(1);
        if self.enabled_count == 0 {
            if let Some(ctx) = self.context.as_ref() {
                self.host.remove_enabled_device(ctx.source.fd());
            }
        }

        self.keys.remove(&handle.key());
        self.detach(&handle, server_fd);

        let instance = self.instance_mut(id)?;
        instance.attached = false;
        instance.translation.reset();
        instance.state = DeviceState::Disabled;

        info!("{}: disabled", id);
        Ok(())
    }

    /// Release host-side registration; the device returns to uninitialized
    pub fn close(&mut self, id: DeviceId) -> Result<()> {
        self.disable(id)?;
        self.instance_mut(id)?.state = DeviceState::Uninitialized;
        Ok(())
    }

    /// Forget a device entirely
    pub fn uninit(&mut self, id: DeviceId) -> Result<()> {
        self.disable(id)?;
        self.devices.remove(&id);
        debug!("{}: removed", id);
        Ok(())
    }

    /// Dispatch a host lifecycle request
    pub fn device_control(&mut self, id: DeviceId, control: DeviceControl) -> Result<()> {
        match control {
            DeviceControl::Init => self.init(id),
            DeviceControl::On => self.enable(id),
            DeviceControl::Off => self.disable(id),
            DeviceControl::Close => self.close(id),
        }
    }

    /// Drain the shared event source and translate every pending event
    ///
    /// Called when the shared descriptor is readable. Returns the number of
    /// consumer events posted. "No data" is not an error. End of stream
    /// disables every enabled device.
    pub fn read_input(&mut self, sink: &mut dyn EventSink) -> Result<usize> {
        let Some(ctx) = self.context.as_mut() else {
            return Ok(0);
        };

        if let Err(e) = ctx.source.dispatch() {
            return match e.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(0),
                io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe => {
                    error!("Event source closed: {}, disabling devices", e);
                    self.disable_all();
                    Err(DriverError::Dispatch(e))
                }
                _ => {
                    let error = DriverError::Dispatch(e);
                    error!("{} ({:?})", error, classify_error(&error));
                    Err(error)
                }
            };
        }

        let mut posted = 0;
        while let Some(event) = ctx.source.next_event() {
            let instance = self
                .keys
                .get(&event.device)
                .and_then(|id| self.devices.get_mut(id).map(|instance| (*id, instance)));

            match instance {
                Some((id, instance)) if instance.state == DeviceState::Enabled => {
                    if self.translator.translate(
                        id,
                        &mut instance.translation,
                        &instance.options.button_map,
                        &event.kind,
                        sink,
                    ) {
                        posted += 1;
                    }
                }
                _ => self.translator.record_dropped(),
            }
        }
        Ok(posted)
    }

    fn disable_all(&mut self) {
        let enabled: Vec<DeviceId> = self
            .devices
            .iter()
            .filter(|(_, instance)| instance.state == DeviceState::Enabled)
            .map(|(id, _)| *id)
            .collect();
        for id in enabled {
            if let Err(e) = self.disable(id) {
                error!("{}: failed to disable: {}", id, e);
            }
        }
    }

    /// Handle a host property write
    ///
    /// Writes to unknown devices or to properties the driver does not own
    /// report [`WriteStatus::NotOwned`].
    pub fn set_property(
        &mut self,
        id: DeviceId,
        name: &str,
        value: &PropertyValue,
        check_only: bool,
    ) -> std::result::Result<WriteStatus, PropertyError> {
        let Some(instance) = self.devices.get_mut(&id) else {
            return Ok(WriteStatus::NotOwned);
        };
        let device = (instance.state == DeviceState::Enabled && instance.attached)
            .then_some(&instance.handle);

        let result = instance.bridge.set(
            device,
            &instance.caps,
            &mut instance.options,
            name,
            value,
            check_only,
        );
        if let Err(e) = &result {
            debug!(
                "{}: property write refused ({:?}): {}",
                id,
                classify_property_error(e),
                e
            );
        }
        result
    }

    /// Current value of a property
    pub fn get_property(&self, id: DeviceId, name: &str) -> Option<PropertyValue> {
        let instance = self.devices.get(&id)?;
        let property = PropertyName::from_name(name)?;
        instance
            .bridge
            .get(&instance.caps, &instance.options, property)
    }

    /// Properties registered for a device
    pub fn properties(&self, id: DeviceId) -> Result<Vec<PropertyDescriptor>> {
        Ok(self.instance(id)?.bridge.descriptors().to_vec())
    }

    /// Resolved option set of a device
    pub fn options(&self, id: DeviceId) -> Result<&OptionSet> {
        Ok(&self.instance(id)?.options)
    }

    /// Capability snapshot of a device
    pub fn capabilities(&self, id: DeviceId) -> Result<&DeviceCapabilities> {
        Ok(&self.instance(id)?.caps)
    }

    /// Lifecycle state of a device
    pub fn device_state(&self, id: DeviceId) -> Result<DeviceState> {
        Ok(self.instance(id)?.state)
    }

    /// Summary of a device
    pub fn device_info(&self, id: DeviceId) -> Result<DeviceInfo> {
        let instance = self.instance(id)?;
        Ok(DeviceInfo {
            id,
            path: instance.path.clone(),
            name: instance.caps.name.clone(),
            device_type: instance.caps.device_type(),
            button_count: instance.caps.button_count(),
            absolute: instance.translation.is_absolute(),
            state: instance.state,
        })
    }

    /// Forward host keyboard LED state to an enabled device
    pub fn update_leds(&mut self, id: DeviceId, leds: BitFlags<Led>) -> Result<()> {
        let instance = self.instance(id)?;
        if instance.attached {
            instance.handle.led_update(leds);
        }
        Ok(())
    }

    /// Change the wheel step distance of every device
    pub fn set_scroll_distance(&mut self, horizontal: f64, vertical: f64) -> Result<()> {
        let valid = |d: f64| d.is_finite() && d > 0.0;
        if !valid(horizontal) || !valid(vertical) {
            return Err(DriverError::Config(format!(
                "scroll distance must be positive, got {}x{}",
                horizontal, vertical
            )));
        }
        self.scroll.horizontal_distance = horizontal;
        self.scroll.vertical_distance = vertical;
        for instance in self.devices.values_mut() {
            instance.translation.set_scroll_distance(horizontal, vertical);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{
        ButtonState, RawEventKind, ScrollMethod, VirtualBackend, VirtualDeviceSpec,
        VIRTUAL_EVENT_FD,
    };
    use crate::input::ConsumerEvent;
    use mockall::predicate::eq;
    use std::cell::Cell;
    use std::rc::Rc;

    const TOUCHPAD: &str = "/dev/input/event5";
    const MOUSE: &str = "/dev/input/event4";

    fn backend() -> VirtualBackend {
        VirtualBackend::new([
            VirtualDeviceSpec::touchpad(TOUCHPAD),
            VirtualDeviceSpec::mouse(MOUSE),
        ])
    }

    fn driver_with(
        backend: &VirtualBackend,
        host: MockReadinessHost,
    ) -> Driver<VirtualBackend, MockReadinessHost> {
        let source = backend.clone();
        Driver::new(move || Ok(source.clone()), host)
    }

    fn open(driver: &mut Driver<VirtualBackend, MockReadinessHost>, path: &str) -> DeviceId {
        let id = driver
            .pre_init(&OptionMap::new().with("Device", path), None)
            .unwrap();
        driver.init(id).unwrap();
        id
    }

    #[test]
    fn test_descriptor_registered_once_for_two_devices() {
        let backend = backend();
        let mut host = MockReadinessHost::new();
        host.expect_add_enabled_device()
            .with(eq(VIRTUAL_EVENT_FD))
            .times(1)
            .return_const(());
        host.expect_remove_enabled_device()
            .with(eq(VIRTUAL_EVENT_FD))
            .times(1)
            .return_const(());

        let mut driver = driver_with(&backend, host);
        let touchpad = open(&mut driver, TOUCHPAD);
        let mouse = open(&mut driver, MOUSE);

        driver.enable(touchpad).unwrap();
        driver.enable(mouse).unwrap();
        assert_eq!(driver.enabled_count(), 2);
        assert_eq!(driver.context_refs(), 2);

        driver.disable(touchpad).unwrap();
        assert!(driver.has_context());
        driver.disable(mouse).unwrap();
        assert!(!driver.has_context());
        assert_eq!(backend.attached_count(), 0);
    }

    #[test]
    fn test_pre_init_detaches_after_probe() {
        let backend = backend();
        let created = Rc::new(Cell::new(0));
        let counter = created.clone();
        let source = backend.clone();
        let mut driver = Driver::new(
            move || {
                counter.set(counter.get() + 1);
                Ok(source.clone())
            },
            MockReadinessHost::new(),
        );

        let id = driver
            .pre_init(
                &OptionMap::new()
                    .with("Device", TOUCHPAD)
                    .with("ScrollMethod", "edge"),
                None,
            )
            .unwrap();

        assert_eq!(created.get(), 1);
        assert!(!driver.has_context());
        assert!(!backend.is_attached(TOUCHPAD));
        assert_eq!(driver.device_state(id).unwrap(), DeviceState::Uninitialized);
        assert_eq!(
            driver.options(id).unwrap().scroll_method,
            Some(ScrollMethod::Edge)
        );
    }

    #[test]
    fn test_missing_device_path() {
        let mut driver = driver_with(&backend(), MockReadinessHost::new());
        let error = driver.pre_init(&OptionMap::new(), None).unwrap_err();
        assert!(matches!(error, DriverError::MissingDevicePath));
    }

    #[test]
    fn test_open_failure_releases_context() {
        let mut driver = driver_with(&backend(), MockReadinessHost::new());
        let error = driver
            .pre_init(&OptionMap::new().with("Device", "/dev/input/event99"), None)
            .unwrap_err();

        assert!(matches!(error, DriverError::DeviceOpen { .. }));
        assert!(!driver.has_context());
    }

    #[test]
    fn test_context_creation_failure() {
        let mut driver: Driver<VirtualBackend, _> = Driver::new(
            || Err(io::Error::new(io::ErrorKind::Other, "no udev")),
            MockReadinessHost::new(),
        );
        let error = driver
            .pre_init(&OptionMap::new().with("Device", TOUCHPAD), None)
            .unwrap_err();
        assert!(matches!(error, DriverError::ContextCreation(_)));
    }

    #[test]
    fn test_enable_requires_init() {
        let mut driver = driver_with(&backend(), MockReadinessHost::new());
        let id = driver
            .pre_init(&OptionMap::new().with("Device", MOUSE), None)
            .unwrap();

        let error = driver.enable(id).unwrap_err();
        assert!(matches!(error, DriverError::InvalidState { .. }));
        assert!(driver.init(id).is_ok());
        assert!(driver.init(id).is_err());
    }

    #[test]
    fn test_events_for_disabled_device_dropped() {
        let backend = backend();
        let mut host = MockReadinessHost::new();
        host.expect_add_enabled_device().return_const(());
        host.expect_remove_enabled_device().return_const(());

        let mut driver = driver_with(&backend, host);
        let touchpad = open(&mut driver, TOUCHPAD);
        let mouse = open(&mut driver, MOUSE);
        driver.enable(touchpad).unwrap();
        driver.enable(mouse).unwrap();
        driver.disable(mouse).unwrap();

        backend.push_event(
            MOUSE,
            RawEventKind::PointerButton {
                button: crate::input::buttons::BTN_LEFT,
                state: ButtonState::Pressed,
            },
        );
        backend.push_event(
            TOUCHPAD,
            RawEventKind::PointerMotion {
                dx: 1.0,
                dy: 1.0,
                unaccelerated: None,
            },
        );

        let mut sink = Vec::new();
        let posted = driver.read_input(&mut sink).unwrap();

        assert_eq!(posted, 1);
        assert_eq!(sink[0].0, touchpad);
        assert!(matches!(sink[0].1, ConsumerEvent::RelativeMotion { .. }));
    }

    #[test]
    fn test_would_block_is_not_an_error() {
        let backend = backend();
        let mut host = MockReadinessHost::new();
        host.expect_add_enabled_device().return_const(());

        let mut driver = driver_with(&backend, host);
        let id = open(&mut driver, MOUSE);
        driver.enable(id).unwrap();

        backend.fail_next_dispatch(io::ErrorKind::WouldBlock);
        let mut sink = Vec::new();
        assert_eq!(driver.read_input(&mut sink).unwrap(), 0);
        assert_eq!(driver.device_state(id).unwrap(), DeviceState::Enabled);
    }

    #[test]
    fn test_end_of_stream_disables_devices() {
        let backend = backend();
        let mut host = MockReadinessHost::new();
        host.expect_add_enabled_device().times(1).return_const(());
        host.expect_remove_enabled_device().times(1).return_const(());

        let mut driver = driver_with(&backend, host);
        let id = open(&mut driver, MOUSE);
        driver.enable(id).unwrap();

        backend.fail_next_dispatch(io::ErrorKind::UnexpectedEof);
        let mut sink = Vec::new();
        assert!(driver.read_input(&mut sink).is_err());
        assert_eq!(driver.device_state(id).unwrap(), DeviceState::Disabled);
        assert!(!driver.has_context());
    }

    #[test]
    fn test_other_dispatch_error_keeps_devices() {
        let backend = backend();
        let mut host = MockReadinessHost::new();
        host.expect_add_enabled_device().return_const(());

        let mut driver = driver_with(&backend, host);
        let id = open(&mut driver, MOUSE);
        driver.enable(id).unwrap();

        backend.fail_next_dispatch(io::ErrorKind::InvalidData);
        let mut sink = Vec::new();
        let error = driver.read_input(&mut sink).unwrap_err();
        assert!(matches!(error, DriverError::Dispatch(_)));
        assert_eq!(driver.device_state(id).unwrap(), DeviceState::Enabled);
    }

    #[test]
    fn test_server_fd_bound_only_while_attached() {
        let backend = backend().with_node_opening(true);
        let mut host = MockReadinessHost::new();
        host.expect_add_enabled_device().return_const(());
        host.expect_remove_enabled_device().return_const(());

        let mut driver = driver_with(&backend, host);
        let id = driver
            .pre_init(&OptionMap::new().with("Device", MOUSE), Some(55))
            .unwrap();
        assert!(driver.registry.is_empty());

        driver.init(id).unwrap();
        driver.enable(id).unwrap();
        assert_eq!(driver.registry.lookup(Path::new(MOUSE)), Some(55));

        driver.disable(id).unwrap();
        assert!(driver.registry.is_empty());
    }

    #[test]
    fn test_device_control_and_info() {
        let backend = backend();
        let mut host = MockReadinessHost::new();
        host.expect_add_enabled_device().return_const(());
        host.expect_remove_enabled_device().return_const(());

        let mut driver = driver_with(&backend, host);
        let id = driver
            .pre_init(&OptionMap::new().with("Device", TOUCHPAD), None)
            .unwrap();

        driver.device_control(id, DeviceControl::Init).unwrap();
        driver.device_control(id, DeviceControl::On).unwrap();

        let info = driver.device_info(id).unwrap();
        assert_eq!(info.device_type, DeviceType::Touchpad);
        assert_eq!(info.state, DeviceState::Enabled);
        assert!(!info.absolute);

        driver.device_control(id, DeviceControl::Close).unwrap();
        assert_eq!(driver.device_state(id).unwrap(), DeviceState::Uninitialized);

        driver.uninit(id).unwrap();
        assert!(matches!(
            driver.device_info(id),
            Err(DriverError::UnknownDevice(_))
        ));
    }

    #[test]
    fn test_update_leds_reaches_enabled_device() {
        let backend = VirtualBackend::new([VirtualDeviceSpec::keyboard("/dev/input/event2")]);
        let mut host = MockReadinessHost::new();
        host.expect_add_enabled_device().return_const(());

        let mut driver = driver_with(&backend, host);
        let id = open(&mut driver, "/dev/input/event2");

        driver.update_leds(id, Led::CapsLock.into()).unwrap();
        let device = backend.device("/dev/input/event2").unwrap();
        assert!(device.leds().is_empty());

        driver.enable(id).unwrap();
        driver
            .update_leds(id, Led::CapsLock | Led::NumLock)
            .unwrap();
        assert_eq!(device.leds(), Led::CapsLock | Led::NumLock);
    }

    #[test]
    fn test_set_scroll_distance() {
        let mut driver = driver_with(&backend(), MockReadinessHost::new());
        assert!(driver.set_scroll_distance(0.0, 15.0).is_err());
        assert!(driver.set_scroll_distance(10.0, 20.0).is_ok());
    }
}
