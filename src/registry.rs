//! Device Registry
//!
//! Tracks descriptors the host opened on the driver's behalf so that a
//! device node can be attached without reopening it. When the host does not
//! pre-open devices the registry stays empty and nodes are opened directly.

use nix::fcntl::OFlag;
use nix::sys::stat::Mode;
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One host-provided descriptor bound to a device path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceBinding {
    /// Device node path
    pub path: PathBuf,
    /// Descriptor owned by the host
    pub fd: RawFd,
}

/// Path to descriptor bindings, at most one per path
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    bindings: Vec<DeviceBinding>,
}

impl DeviceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `fd` to `path`, replacing any earlier binding for the path
    pub fn bind(&mut self, path: impl Into<PathBuf>, fd: RawFd) {
        let path = path.into();
        self.bindings.retain(|binding| binding.path != path);
        debug!("Bound {} to fd {}", path.display(), fd);
        self.bindings.push(DeviceBinding { path, fd });
    }

    /// Descriptor most recently bound to exactly `path`
    pub fn lookup(&self, path: &Path) -> Option<RawFd> {
        self.bindings
            .iter()
            .rev()
            .find(|binding| binding.path == path)
            .map(|binding| binding.fd)
    }

    /// Remove the binding that owns `fd`
    pub fn unbind(&mut self, fd: RawFd) -> Option<DeviceBinding> {
        let index = self.bindings.iter().position(|binding| binding.fd == fd)?;
        Some(self.bindings.remove(index))
    }

    /// Whether `fd` belongs to the host
    pub fn contains_fd(&self, fd: RawFd) -> bool {
        self.bindings.iter().any(|binding| binding.fd == fd)
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// True when nothing is bound
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Opens and closes device nodes for an event source
pub trait OpenRestricted {
    /// Open the device node at `path`
    fn open_restricted(&mut self, path: &Path, flags: OFlag) -> nix::Result<RawFd>;

    /// Release a descriptor returned by [`OpenRestricted::open_restricted`]
    fn close_restricted(&mut self, fd: RawFd);
}

/// Opener that reuses host-provided descriptors before opening nodes itself
#[derive(Debug)]
pub struct RegistryOpener<'a> {
    registry: &'a DeviceRegistry,
}

impl<'a> RegistryOpener<'a> {
    /// Opener backed by `registry`
    pub fn new(registry: &'a DeviceRegistry) -> Self {
        Self { registry }
    }
}

impl OpenRestricted for RegistryOpener<'_> {
    fn open_restricted(&mut self, path: &Path, flags: OFlag) -> nix::Result<RawFd> {
        if let Some(fd) = self.registry.lookup(path) {
            debug!("Using host descriptor {} for {}", fd, path.display());
            return Ok(fd);
        }
        nix::fcntl::open(path, flags, Mode::empty())
    }

    fn close_restricted(&mut self, fd: RawFd) {
        if self.registry.contains_fd(fd) {
            return;
        }
        if let Err(e) = nix::unistd::close(fd) {
            warn!("Failed to close fd {}: {}", fd, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsRawFd;

    #[test]
    fn test_bind_and_lookup() {
        let mut registry = DeviceRegistry::new();
        registry.bind("/dev/input/event3", 11);
        registry.bind("/dev/input/event4", 12);

        assert_eq!(registry.lookup(Path::new("/dev/input/event3")), Some(11));
        assert_eq!(registry.lookup(Path::new("/dev/input/event4")), Some(12));
        assert_eq!(registry.lookup(Path::new("/dev/input/event5")), None);
    }

    #[test]
    fn test_rebind_replaces_path() {
        let mut registry = DeviceRegistry::new();
        registry.bind("/dev/input/event3", 11);
        registry.bind("/dev/input/event3", 14);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(Path::new("/dev/input/event3")), Some(14));
        assert!(!registry.contains_fd(11));
    }

    #[test]
    fn test_unbind() {
        let mut registry = DeviceRegistry::new();
        registry.bind("/dev/input/event3", 11);

        let binding = registry.unbind(11).unwrap();
        assert_eq!(binding.path, PathBuf::from("/dev/input/event3"));
        assert!(registry.is_empty());
        assert!(registry.unbind(11).is_none());
    }

    #[test]
    fn test_opener_prefers_host_descriptor() {
        let mut registry = DeviceRegistry::new();
        registry.bind("/dev/input/event-host", 77);

        let mut opener = RegistryOpener::new(&registry);
        let fd = opener
            .open_restricted(Path::new("/dev/input/event-host"), OFlag::O_RDWR)
            .unwrap();
        assert_eq!(fd, 77);

        // Host descriptors are never closed by the opener
        opener.close_restricted(77);
        assert!(registry.contains_fd(77));
    }

    #[test]
    fn test_opener_opens_unbound_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let registry = DeviceRegistry::new();
        let mut opener = RegistryOpener::new(&registry);

        let fd = opener
            .open_restricted(file.path(), OFlag::O_RDONLY | OFlag::O_NONBLOCK)
            .unwrap();
        assert!(fd >= 0);
        assert_ne!(fd, file.as_file().as_raw_fd());
        opener.close_restricted(fd);

        assert!(opener
            .open_restricted(Path::new("/nonexistent/event0"), OFlag::O_RDONLY)
            .is_err());
    }
}
