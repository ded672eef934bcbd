//! Access to the host the sandbox is assembled for.
//!
//! The assembly pipeline never reads the process environment or the
//! filesystem directly. Everything it needs from the host goes through the
//! [`Host`] trait, so an assembly can be replayed against a fixed
//! [`SnapshotHost`].

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::layout::Layout;
use crate::sysfs::Sysfs;
use crate::usb::DeviceNode;

/// Host facts and side effects used while assembling a spec.
pub trait Host {
    /// Value of an environment variable.
    fn var(&self, key: &str) -> Option<String>;

    /// Real user ID of the invoking user.
    fn uid(&self) -> u32;

    /// Directory holding per-sandbox home directories.
    fn home_storage(&self) -> PathBuf;

    /// Creates `path` and its parents. Succeeds if it already exists.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// The host device tree.
    fn devices(&self) -> io::Result<Vec<DeviceNode>>;
}

/// The machine deskbox is running on.
#[derive(Debug, Clone)]
pub struct SystemHost {
    /// Home storage root.
    storage: PathBuf,
    /// Device tree scanner.
    sysfs: Sysfs,
}

impl SystemHost {
    /// A host whose home directories live in `layout`'s storage directory.
    pub fn new(layout: &Layout) -> Self {
        Self {
            storage: layout.storage_dir().to_path_buf(),
            sysfs: Sysfs::default(),
        }
    }

    /// Uses `sysfs` for device enumeration.
    #[must_use]
    pub fn with_sysfs(mut self, sysfs: Sysfs) -> Self {
        self.sysfs = sysfs;
        self
    }
}

impl Host for SystemHost {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    #[cfg(unix)]
    fn uid(&self) -> u32 {
        nix::unistd::getuid().as_raw()
    }

    #[cfg(not(unix))]
    fn uid(&self) -> u32 {
        0
    }

    fn home_storage(&self) -> PathBuf {
        self.storage.clone()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn devices(&self) -> io::Result<Vec<DeviceNode>> {
        self.sysfs.scan()
    }
}

/// A fixed host: environment, uid and device tree are plain values.
///
/// Directory creation still touches the real filesystem below
/// [`Host::home_storage`].
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct SnapshotHost {
    /// Environment.
    pub vars: BTreeMap<String, String>,
    /// User ID.
    pub uid: u32,
    /// Home storage root.
    pub storage: PathBuf,
    /// Device tree; `None` makes enumeration fail.
    pub devices: Option<Vec<DeviceNode>>,
}

impl SnapshotHost {
    /// Sets an environment variable.
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Sets the user ID.
    #[must_use]
    pub const fn with_uid(mut self, uid: u32) -> Self {
        self.uid = uid;
        self
    }

    /// Sets the home storage root.
    #[must_use]
    pub fn with_storage(mut self, storage: impl Into<PathBuf>) -> Self {
        self.storage = storage.into();
        self
    }

    /// Sets the device tree.
    #[must_use]
    pub fn with_devices(mut self, devices: Vec<DeviceNode>) -> Self {
        self.devices = Some(devices);
        self
    }
}

impl Host for SnapshotHost {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn uid(&self) -> u32 {
        self.uid
    }

    fn home_storage(&self) -> PathBuf {
        self.storage.clone()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn devices(&self) -> io::Result<Vec<DeviceNode>> {
        self.devices.clone().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Unsupported, "no device tree in snapshot")
        })
    }
}
