//! Device tree enumeration from sysfs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::usb::DeviceNode;

/// Default root of the device hierarchy.
pub const SYSFS_DEVICES: &str = "/sys/devices";

/// Attribute files read for every device.
const ATTRIBUTES: &[&str] = &["idVendor", "idProduct", "manufacturer", "product", "serial"];

/// Reads the device hierarchy below a sysfs root.
#[derive(Debug, Clone)]
pub struct Sysfs {
    /// Directory the walk starts at.
    root: PathBuf,
}

impl Default for Sysfs {
    fn default() -> Self {
        Self::new(SYSFS_DEVICES)
    }
}

impl Sysfs {
    /// A scanner rooted at `root` instead of `/sys/devices`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the device forest below the root.
    ///
    /// Directories holding a `uevent` file are devices. Other directories
    /// are walked through and their devices are attached to the nearest
    /// device above them. Symlinks are skipped, which keeps the walk a tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be read. Unreadable directories
    /// further down are skipped.
    pub fn scan(&self) -> io::Result<Vec<DeviceNode>> {
        let mut forest = Vec::new();
        for dir in subdirs(&self.root)? {
            collect(&dir, &mut forest);
        }
        Ok(forest)
    }
}

/// Real subdirectories of `dir`, sorted by name.
fn subdirs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Adds the devices at or below `dir` to `out`.
fn collect(dir: &Path, out: &mut Vec<DeviceNode>) {
    let below = subdirs(dir).unwrap_or_else(|e| {
        tracing::trace!(path = %dir.display(), "skipping unreadable directory: {e}");
        Vec::new()
    });
    match read_device(dir) {
        Some(mut node) => {
            for child in &below {
                collect(child, &mut node.children);
            }
            out.push(node);
        }
        None => {
            for child in &below {
                collect(child, out);
            }
        }
    }
}

/// Reads the `uevent` properties and attributes of `dir`, if it is a device.
fn read_device(dir: &Path) -> Option<DeviceNode> {
    let uevent = fs::read_to_string(dir.join("uevent")).ok()?;
    let mut node = DeviceNode::new(dir);
    for line in uevent.lines() {
        if let Some((key, value)) = line.split_once('=') {
            node.properties.insert(key.to_owned(), value.to_owned());
        }
    }
    for &attr in ATTRIBUTES {
        if let Ok(value) = fs::read_to_string(dir.join(attr)) {
            node.attributes.insert(attr.to_owned(), value.trim().to_owned());
        }
    }
    Some(node)
}
