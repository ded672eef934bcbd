//! USB device selection over the host device tree.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::host::Host;

/// One node of the host device tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct DeviceNode {
    /// Location of the node in the device tree.
    pub syspath: PathBuf,
    /// Properties from the node's `uevent`, such as `DEVNAME`.
    pub properties: BTreeMap<String, String>,
    /// Attribute files such as `idVendor` and `idProduct`.
    pub attributes: BTreeMap<String, String>,
    /// Nodes below this one.
    pub children: Vec<DeviceNode>,
}

impl DeviceNode {
    /// A node at `syspath` with no properties or children.
    pub fn new(syspath: impl Into<PathBuf>) -> Self {
        Self {
            syspath: syspath.into(),
            ..Self::default()
        }
    }

    /// Sets a `uevent` property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Sets an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Appends a child node.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// The `DEVNAME` property, if the node has a device file.
    pub fn devname(&self) -> Option<&str> {
        self.properties.get("DEVNAME").map(String::as_str)
    }

    /// Returns `true` if this is a USB device node with the given IDs.
    ///
    /// A `None` vendor or product matches any value.
    pub fn matches(&self, vendor: Option<&str>, product: Option<&str>) -> bool {
        let attr = |k: &str| self.attributes.get(k).map(String::as_str);
        self.devname().is_some_and(|d| d.contains("usb"))
            && vendor.is_none_or(|v| attr("idVendor") == Some(v))
            && product.is_none_or(|p| attr("idProduct") == Some(p))
    }

    /// Appends `/dev/DEVNAME` for this node and all of its descendants, in
    /// pre-order. Nodes without `DEVNAME` add nothing.
    fn collect_paths(&self, out: &mut Vec<String>) {
        if let Some(devname) = self.devname() {
            out.push(format!("/dev/{devname}"));
        }
        for child in &self.children {
            child.collect_paths(out);
        }
    }
}

/// Returns the device paths of every matching node in `forest` together with
/// the paths of everything below it.
///
/// The forest is walked in pre-order. Once a node matches, its subtree is
/// emitted whole and not searched again, so no path appears twice.
pub fn matching_paths(
    forest: &[DeviceNode],
    vendor: Option<&str>,
    product: Option<&str>,
) -> Vec<String> {
    /// Pre-order search for matching subtree roots.
    fn walk(
        node: &DeviceNode,
        vendor: Option<&str>,
        product: Option<&str>,
        out: &mut Vec<String>,
    ) {
        if node.matches(vendor, product) {
            node.collect_paths(out);
            return;
        }
        for child in &node.children {
            walk(child, vendor, product, out);
        }
    }

    let mut out = Vec::new();
    for node in forest {
        walk(node, vendor, product, &mut out);
    }
    out
}

/// Enumerates the host device tree and returns the device paths for one
/// `[vendor][:product]` selector. `None` on either side matches any value.
///
/// # Errors
///
/// Returns the enumeration error of [`Host::devices`].
pub fn usb_device_paths(
    host: &dyn Host,
    vendor: Option<&str>,
    product: Option<&str>,
) -> Result<Vec<String>> {
    let forest = host.devices()?;
    Ok(matching_paths(&forest, vendor, product))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usb(path: &str, devname: &str) -> DeviceNode {
        DeviceNode::new(path)
            .with_property("DEVNAME", devname)
            .with_attribute("idVendor", "046d")
            .with_attribute("idProduct", "c52b")
    }

    #[test]
    fn match_requires_usb_devname_and_ids() {
        let node = usb("/sys/devices/a", "bus/usb/001/004");
        assert!(node.matches(Some("046d"), Some("c52b")));
        assert!(node.matches(Some("046d"), None));
        assert!(!node.matches(Some("046d"), Some("0000")));
        assert!(!node.matches(Some("1234"), None));
        assert!(node.matches(None, Some("c52b")));
        assert!(!node.matches(None, Some("0000")));

        let not_usb = DeviceNode::new("/sys/devices/b")
            .with_property("DEVNAME", "sda")
            .with_attribute("idVendor", "046d");
        assert!(!not_usb.matches(Some("046d"), None));

        let no_devname = DeviceNode::new("/sys/devices/c").with_attribute("idVendor", "046d");
        assert!(!no_devname.matches(Some("046d"), None));
    }

    #[test]
    fn subtree_is_expanded_root_first() {
        let tree = usb("/sys/devices/root", "bus/usb/001/004").with_child(
            DeviceNode::new("/sys/devices/root/child")
                .with_property("DEVNAME", "hidraw0")
                .with_child(
                    DeviceNode::new("/sys/devices/root/child/grandchild")
                        .with_property("DEVNAME", "input/event7"),
                ),
        );
        assert_eq!(
            matching_paths(&[tree], Some("046d"), Some("c52b")),
            ["/dev/bus/usb/001/004", "/dev/hidraw0", "/dev/input/event7"]
        );
    }

    #[test]
    fn nested_match_is_not_emitted_twice() {
        let tree = usb("/r", "bus/usb/001/002").with_child(usb("/r/c", "bus/usb/001/003"));
        assert_eq!(
            matching_paths(&[tree], Some("046d"), None),
            ["/dev/bus/usb/001/002", "/dev/bus/usb/001/003"]
        );
    }

    #[test]
    fn unnamed_nodes_are_walked_through() {
        let tree = DeviceNode::new("/sys/devices/pci0000:00").with_child(
            DeviceNode::new("/sys/devices/pci0000:00/usb1")
                .with_child(usb("/sys/devices/pci0000:00/usb1/1-1", "bus/usb/001/005")),
        );
        assert_eq!(
            matching_paths(&[tree], Some("046d"), None),
            ["/dev/bus/usb/001/005"]
        );
    }

    #[test]
    fn product_alone_matches_any_vendor() {
        let forest = [
            usb("/a", "bus/usb/001/002"),
            usb("/b", "bus/usb/002/002").with_attribute("idVendor", "1d6b"),
            usb("/c", "bus/usb/003/002").with_attribute("idProduct", "0001"),
        ];
        assert_eq!(
            matching_paths(&forest, None, Some("c52b")),
            ["/dev/bus/usb/001/002", "/dev/bus/usb/002/002"]
        );
    }

    #[test]
    fn empty_forest_gives_nothing() {
        assert!(matching_paths(&[], Some("046d"), None).is_empty());
    }
}
