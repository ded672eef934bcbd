//! Container specification types produced by an assembly run.
//!
//! A [`Spec`] is what the runtime collaborator receives: every field maps
//! onto a container-create option. All maps are ordered so that two
//! assemblies of the same input serialize identically.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::idmap::IdMappings;
use crate::network::NetworkMode;

/// Mount type used for every parsed volume.
pub const BIND: &str = "bind";

/// A container specification under construction or ready for handoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Spec {
    /// Container name override; the runtime picks one when `None`.
    pub name: Option<String>,
    /// Image reference the container is created from.
    pub image: String,
    /// Hostname inside the container.
    pub hostname: String,
    /// File mode creation mask of the initial process.
    pub umask: String,
    /// Allocate a pseudo-TTY.
    pub terminal: bool,
    /// Keep stdin open.
    pub stdin: bool,
    /// Remove the container once it exits.
    pub remove: bool,
    /// Entrypoint override; empty keeps the image's.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entrypoint: Vec<String>,
    /// User the initial process runs as.
    pub user: Option<String>,
    /// Environment of the initial process.
    pub env: BTreeMap<String, String>,
    /// Container labels.
    pub labels: BTreeMap<String, String>,
    /// Mounts, applied in order.
    pub mounts: Vec<Mount>,
    /// Device nodes exposed to the container.
    pub devices: Vec<Device>,
    /// Published ports.
    pub port_mappings: Vec<PortMapping>,
    /// Namespace modes.
    pub namespaces: Namespaces,
    /// UID/GID remapping for a private user namespace.
    pub id_mappings: Option<IdMappings>,
    /// cgroup CPU, memory and pids limits.
    pub resource_limits: Option<ResourceLimits>,
    /// POSIX resource limits of the initial process.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rlimits: Vec<Rlimit>,
    /// Raw cgroup v2 key/value settings.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cgroup_conf: BTreeMap<String, String>,
}

impl Spec {
    /// Returns a spec for `image` with every other field empty.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            name: None,
            image: image.into(),
            hostname: String::new(),
            umask: String::new(),
            terminal: false,
            stdin: false,
            remove: false,
            entrypoint: Vec::new(),
            user: None,
            env: BTreeMap::new(),
            labels: BTreeMap::new(),
            mounts: Vec::new(),
            devices: Vec::new(),
            port_mappings: Vec::new(),
            namespaces: Namespaces::default(),
            id_mappings: None,
            resource_limits: None,
            rlimits: Vec::new(),
            cgroup_conf: BTreeMap::new(),
        }
    }

    /// Keeps the container after it exits.
    #[must_use]
    pub const fn keep(mut self) -> Self {
        self.remove = false;
        self
    }

    /// Replaces the entrypoint, unless `command` is empty.
    #[must_use]
    pub fn with_entrypoint(mut self, command: Vec<String>) -> Self {
        if !command.is_empty() {
            self.entrypoint = command;
        }
        self
    }

    /// Sets an environment variable, replacing any previous value.
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.insert(key.into(), value.into());
    }

    /// Returns the first mount whose destination is `dest`.
    pub fn mount_at(&self, dest: &str) -> Option<&Mount> {
        self.mounts.iter().find(|m| m.destination == dest)
    }
}

/// A filesystem mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Mount {
    /// Path inside the container.
    pub destination: String,
    /// Path on the host.
    pub source: String,
    /// Mount type (`bind`, `tmpfs`, ...).
    #[serde(rename = "type", default = "default_mount_type")]
    pub kind: String,
    /// `mount -o` style options.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// Serde default for [`Mount::kind`].
fn default_mount_type() -> String {
    BIND.to_owned()
}

impl Mount {
    /// A bind mount of `source` at `destination`.
    pub fn bind(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            source: source.into(),
            kind: BIND.to_owned(),
            options: Vec::new(),
        }
    }

    /// A bind mount of `path` at the same path inside the container.
    pub fn same_path(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::bind(path.clone(), path)
    }

    /// Adds mount options.
    #[must_use]
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.extend(options.into_iter().map(Into::into));
        self
    }

    /// Returns `true` if the mount carries the `ro` option.
    pub fn is_read_only(&self) -> bool {
        self.options.iter().any(|o| o == "ro")
    }
}

/// A device node exposed to the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Device {
    /// Device path inside the container.
    pub path: String,
    /// Device type (`c`, `b`, `u` or `p`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Major number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<i64>,
    /// Minor number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor: Option<i64>,
    /// File mode of the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_mode: Option<u32>,
    /// Owner UID of the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    /// Owner GID of the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
}

impl Device {
    /// A device identified only by its path.
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: None,
            major: None,
            minor: None,
            file_mode: None,
            uid: None,
            gid: None,
        }
    }
}

/// A published port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct PortMapping {
    /// Port inside the container.
    pub container_port: u16,
    /// Port on the host.
    pub host_port: u16,
    /// Host address to bind; all addresses when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    /// Number of consecutive ports, starting at both ports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<u16>,
    /// Comma-separated protocols (`tcp`, `udp`, `sctp`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

impl PortMapping {
    /// A single-port mapping.
    pub const fn new(container_port: u16, host_port: u16) -> Self {
        Self {
            container_port,
            host_port,
            host_ip: None,
            range: None,
            protocol: None,
        }
    }
}

/// Namespace settings of a spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Namespaces {
    /// Network namespace.
    pub network: NetworkMode,
    /// IPC namespace.
    pub ipc: NamespaceMode,
    /// User namespace.
    pub user: NamespaceMode,
}

/// Mode of a non-network namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum NamespaceMode {
    /// Left to the runtime.
    #[default]
    Default,
    /// Shared with the host.
    Host,
    /// A new namespace private to the container.
    Private,
}

/// cgroup limits attached to a spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ResourceLimits {
    /// CPU controller settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuLimits>,
    /// Memory controller settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryLimits>,
    /// Maximum number of tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pids: Option<i64>,
}

/// CPU controller settings. Unset fields are left to the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[non_exhaustive]
pub struct CpuLimits {
    /// Relative CPU weight.
    pub shares: Option<u64>,
    /// Allowed CPU time in microseconds per period.
    pub quota: Option<i64>,
    /// Period length in microseconds.
    pub period: Option<u64>,
    /// CPUs the container may run on (`0-3,6`).
    pub cpus: Option<String>,
    /// Memory nodes the container may use.
    pub mems: Option<String>,
}

impl CpuLimits {
    /// Field-wise merge: values set on `self` win over `defaults`.
    #[must_use]
    pub fn or(self, defaults: &Self) -> Self {
        Self {
            shares: self.shares.or(defaults.shares),
            quota: self.quota.or(defaults.quota),
            period: self.period.or(defaults.period),
            cpus: self.cpus.or_else(|| defaults.cpus.clone()),
            mems: self.mems.or_else(|| defaults.mems.clone()),
        }
    }

    /// Returns `true` if no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Memory controller settings. Unset fields are left to the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[non_exhaustive]
pub struct MemoryLimits {
    /// Hard limit in bytes.
    pub limit: Option<i64>,
    /// Soft limit in bytes.
    pub reservation: Option<i64>,
    /// Memory plus swap limit in bytes.
    pub swap: Option<i64>,
    /// Swappiness, 0 to 100.
    pub swappiness: Option<u64>,
    /// Disable the OOM killer.
    pub disable_oom_killer: Option<bool>,
}

impl MemoryLimits {
    /// Field-wise merge: values set on `self` win over `defaults`.
    #[must_use]
    pub fn or(self, defaults: &Self) -> Self {
        Self {
            limit: self.limit.or(defaults.limit),
            reservation: self.reservation.or(defaults.reservation),
            swap: self.swap.or(defaults.swap),
            swappiness: self.swappiness.or(defaults.swappiness),
            disable_oom_killer: self.disable_oom_killer.or(defaults.disable_oom_killer),
        }
    }

    /// Returns `true` if no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A POSIX resource limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[non_exhaustive]
pub struct Rlimit {
    /// Resource name (`RLIMIT_NOFILE`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Hard limit.
    pub hard: u64,
    /// Soft limit.
    pub soft: u64,
}

impl Rlimit {
    /// A limit on `kind` with the given soft and hard values.
    pub fn new(kind: impl Into<String>, soft: u64, hard: u64) -> Self {
        Self {
            kind: kind.into(),
            hard,
            soft,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn keep_and_entrypoint_overrides() {
        let mut spec = Spec::new("app/image");
        spec.remove = true;
        spec.entrypoint = vec!["/bin/app".into()];

        let spec = spec.keep().with_entrypoint(Vec::new());
        assert!(!spec.remove);
        assert_eq!(spec.entrypoint, ["/bin/app"]);

        let spec = spec.with_entrypoint(vec!["/bin/sh".into(), "-l".into()]);
        assert_eq!(spec.entrypoint, ["/bin/sh", "-l"]);
    }

    #[test]
    fn raw_mount_defaults_to_bind() {
        let m: Mount =
            serde_json::from_str(r#"{"destination":"/srv","source":"/data"}"#).unwrap();
        assert_eq!(m, Mount::bind("/data", "/srv"));
        assert!(!m.is_read_only());
    }

    #[test]
    fn cpu_limits_merge_fieldwise() {
        let defaults = CpuLimits {
            shares: Some(1024),
            cpus: Some("0-3".into()),
            ..CpuLimits::default()
        };
        let own = CpuLimits {
            shares: Some(512),
            ..CpuLimits::default()
        };
        let merged = own.or(&defaults);
        assert_eq!(merged.shares, Some(512));
        assert_eq!(merged.cpus.as_deref(), Some("0-3"));
        assert!(merged.quota.is_none());
        assert!(CpuLimits::default().is_empty());
    }

    #[test]
    fn device_serializes_only_set_fields() {
        let json = serde_json::to_string(&Device::path("/dev/dri")).unwrap();
        assert_eq!(json, r#"{"path":"/dev/dri"}"#);
    }
}
