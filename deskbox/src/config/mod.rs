//! Sandbox configuration layers.
//!
//! A sandbox is described by two layers with the same shape: the sandbox's
//! own file and the site-wide defaults. Every scalar is an `Option` so that
//! "not set" and "set to the zero value" stay distinct; [`resolve`] merges
//! the two into a [`ResolvedConfig`].

mod file;
mod resolve;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::spec::{CpuLimits, Device, MemoryLimits, Mount, PortMapping, Rlimit};

pub use file::{load, load_defaults, load_sandbox, parse_defaults, parse_sandbox, scaffold};
pub use resolve::{Flags, ResolvedBuild, ResolvedConfig, ResolvedLimits, ResolvedRun, resolve};

/// Prefix of every image built from a sandbox file.
pub const IMAGE_PREFIX: &str = "deskbox";

/// A boolean feature of a sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Flag {
    /// X11 display forwarding.
    X11,
    /// Wayland display forwarding.
    Wayland,
    /// Direct rendering device.
    Dri,
    /// GPU access; same device as [`Flag::Dri`].
    Gpu,
    /// Share the host IPC namespace.
    Ipc,
    /// PulseAudio client socket.
    Pulseaudio,
    /// PipeWire client socket.
    Pipewire,
    /// Session bus socket.
    Dbus,
    /// Legacy switch for user-mode networking.
    Net,
    /// Rootless UID/GID remapping.
    Uidmap,
    /// Persistent home directory.
    Home,
    /// Host fonts.
    Fonts,
}

impl Flag {
    /// Every flag, in pipeline order.
    pub const ALL: &[Self] = &[
        Self::X11,
        Self::Wayland,
        Self::Dri,
        Self::Gpu,
        Self::Ipc,
        Self::Pulseaudio,
        Self::Pipewire,
        Self::Dbus,
        Self::Net,
        Self::Uidmap,
        Self::Home,
        Self::Fonts,
    ];
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::X11 => "x11",
            Self::Wayland => "wayland",
            Self::Dri => "dri",
            Self::Gpu => "gpu",
            Self::Ipc => "ipc",
            Self::Pulseaudio => "pulseaudio",
            Self::Pipewire => "pipewire",
            Self::Dbus => "dbus",
            Self::Net => "net",
            Self::Uidmap => "uidmap",
            Self::Home => "home",
            Self::Fonts => "fonts",
        })
    }
}

/// Layer compression of a built image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Compression {
    /// No compression.
    #[default]
    Uncompressed,
    /// gzip.
    Gzip,
    /// bzip2.
    Bzip2,
    /// xz.
    Xz,
    /// zstd.
    Zstd,
}

/// `[build]` table of a layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[non_exhaustive]
pub struct BuildConfig {
    /// Containerfile text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Build context; the configuration directory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_directory: Option<String>,
    /// Layer compression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<Compression>,
    /// Extra names for the built image.
    pub additional_tags: BTreeSet<String>,
    /// `--ulimit` values for build containers.
    pub ulimits: Vec<String>,
}

/// `[run]` table of a layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[non_exhaustive]
pub struct RunConfig {
    /// See [`Flag::X11`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x11: Option<bool>,
    /// See [`Flag::Wayland`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wayland: Option<bool>,
    /// See [`Flag::Dri`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dri: Option<bool>,
    /// See [`Flag::Gpu`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu: Option<bool>,
    /// See [`Flag::Ipc`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipc: Option<bool>,
    /// See [`Flag::Pulseaudio`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pulseaudio: Option<bool>,
    /// See [`Flag::Pipewire`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipewire: Option<bool>,
    /// See [`Flag::Dbus`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dbus: Option<bool>,
    /// See [`Flag::Net`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net: Option<bool>,
    /// See [`Flag::Uidmap`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uidmap: Option<bool>,
    /// See [`Flag::Home`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<bool>,
    /// See [`Flag::Fonts`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fonts: Option<bool>,
    /// Network mode string (`host`, `slirp4netns:...`, a network name).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// Container name and hostname override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Where the persistent home is mounted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_path: Option<String>,
    /// `SRC[:DEST[:OPTS]]` bind mounts.
    pub volumes: Vec<String>,
    /// `KEY[=VALUE]` environment entries.
    pub env: Vec<String>,
    /// Host device paths.
    pub devices: Vec<String>,
    /// `CONTAINER_PORT:HOST_PORT` mappings.
    pub ports: Vec<String>,
    /// `VENDOR[:PRODUCT]` USB selectors.
    pub usb_devices: Vec<String>,
    /// Mounts passed through unparsed.
    pub raw_mounts: Vec<Mount>,
    /// Port mappings passed through unparsed.
    pub raw_ports: Vec<PortMapping>,
    /// Devices passed through unparsed.
    pub raw_devices: Vec<Device>,
    /// Resource limits.
    pub limits: LimitsConfig,
}

impl RunConfig {
    /// The layer's value for `flag`.
    pub const fn flag(&self, flag: Flag) -> Option<bool> {
        match flag {
            Flag::X11 => self.x11,
            Flag::Wayland => self.wayland,
            Flag::Dri => self.dri,
            Flag::Gpu => self.gpu,
            Flag::Ipc => self.ipc,
            Flag::Pulseaudio => self.pulseaudio,
            Flag::Pipewire => self.pipewire,
            Flag::Dbus => self.dbus,
            Flag::Net => self.net,
            Flag::Uidmap => self.uidmap,
            Flag::Home => self.home,
            Flag::Fonts => self.fonts,
        }
    }

    /// Sets the layer's value for `flag`.
    pub fn set_flag(&mut self, flag: Flag, value: bool) {
        let slot = match flag {
            Flag::X11 => &mut self.x11,
            Flag::Wayland => &mut self.wayland,
            Flag::Dri => &mut self.dri,
            Flag::Gpu => &mut self.gpu,
            Flag::Ipc => &mut self.ipc,
            Flag::Pulseaudio => &mut self.pulseaudio,
            Flag::Pipewire => &mut self.pipewire,
            Flag::Dbus => &mut self.dbus,
            Flag::Net => &mut self.net,
            Flag::Uidmap => &mut self.uidmap,
            Flag::Home => &mut self.home,
            Flag::Fonts => &mut self.fonts,
        };
        *slot = Some(value);
    }
}

/// `[run.limits]` table of a layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[non_exhaustive]
pub struct LimitsConfig {
    /// Maximum number of tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pids: Option<i64>,
    /// CPU controller.
    pub cpu: CpuLimits,
    /// Memory controller.
    pub memory: MemoryLimits,
    /// POSIX rlimits.
    pub rlimits: Vec<Rlimit>,
    /// Raw cgroup v2 settings.
    pub cgroup_conf: BTreeMap<String, String>,
}

/// The configuration of one sandbox, as read from `<name>.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[non_exhaustive]
pub struct SandboxConfig {
    /// Sandbox name, taken from the file name.
    #[serde(skip)]
    pub name: String,
    /// Image the sandbox runs.
    #[serde(skip)]
    pub image_name: String,
    /// Image build settings.
    pub build: BuildConfig,
    /// Container settings.
    pub run: RunConfig,
}

impl SandboxConfig {
    /// An empty configuration for sandbox `name`, running `deskbox/<name>`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            image_name: format!("{IMAGE_PREFIX}/{name}"),
            name,
            ..Self::default()
        }
    }
}

/// Site-wide defaults, the `[defaults]` table of `deskbox.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[non_exhaustive]
pub struct Defaults {
    /// Default build settings.
    pub build: BuildConfig,
    /// Default container settings.
    pub run: RunConfig,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn flag_names_match_config_keys() {
        for &flag in Flag::ALL {
            assert_eq!(serde_json::to_string(&flag).unwrap(), format!("\"{flag}\""));
        }
    }

    #[test]
    fn flag_accessors_agree() {
        let mut run = RunConfig::default();
        for &flag in Flag::ALL {
            assert_eq!(run.flag(flag), None);
            run.set_flag(flag, flag == Flag::Fonts);
        }
        assert_eq!(run.fonts, Some(true));
        assert_eq!(run.x11, Some(false));
        assert_eq!(run.flag(Flag::Net), Some(false));
    }

    #[test]
    fn new_sandbox_gets_prefixed_image() {
        let config = SandboxConfig::new("firefox");
        assert_eq!(config.name, "firefox");
        assert_eq!(config.image_name, "deskbox/firefox");
    }
}
