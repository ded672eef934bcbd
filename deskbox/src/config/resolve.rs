//! Merging a sandbox layer over the defaults.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{BuildConfig, Compression, Defaults, Flag, LimitsConfig, RunConfig, SandboxConfig};
use crate::spec::{CpuLimits, Device, MemoryLimits, Mount, PortMapping, Rlimit};

/// The set of enabled [`Flag`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flags(BTreeSet<Flag>);

impl Flags {
    /// Returns `true` if `flag` is enabled.
    pub fn contains(&self, flag: Flag) -> bool {
        self.0.contains(&flag)
    }

    /// Enables `flag`.
    pub fn insert(&mut self, flag: Flag) {
        self.0.insert(flag);
    }

    /// Enabled flags in [`Flag::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = Flag> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Fully merged sandbox configuration, the input of an assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ResolvedConfig {
    /// Sandbox name. Never empty when the image name is set.
    pub name: String,
    /// Image to run. Must be non-empty for assembly.
    pub image_name: String,
    /// Build settings.
    pub build: ResolvedBuild,
    /// Container settings.
    pub run: ResolvedRun,
}

/// Merged `[build]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ResolvedBuild {
    /// Containerfile text.
    pub instructions: String,
    /// Build context; empty means the configuration directory.
    pub context_directory: String,
    /// Extra image names.
    pub additional_tags: BTreeSet<String>,
    /// Layer compression.
    pub compression: Compression,
    /// `--ulimit` values.
    pub ulimits: Vec<String>,
}

/// Merged `[run]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ResolvedRun {
    /// Enabled flags.
    pub flags: Flags,
    /// Network mode string, empty when unset.
    pub network: String,
    /// Name override, empty when unset.
    pub name: String,
    /// Home mount destination override, empty when unset.
    pub home_path: String,
    /// Volume entries.
    pub volumes: Vec<String>,
    /// Environment entries.
    pub env: Vec<String>,
    /// Device paths.
    pub devices: Vec<String>,
    /// Port entries.
    pub ports: Vec<String>,
    /// USB selectors.
    pub usb_devices: Vec<String>,
    /// Passthrough mounts.
    pub raw_mounts: Vec<Mount>,
    /// Passthrough port mappings.
    pub raw_ports: Vec<PortMapping>,
    /// Passthrough devices.
    pub raw_devices: Vec<Device>,
    /// Resource limits.
    pub limits: ResolvedLimits,
}

impl ResolvedRun {
    /// Returns `true` if `flag` is enabled.
    pub fn has(&self, flag: Flag) -> bool {
        self.flags.contains(flag)
    }
}

/// Merged `[run.limits]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ResolvedLimits {
    /// CPU controller; empty when nothing is set.
    pub cpu: CpuLimits,
    /// Memory controller; empty when nothing is set.
    pub memory: MemoryLimits,
    /// Task limit.
    pub pids: Option<i64>,
    /// POSIX rlimits.
    pub rlimits: Vec<Rlimit>,
    /// Raw cgroup v2 settings.
    pub cgroup_conf: BTreeMap<String, String>,
}

/// Merges `sandbox` over `defaults`.
///
/// Scalars set in the sandbox win, then scalars set in the defaults, then the
/// zero value. A collection is taken whole from the sandbox if it is
/// non-empty and from the defaults otherwise; collections never concatenate.
/// Nested tables merge field by field. Name and image come from the sandbox;
/// an empty name is derived from the image name with `/` replaced by `_`.
pub fn resolve(sandbox: &SandboxConfig, defaults: &Defaults) -> ResolvedConfig {
    let name = if sandbox.name.is_empty() {
        sandbox.image_name.replace('/', "_")
    } else {
        sandbox.name.clone()
    };
    ResolvedConfig {
        name,
        image_name: sandbox.image_name.clone(),
        build: resolve_build(&sandbox.build, &defaults.build),
        run: resolve_run(&sandbox.run, &defaults.run),
    }
}

/// Sandbox value, else default value, else the zero value.
fn scalar<T: Clone + Default>(own: Option<&T>, default: Option<&T>) -> T {
    own.or(default).cloned().unwrap_or_default()
}

/// `own` if it has any element, else `default`.
fn collection<C>(own: &C, default: &C) -> C
where
    C: Clone,
    for<'a> &'a C: IntoIterator,
{
    if own.into_iter().next().is_some() {
        own.clone()
    } else {
        default.clone()
    }
}

/// Merges `[build]`.
fn resolve_build(own: &BuildConfig, default: &BuildConfig) -> ResolvedBuild {
    ResolvedBuild {
        instructions: scalar(own.instructions.as_ref(), default.instructions.as_ref()),
        context_directory: scalar(
            own.context_directory.as_ref(),
            default.context_directory.as_ref(),
        ),
        additional_tags: collection(&own.additional_tags, &default.additional_tags),
        compression: scalar(own.compression.as_ref(), default.compression.as_ref()),
        ulimits: collection(&own.ulimits, &default.ulimits),
    }
}

/// Merges `[run]`.
fn resolve_run(own: &RunConfig, default: &RunConfig) -> ResolvedRun {
    let flags = Flag::ALL
        .iter()
        .copied()
        .filter(|&f| own.flag(f).or(default.flag(f)).unwrap_or(false))
        .collect();
    ResolvedRun {
        flags,
        network: scalar(own.network.as_ref(), default.network.as_ref()),
        name: scalar(own.name.as_ref(), default.name.as_ref()),
        home_path: scalar(own.home_path.as_ref(), default.home_path.as_ref()),
        volumes: collection(&own.volumes, &default.volumes),
        env: collection(&own.env, &default.env),
        devices: collection(&own.devices, &default.devices),
        ports: collection(&own.ports, &default.ports),
        usb_devices: collection(&own.usb_devices, &default.usb_devices),
        raw_mounts: collection(&own.raw_mounts, &default.raw_mounts),
        raw_ports: collection(&own.raw_ports, &default.raw_ports),
        raw_devices: collection(&own.raw_devices, &default.raw_devices),
        limits: resolve_limits(&own.limits, &default.limits),
    }
}

/// Merges `[run.limits]`.
fn resolve_limits(own: &LimitsConfig, default: &LimitsConfig) -> ResolvedLimits {
    ResolvedLimits {
        cpu: own.cpu.clone().or(&default.cpu),
        memory: own.memory.clone().or(&default.memory),
        pids: own.pids.or(default.pids),
        rlimits: collection(&own.rlimits, &default.rlimits),
        cgroup_conf: collection(&own.cgroup_conf, &default.cgroup_conf),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_layers(own: &[&str], default: &[&str]) -> Vec<String> {
        let mut sandbox = SandboxConfig::new("app");
        sandbox.run.env = own.iter().map(|s| (*s).to_owned()).collect();
        let mut defaults = Defaults::default();
        defaults.run.env = default.iter().map(|s| (*s).to_owned()).collect();
        resolve(&sandbox, &defaults).run.env
    }

    #[test]
    fn sequences_replace_never_concatenate() {
        assert_eq!(env_layers(&[], &["A=1"]), ["A=1"]);
        assert_eq!(env_layers(&["B=2"], &["A=1"]), ["B=2"]);
        assert!(env_layers(&[], &[]).is_empty());
    }

    #[test]
    fn explicit_false_beats_default_true() {
        let mut sandbox = SandboxConfig::new("app");
        let mut defaults = Defaults::default();
        defaults.run.x11 = Some(true);
        defaults.run.fonts = Some(true);
        sandbox.run.x11 = Some(false);

        let run = resolve(&sandbox, &defaults).run;
        assert!(!run.has(Flag::X11));
        assert!(run.has(Flag::Fonts));
        assert!(!run.has(Flag::Wayland));
        assert_eq!(run.flags.iter().collect::<Vec<_>>(), [Flag::Fonts]);
    }

    #[test]
    fn explicit_empty_string_beats_default() {
        let mut sandbox = SandboxConfig::new("app");
        let mut defaults = Defaults::default();
        defaults.run.network = Some("host".into());
        assert_eq!(resolve(&sandbox, &defaults).run.network, "host");

        sandbox.run.network = Some(String::new());
        assert_eq!(resolve(&sandbox, &defaults).run.network, "");
    }

    #[test]
    fn limits_merge_fieldwise() {
        let mut sandbox = SandboxConfig::new("app");
        let mut defaults = Defaults::default();
        defaults.run.limits.memory.limit = Some(1 << 30);
        defaults.run.limits.memory.swappiness = Some(10);
        defaults.run.limits.pids = Some(512);
        defaults
            .run
            .limits
            .cgroup_conf
            .insert("memory.high".into(), "512M".into());
        sandbox.run.limits.memory.swappiness = Some(0);

        let limits = resolve(&sandbox, &defaults).run.limits;
        assert_eq!(limits.memory.limit, Some(1 << 30));
        assert_eq!(limits.memory.swappiness, Some(0));
        assert_eq!(limits.pids, Some(512));
        assert_eq!(limits.cgroup_conf["memory.high"], "512M");
        assert!(limits.cpu.is_empty());
    }

    #[test]
    fn identity_comes_from_the_sandbox() {
        let mut defaults = Defaults::default();
        defaults.build.instructions = Some("FROM alpine".into());
        defaults.build.compression = Some(Compression::Zstd);
        let resolved = resolve(&SandboxConfig::new("app"), &defaults);
        assert_eq!(resolved.name, "app");
        assert_eq!(resolved.image_name, "deskbox/app");
        assert_eq!(resolved.build.instructions, "FROM alpine");
        assert_eq!(resolved.build.compression, Compression::Zstd);
    }

    #[test]
    fn empty_name_comes_from_the_image() {
        let mut sandbox = SandboxConfig::new("");
        sandbox.image_name = "app/image".into();
        let resolved = resolve(&sandbox, &Defaults::default());
        assert_eq!(resolved.name, "app_image");
        assert_eq!(resolved.image_name, "app/image");

        sandbox.image_name.clear();
        assert!(resolve(&sandbox, &Defaults::default()).name.is_empty());
    }

    #[test]
    fn resolution_is_deterministic() {
        let mut sandbox = SandboxConfig::new("app");
        sandbox.run.ports = vec!["80:8080".into()];
        sandbox.build.additional_tags = ["b".to_owned(), "a".to_owned()].into();
        let defaults = Defaults::default();
        assert_eq!(resolve(&sandbox, &defaults), resolve(&sandbox, &defaults));
    }
}
