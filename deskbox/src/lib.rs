//! Container specifications for sandboxed desktop applications.
//!
//! `deskbox` turns a per-sandbox configuration, merged with site-wide
//! defaults, into a [`Spec`]: the environment, bind mounts, devices,
//! namespaces, port mappings and resource limits a container engine needs to
//! run a GUI application with exactly the host access it was given.
//!
//! # Quick start
//!
//! ```
//! use deskbox::{Defaults, SandboxConfig, SnapshotHost, assemble, resolve};
//!
//! let mut sandbox = SandboxConfig::new("firefox");
//! sandbox.run.x11 = Some(true);
//! sandbox.run.volumes = vec!["/srv/downloads:/home/user/Downloads".into()];
//!
//! let config = resolve(&sandbox, &Defaults::default());
//! let host = SnapshotHost::default().with_var("DISPLAY", ":0");
//! let assembly = assemble(&config, &host)?;
//!
//! assert_eq!(assembly.spec.env["DISPLAY"], ":0");
//! assert_eq!(assembly.spec.hostname, "deskbox_firefox");
//! assert!(assembly.diagnostics.is_empty());
//! # Ok::<(), deskbox::Error>(())
//! ```
//!
//! On a real machine use [`SystemHost`] and load configuration files with
//! [`load`] from a [`Layout`].

mod config;
mod error;
mod grammar;
mod host;
mod idmap;
mod image;
mod layout;
mod network;
mod pipeline;
mod runtime;
mod spec;
mod sysfs;
mod usb;

pub use config::{
    BuildConfig, Compression, Defaults, Flag, Flags, IMAGE_PREFIX, LimitsConfig, ResolvedBuild,
    ResolvedConfig, ResolvedLimits, ResolvedRun, RunConfig, SandboxConfig, load, load_defaults,
    load_sandbox, parse_defaults, parse_sandbox, resolve, scaffold,
};
pub use error::{Error, Result};
pub use grammar::{parse_env, parse_port, parse_usb_selector, parse_volume};
pub use host::{Host, SnapshotHost, SystemHost};
pub use idmap::{ID_SPACE, IdMap, IdMappings};
pub use image::BuildOptions;
pub use layout::{HOME_ENV, Layout, PathCheck, PathState};
pub use network::{NetworkMode, resolve_network};
pub use pipeline::{
    Assembly, Context, Diagnostic, LABEL_CONTAINER_NAME, LABEL_IMAGE_NAME, LABEL_VERSION, PIPELINE,
    Transform, VERSION, assemble, seed,
};
pub use runtime::{Runtime, launch};
pub use spec::{
    BIND, CpuLimits, Device, MemoryLimits, Mount, NamespaceMode, Namespaces, PortMapping,
    ResourceLimits, Rlimit, Spec,
};
pub use sysfs::{SYSFS_DEVICES, Sysfs};
pub use usb::{DeviceNode, matching_paths, usb_device_paths};
