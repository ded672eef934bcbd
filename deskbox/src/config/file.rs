//! TOML files backing the configuration layers.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;

use super::{Compression, Defaults, ResolvedConfig, SandboxConfig, resolve};
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::spec::{Mount, Rlimit};

/// Top level of `deskbox.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DefaultsFile {
    /// The `[defaults]` table.
    defaults: Defaults,
}

/// Decodes a sandbox file. `path` is only used in error messages.
///
/// # Errors
///
/// Returns [`Error::Config`] on malformed TOML or unknown keys.
pub fn parse_sandbox(name: &str, text: &str, path: &Path) -> Result<SandboxConfig> {
    let parsed: SandboxConfig = toml::from_str(text).map_err(|source| Error::Config {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(SandboxConfig {
        build: parsed.build,
        run: parsed.run,
        ..SandboxConfig::new(name)
    })
}

/// Decodes a defaults file. `path` is only used in error messages.
///
/// # Errors
///
/// Returns [`Error::Config`] on malformed TOML or unknown keys.
pub fn parse_defaults(text: &str, path: &Path) -> Result<Defaults> {
    toml::from_str::<DefaultsFile>(text)
        .map(|f| f.defaults)
        .map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
}

/// Reads `<name>.toml` from the layout.
///
/// # Errors
///
/// Returns [`Error::ConfigNotFound`] if the file does not exist, otherwise
/// the read or decode error.
pub fn load_sandbox(layout: &Layout, name: &str) -> Result<SandboxConfig> {
    let path = layout.sandbox_file(name);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::ConfigNotFound(path)),
        Err(e) => return Err(e.into()),
    };
    parse_sandbox(name, &text, &path)
}

/// Reads `deskbox.toml` from the layout. A missing file means no defaults.
///
/// # Errors
///
/// Returns the read or decode error.
pub fn load_defaults(layout: &Layout) -> Result<Defaults> {
    let path = layout.defaults_file();
    match fs::read_to_string(&path) {
        Ok(text) => parse_defaults(&text, &path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no defaults file");
            Ok(Defaults::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Loads sandbox `name` and resolves it against the defaults.
///
/// # Errors
///
/// See [`load_sandbox`] and [`load_defaults`].
pub fn load(layout: &Layout, name: &str) -> Result<ResolvedConfig> {
    let defaults = load_defaults(layout)?;
    let sandbox = load_sandbox(layout, name)?;
    let resolved = resolve(&sandbox, &defaults);
    tracing::debug!(name, image = %resolved.image_name, "resolved sandbox configuration");
    Ok(resolved)
}

/// Renders a sample sandbox file that sets every key.
///
/// # Errors
///
/// Returns [`Error::Render`] if serialization fails.
pub fn scaffold() -> Result<String> {
    let mut sample = SandboxConfig::new("sample");
    let build = &mut sample.build;
    build.instructions = Some("FROM docker.io/library/alpine:latest\n".into());
    build.context_directory = Some(String::new());
    build.compression = Some(Compression::Uncompressed);
    build.ulimits = vec!["nofile=1024:1024".into()];

    let run = &mut sample.run;
    for &flag in super::Flag::ALL {
        run.set_flag(flag, false);
    }
    run.network = Some(String::new());
    run.name = Some(String::new());
    run.home_path = Some("/home/user".into());
    run.volumes = vec!["/srv/data:/data:ro".into()];
    run.env = vec!["LANG".into(), "EDITOR=vi".into()];
    run.devices = vec!["/dev/video0".into()];
    run.ports = vec!["8080:8080".into()];
    run.usb_devices = vec!["046d:c52b".into()];
    run.raw_mounts = vec![Mount {
        kind: "tmpfs".into(),
        ..Mount::bind("tmpfs", "/tmp")
    }];
    run.limits.pids = Some(1024);
    run.limits.memory.limit = Some(2 << 30);
    run.limits.cpu.shares = Some(1024);
    run.limits.rlimits = vec![Rlimit::new("RLIMIT_NOFILE", 1024, 4096)];
    run.limits.cgroup_conf = BTreeMap::from([("memory.high".to_owned(), "1G".to_owned())]);

    Ok(toml::to_string_pretty(&sample)?)
}
