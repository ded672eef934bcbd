//! Assembly of a [`Spec`] from a [`ResolvedConfig`].
//!
//! Assembly seeds a spec with fixed defaults and then runs every entry of
//! [`PIPELINE`] against it, in order. Each transform reads the configuration
//! and the [`Host`], and only ever adds to or overwrites parts of the spec.
//! Failures inside a transform are recorded as [`Diagnostic`]s and the
//! offending entry is skipped; only a missing image name stops assembly.

mod desktop;
mod entries;
mod identity;

use serde::Serialize;

use crate::config::ResolvedConfig;
use crate::error::{Error, Result};
use crate::host::Host;
use crate::spec::Spec;

/// Label holding the sandbox name.
pub const LABEL_CONTAINER_NAME: &str = "deskbox.container-name";
/// Label holding the image name.
pub const LABEL_IMAGE_NAME: &str = "deskbox.image-name";
/// Label holding the deskbox version.
pub const LABEL_VERSION: &str = "deskbox.version";

/// Version written to [`LABEL_VERSION`].
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A pipeline step.
pub type Transform = fn(&mut Spec, &mut Context<'_>);

/// Every transform, in the order they run.
pub static PIPELINE: &[(&str, Transform)] = &[
    ("x11", desktop::x11),
    ("wayland", desktop::wayland),
    ("gpu", desktop::gpu),
    ("ipc", desktop::ipc),
    ("pulseaudio", desktop::pulseaudio),
    ("pipewire", desktop::pipewire),
    ("dbus", desktop::dbus),
    ("fonts", desktop::fonts),
    ("uidmap", identity::uidmap),
    ("name", identity::name),
    ("network", identity::network),
    ("home", identity::home),
    ("volumes", entries::volumes),
    ("env", entries::env),
    ("devices", entries::devices),
    ("ports", entries::ports),
    ("usb", entries::usb),
    ("raw", entries::raw),
    ("limits", entries::limits),
];

/// A problem found while assembling. The affected entry was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct Diagnostic {
    /// Name of the transform that reported it.
    pub transform: &'static str,
    /// What went wrong.
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.transform, self.message)
    }
}

/// Result of an assembly run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct Assembly {
    /// The finished spec.
    pub spec: Spec,
    /// Everything that was skipped, in pipeline order.
    pub diagnostics: Vec<Diagnostic>,
}

/// What a transform sees besides the spec.
pub struct Context<'a> {
    /// The configuration being assembled.
    pub config: &'a ResolvedConfig,
    /// The host.
    pub host: &'a dyn Host,
    /// Transform currently running.
    current: &'static str,
    /// Collected diagnostics.
    diagnostics: Vec<Diagnostic>,
}

impl std::fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config.name)
            .field("current", &self.current)
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

impl<'a> Context<'a> {
    /// A context for running transforms on `config` against `host`.
    pub fn new(config: &'a ResolvedConfig, host: &'a dyn Host) -> Self {
        Self {
            config,
            host,
            current: "seed",
            diagnostics: Vec::new(),
        }
    }

    /// Runs one transform, attributing its diagnostics to `name`.
    pub fn apply(&mut self, name: &'static str, transform: Transform, spec: &mut Spec) {
        tracing::trace!(transform = name, "applying");
        self.current = name;
        transform(spec, self);
    }

    /// Host environment variable, empty if unset.
    pub fn var(&self, key: &str) -> String {
        self.host.var(key).unwrap_or_default()
    }

    /// Records a diagnostic for the running transform.
    pub fn warn(&mut self, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            transform: self.current,
            message: message.into(),
        };
        tracing::warn!(transform = diagnostic.transform, "{}", diagnostic.message);
        self.diagnostics.push(diagnostic);
    }

    /// Consumes the context, returning its diagnostics.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// The spec every assembly starts from.
///
/// Terminal, open stdin and removal on exit are on, the umask is `0022`, the
/// hostname is the image name with `/` replaced by `_`, and the three
/// `deskbox.*` labels are set.
pub fn seed(config: &ResolvedConfig) -> Spec {
    let mut spec = Spec::new(config.image_name.clone());
    spec.terminal = true;
    spec.stdin = true;
    spec.remove = true;
    spec.umask = "0022".to_owned();
    spec.hostname = config.image_name.replace('/', "_");
    spec.labels.extend([
        (LABEL_CONTAINER_NAME.to_owned(), config.name.clone()),
        (LABEL_IMAGE_NAME.to_owned(), config.image_name.clone()),
        (LABEL_VERSION.to_owned(), VERSION.to_owned()),
    ]);
    spec
}

/// Builds the spec for `config` on `host`.
///
/// # Errors
///
/// Returns [`Error::MissingImage`] if `config` has no image name. Everything
/// else is reported through [`Assembly::diagnostics`].
pub fn assemble(config: &ResolvedConfig, host: &dyn Host) -> Result<Assembly> {
    if config.image_name.is_empty() {
        return Err(Error::MissingImage {
            name: config.name.clone(),
        });
    }
    let mut spec = seed(config);
    let mut ctx = Context::new(config, host);
    for &(name, transform) in PIPELINE {
        ctx.apply(name, transform, &mut spec);
    }
    let diagnostics = ctx.into_diagnostics();
    let flags: Vec<String> = config.run.flags.iter().map(|flag| flag.to_string()).collect();
    tracing::debug!(
        image = %spec.image,
        flags = %flags.join(","),
        mounts = spec.mounts.len(),
        devices = spec.devices.len(),
        diagnostics = diagnostics.len(),
        "assembled spec"
    );
    Ok(Assembly { spec, diagnostics })
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Flag;

    #[test]
    fn seed_defaults() {
        let spec = seed(&fixture::config(&[]));
        assert!(spec.terminal && spec.stdin && spec.remove);
        assert_eq!(spec.umask, "0022");
        assert_eq!(spec.hostname, "app_image");
        assert_eq!(spec.labels[LABEL_CONTAINER_NAME], "app");
        assert_eq!(spec.labels[LABEL_IMAGE_NAME], "app/image");
        assert_eq!(spec.labels[LABEL_VERSION], VERSION);
        assert!(spec.mounts.is_empty() && spec.env.is_empty());
    }

    #[test]
    fn missing_image_aborts() {
        let mut config = fixture::config(&[Flag::X11]);
        config.image_name.clear();
        let err = assemble(&config, &fixture::host()).unwrap_err();
        assert!(matches!(err, Error::MissingImage { name } if name == "app"));
    }

    #[test]
    fn pipeline_order_is_fixed() {
        let names: Vec<_> = PIPELINE.iter().map(|(n, _)| *n).collect();
        assert_eq!(names.len(), 19);
        assert_eq!(names.first(), Some(&"x11"));
        assert_eq!(names.last(), Some(&"limits"));
        let pos = |n: &str| names.iter().position(|x| *x == n).unwrap();
        assert!(pos("name") < pos("network"));
        assert!(pos("env") > pos("x11"));
        assert!(pos("raw") < pos("limits"));
    }

    #[test]
    fn diagnostics_carry_the_transform_name() {
        let mut config = fixture::config(&[]);
        config.run.ports = vec!["invalid".into(), "1:2".into()];
        config.run.network = "bad name!".into();
        let out = assemble(&config, &fixture::host()).unwrap();
        let sources: Vec<_> = out.diagnostics.iter().map(|d| d.transform).collect();
        assert_eq!(sources, ["network", "ports"]);
        assert_eq!(out.spec.port_mappings.len(), 1);
        assert!(out.diagnostics[1].to_string().starts_with("ports: "));
    }

    #[test]
    fn empty_config_is_just_the_seed() {
        let config = fixture::config(&[]);
        let out = assemble(&config, &fixture::host()).unwrap();
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.spec, seed(&config));
    }
}
