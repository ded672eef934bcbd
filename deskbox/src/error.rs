//! Error types for deskbox operations.

use std::path::PathBuf;

/// Alias for `Result<T, deskbox::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by deskbox operations.
///
/// Only [`Error::MissingImage`] aborts an assembly. Parse errors raised while
/// assembling are turned into [`Diagnostic`](crate::Diagnostic)s and the
/// offending entry is skipped.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Assembly was requested for a configuration without an image name.
    #[error("no image name configured for sandbox {name:?}")]
    MissingImage {
        /// Sandbox name of the offending configuration.
        name: String,
    },

    /// A port entry is not `CONTAINER_PORT:HOST_PORT`.
    #[error("invalid port mapping {spec:?}: {reason}")]
    InvalidPort {
        /// The raw entry.
        spec: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A network string could not be parsed.
    #[error("invalid network {spec:?}: {reason}")]
    InvalidNetwork {
        /// The raw network string.
        spec: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A USB selector names neither a vendor nor a product.
    #[error("invalid usb selector {0:?}; use VENDOR[:PRODUCT] or :PRODUCT")]
    InvalidUsbSelector(String),

    /// A configuration file does not exist.
    #[error("configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// A configuration file could not be decoded.
    #[error("cannot decode {}: {source}", path.display())]
    Config {
        /// The file being decoded.
        path: PathBuf,
        /// The TOML decoder error.
        source: toml::de::Error,
    },

    /// A configuration could not be rendered as TOML.
    #[error(transparent)]
    Render(#[from] toml::ser::Error),

    /// The platform has no config or data directory and `DESKBOX_HOME` is unset.
    #[error("cannot determine platform {0} directory; set DESKBOX_HOME")]
    NoDataDir(&'static str),

    /// An I/O error from the filesystem or device enumeration.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON encoding error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
