//! Network namespace modes and the `--network` style grammar.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Network namespace of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
#[non_exhaustive]
pub enum NetworkMode {
    /// No networking beyond loopback.
    #[default]
    None,
    /// Share the host's network namespace.
    Host,
    /// A private namespace with no interfaces configured.
    Private,
    /// Bridged networking through the runtime's network backend.
    Bridge {
        /// Named networks to attach to; the default network when empty.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        networks: Vec<String>,
        /// Backend options.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        options: Vec<String>,
    },
    /// User-mode networking through slirp4netns.
    Slirp {
        /// slirp4netns options.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        options: Vec<String>,
    },
    /// User-mode networking through pasta.
    Pasta {
        /// pasta options.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        options: Vec<String>,
    },
    /// Join the namespace of another container.
    Container {
        /// Name or ID of the container.
        id: String,
    },
    /// Join the namespace at a filesystem path.
    Path {
        /// Path of the namespace file.
        path: String,
    },
}

impl NetworkMode {
    /// User-mode networking with default options.
    pub const fn slirp() -> Self {
        Self::Slirp {
            options: Vec::new(),
        }
    }
}

impl std::fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        /// Writes `mode` followed by `:opts` when `opts` is non-empty.
        fn with_opts(
            f: &mut std::fmt::Formatter<'_>,
            mode: &str,
            opts: &[String],
        ) -> std::fmt::Result {
            if opts.is_empty() {
                f.write_str(mode)
            } else {
                write!(f, "{mode}:{}", opts.join(","))
            }
        }

        match self {
            Self::None => f.write_str("none"),
            Self::Host => f.write_str("host"),
            Self::Private => f.write_str("private"),
            Self::Bridge { networks, options } => match networks.as_slice() {
                [] => with_opts(f, "bridge", options),
                names => with_opts(f, &names.join(","), options),
            },
            Self::Slirp { options } => with_opts(f, "slirp4netns", options),
            Self::Pasta { options } => with_opts(f, "pasta", options),
            Self::Container { id } => write!(f, "container:{id}"),
            Self::Path { path } => write!(f, "ns:{path}"),
        }
    }
}

impl std::str::FromStr for NetworkMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason| Error::InvalidNetwork {
            spec: s.to_owned(),
            reason,
        };
        let (mode, arg) = match s.split_once(':') {
            Some((mode, arg)) => (mode, Some(arg)),
            None => (s, None),
        };
        let options = || -> Vec<String> {
            arg.map(|a| {
                a.split(',')
                    .filter(|o| !o.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
        };

        match mode {
            "none" | "host" | "private" if arg.is_some() => {
                Err(invalid("this mode takes no options"))
            }
            "none" => Ok(Self::None),
            "host" => Ok(Self::Host),
            "private" => Ok(Self::Private),
            "bridge" | "default" => Ok(Self::Bridge {
                networks: Vec::new(),
                options: options(),
            }),
            "slirp4netns" => Ok(Self::Slirp { options: options() }),
            "pasta" => Ok(Self::Pasta { options: options() }),
            "container" => match arg {
                Some(id) if !id.is_empty() => Ok(Self::Container { id: id.to_owned() }),
                _ => Err(invalid("container mode needs a container name or ID")),
            },
            "ns" => match arg {
                Some(path) if !path.is_empty() => Ok(Self::Path {
                    path: path.to_owned(),
                }),
                _ => Err(invalid("ns mode needs a namespace path")),
            },
            "" => Err(invalid("empty network mode")),
            name if is_network_name(name) => Ok(Self::Bridge {
                networks: vec![name.to_owned()],
                options: options(),
            }),
            _ => Err(invalid("not a mode or a valid network name")),
        }
    }
}

/// `[A-Za-z0-9][A-Za-z0-9_.-]*`
fn is_network_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Picks the network namespace for a sandbox.
///
/// The legacy `net` flag wins over the symbolic `network` string and selects
/// user-mode networking. With neither set the container gets no network.
///
/// # Errors
///
/// Returns [`Error::InvalidNetwork`] if `network` does not parse. The caller
/// decides on a fallback.
pub fn resolve_network(legacy_net: bool, network: &str) -> Result<NetworkMode> {
    if legacy_net {
        return Ok(NetworkMode::slirp());
    }
    if network.is_empty() {
        return Ok(NetworkMode::None);
    }
    network.parse()
}
