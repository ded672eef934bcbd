//! Parsers for the colon and equals delimited entries of a sandbox file.

use crate::error::{Error, Result};
use crate::host::Host;
use crate::spec::{Mount, PortMapping};

/// Parses `SRC[:DEST[:OPT,OPT...]]` into a bind mount.
///
/// A bare `SRC` is mounted at the same path. Components after the third are
/// ignored. Nothing is checked against the filesystem.
pub fn parse_volume(entry: &str) -> Mount {
    let mut parts = entry.split(':');
    let source = parts.next().unwrap_or_default();
    let destination = parts.next().unwrap_or(source);
    let options = parts
        .next()
        .map(|opts| opts.split(',').filter(|o| !o.is_empty()).collect::<Vec<_>>())
        .unwrap_or_default();
    Mount::bind(source, destination).with_options(options)
}

/// Parses `KEY[=VALUE]`.
///
/// Without `=` the value is taken from the host environment, or empty if the
/// host does not have it. With `=` everything after the first one is the
/// value, so `A=b=c` sets `A` to `b=c`.
pub fn parse_env(entry: &str, host: &dyn Host) -> (String, String) {
    match entry.split_once('=') {
        Some((key, value)) => (key.to_owned(), value.to_owned()),
        None => (entry.to_owned(), host.var(entry).unwrap_or_default()),
    }
}

/// Parses `CONTAINER_PORT:HOST_PORT`. Components after the second are ignored.
///
/// # Errors
///
/// Returns [`Error::InvalidPort`] if either port is missing or is not a
/// number in `0..=65535`.
pub fn parse_port(entry: &str) -> Result<PortMapping> {
    let invalid = |reason| Error::InvalidPort {
        spec: entry.to_owned(),
        reason,
    };
    let mut parts = entry.split(':');
    let (Some(container), Some(host)) = (parts.next(), parts.next()) else {
        return Err(invalid("expected CONTAINER_PORT:HOST_PORT"));
    };
    let container_port = container
        .trim()
        .parse()
        .map_err(|_| invalid("container port is not a number in 0..=65535"))?;
    let host_port = host
        .trim()
        .parse()
        .map_err(|_| invalid("host port is not a number in 0..=65535"))?;
    Ok(PortMapping::new(container_port, host_port))
}

/// Parses a `[VENDOR][:PRODUCT]` USB selector.
///
/// An empty or missing component matches any value, so `046d` selects every
/// device of that vendor and `:c52b` that product from any vendor.
///
/// # Errors
///
/// Returns [`Error::InvalidUsbSelector`] if both vendor and product are empty.
pub fn parse_usb_selector(entry: &str) -> Result<(Option<String>, Option<String>)> {
    let (vendor, product) = entry.split_once(':').unwrap_or((entry, ""));
    let given = |id: &str| {
        let trimmed = id.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_owned())
    };
    match (given(vendor), given(product)) {
        (None, None) => Err(Error::InvalidUsbSelector(entry.to_owned())),
        ids => Ok(ids),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::host::SnapshotHost;

    #[test]
    fn volume_forms() {
        assert_eq!(parse_volume("/a"), Mount::same_path("/a"));
        assert_eq!(parse_volume("/a:/b"), Mount::bind("/a", "/b"));

        let m = parse_volume("/a:/b:ro,noatime");
        assert_eq!(m.source, "/a");
        assert_eq!(m.destination, "/b");
        assert_eq!(m.options, ["ro", "noatime"]);
        assert!(m.is_read_only());
    }

    #[test]
    fn volume_extra_components_are_ignored() {
        assert_eq!(parse_volume("/a:/b:ro:junk"), parse_volume("/a:/b:ro"));
    }

    #[test]
    fn env_literal_and_passthrough() {
        let host = SnapshotHost::default().with_var("PWD", "/x");
        assert_eq!(parse_env("PWD", &host), ("PWD".into(), "/x".into()));
        assert_eq!(parse_env("K=val", &host), ("K".into(), "val".into()));
        assert_eq!(parse_env("K=", &host), ("K".into(), String::new()));
        assert_eq!(parse_env("K=a=b", &host), ("K".into(), "a=b".into()));
        assert_eq!(parse_env("MISSING", &host), ("MISSING".into(), String::new()));
    }

    #[test]
    fn port_container_first() {
        assert_eq!(parse_port("3000:4000").unwrap(), PortMapping::new(3000, 4000));
        assert_eq!(parse_port("80:8080:tcp").unwrap(), PortMapping::new(80, 8080));
    }

    #[test]
    fn port_rejects_garbage() {
        assert!(matches!(parse_port("invalid"), Err(Error::InvalidPort { .. })));
        assert!(parse_port("80").is_err());
        assert!(parse_port("http:80").is_err());
        assert!(parse_port("80:99999").is_err());
        assert!(parse_port(":80").is_err());
    }

    #[test]
    fn usb_selector_forms() {
        assert_eq!(
            parse_usb_selector("046d:c52b").unwrap(),
            (Some("046d".into()), Some("c52b".into()))
        );
        assert_eq!(parse_usb_selector("046d").unwrap(), (Some("046d".into()), None));
        assert_eq!(parse_usb_selector("046d:").unwrap(), (Some("046d".into()), None));
        assert_eq!(parse_usb_selector(":c52b").unwrap(), (None, Some("c52b".into())));
        assert!(parse_usb_selector("").is_err());
        assert!(parse_usb_selector(" : ").is_err());
    }
}
