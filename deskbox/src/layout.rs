//! On-disk locations of configuration files and persistent homes.
//!
//! Default locations are `<platform_config_dir>/deskbox` for configuration
//! and `<platform_data_dir>/deskbox` for home directories. Setting
//! `DESKBOX_HOME` puts both under one directory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable overriding every default location.
pub const HOME_ENV: &str = "DESKBOX_HOME";

/// Directory name under the platform config and data directories.
const DESKBOX_DIR: &str = "deskbox";
/// Storage directory name under `DESKBOX_HOME`.
const STORAGE_DIR: &str = "storage";
/// File name of the defaults layer.
const DEFAULTS_FILE: &str = "deskbox.toml";

/// Contents written by [`Layout::setup`] when no defaults file exists.
const DEFAULTS_TEMPLATE: &str = "\
# Settings shared by every sandbox. Keys are the same as in a sandbox file.
[defaults.build]

[defaults.run]
";

/// Where deskbox keeps its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Holds `deskbox.toml` and the `<name>.toml` sandbox files.
    config_dir: PathBuf,
    /// Holds one home directory per sandbox.
    storage_dir: PathBuf,
}

/// State of one path reported by [`Layout::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PathState {
    /// Exists with the expected type.
    Ok,
    /// Does not exist.
    Missing,
    /// Exists but is a file where a directory is expected, or the reverse.
    WrongType,
}

/// One line of a [`Layout::check`] report.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct PathCheck {
    /// What the path is for.
    pub label: &'static str,
    /// The path.
    pub path: PathBuf,
    /// What was found.
    pub state: PathState,
}

impl Layout {
    /// Resolves the layout from `DESKBOX_HOME` or the platform directories.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoDataDir`] if `DESKBOX_HOME` is unset and the
    /// platform has no config or data directory.
    pub fn discover() -> Result<Self> {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|h| !h.is_empty()) {
            return Ok(Self::at(home));
        }
        let config = dirs::config_dir().ok_or(Error::NoDataDir("config"))?;
        let data = dirs::data_local_dir().ok_or(Error::NoDataDir("data"))?;
        Ok(Self {
            config_dir: config.join(DESKBOX_DIR),
            storage_dir: data.join(DESKBOX_DIR),
        })
    }

    /// A layout rooted at `root`, as if `DESKBOX_HOME` were set to it.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            storage_dir: root.join(STORAGE_DIR),
            config_dir: root,
        }
    }

    /// Directory of the configuration files.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Directory of the persistent homes.
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// The defaults file.
    pub fn defaults_file(&self) -> PathBuf {
        self.config_dir.join(DEFAULTS_FILE)
    }

    /// The configuration file of sandbox `name`.
    pub fn sandbox_file(&self, name: &str) -> PathBuf {
        self.config_dir.join(format!("{name}.toml"))
    }

    /// Creates both directories and a skeleton defaults file.
    ///
    /// Existing files are left untouched, so running it twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if a directory or the file cannot be created.
    pub fn setup(&self) -> Result<()> {
        fs::create_dir_all(&self.storage_dir)?;
        fs::create_dir_all(&self.config_dir)?;
        let defaults = self.defaults_file();
        if !defaults.exists() {
            fs::write(&defaults, DEFAULTS_TEMPLATE)?;
            tracing::debug!(path = %defaults.display(), "created defaults file");
        }
        Ok(())
    }

    /// Reports the state of every path [`Layout::setup`] creates.
    pub fn check(&self) -> Vec<PathCheck> {
        vec![
            PathCheck::dir("storage directory", &self.storage_dir),
            PathCheck::dir("configuration directory", &self.config_dir),
            PathCheck::file("defaults file", self.defaults_file()),
        ]
    }
}

impl PathCheck {
    /// Checks that `path` is a directory.
    fn dir(label: &'static str, path: &Path) -> Self {
        let state = match fs::metadata(path) {
            Err(_) => PathState::Missing,
            Ok(m) if m.is_dir() => PathState::Ok,
            Ok(_) => PathState::WrongType,
        };
        Self {
            label,
            path: path.to_path_buf(),
            state,
        }
    }

    /// Checks that `path` is not a directory.
    fn file(label: &'static str, path: PathBuf) -> Self {
        let state = match fs::metadata(&path) {
            Err(_) => PathState::Missing,
            Ok(m) if m.is_dir() => PathState::WrongType,
            Ok(_) => PathState::Ok,
        };
        Self { label, path, state }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn paths_under_root() {
        let layout = Layout::at("/srv/deskbox");
        assert_eq!(layout.config_dir(), Path::new("/srv/deskbox"));
        assert_eq!(layout.storage_dir(), Path::new("/srv/deskbox/storage"));
        assert_eq!(layout.defaults_file(), Path::new("/srv/deskbox/deskbox.toml"));
        assert_eq!(layout.sandbox_file("gimp"), Path::new("/srv/deskbox/gimp.toml"));
    }

    #[test]
    fn setup_then_check() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::at(tmp.path().join("root"));
        assert!(layout.check().iter().all(|c| c.state == PathState::Missing));

        layout.setup().unwrap();
        assert!(layout.check().iter().all(|c| c.state == PathState::Ok));
        assert!(fs::read_to_string(layout.defaults_file()).unwrap().contains("[defaults.run]"));
    }

    #[test]
    fn setup_keeps_existing_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::at(tmp.path());
        fs::write(layout.defaults_file(), "[defaults.run]\nx11 = true\n").unwrap();
        layout.setup().unwrap();
        layout.setup().unwrap();
        assert_eq!(
            fs::read_to_string(layout.defaults_file()).unwrap(),
            "[defaults.run]\nx11 = true\n"
        );
    }

    #[test]
    fn check_reports_wrong_types() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::at(tmp.path());
        fs::write(layout.storage_dir(), "").unwrap();
        fs::create_dir(layout.defaults_file()).unwrap();

        let report = layout.check();
        assert_eq!(report[0].state, PathState::WrongType);
        assert_eq!(report[1].state, PathState::Ok);
        assert_eq!(report[2].state, PathState::WrongType);
    }
}
