//! Image build parameters derived from a sandbox configuration.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::Serialize;

use crate::config::{Compression, ResolvedConfig};
use crate::layout::Layout;
use crate::pipeline::{LABEL_CONTAINER_NAME, LABEL_IMAGE_NAME, LABEL_VERSION, VERSION};

/// Everything an image builder needs to build a sandbox image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct BuildOptions {
    /// Name of the resulting image.
    pub output: String,
    /// Containerfile text.
    pub instructions: String,
    /// Build context.
    pub context_directory: PathBuf,
    /// Extra image names.
    pub additional_tags: BTreeSet<String>,
    /// Labels attached to the image.
    pub labels: BTreeMap<String, String>,
    /// `--ulimit` values for build containers.
    pub ulimits: Vec<String>,
    /// Layer compression.
    pub compression: Compression,
    /// Cache intermediate layers.
    pub layers: bool,
}

impl BuildOptions {
    /// Derives build options for `config`.
    ///
    /// Without a configured context directory the build runs in the
    /// configuration directory of `layout`.
    pub fn from_config(config: &ResolvedConfig, layout: &Layout) -> Self {
        let build = &config.build;
        let context_directory = if build.context_directory.is_empty() {
            layout.config_dir().to_path_buf()
        } else {
            PathBuf::from(&build.context_directory)
        };
        let labels = BTreeMap::from([
            (LABEL_VERSION.to_owned(), VERSION.to_owned()),
            (LABEL_IMAGE_NAME.to_owned(), config.image_name.clone()),
            (LABEL_CONTAINER_NAME.to_owned(), config.name.clone()),
        ]);
        Self {
            output: config.image_name.clone(),
            instructions: build.instructions.clone(),
            context_directory,
            additional_tags: build.additional_tags.clone(),
            labels,
            ulimits: build.ulimits.clone(),
            compression: build.compression,
            layers: false,
        }
    }

    /// Enables layer caching.
    #[must_use]
    pub const fn with_layers(mut self, layers: bool) -> Self {
        self.layers = layers;
        self
    }
}
