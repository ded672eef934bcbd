//! User namespace, naming, networking and the persistent home.

use super::Context;
use crate::config::Flag;
use crate::idmap::{ID_SPACE, IdMappings};
use crate::network::{NetworkMode, resolve_network};
use crate::spec::{Mount, NamespaceMode, Spec};

/// Home mount destination unless `home_path` is set.
pub const DEFAULT_HOME: &str = "/home/user";

/// Maps the invoking user to root in a private user namespace and runs the
/// container process as that user's UID.
pub(super) fn uidmap(spec: &mut Spec, ctx: &mut Context<'_>) {
    if !ctx.config.run.has(Flag::Uidmap) {
        return;
    }
    let uid = ctx.host.uid();
    let mappings = IdMappings::rootless(uid);
    if !mappings.covers_id_space() {
        ctx.warn(format!("uid {uid} is above {ID_SPACE}; IDs above it are not mapped"));
    }
    spec.id_mappings = Some(mappings);
    spec.namespaces.user = NamespaceMode::Private;
    spec.user = Some(uid.to_string());
}

/// Applies `run.name` to both the container name and the hostname.
pub(super) fn name(spec: &mut Spec, ctx: &mut Context<'_>) {
    let name = &ctx.config.run.name;
    if !name.is_empty() {
        spec.name = Some(name.clone());
        spec.hostname.clone_from(name);
    }
}

/// Sets the network namespace; an unparsable mode falls back to none.
pub(super) fn network(spec: &mut Spec, ctx: &mut Context<'_>) {
    let run = &ctx.config.run;
    spec.namespaces.network = match resolve_network(run.has(Flag::Net), &run.network) {
        Ok(mode) => mode,
        Err(e) => {
            ctx.warn(format!("{e}; using no network"));
            NetworkMode::None
        }
    };
}

/// Mounts `<storage>/<name>` as the home directory, creating it first.
///
/// The sandbox name must be a single path component below the storage root.
pub(super) fn home(spec: &mut Spec, ctx: &mut Context<'_>) {
    if !ctx.config.run.has(Flag::Home) {
        return;
    }
    let config = ctx.config;
    let name = config.name.as_str();
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        ctx.warn(format!(
            "sandbox name {name:?} is not a directory name; home not mounted"
        ));
        return;
    }
    let source = ctx.host.home_storage().join(name);
    let Some(source_str) = source.to_str() else {
        ctx.warn(format!("{} is not valid UTF-8; home not mounted", source.display()));
        return;
    };
    if let Err(e) = ctx.host.create_dir_all(&source) {
        ctx.warn(format!("cannot create {source_str}: {e}; home not mounted"));
        return;
    }
    let destination = match config.run.home_path.as_str() {
        "" => DEFAULT_HOME,
        path => path,
    };
    spec.mounts.push(Mount::bind(source_str, destination));
}
