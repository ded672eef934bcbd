//! List-valued settings: volumes, env, devices, ports, USB, raw entries and
//! limits.

use super::Context;
use crate::grammar::{parse_env, parse_port, parse_usb_selector, parse_volume};
use crate::spec::{Device, ResourceLimits, Spec};
use crate::usb::usb_device_paths;

/// One bind mount per volume entry.
pub(super) fn volumes(spec: &mut Spec, ctx: &mut Context<'_>) {
    spec.mounts.extend(ctx.config.run.volumes.iter().map(|v| parse_volume(v)));
}

/// Environment entries; later ones win over everything set before.
pub(super) fn env(spec: &mut Spec, ctx: &mut Context<'_>) {
    for entry in &ctx.config.run.env {
        let (key, value) = parse_env(entry, ctx.host);
        spec.env.insert(key, value);
    }
}

/// One device per configured path.
pub(super) fn devices(spec: &mut Spec, ctx: &mut Context<'_>) {
    spec.devices.extend(ctx.config.run.devices.iter().map(Device::path));
}

/// Port mappings; malformed entries are skipped.
pub(super) fn ports(spec: &mut Spec, ctx: &mut Context<'_>) {
    let config = ctx.config;
    for entry in &config.run.ports {
        match parse_port(entry) {
            Ok(mapping) => spec.port_mappings.push(mapping),
            Err(e) => ctx.warn(format!("{e}; ignored")),
        }
    }
}

/// Device nodes of every USB device matching a selector, with everything
/// below it in the device tree.
pub(super) fn usb(spec: &mut Spec, ctx: &mut Context<'_>) {
    let config = ctx.config;
    for selector in &config.run.usb_devices {
        let (vendor, product) = match parse_usb_selector(selector) {
            Ok(parsed) => parsed,
            Err(e) => {
                ctx.warn(format!("{e}; ignored"));
                continue;
            }
        };
        match usb_device_paths(ctx.host, vendor.as_deref(), product.as_deref()) {
            Ok(paths) => {
                if paths.is_empty() {
                    tracing::debug!(selector = %selector, "no USB device matched");
                }
                spec.devices.extend(paths.into_iter().map(Device::path));
            }
            Err(e) => ctx.warn(format!("cannot enumerate devices for {selector}: {e}")),
        }
    }
}

/// Appends the passthrough entries unchanged.
pub(super) fn raw(spec: &mut Spec, ctx: &mut Context<'_>) {
    let run = &ctx.config.run;
    spec.mounts.extend(run.raw_mounts.iter().cloned());
    spec.port_mappings.extend(run.raw_ports.iter().cloned());
    spec.devices.extend(run.raw_devices.iter().cloned());
}

/// cgroup limits, rlimits and raw cgroup settings.
pub(super) fn limits(spec: &mut Spec, ctx: &mut Context<'_>) {
    let limits = &ctx.config.run.limits;
    let cpu = (!limits.cpu.is_empty()).then(|| limits.cpu.clone());
    let memory = (!limits.memory.is_empty()).then(|| limits.memory.clone());
    if cpu.is_some() || memory.is_some() || limits.pids.is_some() {
        spec.resource_limits = Some(ResourceLimits {
            cpu,
            memory,
            pids: limits.pids,
        });
    }
    if !limits.rlimits.is_empty() {
        spec.rlimits.clone_from(&limits.rlimits);
    }
    if !limits.cgroup_conf.is_empty() {
        spec.cgroup_conf.clone_from(&limits.cgroup_conf);
    }
}
