//! Display, audio, bus and GPU forwarding.

use super::Context;
use crate::config::Flag;
use crate::spec::{Device, Mount, NamespaceMode, Spec};

/// X11 socket directory.
const X11_SOCKETS: &str = "/tmp/.X11-unix";
/// Direct rendering devices.
const DRI: &str = "/dev/dri";
/// Read by PulseAudio clients to identify the session.
const MACHINE_ID: &str = "/etc/machine-id";
/// Host fonts.
const FONTS: &str = "/usr/share/fonts";

/// Copies `keys` from the host environment.
fn pass_env(spec: &mut Spec, ctx: &Context<'_>, keys: &[&str]) {
    for &key in keys {
        spec.set_env(key, ctx.var(key));
    }
}

/// Path under the host's `XDG_RUNTIME_DIR`.
fn runtime_path(ctx: &Context<'_>, leaf: &str) -> String {
    format!("{}/{leaf}", ctx.var("XDG_RUNTIME_DIR"))
}

/// Forwards the X11 display.
pub(super) fn x11(spec: &mut Spec, ctx: &mut Context<'_>) {
    if !ctx.config.run.has(Flag::X11) {
        return;
    }
    pass_env(
        spec,
        ctx,
        &["DISPLAY", "XDG_SESSION_TYPE", "XCURSOR_THEME", "XCURSOR_SIZE"],
    );
    spec.mounts.push(Mount::same_path(X11_SOCKETS));
}

/// Forwards the Wayland display socket.
pub(super) fn wayland(spec: &mut Spec, ctx: &mut Context<'_>) {
    if !ctx.config.run.has(Flag::Wayland) {
        return;
    }
    pass_env(spec, ctx, &["WAYLAND_DISPLAY", "XDG_SESSION_TYPE"]);
    let socket = runtime_path(ctx, &ctx.var("WAYLAND_DISPLAY"));
    spec.mounts.push(Mount::same_path(socket));
}

/// Exposes `/dev/dri`; `dri` and `gpu` both ask for it.
pub(super) fn gpu(spec: &mut Spec, ctx: &mut Context<'_>) {
    let run = &ctx.config.run;
    if run.has(Flag::Dri) || run.has(Flag::Gpu) {
        spec.devices.push(Device::path(DRI));
    }
}

/// Shares the host IPC namespace.
pub(super) fn ipc(spec: &mut Spec, ctx: &mut Context<'_>) {
    if ctx.config.run.has(Flag::Ipc) {
        spec.namespaces.ipc = NamespaceMode::Host;
    }
}

/// Exposes the PulseAudio native socket.
pub(super) fn pulseaudio(spec: &mut Spec, ctx: &mut Context<'_>) {
    if !ctx.config.run.has(Flag::Pulseaudio) {
        return;
    }
    pass_env(spec, ctx, &["XDG_RUNTIME_DIR"]);
    spec.mounts.push(Mount::same_path(MACHINE_ID).with_options(["ro"]));
    spec.mounts.push(Mount::same_path(runtime_path(ctx, "pulse/native")));
}

/// Exposes the PipeWire socket.
pub(super) fn pipewire(spec: &mut Spec, ctx: &mut Context<'_>) {
    if !ctx.config.run.has(Flag::Pipewire) {
        return;
    }
    pass_env(spec, ctx, &["XDG_RUNTIME_DIR"]);
    spec.mounts.push(Mount::same_path(runtime_path(ctx, "pipewire-0")));
}

/// Exposes the session bus.
pub(super) fn dbus(spec: &mut Spec, ctx: &mut Context<'_>) {
    if !ctx.config.run.has(Flag::Dbus) {
        return;
    }
    let bus = runtime_path(ctx, "bus");
    spec.set_env("DBUS_SESSION_BUS_ADDRESS", format!("unix:path={bus}"));
    spec.mounts.push(Mount::same_path(bus));
}

/// Mounts the host fonts read-only.
pub(super) fn fonts(spec: &mut Spec, ctx: &mut Context<'_>) {
    if ctx.config.run.has(Flag::Fonts) {
        spec.mounts.push(Mount::same_path(FONTS).with_options(["ro"]));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::fixture::{config, host, run};
    use super::*;

    #[test]
    fn disabled_flags_do_nothing() {
        let cfg = config(&[]);
        for transform in [x11, wayland, gpu, ipc, pulseaudio, pipewire, dbus, fonts] {
            let (spec, diags) = run(transform, &cfg, &host());
            assert_eq!(spec, crate::pipeline::seed(&cfg));
            assert!(diags.is_empty());
        }
    }

    #[test]
    fn x11_copies_session_and_mounts_sockets() {
        let (spec, _) = run(x11, &config(&[Flag::X11]), &host());
        assert_eq!(spec.env["DISPLAY"], ":0");
        assert_eq!(spec.env["XDG_SESSION_TYPE"], "wayland");
        assert_eq!(spec.env["XCURSOR_THEME"], "");
        assert_eq!(spec.mount_at("/tmp/.X11-unix"), Some(&Mount::same_path("/tmp/.X11-unix")));
    }

    #[test]
    fn wayland_mounts_the_display_socket() {
        let (spec, _) = run(wayland, &config(&[Flag::Wayland]), &host());
        assert_eq!(spec.env["WAYLAND_DISPLAY"], "wayland-0");
        assert_eq!(spec.mounts, [Mount::same_path("/run/user/1000/wayland-0")]);
    }

    #[test]
    fn dri_and_gpu_share_one_device() {
        let cases: [&[Flag]; 3] = [&[Flag::Dri], &[Flag::Gpu], &[Flag::Dri, Flag::Gpu]];
        for flags in cases {
            let (spec, _) = run(gpu, &config(flags), &host());
            assert_eq!(spec.devices, [Device::path("/dev/dri")]);
        }
    }

    #[test]
    fn ipc_shares_host_namespace() {
        let (spec, _) = run(ipc, &config(&[Flag::Ipc]), &host());
        assert_eq!(spec.namespaces.ipc, NamespaceMode::Host);
    }

    #[test]
    fn audio_sockets() {
        let (spec, _) = run(pulseaudio, &config(&[Flag::Pulseaudio]), &host());
        assert_eq!(spec.env["XDG_RUNTIME_DIR"], "/run/user/1000");
        assert!(spec.mount_at("/etc/machine-id").unwrap().is_read_only());
        assert!(spec.mount_at("/run/user/1000/pulse/native").is_some());

        let (spec, _) = run(pipewire, &config(&[Flag::Pipewire]), &host());
        assert_eq!(spec.mounts, [Mount::same_path("/run/user/1000/pipewire-0")]);
    }

    #[test]
    fn dbus_points_at_the_session_bus() {
        let (spec, _) = run(dbus, &config(&[Flag::Dbus]), &host());
        assert_eq!(spec.env["DBUS_SESSION_BUS_ADDRESS"], "unix:path=/run/user/1000/bus");
        assert_eq!(spec.mounts, [Mount::same_path("/run/user/1000/bus")]);
    }

    #[test]
    fn fonts_are_read_only() {
        let (spec, _) = run(fonts, &config(&[Flag::Fonts]), &host());
        assert!(spec.mount_at("/usr/share/fonts").unwrap().is_read_only());
    }
}
