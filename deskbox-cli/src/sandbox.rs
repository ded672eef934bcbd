//! Sandbox commands: spec, build-options.

use std::io::Write;

use anyhow::{Context, Result};
use deskbox::{BuildOptions, Layout, Runtime, Spec, SystemHost};

/// Arguments for `deskbox spec`.
///
/// Usage: `deskbox spec [OPTIONS] NAME [-- COMMAND...]`
#[derive(clap::Args)]
#[command(trailing_var_arg = true)]
pub struct SpecArgs {
    /// Keep the container after it exits.
    #[arg(short = 'k', long)]
    pub keep: bool,

    /// Sandbox name (`<name>.toml` in the configuration directory).
    pub name: String,

    /// Command replacing the image entrypoint.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl SpecArgs {
    pub fn run(self, layout: &Layout) -> Result<()> {
        let config = deskbox::load(layout, &self.name)
            .with_context(|| format!("cannot load sandbox {:?}", self.name))?;
        let host = SystemHost::new(layout);
        let assembly = deskbox::assemble(&config, &host)?;

        let mut spec = assembly.spec.with_entrypoint(self.command);
        if self.keep {
            spec = spec.keep();
        }
        deskbox::launch(&mut DryRun::new(std::io::stdout().lock()), &spec)?;

        if !assembly.diagnostics.is_empty() {
            eprintln!(
                "deskbox: {} entr{} skipped",
                assembly.diagnostics.len(),
                if assembly.diagnostics.len() == 1 { "y" } else { "ies" }
            );
        }
        Ok(())
    }
}

/// Arguments for `deskbox build-options`.
#[derive(clap::Args)]
pub struct BuildArgs {
    /// Cache intermediate layers.
    #[arg(short = 'l', long)]
    pub layers: bool,

    /// Sandbox name.
    pub name: String,
}

impl BuildArgs {
    pub fn run(self, layout: &Layout) -> Result<()> {
        let config = deskbox::load(layout, &self.name)
            .with_context(|| format!("cannot load sandbox {:?}", self.name))?;
        let options = BuildOptions::from_config(&config, layout).with_layers(self.layers);
        println!("{}", serde_json::to_string_pretty(&options)?);
        Ok(())
    }
}

/// A runtime that prints the spec it is asked to create and does nothing
/// else.
pub struct DryRun<W> {
    out: W,
}

impl<W: Write> DryRun<W> {
    pub const fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Runtime for DryRun<W> {
    type Handle = ();

    fn create(&mut self, spec: &Spec) -> deskbox::Result<()> {
        serde_json::to_writer_pretty(&mut self.out, spec)?;
        writeln!(self.out)?;
        Ok(())
    }

    fn start(&mut self, (): &()) -> deskbox::Result<()> {
        Ok(())
    }

    fn wait_until_running(&mut self, (): &()) -> deskbox::Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_prints_the_spec_as_json() {
        let mut rt = DryRun::new(Vec::new());
        let spec = Spec::new("deskbox/app").keep();
        deskbox::launch(&mut rt, &spec).unwrap();

        let printed: Spec = serde_json::from_slice(&rt.out).unwrap();
        assert_eq!(printed, spec);
        assert!(rt.out.ends_with(b"}\n"));
    }
}
