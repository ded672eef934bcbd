//! The seam between an assembled spec and a container engine.
//!
//! deskbox does not talk to a container engine itself. A [`Runtime`]
//! receives the finished [`Spec`] and owns everything that happens after.

use crate::error::Result;
use crate::spec::Spec;

/// A container engine able to create and start containers from a [`Spec`].
pub trait Runtime {
    /// Engine-specific reference to a created container.
    type Handle;

    /// Creates a container without starting it.
    fn create(&mut self, spec: &Spec) -> Result<Self::Handle>;

    /// Starts a created container.
    fn start(&mut self, handle: &Self::Handle) -> Result<()>;

    /// Blocks until the container is running.
    fn wait_until_running(&mut self, handle: &Self::Handle) -> Result<()>;

    /// Connects the terminal to a running container. Engines that cannot
    /// attach leave the container detached.
    fn attach(&mut self, handle: &Self::Handle) -> Result<()> {
        let _ = handle;
        Ok(())
    }
}

/// Creates and starts a container for `spec`, returning once it runs.
///
/// # Errors
///
/// Returns the first error reported by `runtime`.
pub fn launch<R: Runtime + ?Sized>(runtime: &mut R, spec: &Spec) -> Result<R::Handle> {
    let handle = runtime.create(spec)?;
    runtime.start(&handle)?;
    runtime.wait_until_running(&handle)?;
    tracing::debug!(image = %spec.image, "container running");
    Ok(handle)
}
