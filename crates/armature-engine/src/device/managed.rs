use std::collections::HashMap;

use super::context::GraphicsContext;
use super::error::RenderResult;

/// Identity of a registered GPU-backed resource.
///
/// Stable for the resource's lifetime, across context restorations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RestorableId(u64);

/// A GPU-backed resource able to rebuild its device handles after context loss.
pub trait Restorable {
    /// Recreates GPU objects and re-uploads the CPU-side copy of their contents.
    fn restore(&mut self, ctx: &mut ManagedContext) -> RenderResult<()>;
}

/// Owns the active graphics backend and the restorable registry.
///
/// Every restoration bumps the context *epoch*. Resources record the epoch their
/// handles were created in; a resource that sees a newer epoch rebuilds itself
/// before touching the backend, so stale handles are never used.
pub struct ManagedContext {
    gl: Box<dyn GraphicsContext>,
    epoch: u64,
    restorables: HashMap<RestorableId, &'static str>,
    next_restorable: u64,
}

impl ManagedContext {
    pub fn new(gl: impl GraphicsContext) -> Self {
        Self {
            gl: Box::new(gl),
            epoch: 0,
            restorables: HashMap::new(),
            next_restorable: 0,
        }
    }

    /// Returns the active backend.
    #[inline]
    pub fn gl(&mut self) -> &mut dyn GraphicsContext {
        self.gl.as_mut()
    }

    #[inline]
    pub fn gl_ref(&self) -> &dyn GraphicsContext {
        self.gl.as_ref()
    }

    /// Downcasts the active backend to its concrete type.
    pub fn backend<T: GraphicsContext>(&self) -> Option<&T> {
        self.gl.as_any().downcast_ref::<T>()
    }

    pub fn backend_mut<T: GraphicsContext>(&mut self) -> Option<&mut T> {
        self.gl.as_any_mut().downcast_mut::<T>()
    }

    /// Current context generation.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Registers a resource; `kind` is used for diagnostics only.
    pub fn add_restorable(&mut self, kind: &'static str) -> RestorableId {
        let id = RestorableId(self.next_restorable);
        self.next_restorable += 1;
        self.restorables.insert(id, kind);
        id
    }

    /// Unregisters a resource. Returns `false` if it was not registered.
    pub fn remove_restorable(&mut self, id: RestorableId) -> bool {
        self.restorables.remove(&id).is_some()
    }

    pub fn restorable_count(&self) -> usize {
        self.restorables.len()
    }

    /// Installs a fresh backend after the previous one lost its device.
    ///
    /// All handles created before this call are invalid. Registered resources
    /// rebuild on their next use, or immediately when their owner calls
    /// [`Restorable::restore`].
    pub fn restore_with(&mut self, gl: impl GraphicsContext) {
        self.gl = Box::new(gl);
        self.epoch += 1;

        let mut kinds: Vec<&'static str> = self.restorables.values().copied().collect();
        kinds.sort_unstable();
        kinds.dedup();
        log::info!(
            "graphics context restored (epoch {}); {} resources pending rebuild ({})",
            self.epoch,
            self.restorables.len(),
            kinds.join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HeadlessContext;

    #[test]
    fn registry_tracks_add_and_remove() {
        let mut ctx = ManagedContext::new(HeadlessContext::new());
        let a = ctx.add_restorable("mesh");
        let b = ctx.add_restorable("texture");
        assert_ne!(a, b);
        assert_eq!(ctx.restorable_count(), 2);

        assert!(ctx.remove_restorable(a));
        assert!(!ctx.remove_restorable(a));
        assert_eq!(ctx.restorable_count(), 1);
    }

    #[test]
    fn restore_with_bumps_epoch_and_swaps_backend() {
        let mut ctx = ManagedContext::new(HeadlessContext::new());
        ctx.gl().clear(crate::paint::Color::BLACK);
        assert_eq!(ctx.epoch(), 0);
        assert_eq!(ctx.backend::<HeadlessContext>().map(|h| h.commands().len()), Some(1));

        ctx.restore_with(HeadlessContext::new());
        assert_eq!(ctx.epoch(), 1);
        assert_eq!(ctx.backend::<HeadlessContext>().map(|h| h.commands().len()), Some(0));
    }
}
