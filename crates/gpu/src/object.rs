use crate::backend::{Backend, GpuContext};
use crate::error::GpuError;
use crate::handle::{GpuHandle, ResourceKind};

/// Exclusive owner of one backend handle.
///
/// Not `Clone`: ownership of a handle is singular. The handle is released when
/// the object is dropped, and never before.
pub struct GpuObject<B: Backend> {
    ctx: GpuContext<B>,
    kind: ResourceKind,
    handle: GpuHandle,
}

impl<B: Backend> GpuObject<B> {
    pub fn new(ctx: &GpuContext<B>, kind: ResourceKind) -> Result<Self, GpuError> {
        let handle = ctx.backend_mut().create(kind)?;
        tracing::trace!(%kind, %handle, "created gpu object");
        Ok(Self {
            ctx: ctx.clone(),
            kind,
            handle,
        })
    }

    pub fn handle(&self) -> GpuHandle {
        self.handle
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn context(&self) -> &GpuContext<B> {
        &self.ctx
    }
}

impl<B: Backend> std::fmt::Debug for GpuObject<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuObject")
            .field("kind", &self.kind)
            .field("handle", &self.handle)
            .finish()
    }
}

impl<B: Backend> Drop for GpuObject<B> {
    fn drop(&mut self) {
        tracing::trace!(kind = %self.kind, handle = %self.handle, "releasing gpu object");
        self.ctx.backend_mut().destroy(self.kind, self.handle);
    }
}
