use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroU32;

/// Opaque backend-assigned identifier of one live GPU resource.
///
/// Zero is never a valid handle, matching the convention that zero names the
/// default object (the default framebuffer, "no buffer", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GpuHandle(NonZeroU32);

impl GpuHandle {
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for GpuHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The namespaces handles are allocated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ResourceKind {
    Buffer,
    VertexArray,
    Texture,
    RenderTarget,
    StorageBuffer,
    Program,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Buffer,
        ResourceKind::VertexArray,
        ResourceKind::Texture,
        ResourceKind::RenderTarget,
        ResourceKind::StorageBuffer,
        ResourceKind::Program,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Buffer => "buffer",
            ResourceKind::VertexArray => "vertex array",
            ResourceKind::Texture => "texture",
            ResourceKind::RenderTarget => "render target",
            ResourceKind::StorageBuffer => "storage buffer",
            ResourceKind::Program => "program",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
struct Namespace {
    issued: u32,
    free: BTreeSet<NonZeroU32>,
    live: BTreeSet<NonZeroU32>,
}

/// Per-kind handle allocation, lowest free value first.
///
/// Released values are handed out again, the way GL reuses object names, so a
/// stale handle kept past its owner's lifetime can alias a newer resource.
/// Owners therefore must never retain a handle after release.
#[derive(Debug, Default)]
pub struct HandleAllocator {
    namespaces: HashMap<ResourceKind, Namespace>,
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, kind: ResourceKind) -> GpuHandle {
        let ns = self.namespaces.entry(kind).or_default();
        let raw = match ns.free.pop_first() {
            Some(raw) => raw,
            None => {
                let raw = NonZeroU32::MIN.saturating_add(ns.issued);
                ns.issued += 1;
                raw
            }
        };
        ns.live.insert(raw);
        GpuHandle(raw)
    }

    /// Returns `false` if the handle was not live (double release).
    pub fn release(&mut self, kind: ResourceKind, handle: GpuHandle) -> bool {
        let Some(ns) = self.namespaces.get_mut(&kind) else {
            return false;
        };
        if !ns.live.remove(&handle.0) {
            return false;
        }
        ns.free.insert(handle.0);
        true
    }

    pub fn is_live(&self, kind: ResourceKind, handle: GpuHandle) -> bool {
        self.namespaces
            .get(&kind)
            .is_some_and(|ns| ns.live.contains(&handle.0))
    }

    pub fn live_count(&self, kind: ResourceKind) -> usize {
        self.namespaces.get(&kind).map_or(0, |ns| ns.live.len())
    }
}
