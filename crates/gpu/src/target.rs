use crate::backend::{Backend, GpuContext};
use crate::error::GpuError;
use crate::handle::{GpuHandle, ResourceKind};
use crate::object::GpuObject;
use crate::texture::{TextureId, TextureStorage, TextureStore};
use oceanview_common::Extent2d;
use serde::Serialize;

/// A named slot on a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AttachmentPoint {
    Color(u8),
    Depth,
    Stencil,
    DepthStencil,
}

impl AttachmentPoint {
    pub fn is_color(self) -> bool {
        matches!(self, AttachmentPoint::Color(_))
    }
}

impl std::fmt::Display for AttachmentPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttachmentPoint::Color(i) => write!(f, "color{i}"),
            AttachmentPoint::Depth => f.write_str("depth"),
            AttachmentPoint::Stencil => f.write_str("stencil"),
            AttachmentPoint::DepthStencil => f.write_str("depth_stencil"),
        }
    }
}

/// Result of a completeness query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Completeness {
    Complete,
    /// No attachments, or an attachment whose texture no longer exists.
    MissingAttachment,
    /// A format that cannot be used at its attachment point.
    UnsupportedFormat,
    MultisampleMismatch,
    DimensionMismatch,
    /// A draw target names a colour point with nothing attached.
    MissingDrawTarget,
}

impl Completeness {
    pub fn is_complete(self) -> bool {
        self == Completeness::Complete
    }
}

impl std::fmt::Display for Completeness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Completeness::Complete => "complete",
            Completeness::MissingAttachment => "missing attachment",
            Completeness::UnsupportedFormat => "unsupported format",
            Completeness::MultisampleMismatch => "multisample mismatch",
            Completeness::DimensionMismatch => "dimension mismatch",
            Completeness::MissingDrawTarget => "missing draw target",
        };
        f.write_str(s)
    }
}

/// What a backend knows about one attachment when evaluating completeness.
/// `storage` is `None` when the attached texture is no longer live.
#[derive(Debug, Clone, Copy)]
pub struct AttachmentInfo {
    pub point: AttachmentPoint,
    pub storage: Option<TextureStorage>,
}

/// Completeness rules shared by every backend.
pub fn evaluate_completeness(
    attachments: &[AttachmentInfo],
    draw_targets: &[AttachmentPoint],
) -> Completeness {
    if attachments.is_empty() {
        return Completeness::MissingAttachment;
    }
    let mut storages = Vec::with_capacity(attachments.len());
    for info in attachments {
        let Some(storage) = info.storage else {
            return Completeness::MissingAttachment;
        };
        let format_fits = match info.point {
            AttachmentPoint::Color(_) => !storage.format.is_depth(),
            AttachmentPoint::Depth => storage.format.is_depth(),
            AttachmentPoint::Stencil | AttachmentPoint::DepthStencil => {
                storage.format.has_stencil()
            }
        };
        if !format_fits {
            return Completeness::UnsupportedFormat;
        }
        storages.push(storage);
    }
    let first = storages[0];
    if storages.iter().any(|s| s.samples != first.samples) {
        return Completeness::MultisampleMismatch;
    }
    if storages.iter().any(|s| s.extent != first.extent) {
        return Completeness::DimensionMismatch;
    }
    let attached = |point: &AttachmentPoint| attachments.iter().any(|a| a.point == *point);
    if !draw_targets.iter().all(attached) {
        return Completeness::MissingDrawTarget;
    }
    Completeness::Complete
}

/// Non-owning record of which texture sits at which point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment {
    pub point: AttachmentPoint,
    pub texture: TextureId,
}

/// Outcome of [`RenderTarget::resize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// Non-positive size; nothing was touched.
    Ignored,
    Resized {
        extent: Extent2d,
        status: Completeness,
    },
}

/// Offscreen draw destination made of textures owned by a [`TextureStore`].
#[derive(Debug)]
pub struct RenderTarget<B: Backend> {
    object: GpuObject<B>,
    attachments: Vec<Attachment>,
    draw_targets: Vec<AttachmentPoint>,
}

impl<B: Backend> RenderTarget<B> {
    pub fn new(ctx: &GpuContext<B>) -> Result<Self, GpuError> {
        Ok(Self {
            object: GpuObject::new(ctx, ResourceKind::RenderTarget)?,
            attachments: Vec::new(),
            draw_targets: Vec::new(),
        })
    }

    /// Binds the texture's current handle at `point` and records the
    /// attachment, replacing any earlier record for the same point.
    /// Repeating the call with the same arguments is harmless.
    pub fn attach(
        &mut self,
        point: AttachmentPoint,
        texture: TextureId,
        store: &TextureStore<B>,
    ) -> Result<(), GpuError> {
        let handle = store
            .get(texture)
            .ok_or(GpuError::UnknownTexture(texture))?
            .handle();
        self.object
            .context()
            .backend_mut()
            .framebuffer_attach(self.object.handle(), point, Some(handle));
        match self.attachments.iter_mut().find(|a| a.point == point) {
            Some(existing) => existing.texture = texture,
            None => self.attachments.push(Attachment { point, texture }),
        }
        tracing::trace!(%point, %handle, target = %self.object.handle(), "attached texture");
        Ok(())
    }

    pub fn detach(&mut self, point: AttachmentPoint) -> Option<TextureId> {
        let index = self.attachments.iter().position(|a| a.point == point)?;
        self.object
            .context()
            .backend_mut()
            .framebuffer_attach(self.object.handle(), point, None);
        Some(self.attachments.remove(index).texture)
    }

    /// Declares which colour points receive fragment output.
    pub fn set_draw_targets(&mut self, points: &[AttachmentPoint]) {
        self.object
            .context()
            .backend_mut()
            .framebuffer_draw_targets(self.object.handle(), points);
        self.draw_targets = points.to_vec();
    }

    /// Diagnostic only; drawing is never blocked on the result.
    pub fn check_complete(&self) -> Completeness {
        self.object
            .context()
            .backend()
            .framebuffer_status(self.object.handle())
    }

    /// The resize cascade: for every attachment, in order, reallocate its
    /// texture at the new size and then reattach it, because the texture's
    /// handle changed and the binding still names the old one.
    ///
    /// A non-positive size is ignored. An error leaves the attachments before
    /// the failing one resized and the rest at their previous size.
    pub fn resize(
        &mut self,
        width: i32,
        height: i32,
        store: &mut TextureStore<B>,
    ) -> Result<ResizeOutcome, GpuError> {
        let _span = tracing::debug_span!("render_target_resize", width, height).entered();
        let Some(extent) = Extent2d::from_signed(width, height) else {
            tracing::debug!(width, height, "ignoring non-positive render target size");
            return Ok(ResizeOutcome::Ignored);
        };

        for index in 0..self.attachments.len() {
            let Attachment { point, texture } = self.attachments[index];
            store
                .get_mut(texture)
                .ok_or(GpuError::UnknownTexture(texture))?
                .reallocate(extent.width(), extent.height())?;
            self.attach(point, texture, store)?;
        }

        let status = self.check_complete();
        if status.is_complete() {
            tracing::debug!(%extent, "render target resized");
        } else {
            tracing::warn!(%extent, %status, "render target incomplete after resize");
        }
        Ok(ResizeOutcome::Resized { extent, status })
    }

    pub fn bind(&self) {
        self.object
            .context()
            .backend_mut()
            .bind_framebuffer(Some(self.object.handle()));
    }

    /// Makes the default surface the draw destination again.
    pub fn unbind(ctx: &GpuContext<B>) {
        ctx.backend_mut().bind_framebuffer(None);
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn attachment(&self, point: AttachmentPoint) -> Option<TextureId> {
        self.attachments
            .iter()
            .find(|a| a.point == point)
            .map(|a| a.texture)
    }

    pub fn draw_targets(&self) -> &[AttachmentPoint] {
        &self.draw_targets
    }

    pub fn handle(&self) -> GpuHandle {
        self.object.handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessBackend;
    use crate::texture::{TextureDescriptor, TextureFormat};

    const COLOR0: AttachmentPoint = AttachmentPoint::Color(0);

    struct Fixture {
        ctx: GpuContext<HeadlessBackend>,
        store: TextureStore<HeadlessBackend>,
        target: RenderTarget<HeadlessBackend>,
        color: TextureId,
        depth: TextureId,
    }

    fn fixture(w: u32, h: u32) -> Fixture {
        let ctx = GpuContext::new(HeadlessBackend::new());
        let extent = Extent2d::new(w, h).unwrap();
        let mut store = TextureStore::new();
        let color = store
            .create(&ctx, TextureDescriptor::empty("color", extent, TextureFormat::Rgba8))
            .unwrap();
        let depth = store
            .create(&ctx, TextureDescriptor::empty("depth", extent, TextureFormat::Depth24))
            .unwrap();
        let mut target = RenderTarget::new(&ctx).unwrap();
        target.attach(COLOR0, color, &store).unwrap();
        target.attach(AttachmentPoint::Depth, depth, &store).unwrap();
        target.set_draw_targets(&[COLOR0]);
        Fixture {
            ctx,
            store,
            target,
            color,
            depth,
        }
    }

    fn sizes(f: &Fixture) -> Vec<(u32, u32)> {
        f.target
            .attachments()
            .iter()
            .map(|a| {
                let t = f.store.get(a.texture).unwrap();
                (t.width(), t.height())
            })
            .collect()
    }

    fn info(point: AttachmentPoint, w: u32, h: u32, format: TextureFormat) -> AttachmentInfo {
        AttachmentInfo {
            point,
            storage: Some(TextureStorage {
                extent: Extent2d::new(w, h).unwrap(),
                format,
                samples: 1,
                filter: crate::texture::FilterMode::Linear,
                wrap: crate::texture::WrapMode::ClampToEdge,
            }),
        }
    }

    #[test]
    fn color_and_depth_is_complete() {
        let f = fixture(640, 480);
        assert_eq!(f.target.check_complete(), Completeness::Complete);
    }

    #[test]
    fn resize_reallocates_and_reattaches() {
        let mut f = fixture(800, 600);
        let old_color = f.store.get(f.color).unwrap().handle();

        let outcome = f.target.resize(400, 300, &mut f.store).unwrap();

        assert_eq!(
            outcome,
            ResizeOutcome::Resized {
                extent: Extent2d::new(400, 300).unwrap(),
                status: Completeness::Complete
            }
        );
        assert_eq!(f.target.attachment(COLOR0), Some(f.color));
        assert_eq!(f.target.attachment(AttachmentPoint::Depth), Some(f.depth));
        assert_eq!(sizes(&f), vec![(400, 300), (400, 300)]);

        let new_color = f.store.get(f.color).unwrap().handle();
        let new_depth = f.store.get(f.depth).unwrap().handle();
        assert_ne!(new_color, old_color);
        assert_eq!(
            f.ctx.backend().framebuffer_attachments(f.target.handle()),
            vec![(COLOR0, new_color), (AttachmentPoint::Depth, new_depth)]
        );
    }

    #[test]
    fn resize_twice_is_idempotent() {
        let mut f = fixture(800, 600);
        let first = f.target.resize(1024, 768, &mut f.store).unwrap();
        let sizes_first = sizes(&f);
        let second = f.target.resize(1024, 768, &mut f.store).unwrap();
        assert_eq!(first, second);
        assert_eq!(sizes_first, sizes(&f));
        assert_eq!(f.ctx.backend().live_count(ResourceKind::Texture), 2);
    }

    #[test]
    fn non_positive_resize_is_ignored() {
        let mut f = fixture(320, 200);
        let handles: Vec<_> = f
            .target
            .attachments()
            .iter()
            .map(|a| f.store.get(a.texture).unwrap().handle())
            .collect();
        for (w, h) in [(0, 10), (10, 0), (-5, -5), (0, 0)] {
            assert_eq!(
                f.target.resize(w, h, &mut f.store).unwrap(),
                ResizeOutcome::Ignored
            );
        }
        assert_eq!(sizes(&f), vec![(320, 200), (320, 200)]);
        let after: Vec<_> = f
            .target
            .attachments()
            .iter()
            .map(|a| f.store.get(a.texture).unwrap().handle())
            .collect();
        assert_eq!(handles, after);
    }

    #[test]
    fn end_to_end_resize_scenario() {
        let mut f = fixture(640, 480);
        assert!(f.target.check_complete().is_complete());
        f.target.resize(1280, 720, &mut f.store).unwrap();
        assert_eq!(sizes(&f), vec![(1280, 720), (1280, 720)]);
        assert!(f.target.check_complete().is_complete());
        f.target.resize(0, 0, &mut f.store).unwrap();
        assert_eq!(sizes(&f), vec![(1280, 720), (1280, 720)]);
    }

    #[test]
    fn attach_same_point_replaces_record() {
        let mut f = fixture(16, 16);
        let extent = Extent2d::new(16, 16).unwrap();
        let other = f
            .store
            .create(&f.ctx, TextureDescriptor::empty("other", extent, TextureFormat::Rgba8))
            .unwrap();
        f.target.attach(COLOR0, other, &f.store).unwrap();
        f.target.attach(COLOR0, other, &f.store).unwrap();
        assert_eq!(f.target.attachments().len(), 2);
        assert_eq!(f.target.attachment(COLOR0), Some(other));
    }

    #[test]
    fn attach_unknown_texture_fails() {
        let mut f = fixture(16, 16);
        let removed = f.store.remove(f.color).unwrap();
        drop(removed);
        let err = f.target.attach(COLOR0, f.color, &f.store).unwrap_err();
        assert!(matches!(err, GpuError::UnknownTexture(_)));
    }

    #[test]
    fn removed_texture_makes_target_incomplete() {
        let mut f = fixture(16, 16);
        drop(f.store.remove(f.depth));
        assert_eq!(f.target.check_complete(), Completeness::MissingAttachment);
    }

    #[test]
    fn dropping_target_never_releases_textures() {
        let f = fixture(16, 16);
        let Fixture {
            ctx, store, target, ..
        } = f;
        drop(target);
        assert_eq!(ctx.backend().live_count(ResourceKind::RenderTarget), 0);
        assert_eq!(ctx.backend().live_count(ResourceKind::Texture), 2);
        drop(store);
        assert_eq!(ctx.backend().live_count(ResourceKind::Texture), 0);
    }

    #[test]
    fn detach_removes_binding() {
        let mut f = fixture(16, 16);
        assert_eq!(f.target.detach(AttachmentPoint::Depth), Some(f.depth));
        assert_eq!(f.target.detach(AttachmentPoint::Depth), None);
        assert_eq!(f.target.attachments().len(), 1);
        assert!(f.target.check_complete().is_complete());
    }

    #[test]
    fn draw_targets_reach_the_backend() {
        let mut f = fixture(16, 16);
        assert_eq!(f.ctx.backend().draw_targets_of(f.target.handle()), vec![COLOR0]);

        f.target.set_draw_targets(&[COLOR0, AttachmentPoint::Color(1)]);
        assert_eq!(f.target.draw_targets(), &[COLOR0, AttachmentPoint::Color(1)]);
        assert_eq!(
            f.ctx.backend().draw_targets_of(f.target.handle()),
            vec![COLOR0, AttachmentPoint::Color(1)]
        );
        assert_eq!(f.target.check_complete(), Completeness::MissingDrawTarget);
    }

    #[test]
    fn multisampled_depth_with_single_sample_color_is_incomplete() {
        let mut f = fixture(16, 16);
        let extent = Extent2d::new(16, 16).unwrap();
        let msaa_depth = f
            .store
            .create(
                &f.ctx,
                TextureDescriptor::empty("msaa_depth", extent, TextureFormat::Depth24).samples(4),
            )
            .unwrap();
        f.target.attach(AttachmentPoint::Depth, msaa_depth, &f.store).unwrap();
        assert_eq!(f.target.check_complete(), Completeness::MultisampleMismatch);

        f.target.attach(AttachmentPoint::Depth, f.depth, &f.store).unwrap();
        assert!(f.target.check_complete().is_complete());
    }

    #[test]
    fn bind_and_unbind_switch_destination() {
        let f = fixture(16, 16);
        f.target.bind();
        assert_eq!(f.ctx.backend().bound_framebuffer(), Some(f.target.handle()));
        RenderTarget::unbind(&f.ctx);
        assert_eq!(f.ctx.backend().bound_framebuffer(), None);
    }

    #[test]
    fn completeness_rules() {
        use AttachmentPoint::{Color, Depth, DepthStencil};
        use TextureFormat::{Depth24, Depth24Stencil8, Rgba8};

        assert_eq!(evaluate_completeness(&[], &[]), Completeness::MissingAttachment);
        assert_eq!(
            evaluate_completeness(
                &[AttachmentInfo {
                    point: Color(0),
                    storage: None
                }],
                &[]
            ),
            Completeness::MissingAttachment
        );
        assert_eq!(
            evaluate_completeness(&[info(Color(0), 4, 4, Depth24)], &[]),
            Completeness::UnsupportedFormat
        );
        assert_eq!(
            evaluate_completeness(&[info(Depth, 4, 4, Rgba8)], &[]),
            Completeness::UnsupportedFormat
        );
        assert_eq!(
            evaluate_completeness(&[info(DepthStencil, 4, 4, Depth24)], &[]),
            Completeness::UnsupportedFormat
        );
        assert_eq!(
            evaluate_completeness(
                &[info(Color(0), 4, 4, Rgba8), info(DepthStencil, 4, 4, Depth24Stencil8)],
                &[Color(0)]
            ),
            Completeness::Complete
        );
        assert_eq!(
            evaluate_completeness(
                &[info(Color(0), 4, 4, Rgba8), info(Depth, 8, 4, Depth24)],
                &[]
            ),
            Completeness::DimensionMismatch
        );
        assert_eq!(
            evaluate_completeness(&[info(Color(0), 4, 4, Rgba8)], &[Color(1)]),
            Completeness::MissingDrawTarget
        );

        let mut msaa = info(Depth, 4, 4, Depth24);
        if let Some(storage) = msaa.storage.as_mut() {
            storage.samples = 4;
        }
        assert_eq!(
            evaluate_completeness(&[info(Color(0), 4, 4, Rgba8), msaa], &[]),
            Completeness::MultisampleMismatch
        );
    }
}
