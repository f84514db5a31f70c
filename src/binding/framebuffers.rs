use smallvec::SmallVec;

use crate::backend::AttachmentSource;
use crate::context::{Failure, Validated, WebGlContext};
use crate::gl::{self, GLenum};
use crate::objects::{Attachment, FramebufferId, ObjectRegistry, RenderbufferData, RenderbufferId, TextureId};
use crate::texture::formats::{self, Renderable};

/// Result of a framebuffer completeness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramebufferStatus {
    Complete,
    IncompleteAttachment,
    MissingAttachment,
    IncompleteDimensions,
    Unsupported,
    IncompleteMultisample,
}

impl FramebufferStatus {
    #[must_use]
    pub const fn as_gl_enum(self) -> GLenum {
        match self {
            Self::Complete => gl::FRAMEBUFFER_COMPLETE,
            Self::IncompleteAttachment => gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT,
            Self::MissingAttachment => gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT,
            Self::IncompleteDimensions => gl::FRAMEBUFFER_INCOMPLETE_DIMENSIONS,
            Self::Unsupported => gl::FRAMEBUFFER_UNSUPPORTED,
            Self::IncompleteMultisample => gl::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Format and size of whatever an attachment point refers to.
#[derive(Debug, Clone, Copy)]
struct AttachedImage {
    internal_format: GLenum,
    width: u32,
    height: u32,
    samples: u32,
}

fn attached_image(objects: &ObjectRegistry, attachment: &Attachment) -> Option<AttachedImage> {
    match *attachment {
        Attachment::Texture {
            id,
            image_target,
            level,
        } => {
            let image = objects.textures.data(id)?.image(image_target, level)?;
            Some(AttachedImage {
                internal_format: image.internal_format,
                width: image.width,
                height: image.height,
                samples: 0,
            })
        }
        Attachment::Renderbuffer(id) => {
            let &RenderbufferData {
                internal_format,
                width,
                height,
                samples,
            } = objects.renderbuffers.data(id)?;
            (internal_format != 0).then_some(AttachedImage {
                internal_format,
                width,
                height,
                samples,
            })
        }
    }
}

fn add_attachment_ref(objects: &mut ObjectRegistry, attachment: &Attachment) {
    match *attachment {
        Attachment::Texture { id, .. } => objects.textures.add_ref(id),
        Attachment::Renderbuffer(id) => objects.renderbuffers.add_ref(id),
    }
}

pub(crate) fn release_attachment_ref(objects: &mut ObjectRegistry, attachment: &Attachment) {
    match *attachment {
        Attachment::Texture { id, .. } => objects.textures.release_ref(id),
        Attachment::Renderbuffer(id) => objects.renderbuffers.release_ref(id),
    }
}

impl WebGlContext {
    fn validate_framebuffer_target(&self, target: GLenum) -> Validated<()> {
        match target {
            gl::FRAMEBUFFER => Ok(()),
            gl::DRAW_FRAMEBUFFER | gl::READ_FRAMEBUFFER if self.version.is_webgl2() => Ok(()),
            _ => Err(Failure::invalid_enum(format!("Bad framebuffer target: 0x{target:04x}"))),
        }
    }

    /// Framebuffer bound to `target`; `None` is the default framebuffer.
    pub(crate) fn bound_framebuffer(&self, target: GLenum) -> Option<FramebufferId> {
        match target {
            gl::READ_FRAMEBUFFER => self.bindings.read_framebuffer,
            _ => self.bindings.draw_framebuffer,
        }
    }

    /// Attachment points a script-facing `attachment` enum expands to.
    fn attachment_points(&self, attachment: GLenum) -> Validated<SmallVec<[GLenum; 2]>> {
        let color_count = if self.version.is_webgl2() {
            self.limits.max_color_attachments
        } else {
            1
        };
        match attachment {
            gl::DEPTH_ATTACHMENT | gl::STENCIL_ATTACHMENT => Ok(SmallVec::from_slice(&[attachment])),
            gl::DEPTH_STENCIL_ATTACHMENT if self.version.is_webgl2() => {
                Ok(SmallVec::from_slice(&[gl::DEPTH_ATTACHMENT, gl::STENCIL_ATTACHMENT]))
            }
            gl::DEPTH_STENCIL_ATTACHMENT => Ok(SmallVec::from_slice(&[attachment])),
            a if (gl::COLOR_ATTACHMENT0..gl::COLOR_ATTACHMENT0 + color_count).contains(&a) => {
                Ok(SmallVec::from_slice(&[a]))
            }
            _ => Err(Failure::invalid_enum(format!("Bad attachment: 0x{attachment:04x}"))),
        }
    }

    // ========================================================================
    // Binding
    // ========================================================================

    /// `bindFramebuffer`. `FRAMEBUFFER` binds both draw and read.
    pub fn bind_framebuffer(&mut self, target: GLenum, framebuffer: Option<FramebufferId>) {
        self.run("bindFramebuffer", |ctx| {
            ctx.validate_framebuffer_target(target)?;
            if let Some(id) = framebuffer
                && !ctx.objects.framebuffers.is_live(id)
            {
                return Err(Failure::invalid_operation("Framebuffer is deleted or unknown."));
            }

            if let Some(id) = framebuffer {
                ctx.objects.framebuffers.mark_bound(id);
            }
            let pool = &mut ctx.objects.framebuffers;
            if matches!(target, gl::FRAMEBUFFER | gl::DRAW_FRAMEBUFFER) {
                pool.rebind(&mut ctx.bindings.draw_framebuffer, framebuffer);
            }
            if matches!(target, gl::FRAMEBUFFER | gl::READ_FRAMEBUFFER) {
                pool.rebind(&mut ctx.bindings.read_framebuffer, framebuffer);
            }
            let native = ctx.objects.framebuffers.native_of(framebuffer);
            ctx.backend.bind_framebuffer(target, native);
            Ok(())
        });
    }

    /// `bindRenderbuffer`.
    pub fn bind_renderbuffer(&mut self, target: GLenum, renderbuffer: Option<RenderbufferId>) {
        self.run("bindRenderbuffer", |ctx| {
            if target != gl::RENDERBUFFER {
                return Err(Failure::invalid_enum(format!("Bad renderbuffer target: 0x{target:04x}")));
            }
            if let Some(id) = renderbuffer
                && !ctx.objects.renderbuffers.is_live(id)
            {
                return Err(Failure::invalid_operation("Renderbuffer is deleted or unknown."));
            }
            if let Some(id) = renderbuffer {
                ctx.objects.renderbuffers.mark_bound(id);
            }
            ctx.objects.renderbuffers.rebind(&mut ctx.bindings.renderbuffer, renderbuffer);
            let native = ctx.objects.renderbuffers.native_of(renderbuffer);
            ctx.backend.bind_renderbuffer(native);
            Ok(())
        });
    }

    // ========================================================================
    // Attachments
    // ========================================================================

    fn attach(&mut self, target: GLenum, attachment: GLenum, new: Option<Attachment>) -> Validated<()> {
        let points = self.attachment_points(attachment)?;
        let framebuffer = self.bound_framebuffer(target).ok_or_else(|| {
            Failure::invalid_operation("Cannot change attachments of the default framebuffer.")
        })?;

        let objects = &mut self.objects;
        let Some(data) = objects.framebuffers.data_mut(framebuffer) else {
            return Err(Failure::implementation_bug("bound framebuffer missing from its pool"));
        };
        let mut replaced: SmallVec<[Attachment; 2]> = SmallVec::new();
        for &point in &points {
            let old = match new {
                Some(a) => data.attachments.insert(point, a),
                None => data.attachments.remove(&point),
            };
            replaced.extend(old);
        }
        if let Some(a) = &new {
            for _ in &points {
                add_attachment_ref(objects, a);
            }
        }
        for old in &replaced {
            release_attachment_ref(objects, old);
        }

        let source = match new {
            None => AttachmentSource::None,
            Some(Attachment::Texture {
                id,
                image_target,
                level,
            }) => match objects.textures.native(id) {
                Some(texture) => AttachmentSource::Texture {
                    texture,
                    image_target,
                    level,
                },
                None => AttachmentSource::None,
            },
            Some(Attachment::Renderbuffer(id)) => objects
                .renderbuffers
                .native(id)
                .map_or(AttachmentSource::None, AttachmentSource::Renderbuffer),
        };
        for point in points {
            self.backend.framebuffer_attach(target, point, source);
        }
        Ok(())
    }

    /// `framebufferTexture2D`.
    pub fn framebuffer_texture_2d(
        &mut self,
        target: GLenum,
        attachment: GLenum,
        tex_target: GLenum,
        texture: Option<TextureId>,
        level: i32,
    ) {
        self.run("framebufferTexture2D", |ctx| {
            ctx.validate_framebuffer_target(target)?;
            let bind_target = match tex_target {
                gl::TEXTURE_2D => gl::TEXTURE_2D,
                gl::TEXTURE_CUBE_MAP_POSITIVE_X..=gl::TEXTURE_CUBE_MAP_NEGATIVE_Z => gl::TEXTURE_CUBE_MAP,
                _ => return Err(Failure::invalid_enum(format!("Bad texture target: 0x{tex_target:04x}"))),
            };

            let new = match texture {
                None => None,
                Some(id) => {
                    let entry = ctx
                        .objects
                        .textures
                        .get(id)
                        .filter(|e| !e.deleted)
                        .ok_or_else(|| Failure::invalid_operation("Texture is deleted or unknown."))?;
                    if entry.data.target != Some(bind_target) {
                        return Err(Failure::invalid_operation(
                            "Texture target does not match `textarget`.",
                        ));
                    }
                    let max_level = if ctx.version.is_webgl2() {
                        crate::context::Limits::max_level_for(ctx.limits.max_texture_size)
                    } else {
                        0
                    };
                    let level = u32::try_from(level)
                        .ok()
                        .filter(|&l| l <= max_level)
                        .ok_or_else(|| Failure::invalid_value(format!("Bad mip level: {level}")))?;
                    Some(Attachment::Texture {
                        id,
                        image_target: tex_target,
                        level,
                    })
                }
            };
            ctx.attach(target, attachment, new)
        });
    }

    /// `framebufferRenderbuffer`.
    pub fn framebuffer_renderbuffer(
        &mut self,
        target: GLenum,
        attachment: GLenum,
        renderbuffer_target: GLenum,
        renderbuffer: Option<RenderbufferId>,
    ) {
        self.run("framebufferRenderbuffer", |ctx| {
            ctx.validate_framebuffer_target(target)?;
            if renderbuffer_target != gl::RENDERBUFFER {
                return Err(Failure::invalid_enum(format!(
                    "Bad renderbuffer target: 0x{renderbuffer_target:04x}"
                )));
            }
            if let Some(id) = renderbuffer
                && !ctx.objects.renderbuffers.is_live(id)
            {
                return Err(Failure::invalid_operation("Renderbuffer is deleted or unknown."));
            }
            ctx.attach(target, attachment, renderbuffer.map(Attachment::Renderbuffer))
        });
    }

    // ========================================================================
    // Renderbuffer Storage
    // ========================================================================

    /// `renderbufferStorage`.
    pub fn renderbuffer_storage(&mut self, target: GLenum, internal_format: GLenum, width: i32, height: i32) {
        self.run("renderbufferStorage", |ctx| {
            ctx.renderbuffer_storage_impl(target, 0, internal_format, width, height)
        });
    }

    /// `renderbufferStorageMultisample`.
    pub fn renderbuffer_storage_multisample(
        &mut self,
        target: GLenum,
        samples: i32,
        internal_format: GLenum,
        width: i32,
        height: i32,
    ) {
        self.run("renderbufferStorageMultisample", |ctx| {
            ctx.require_webgl2()?;
            ctx.renderbuffer_storage_impl(target, samples, internal_format, width, height)
        });
    }

    fn renderbuffer_storage_impl(
        &mut self,
        target: GLenum,
        samples: i32,
        internal_format: GLenum,
        width: i32,
        height: i32,
    ) -> Validated<()> {
        if target != gl::RENDERBUFFER {
            return Err(Failure::invalid_enum(format!("Bad renderbuffer target: 0x{target:04x}")));
        }
        let id = self
            .bindings
            .renderbuffer
            .ok_or_else(|| Failure::invalid_operation("No renderbuffer bound."))?;
        let info = formats::resolve_renderbuffer_format(self.version, self.extensions_enabled, internal_format)?;

        let (Ok(width), Ok(height), Ok(samples)) =
            (u32::try_from(width), u32::try_from(height), u32::try_from(samples))
        else {
            return Err(Failure::invalid_value("`width`, `height` and `samples` must be non-negative."));
        };
        let max = self.limits.max_renderbuffer_size;
        if width > max || height > max {
            return Err(Failure::invalid_value(format!(
                "Requested size {width}x{height} exceeds MAX_RENDERBUFFER_SIZE ({max})."
            )));
        }
        if samples > self.limits.max_samples {
            return Err(Failure::invalid_operation(format!(
                "`samples` ({samples}) exceeds MAX_SAMPLES ({}).",
                self.limits.max_samples
            )));
        }

        if !self
            .backend
            .renderbuffer_storage(info.internal_format, samples, width, height)
        {
            return Err(Failure::out_of_memory("Renderbuffer allocation failed."));
        }
        if let Some(data) = self.objects.renderbuffers.data_mut(id) {
            *data = RenderbufferData {
                internal_format: info.internal_format,
                width,
                height,
                samples,
            };
        }
        Ok(())
    }

    // ========================================================================
    // Completeness
    // ========================================================================

    /// Completeness of a framebuffer; the default framebuffer is always
    /// complete.
    pub(crate) fn framebuffer_status(&self, framebuffer: Option<FramebufferId>) -> FramebufferStatus {
        let Some(data) = framebuffer.and_then(|id| self.objects.framebuffers.data(id)) else {
            return FramebufferStatus::Complete;
        };
        if data.attachments.is_empty() {
            return FramebufferStatus::MissingAttachment;
        }

        let mut size: Option<(u32, u32)> = None;
        let mut samples: Option<u32> = None;
        for (&point, attachment) in &data.attachments {
            let Some(image) = attached_image(&self.objects, attachment) else {
                return FramebufferStatus::IncompleteAttachment;
            };
            if image.width == 0 || image.height == 0 {
                return FramebufferStatus::IncompleteAttachment;
            }
            let Some(info) = formats::sized_format(image.internal_format) else {
                return FramebufferStatus::IncompleteAttachment;
            };
            let attachable = match point {
                gl::DEPTH_ATTACHMENT => {
                    info.renderable == Renderable::Depth || (info.has_depth() && self.version.is_webgl2())
                }
                gl::STENCIL_ATTACHMENT => {
                    info.renderable == Renderable::Stencil || (info.has_stencil() && self.version.is_webgl2())
                }
                gl::DEPTH_STENCIL_ATTACHMENT => info.renderable == Renderable::DepthStencil,
                _ => info.is_color_renderable(self.extensions_enabled),
            };
            if !attachable {
                return FramebufferStatus::IncompleteAttachment;
            }

            match size {
                None => size = Some((image.width, image.height)),
                Some(s) if s != (image.width, image.height) && !self.version.is_webgl2() => {
                    return FramebufferStatus::IncompleteDimensions;
                }
                Some(_) => {}
            }
            match samples {
                None => samples = Some(image.samples),
                Some(s) if s != image.samples => return FramebufferStatus::IncompleteMultisample,
                Some(_) => {}
            }
        }

        let depth = data.attachments.get(&gl::DEPTH_ATTACHMENT);
        let stencil = data.attachments.get(&gl::STENCIL_ATTACHMENT);
        let depth_stencil = data.attachments.contains_key(&gl::DEPTH_STENCIL_ATTACHMENT);
        if self.version.is_webgl2() {
            if let (Some(d), Some(s)) = (depth, stencil)
                && d != s
            {
                return FramebufferStatus::Unsupported;
            }
        } else if usize::from(depth.is_some()) + usize::from(stencil.is_some()) + usize::from(depth_stencil) > 1 {
            return FramebufferStatus::Unsupported;
        }
        FramebufferStatus::Complete
    }

    /// `checkFramebufferStatus`. Returns 0 on an invalid target.
    pub fn check_framebuffer_status(&mut self, target: GLenum) -> GLenum {
        self.run("checkFramebufferStatus", |ctx| {
            ctx.validate_framebuffer_target(target)?;
            Ok(ctx.framebuffer_status(ctx.bound_framebuffer(target)).as_gl_enum())
        })
        .unwrap_or(0)
    }

    /// Requires the framebuffer bound to `target` to be complete.
    pub(crate) fn require_complete_framebuffer(&self, target: GLenum) -> Validated<()> {
        let status = self.framebuffer_status(self.bound_framebuffer(target));
        if status.is_complete() {
            Ok(())
        } else {
            Err(Failure::invalid_framebuffer_operation(format!(
                "Framebuffer not complete (status 0x{:04x}).",
                status.as_gl_enum()
            )))
        }
    }

    /// Stencil bits of the current draw framebuffer.
    pub(crate) fn draw_framebuffer_stencil_bits(&self) -> u32 {
        let Some(data) = self
            .bindings
            .draw_framebuffer
            .and_then(|id| self.objects.framebuffers.data(id))
        else {
            return if self.attributes.stencil { 8 } else { 0 };
        };
        let has_stencil = [gl::STENCIL_ATTACHMENT, gl::DEPTH_STENCIL_ATTACHMENT]
            .iter()
            .filter_map(|point| data.attachments.get(point))
            .filter_map(|a| attached_image(&self.objects, a))
            .filter_map(|image| formats::sized_format(image.internal_format))
            .any(|info| info.has_stencil());
        if has_stencil { 8 } else { 0 }
    }

    /// Detaches `attachment` objects from the bound framebuffers, as deleting
    /// an attached object does.
    pub(crate) fn detach_from_bound_framebuffers(&mut self, matches: impl Fn(&Attachment) -> bool) {
        let mut targets: SmallVec<[(GLenum, FramebufferId); 2]> = SmallVec::new();
        if let Some(id) = self.bindings.draw_framebuffer {
            targets.push((gl::DRAW_FRAMEBUFFER, id));
        }
        if let Some(id) = self.bindings.read_framebuffer
            && self.bindings.draw_framebuffer != Some(id)
        {
            targets.push((gl::READ_FRAMEBUFFER, id));
        }

        for (target, id) in targets {
            let Some(data) = self.objects.framebuffers.data_mut(id) else {
                continue;
            };
            let points: SmallVec<[GLenum; 4]> = data
                .attachments
                .iter()
                .filter(|(_, a)| matches(a))
                .map(|(&p, _)| p)
                .collect();
            let mut removed: SmallVec<[Attachment; 4]> = SmallVec::new();
            for point in &points {
                removed.extend(data.attachments.remove(point));
            }
            for a in &removed {
                release_attachment_ref(&mut self.objects, a);
            }
            let target = if self.version.is_webgl2() { target } else { gl::FRAMEBUFFER };
            for point in points {
                self.backend.framebuffer_attach(target, point, AttachmentSource::None);
            }
        }
    }
}
