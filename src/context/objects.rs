//! `create*` / `delete*` / `is*` for every object kind.
//!
//! Deleting an object unbinds it from the context-level slots that GL
//! clears on delete (generic buffer targets, indexed uniform buffers, the
//! bound vertex array's element array, texture units, the bound
//! framebuffers and renderbuffer). Containers drop the references they hold
//! on their children at delete time. Vertex array attribute slots and
//! transform feedback bindings keep a deleted buffer reachable.

use super::{Failure, Validated, WebGlContext};
use crate::backend::ObjectKind;
use crate::binding::Bindings;
use crate::extensions::ExtensionSet;
use crate::gl::{self, GLenum};
use crate::objects::{
    Attachment, BufferData, BufferId, FramebufferData, FramebufferId, ObjectPool, ProgramData, ProgramId,
    QueryData, QueryId, RenderbufferData, RenderbufferId, SamplerId, ShaderData, ShaderId, TextureData,
    TextureId, TransformFeedbackData, TransformFeedbackId, VertexArrayData, VertexArrayId,
};

/// Whether an object passed to `delete*` still needs deleting.
///
/// A freed entry leaves no trace in its pool, so a repeated delete finds
/// nothing and is a silent no-op.
fn deletable<K: slotmap::Key, T>(pool: &ObjectPool<K, T>, id: K) -> bool {
    pool.get(id).is_some_and(|entry| !entry.deleted)
}

impl WebGlContext {
    fn create_native(&mut self, kind: ObjectKind) -> Validated<crate::backend::NativeName> {
        self.backend
            .create_object(kind)
            .ok_or_else(|| Failure::out_of_memory(format!("Driver failed to create a {kind:?}.")))
    }

    fn require_vao_support(&self) -> Validated<()> {
        if self.version.is_webgl2() || self.extensions_enabled.contains(ExtensionSet::OES_VERTEX_ARRAY_OBJECT) {
            Ok(())
        } else {
            Err(Failure::invalid_operation("OES_vertex_array_object is not enabled."))
        }
    }

    // ========================================================================
    // Create
    // ========================================================================

    pub fn create_buffer(&mut self) -> Option<BufferId> {
        self.run("createBuffer", |ctx| {
            let native = ctx.create_native(ObjectKind::Buffer)?;
            Ok(ctx.objects.buffers.insert(Some(native), BufferData::default()))
        })
    }

    pub fn create_texture(&mut self) -> Option<TextureId> {
        self.run("createTexture", |ctx| {
            let native = ctx.create_native(ObjectKind::Texture)?;
            Ok(ctx.objects.textures.insert(Some(native), TextureData::default()))
        })
    }

    pub fn create_framebuffer(&mut self) -> Option<FramebufferId> {
        self.run("createFramebuffer", |ctx| {
            let native = ctx.create_native(ObjectKind::Framebuffer)?;
            Ok(ctx.objects.framebuffers.insert(Some(native), FramebufferData::default()))
        })
    }

    pub fn create_renderbuffer(&mut self) -> Option<RenderbufferId> {
        self.run("createRenderbuffer", |ctx| {
            let native = ctx.create_native(ObjectKind::Renderbuffer)?;
            Ok(ctx.objects.renderbuffers.insert(Some(native), RenderbufferData::default()))
        })
    }

    pub fn create_sampler(&mut self) -> Option<SamplerId> {
        self.run("createSampler", |ctx| {
            ctx.require_webgl2()?;
            let native = ctx.create_native(ObjectKind::Sampler)?;
            Ok(ctx.objects.samplers.insert(Some(native), ()))
        })
    }

    /// `createShader(type)`.
    pub fn create_shader(&mut self, stage: GLenum) -> Option<ShaderId> {
        self.run("createShader", |ctx| {
            if !matches!(stage, gl::VERTEX_SHADER | gl::FRAGMENT_SHADER) {
                return Err(Failure::invalid_enum(format!("Bad shader type: 0x{stage:04x}")));
            }
            let native = ctx.create_native(ObjectKind::Shader)?;
            Ok(ctx.objects.shaders.insert(
                Some(native),
                ShaderData {
                    stage,
                    source: String::new(),
                    compiled: false,
                    info_log: String::new(),
                },
            ))
        })
    }

    pub fn create_program(&mut self) -> Option<ProgramId> {
        self.run("createProgram", |ctx| {
            let native = ctx.create_native(ObjectKind::Program)?;
            Ok(ctx.objects.programs.insert(Some(native), ProgramData::default()))
        })
    }

    pub fn create_query(&mut self) -> Option<QueryId> {
        self.run("createQuery", |ctx| {
            ctx.require_webgl2()?;
            let native = ctx.create_native(ObjectKind::Query)?;
            Ok(ctx.objects.queries.insert(Some(native), QueryData::default()))
        })
    }

    pub fn create_vertex_array(&mut self) -> Option<VertexArrayId> {
        self.run("createVertexArray", |ctx| {
            ctx.require_vao_support()?;
            let native = ctx.create_native(ObjectKind::VertexArray)?;
            let data = VertexArrayData::new(ctx.limits.max_vertex_attribs);
            Ok(ctx.objects.vertex_arrays.insert(Some(native), data))
        })
    }

    pub fn create_transform_feedback(&mut self) -> Option<TransformFeedbackId> {
        self.run("createTransformFeedback", |ctx| {
            ctx.require_webgl2()?;
            let native = ctx.create_native(ObjectKind::TransformFeedback)?;
            let data = TransformFeedbackData::new(ctx.limits.max_transform_feedback_separate_attribs);
            Ok(ctx.objects.transform_feedbacks.insert(Some(native), data))
        })
    }

    // ========================================================================
    // Delete
    // ========================================================================

    pub fn delete_buffer(&mut self, buffer: Option<BufferId>) {
        let Some(id) = buffer else { return };
        self.run("deleteBuffer", |ctx| {
            if !deletable(&ctx.objects.buffers, id) {
                return Ok(());
            }
            let Bindings {
                array_buffer,
                copy_read_buffer,
                copy_write_buffer,
                pixel_pack_buffer,
                pixel_unpack_buffer,
                uniform_buffer,
                transform_feedback_buffer,
                uniform_buffers,
                ..
            } = &mut ctx.bindings;
            let pool = &mut ctx.objects.buffers;
            for slot in [
                array_buffer,
                copy_read_buffer,
                copy_write_buffer,
                pixel_pack_buffer,
                pixel_unpack_buffer,
                uniform_buffer,
                transform_feedback_buffer,
            ] {
                if *slot == Some(id) {
                    pool.rebind(slot, None);
                }
            }
            for binding in uniform_buffers.iter_mut().filter(|b| b.buffer == Some(id)) {
                pool.rebind(&mut binding.buffer, None);
                *binding = crate::binding::IndexedBufferBinding::default();
            }
            if let Some(vao) = ctx.objects.vertex_arrays.data_mut(ctx.bindings.vertex_array)
                && vao.element_array == Some(id)
            {
                ctx.objects.buffers.rebind(&mut vao.element_array, None);
            }
            ctx.objects.buffers.mark_deleted(id);
            Ok(())
        });
    }

    pub fn delete_texture(&mut self, texture: Option<TextureId>) {
        let Some(id) = texture else { return };
        self.run("deleteTexture", |ctx| {
            if !deletable(&ctx.objects.textures, id) {
                return Ok(());
            }
            for unit in &mut ctx.bindings.texture_units {
                for slot in [&mut unit.tex_2d, &mut unit.cube_map, &mut unit.tex_3d, &mut unit.tex_2d_array] {
                    if *slot == Some(id) {
                        ctx.objects.textures.rebind(slot, None);
                    }
                }
            }
            ctx.detach_from_bound_framebuffers(|a| matches!(a, Attachment::Texture { id: t, .. } if *t == id));
            ctx.objects.textures.mark_deleted(id);
            Ok(())
        });
    }

    pub fn delete_renderbuffer(&mut self, renderbuffer: Option<RenderbufferId>) {
        let Some(id) = renderbuffer else { return };
        self.run("deleteRenderbuffer", |ctx| {
            if !deletable(&ctx.objects.renderbuffers, id) {
                return Ok(());
            }
            if ctx.bindings.renderbuffer == Some(id) {
                ctx.objects.renderbuffers.rebind(&mut ctx.bindings.renderbuffer, None);
            }
            ctx.detach_from_bound_framebuffers(|a| *a == Attachment::Renderbuffer(id));
            ctx.objects.renderbuffers.mark_deleted(id);
            Ok(())
        });
    }

    pub fn delete_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        let Some(id) = framebuffer else { return };
        self.run("deleteFramebuffer", |ctx| {
            if !deletable(&ctx.objects.framebuffers, id) {
                return Ok(());
            }
            let pool = &mut ctx.objects.framebuffers;
            for slot in [&mut ctx.bindings.draw_framebuffer, &mut ctx.bindings.read_framebuffer] {
                if *slot == Some(id) {
                    pool.rebind(slot, None);
                }
            }
            let attachments = pool
                .data_mut(id)
                .map(|fb| std::mem::take(&mut fb.attachments))
                .unwrap_or_default();
            for attachment in attachments.values() {
                crate::binding::release_attachment_ref(&mut ctx.objects, attachment);
            }
            ctx.objects.framebuffers.mark_deleted(id);
            Ok(())
        });
    }

    pub fn delete_sampler(&mut self, sampler: Option<SamplerId>) {
        let Some(id) = sampler else { return };
        self.run("deleteSampler", |ctx| {
            if !deletable(&ctx.objects.samplers, id) {
                return Ok(());
            }
            for unit in &mut ctx.bindings.texture_units {
                if unit.sampler == Some(id) {
                    ctx.objects.samplers.rebind(&mut unit.sampler, None);
                }
            }
            ctx.objects.samplers.mark_deleted(id);
            Ok(())
        });
    }

    pub fn delete_shader(&mut self, shader: Option<ShaderId>) {
        let Some(id) = shader else { return };
        self.run("deleteShader", |ctx| {
            if deletable(&ctx.objects.shaders, id) {
                ctx.objects.shaders.mark_deleted(id);
            }
            Ok(())
        });
    }

    /// `deleteProgram`. A current program stays in use until replaced, but
    /// releases its attached shaders now.
    pub fn delete_program(&mut self, program: Option<ProgramId>) {
        let Some(id) = program else { return };
        self.run("deleteProgram", |ctx| {
            if !deletable(&ctx.objects.programs, id) {
                return Ok(());
            }
            let objects = &mut ctx.objects;
            if let Some(data) = objects.programs.data_mut(id) {
                objects.shaders.rebind(&mut data.vertex_shader, None);
                objects.shaders.rebind(&mut data.fragment_shader, None);
            }
            objects.programs.mark_deleted(id);
            Ok(())
        });
    }

    /// `deleteQuery`. Ends the query if it is active.
    pub fn delete_query(&mut self, query: Option<QueryId>) {
        let Some(id) = query else { return };
        self.run("deleteQuery", |ctx| {
            if !deletable(&ctx.objects.queries, id) {
                return Ok(());
            }
            if let Some(data) = ctx.objects.queries.data(id)
                && data.active
                && let Some(target) = data.target
            {
                ctx.finish_query(target, id);
            }
            ctx.objects.queries.mark_deleted(id);
            Ok(())
        });
    }

    pub fn delete_vertex_array(&mut self, vao: Option<VertexArrayId>) {
        let Some(id) = vao else { return };
        self.run("deleteVertexArray", |ctx| {
            ctx.require_vao_support()?;
            if id == ctx.default_vao || !deletable(&ctx.objects.vertex_arrays, id) {
                return Ok(());
            }
            if ctx.bindings.vertex_array == id {
                ctx.bindings.vertex_array = ctx.default_vao;
                ctx.objects.vertex_arrays.release_ref(id);
                ctx.backend.bind_vertex_array(None);
            }
            let max_attribs = ctx.limits.max_vertex_attribs;
            let objects = &mut ctx.objects;
            if let Some(data) = objects.vertex_arrays.data_mut(id) {
                let old = std::mem::replace(data, VertexArrayData::new(max_attribs));
                for buffer in old.attribs.iter().filter_map(|a| a.buffer).chain(old.element_array) {
                    objects.buffers.release_ref(buffer);
                }
            }
            objects.vertex_arrays.mark_deleted(id);
            Ok(())
        });
    }

    /// `deleteTransformFeedback`. Refused while the object is active.
    pub fn delete_transform_feedback(&mut self, tf: Option<TransformFeedbackId>) {
        let Some(id) = tf else { return };
        self.run("deleteTransformFeedback", |ctx| {
            ctx.require_webgl2()?;
            if id == ctx.default_tf || !deletable(&ctx.objects.transform_feedbacks, id) {
                return Ok(());
            }
            if ctx.objects.transform_feedbacks.data(id).is_some_and(|d| d.active) {
                return Err(Failure::invalid_operation("Cannot delete an active transform feedback."));
            }
            if ctx.bindings.transform_feedback == id {
                ctx.bindings.transform_feedback = ctx.default_tf;
                ctx.objects.transform_feedbacks.release_ref(id);
                ctx.backend.bind_transform_feedback(None);
            }
            let max = ctx.limits.max_transform_feedback_separate_attribs;
            let objects = &mut ctx.objects;
            if let Some(data) = objects.transform_feedbacks.data_mut(id) {
                let old = std::mem::replace(data, TransformFeedbackData::new(max));
                for buffer in old.bindings.iter().filter_map(|b| b.buffer) {
                    objects.buffers.release_ref(buffer);
                }
            }
            objects.transform_feedbacks.mark_deleted(id);
            Ok(())
        });
    }

    // ========================================================================
    // Is
    // ========================================================================

    fn is_bound_object<K: slotmap::Key, T>(pool: &ObjectPool<K, T>, id: K) -> bool {
        pool.get(id).is_some_and(|e| !e.deleted && e.has_been_bound)
    }

    pub fn is_buffer(&mut self, buffer: BufferId) -> bool {
        self.run("isBuffer", |ctx| Ok(Self::is_bound_object(&ctx.objects.buffers, buffer)))
            .unwrap_or(false)
    }

    pub fn is_texture(&mut self, texture: TextureId) -> bool {
        self.run("isTexture", |ctx| Ok(Self::is_bound_object(&ctx.objects.textures, texture)))
            .unwrap_or(false)
    }

    pub fn is_framebuffer(&mut self, framebuffer: FramebufferId) -> bool {
        self.run("isFramebuffer", |ctx| {
            Ok(Self::is_bound_object(&ctx.objects.framebuffers, framebuffer))
        })
        .unwrap_or(false)
    }

    pub fn is_renderbuffer(&mut self, renderbuffer: RenderbufferId) -> bool {
        self.run("isRenderbuffer", |ctx| {
            Ok(Self::is_bound_object(&ctx.objects.renderbuffers, renderbuffer))
        })
        .unwrap_or(false)
    }

    pub fn is_vertex_array(&mut self, vao: VertexArrayId) -> bool {
        self.run("isVertexArray", |ctx| {
            Ok(vao != ctx.default_vao && Self::is_bound_object(&ctx.objects.vertex_arrays, vao))
        })
        .unwrap_or(false)
    }

    pub fn is_transform_feedback(&mut self, tf: TransformFeedbackId) -> bool {
        self.run("isTransformFeedback", |ctx| {
            Ok(tf != ctx.default_tf && Self::is_bound_object(&ctx.objects.transform_feedbacks, tf))
        })
        .unwrap_or(false)
    }

    pub fn is_program(&mut self, program: ProgramId) -> bool {
        self.run("isProgram", |ctx| Ok(ctx.objects.programs.is_live(program)))
            .unwrap_or(false)
    }

    pub fn is_shader(&mut self, shader: ShaderId) -> bool {
        self.run("isShader", |ctx| Ok(ctx.objects.shaders.is_live(shader)))
            .unwrap_or(false)
    }

    pub fn is_query(&mut self, query: QueryId) -> bool {
        self.run("isQuery", |ctx| Ok(ctx.objects.queries.is_live(query)))
            .unwrap_or(false)
    }

    pub fn is_sampler(&mut self, sampler: SamplerId) -> bool {
        self.run("isSampler", |ctx| Ok(ctx.objects.samplers.is_live(sampler)))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::{DriverCall, ObjectKind, RecordingBackend};
    use crate::context::{GlError, InitContextDesc, WebGlContext};
    use crate::gl;
    use crate::loss::{ContextManager, ManualClock};
    use std::sync::Arc;

    fn context() -> (WebGlContext, crate::backend::RecordingHandle) {
        let backend = RecordingBackend::default();
        let handle = backend.handle();
        let manager = Arc::new(ContextManager::new(Arc::new(ManualClock::new(0)), 3000));
        let ctx = crate::context::ContextBuilder::new(InitContextDesc::default())
            .manager(manager)
            .build(backend)
            .unwrap();
        (ctx, handle)
    }

    fn deleted_count(handle: &crate::backend::RecordingHandle, kind: ObjectKind) -> usize {
        handle.count(|c| matches!(c, DriverCall::DeleteObject { kind: k, .. } if *k == kind))
    }

    #[test]
    fn is_buffer_requires_a_bind() {
        let (mut ctx, _) = context();
        let buffer = ctx.create_buffer().unwrap();
        assert!(!ctx.is_buffer(buffer));
        ctx.bind_buffer(gl::ARRAY_BUFFER, Some(buffer));
        assert!(ctx.is_buffer(buffer));
        ctx.delete_buffer(Some(buffer));
        assert!(!ctx.is_buffer(buffer));
    }

    #[test]
    fn deleting_bound_buffer_clears_generic_slot_and_releases_native() {
        let (mut ctx, handle) = context();
        let buffer = ctx.create_buffer().unwrap();
        ctx.bind_buffer(gl::ARRAY_BUFFER, Some(buffer));
        ctx.delete_buffer(Some(buffer));
        assert_eq!(ctx.bindings.array_buffer, None);
        assert_eq!(deleted_count(&handle, ObjectKind::Buffer), 1);
        assert_eq!(ctx.get_error(), GlError::NoError);
    }

    #[test]
    fn attribute_binding_keeps_deleted_buffer_alive() {
        let (mut ctx, handle) = context();
        let buffer = ctx.create_buffer().unwrap();
        ctx.bind_buffer(gl::ARRAY_BUFFER, Some(buffer));
        ctx.vertex_attrib_pointer(0, 4, gl::FLOAT, false, 0, 0);
        ctx.delete_buffer(Some(buffer));

        assert_eq!(deleted_count(&handle, ObjectKind::Buffer), 0);
        assert_eq!(ctx.current_vao().attribs[0].buffer, Some(buffer));
        assert!(ctx.objects.buffers.get(buffer).is_some_and(|e| e.deleted));
    }

    #[test]
    fn deleting_attached_renderbuffer_detaches_from_bound_framebuffer() {
        let (mut ctx, handle) = context();
        let fb = ctx.create_framebuffer().unwrap();
        let rb = ctx.create_renderbuffer().unwrap();
        ctx.bind_framebuffer(gl::FRAMEBUFFER, Some(fb));
        ctx.bind_renderbuffer(gl::RENDERBUFFER, Some(rb));
        ctx.framebuffer_renderbuffer(gl::FRAMEBUFFER, gl::COLOR_ATTACHMENT0, gl::RENDERBUFFER, Some(rb));
        ctx.delete_renderbuffer(Some(rb));

        assert_eq!(deleted_count(&handle, ObjectKind::Renderbuffer), 1);
        assert_eq!(
            ctx.check_framebuffer_status(gl::FRAMEBUFFER),
            gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT
        );
    }

    #[test]
    fn double_delete_is_silent() {
        let (mut ctx, _) = context();
        let texture = ctx.create_texture().unwrap();
        ctx.delete_texture(Some(texture));
        ctx.delete_texture(Some(texture));
        assert_eq!(ctx.get_error(), GlError::NoError);
    }

    #[test]
    fn repeated_delete_of_a_freed_object_is_silent_for_every_kind() {
        let backend = RecordingBackend::default();
        let handle = backend.handle();
        let manager = Arc::new(ContextManager::new(Arc::new(ManualClock::new(0)), 3000));
        let mut ctx = crate::context::ContextBuilder::new(InitContextDesc {
            version: crate::context::WebGlVersion::WebGl2,
            ..InitContextDesc::default()
        })
        .manager(manager)
        .build(backend)
        .unwrap();

        macro_rules! delete_twice {
            ($create:expr, $delete:ident, $kind:expr) => {{
                let id = $create.unwrap();
                ctx.$delete(Some(id));
                ctx.$delete(Some(id));
                assert_eq!(ctx.get_error(), GlError::NoError, "{}", stringify!($delete));
                assert_eq!(deleted_count(&handle, $kind), 1, "{}", stringify!($delete));
            }};
        }

        delete_twice!(ctx.create_buffer(), delete_buffer, ObjectKind::Buffer);
        delete_twice!(ctx.create_texture(), delete_texture, ObjectKind::Texture);
        delete_twice!(ctx.create_framebuffer(), delete_framebuffer, ObjectKind::Framebuffer);
        delete_twice!(ctx.create_renderbuffer(), delete_renderbuffer, ObjectKind::Renderbuffer);
        delete_twice!(ctx.create_sampler(), delete_sampler, ObjectKind::Sampler);
        delete_twice!(ctx.create_shader(gl::VERTEX_SHADER), delete_shader, ObjectKind::Shader);
        delete_twice!(ctx.create_program(), delete_program, ObjectKind::Program);
        delete_twice!(ctx.create_query(), delete_query, ObjectKind::Query);
        delete_twice!(ctx.create_vertex_array(), delete_vertex_array, ObjectKind::VertexArray);
        delete_twice!(
            ctx.create_transform_feedback(),
            delete_transform_feedback,
            ObjectKind::TransformFeedback
        );
    }

    #[test]
    fn shader_type_is_validated() {
        let (mut ctx, _) = context();
        assert!(ctx.create_shader(gl::TEXTURE_2D).is_none());
        assert_eq!(ctx.get_error(), GlError::InvalidEnum);
    }
}
