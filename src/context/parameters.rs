//! `getParameter` and the other state getters.
//!
//! Everything is answered from the client-side mirror; the driver is never
//! asked. Vendor and renderer strings are generic, and the unmasked ones are
//! too when fingerprinting resistance is on.

use super::{Failure, Validated, WebGlContext};
use crate::gl::{self, GLenum};
use crate::objects::{
    BufferId, FramebufferId, ProgramId, QueryId, RenderbufferId, SamplerId, TextureId, TransformFeedbackId,
    VertexArrayId,
};

/// A typed parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i32),
    Uint(u32),
    Int64(i64),
    Float(f32),
    Enum(GLenum),
    Int2([i32; 2]),
    Int4([i32; 4]),
    Uint4([u32; 4]),
    Float2([f32; 2]),
    Float4([f32; 4]),
    Bool4([bool; 4]),
    String(String),
    Buffer(Option<BufferId>),
    Texture(Option<TextureId>),
    Framebuffer(Option<FramebufferId>),
    Renderbuffer(Option<RenderbufferId>),
    Program(Option<ProgramId>),
    VertexArray(Option<VertexArrayId>),
    TransformFeedback(Option<TransformFeedbackId>),
    Sampler(Option<SamplerId>),
    Query(Option<QueryId>),
}

fn int(value: u32) -> ParamValue {
    ParamValue::Int(i32::try_from(value).unwrap_or(i32::MAX))
}

fn int64(value: u64) -> ParamValue {
    ParamValue::Int64(i64::try_from(value).unwrap_or(i64::MAX))
}

impl WebGlContext {
    /// `getParameter`.
    pub fn get_parameter(&mut self, pname: GLenum) -> Option<ParamValue> {
        self.run("getParameter", |ctx| ctx.parameter(pname))
    }

    fn parameter(&self, pname: GLenum) -> Validated<ParamValue> {
        if let Some(value) = self.state_parameter(pname) {
            return Ok(value);
        }
        if let Some(value) = self.binding_parameter(pname) {
            return Ok(value);
        }
        if let Some(value) = self.limit_parameter(pname) {
            return Ok(value);
        }
        if let Some(value) = self.string_parameter(pname) {
            return Ok(value);
        }
        Err(Failure::invalid_enum(format!("Bad pname: 0x{pname:04x}")))
    }

    fn state_parameter(&self, pname: GLenum) -> Option<ParamValue> {
        let s = &self.state;
        let webgl2 = self.version.is_webgl2();
        if let Some(cap) = super::EnabledCaps::from_gl(pname, webgl2) {
            return Some(ParamValue::Bool(s.is_enabled(cap)));
        }
        let store = &s.pixel_store;
        Some(match pname {
            gl::VIEWPORT => ParamValue::Int4(s.viewport),
            gl::SCISSOR_BOX => ParamValue::Int4(s.scissor),
            gl::BLEND_COLOR => ParamValue::Float4(s.blend.color.to_array()),
            gl::BLEND_EQUATION_RGB => ParamValue::Enum(s.blend.equation_rgb),
            gl::BLEND_EQUATION_ALPHA => ParamValue::Enum(s.blend.equation_alpha),
            gl::BLEND_SRC_RGB => ParamValue::Enum(s.blend.src_rgb),
            gl::BLEND_DST_RGB => ParamValue::Enum(s.blend.dst_rgb),
            gl::BLEND_SRC_ALPHA => ParamValue::Enum(s.blend.src_alpha),
            gl::BLEND_DST_ALPHA => ParamValue::Enum(s.blend.dst_alpha),
            gl::COLOR_WRITEMASK => ParamValue::Bool4(s.color_mask),
            gl::DEPTH_WRITEMASK => ParamValue::Bool(s.depth_mask),
            gl::COLOR_CLEAR_VALUE => ParamValue::Float4(s.clear_color.to_array()),
            gl::DEPTH_CLEAR_VALUE => ParamValue::Float(s.clear_depth),
            gl::STENCIL_CLEAR_VALUE => ParamValue::Int(s.clear_stencil),
            gl::LINE_WIDTH => ParamValue::Float(s.line_width),
            gl::DEPTH_FUNC => ParamValue::Enum(s.depth_func),
            gl::DEPTH_RANGE => ParamValue::Float2(s.depth_range.to_array()),
            gl::CULL_FACE_MODE => ParamValue::Enum(s.cull_face_mode),
            gl::FRONT_FACE => ParamValue::Enum(s.front_face),
            gl::GENERATE_MIPMAP_HINT => ParamValue::Enum(s.generate_mipmap_hint),
            gl::FRAGMENT_SHADER_DERIVATIVE_HINT if webgl2 => ParamValue::Enum(s.derivative_hint),
            gl::POLYGON_OFFSET_FACTOR => ParamValue::Float(s.polygon_offset.x),
            gl::POLYGON_OFFSET_UNITS => ParamValue::Float(s.polygon_offset.y),
            gl::SAMPLE_COVERAGE_VALUE => ParamValue::Float(s.sample_coverage_value),
            gl::SAMPLE_COVERAGE_INVERT => ParamValue::Bool(s.sample_coverage_invert),

            gl::STENCIL_FUNC => ParamValue::Enum(s.stencil_front.func),
            gl::STENCIL_REF => ParamValue::Int(s.stencil_front.reference),
            gl::STENCIL_VALUE_MASK => ParamValue::Uint(s.stencil_front.value_mask),
            gl::STENCIL_WRITEMASK => ParamValue::Uint(s.stencil_front.write_mask),
            gl::STENCIL_FAIL => ParamValue::Enum(s.stencil_front.fail),
            gl::STENCIL_PASS_DEPTH_FAIL => ParamValue::Enum(s.stencil_front.depth_fail),
            gl::STENCIL_PASS_DEPTH_PASS => ParamValue::Enum(s.stencil_front.depth_pass),
            gl::STENCIL_BACK_FUNC => ParamValue::Enum(s.stencil_back.func),
            gl::STENCIL_BACK_REF => ParamValue::Int(s.stencil_back.reference),
            gl::STENCIL_BACK_VALUE_MASK => ParamValue::Uint(s.stencil_back.value_mask),
            gl::STENCIL_BACK_WRITEMASK => ParamValue::Uint(s.stencil_back.write_mask),
            gl::STENCIL_BACK_FAIL => ParamValue::Enum(s.stencil_back.fail),
            gl::STENCIL_BACK_PASS_DEPTH_FAIL => ParamValue::Enum(s.stencil_back.depth_fail),
            gl::STENCIL_BACK_PASS_DEPTH_PASS => ParamValue::Enum(s.stencil_back.depth_pass),
            gl::STENCIL_BITS => int(self.draw_framebuffer_stencil_bits()),

            gl::UNPACK_ALIGNMENT => int(store.unpack_alignment),
            gl::PACK_ALIGNMENT => int(store.pack_alignment),
            gl::UNPACK_FLIP_Y_WEBGL => ParamValue::Bool(store.flip_y),
            gl::UNPACK_PREMULTIPLY_ALPHA_WEBGL => ParamValue::Bool(store.premultiply_alpha),
            gl::UNPACK_COLORSPACE_CONVERSION_WEBGL => ParamValue::Enum(store.colorspace_conversion),
            gl::UNPACK_ROW_LENGTH if webgl2 => int(store.unpack_row_length),
            gl::UNPACK_IMAGE_HEIGHT if webgl2 => int(store.unpack_image_height),
            gl::UNPACK_SKIP_PIXELS if webgl2 => int(store.unpack_skip_pixels),
            gl::UNPACK_SKIP_ROWS if webgl2 => int(store.unpack_skip_rows),
            gl::UNPACK_SKIP_IMAGES if webgl2 => int(store.unpack_skip_images),
            gl::PACK_ROW_LENGTH if webgl2 => int(store.pack_row_length),
            gl::PACK_SKIP_PIXELS if webgl2 => int(store.pack_skip_pixels),
            gl::PACK_SKIP_ROWS if webgl2 => int(store.pack_skip_rows),
            _ => return None,
        })
    }

    fn binding_parameter(&self, pname: GLenum) -> Option<ParamValue> {
        let b = &self.bindings;
        let webgl2 = self.version.is_webgl2();
        let vao_ext = self
            .extensions_enabled
            .contains(crate::extensions::ExtensionSet::OES_VERTEX_ARRAY_OBJECT);
        Some(match pname {
            gl::ARRAY_BUFFER_BINDING => ParamValue::Buffer(b.array_buffer),
            gl::ELEMENT_ARRAY_BUFFER_BINDING => ParamValue::Buffer(self.current_vao().element_array),
            gl::COPY_READ_BUFFER_BINDING if webgl2 => ParamValue::Buffer(b.copy_read_buffer),
            gl::COPY_WRITE_BUFFER_BINDING if webgl2 => ParamValue::Buffer(b.copy_write_buffer),
            gl::PIXEL_PACK_BUFFER_BINDING if webgl2 => ParamValue::Buffer(b.pixel_pack_buffer),
            gl::PIXEL_UNPACK_BUFFER_BINDING if webgl2 => ParamValue::Buffer(b.pixel_unpack_buffer),
            gl::UNIFORM_BUFFER_BINDING if webgl2 => ParamValue::Buffer(b.uniform_buffer),
            gl::TRANSFORM_FEEDBACK_BUFFER_BINDING if webgl2 => ParamValue::Buffer(b.transform_feedback_buffer),

            gl::ACTIVE_TEXTURE => ParamValue::Enum(gl::TEXTURE0 + b.active_texture),
            gl::TEXTURE_BINDING_2D => ParamValue::Texture(self.bound_texture(gl::TEXTURE_2D)),
            gl::TEXTURE_BINDING_CUBE_MAP => ParamValue::Texture(self.bound_texture(gl::TEXTURE_CUBE_MAP)),
            gl::TEXTURE_BINDING_3D if webgl2 => ParamValue::Texture(self.bound_texture(gl::TEXTURE_3D)),
            gl::TEXTURE_BINDING_2D_ARRAY if webgl2 => {
                ParamValue::Texture(self.bound_texture(gl::TEXTURE_2D_ARRAY))
            }
            gl::SAMPLER_BINDING if webgl2 => ParamValue::Sampler(b.active_unit().and_then(|u| u.sampler)),

            gl::FRAMEBUFFER_BINDING => ParamValue::Framebuffer(b.draw_framebuffer),
            gl::READ_FRAMEBUFFER_BINDING if webgl2 => ParamValue::Framebuffer(b.read_framebuffer),
            gl::RENDERBUFFER_BINDING => ParamValue::Renderbuffer(b.renderbuffer),
            gl::CURRENT_PROGRAM => ParamValue::Program(b.program),
            gl::VERTEX_ARRAY_BINDING if webgl2 || vao_ext => {
                ParamValue::VertexArray((b.vertex_array != self.default_vao).then_some(b.vertex_array))
            }
            gl::TRANSFORM_FEEDBACK_BINDING if webgl2 => ParamValue::TransformFeedback(
                (b.transform_feedback != self.default_tf).then_some(b.transform_feedback),
            ),
            gl::TRANSFORM_FEEDBACK_ACTIVE if webgl2 => ParamValue::Bool(self.current_tf().active),
            gl::TRANSFORM_FEEDBACK_PAUSED if webgl2 => ParamValue::Bool(self.current_tf().paused),
            _ => return None,
        })
    }

    fn limit_parameter(&self, pname: GLenum) -> Option<ParamValue> {
        let l = &self.limits;
        let webgl2 = self.version.is_webgl2();
        Some(match pname {
            gl::MAX_TEXTURE_SIZE => int(l.max_texture_size),
            gl::MAX_CUBE_MAP_TEXTURE_SIZE => int(l.max_cube_map_texture_size),
            gl::MAX_RENDERBUFFER_SIZE => int(l.max_renderbuffer_size),
            gl::MAX_VERTEX_ATTRIBS => int(l.max_vertex_attribs),
            gl::MAX_COMBINED_TEXTURE_IMAGE_UNITS => int(l.max_texture_units),
            gl::MAX_VIEWPORT_DIMS => {
                let [w, h] = l.max_viewport_dims;
                ParamValue::Int2([
                    i32::try_from(w).unwrap_or(i32::MAX),
                    i32::try_from(h).unwrap_or(i32::MAX),
                ])
            }
            gl::MAX_3D_TEXTURE_SIZE if webgl2 => int(l.max_3d_texture_size),
            gl::MAX_ARRAY_TEXTURE_LAYERS if webgl2 => int(l.max_array_texture_layers),
            gl::MAX_COLOR_ATTACHMENTS if webgl2 => int(l.max_color_attachments),
            gl::MAX_DRAW_BUFFERS if webgl2 => int(l.max_draw_buffers),
            gl::MAX_SAMPLES if webgl2 => int(l.max_samples),
            gl::MAX_UNIFORM_BUFFER_BINDINGS if webgl2 => int(l.max_uniform_buffer_bindings),
            gl::MAX_TRANSFORM_FEEDBACK_SEPARATE_ATTRIBS if webgl2 => {
                int(l.max_transform_feedback_separate_attribs)
            }
            gl::UNIFORM_BUFFER_OFFSET_ALIGNMENT if webgl2 => int(l.uniform_buffer_offset_alignment),
            gl::MAX_CLIENT_WAIT_TIMEOUT_WEBGL if webgl2 => ParamValue::Int64(0),
            _ => return None,
        })
    }

    fn string_parameter(&self, pname: GLenum) -> Option<ParamValue> {
        let webgl2 = self.version.is_webgl2();
        let text = match pname {
            gl::VENDOR => "WebKit".to_owned(),
            gl::RENDERER => "WebKit WebGL".to_owned(),
            gl::VERSION if webgl2 => "WebGL 2.0".to_owned(),
            gl::VERSION => "WebGL 1.0".to_owned(),
            gl::SHADING_LANGUAGE_VERSION if webgl2 => "WebGL GLSL ES 3.00".to_owned(),
            gl::SHADING_LANGUAGE_VERSION => "WebGL GLSL ES 1.0".to_owned(),
            gl::UNMASKED_VENDOR_WEBGL if self.resist_fingerprinting => "Mozilla".to_owned(),
            gl::UNMASKED_RENDERER_WEBGL if self.resist_fingerprinting => "Mozilla".to_owned(),
            gl::UNMASKED_VENDOR_WEBGL => self.capabilities.vendor.clone(),
            gl::UNMASKED_RENDERER_WEBGL => self.capabilities.renderer.clone(),
            _ => return None,
        };
        Some(ParamValue::String(text))
    }

    /// `getBufferParameter`.
    pub fn get_buffer_parameter(&mut self, target: GLenum, pname: GLenum) -> Option<ParamValue> {
        self.run("getBufferParameter", |ctx| {
            let buffer = ctx.require_bound_buffer(target)?;
            let data = ctx
                .objects
                .buffers
                .data(buffer)
                .ok_or_else(|| Failure::implementation_bug("bound buffer missing from its pool"))?;
            match pname {
                gl::BUFFER_SIZE => Ok(int64(data.byte_length)),
                gl::BUFFER_USAGE => Ok(ParamValue::Enum(data.usage)),
                _ => Err(Failure::invalid_enum(format!("Bad pname: 0x{pname:04x}"))),
            }
        })
    }

    /// `getIndexedParameter` for indexed buffer bindings.
    pub fn get_indexed_parameter(&mut self, target: GLenum, index: u32) -> Option<ParamValue> {
        self.run("getIndexedParameter", |ctx| {
            ctx.require_webgl2()?;
            let (bindings, what) = match target {
                gl::UNIFORM_BUFFER_BINDING | gl::UNIFORM_BUFFER_START | gl::UNIFORM_BUFFER_SIZE => {
                    (ctx.bindings.uniform_buffers.as_slice(), target)
                }
                gl::TRANSFORM_FEEDBACK_BUFFER_BINDING
                | gl::TRANSFORM_FEEDBACK_BUFFER_START
                | gl::TRANSFORM_FEEDBACK_BUFFER_SIZE => (ctx.current_tf().bindings.as_slice(), target),
                _ => return Err(Failure::invalid_enum(format!("Bad target: 0x{target:04x}"))),
            };
            let binding = bindings
                .get(index as usize)
                .ok_or_else(|| Failure::invalid_value(format!("`index` ({index}) out of range.")))?;
            Ok(match what {
                gl::UNIFORM_BUFFER_BINDING | gl::TRANSFORM_FEEDBACK_BUFFER_BINDING => {
                    ParamValue::Buffer(binding.buffer)
                }
                gl::UNIFORM_BUFFER_START | gl::TRANSFORM_FEEDBACK_BUFFER_START => int64(binding.start),
                _ => int64(binding.size),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::ParamValue;
    use crate::backend::{Capabilities, RecordingBackend};
    use crate::context::{ContextBuilder, GlError, InitContextDesc, WebGlContext, WebGlVersion};
    use crate::gl;
    use crate::loss::{ContextManager, ManualClock};

    fn context(desc: InitContextDesc) -> WebGlContext {
        let manager = Arc::new(ContextManager::new(Arc::new(ManualClock::new(0)), 3000));
        let backend = RecordingBackend::new(Capabilities {
            renderer: "Acme GPU 9000".into(),
            ..Capabilities::default()
        });
        ContextBuilder::new(desc).manager(manager).build(backend).unwrap()
    }

    #[test]
    fn reports_mirrored_state() {
        let mut ctx = context(InitContextDesc::default());
        ctx.viewport(1, 2, 30, 40);
        ctx.enable(gl::BLEND);
        assert_eq!(ctx.get_parameter(gl::VIEWPORT), Some(ParamValue::Int4([1, 2, 30, 40])));
        assert_eq!(ctx.get_parameter(gl::BLEND), Some(ParamValue::Bool(true)));
        assert_eq!(ctx.get_parameter(gl::ACTIVE_TEXTURE), Some(ParamValue::Enum(gl::TEXTURE0)));
    }

    #[test]
    fn webgl2_pnames_rejected_on_webgl1() {
        let mut ctx = context(InitContextDesc::default());
        assert_eq!(ctx.get_parameter(gl::MAX_SAMPLES), None);
        assert_eq!(ctx.get_error(), GlError::InvalidEnum);

        let mut ctx2 = context(InitContextDesc {
            version: WebGlVersion::WebGl2,
            ..InitContextDesc::default()
        });
        assert!(matches!(ctx2.get_parameter(gl::MAX_SAMPLES), Some(ParamValue::Int(_))));
    }

    #[test]
    fn unmasked_renderer_hidden_when_resisting_fingerprinting() {
        let mut open = context(InitContextDesc::default());
        assert_eq!(
            open.get_parameter(gl::UNMASKED_RENDERER_WEBGL),
            Some(ParamValue::String("Acme GPU 9000".into()))
        );

        let mut rfp = context(InitContextDesc {
            resist_fingerprinting: true,
            ..InitContextDesc::default()
        });
        assert_eq!(
            rfp.get_parameter(gl::UNMASKED_RENDERER_WEBGL),
            Some(ParamValue::String("Mozilla".into()))
        );
    }
}
